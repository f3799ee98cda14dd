use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::fence::CodeFence;
use super::matcher::LineMatcher;
use super::session::DiffSession;
use crate::collab::ChunkStream;

/// How consuming a chunk stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Finished,
    Cancelled,
}

/// Feeds streamed model output into a [`DiffSession`].
///
/// Chunks are buffered and re-decoded on each arrival; only lines that can no
/// longer change are matched, so the session never sees a partial line.
#[derive(Debug)]
pub struct DiffStream {
    session: DiffSession,
    matcher: LineMatcher,
    buffer: String,
    emitted: usize,

    /// Whether the code is expected inside a fenced block.
    fenced: bool,
    saw_code: bool,
}

impl DiffStream {
    /// Reconcile the first fenced code block of the output. Prose and
    /// markdown blocks produce no edits.
    pub fn new(session: DiffSession) -> Self {
        Self::with_mode(session, true)
    }

    /// Reconcile the output as-is, every line being code.
    pub fn raw(session: DiffSession) -> Self {
        Self::with_mode(session, false)
    }

    fn with_mode(session: DiffSession, fenced: bool) -> Self {
        let matcher = LineMatcher::new(session.original_lines().to_vec());
        Self {
            session,
            matcher,
            buffer: String::new(),
            emitted: 0,
            fenced,
            saw_code: !fenced,
        }
    }

    pub fn session(&self) -> &DiffSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DiffSession {
        &mut self.session
    }

    pub fn into_session(self) -> DiffSession {
        self.session
    }

    /// Everything received so far.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn push_chunk(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
        let lines = match self.code() {
            Some(code) => code.finished_lines().to_vec(),
            None => return,
        };
        self.emit(&lines);
    }

    /// The stream ended: flush the last line and remove unmatched originals.
    pub fn finish(&mut self) {
        if let Some(code) = self.code() {
            let mut lines = code.lines;
            if !code.is_complete && lines.last().is_some_and(String::is_empty) {
                lines.pop();
            }
            self.emit(&lines);
        }
        if self.saw_code {
            let leftovers = std::mem::take(&mut self.matcher).finish();
            leftovers.iter().for_each(|event| self.session.apply(event));
        } else {
            tracing::debug!("no code block in the response, leaving the document untouched");
        }
        self.session.finish();
    }

    /// Drive the stream to completion or until `cancel` fires. Failed chunks
    /// are logged and skipped.
    pub async fn consume(&mut self, mut chunks: ChunkStream, cancel: &CancellationToken) -> StreamEnd {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.session.cancel();
                    return StreamEnd::Cancelled;
                }
                next = chunks.next() => match next {
                    Some(Ok(chunk)) => self.push_chunk(&chunk),
                    Some(Err(error)) => tracing::warn!(?error, "skipping failed chunk"),
                    None => {
                        self.finish();
                        return StreamEnd::Finished;
                    }
                },
            }
        }
    }

    /// The code decoded from the buffer, if any has started.
    fn code(&mut self) -> Option<CodeFence> {
        if !self.fenced {
            return Some(CodeFence {
                language: None,
                lines: self.buffer.split('\n').map(String::from).collect(),
                is_complete: false,
            });
        }

        let fence = CodeFence::parse(&self.buffer);
        if fence.language.is_none() || !fence.is_code() {
            return None;
        }
        self.saw_code = true;
        Some(fence)
    }

    fn emit(&mut self, lines: &[String]) {
        let Some(fresh) = lines.get(self.emitted..) else {
            return;
        };
        for line in fresh {
            for event in self.matcher.push(line) {
                self.session.apply(&event);
            }
        }
        self.emitted = lines.len();
    }
}
