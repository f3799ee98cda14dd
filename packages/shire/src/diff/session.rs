use std::collections::VecDeque;
use std::fmt::{self, Debug, Formatter};
use std::ops::Range;

use super::DiffLine;
use super::block::DiffBlock;
use super::document::{Document, DocumentError};

/// Lifecycle of a [`DiffSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no events yet.
    Idle,

    /// Consuming diff lines.
    Running,

    /// The stream ended; blocks await review.
    Finished,

    /// Cancelled, or everything was accepted or rejected.
    Closed,
}

/// Where the next diff line applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorState {
    pub index: usize,

    /// Id of the block collecting consecutive changes at the cursor.
    pub active_block: Option<usize>,
}

type Callback = Box<dyn FnMut() + Send>;

/// Applies streamed diff lines to a document and tracks the resulting
/// blocks until the user accepts or rejects them.
///
/// Every event is applied to the document as it arrives; accepting only
/// clears the bookkeeping.
pub struct DiffSession {
    document: Document,
    original: Vec<String>,
    start_line: usize,
    end_line: usize,
    cursor: CursorState,
    blocks: Vec<DiffBlock>,
    next_block_id: usize,
    state: SessionState,

    /// Whether any block was accepted or rejected individually.
    touched: bool,

    highlight: Option<usize>,
    unfinished: VecDeque<usize>,
    on_close: Option<Callback>,
    on_finish: Option<Callback>,
}

impl DiffSession {
    /// A session rewriting `lines` of `document`.
    pub fn new(document: Document, lines: Range<usize>) -> Self {
        let end_line = lines.end.min(document.line_count());
        let start_line = lines.start.min(end_line);
        let original = document.lines()[start_line..end_line].to_vec();
        Self {
            document,
            original,
            start_line,
            end_line,
            cursor: CursorState {
                index: start_line,
                active_block: None,
            },
            blocks: Vec::new(),
            next_block_id: 0,
            state: SessionState::Idle,
            touched: false,
            highlight: None,
            unfinished: (start_line..end_line).collect(),
            on_close: None,
            on_finish: None,
        }
    }

    /// A session rewriting the whole of `text`.
    pub fn for_text(text: &str) -> Self {
        let document = Document::new(text);
        let lines = 0..text.lines().count();
        Self::new(document, lines)
    }

    /// Called whenever no blocks remain.
    pub fn with_on_close(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(callback));
        self
    }

    /// Called once the stream ends.
    pub fn with_on_finish(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_finish = Some(Box::new(callback));
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn text(&self) -> String {
        self.document.text()
    }

    pub fn blocks(&self) -> &[DiffBlock] {
        &self.blocks
    }

    pub fn cursor(&self) -> CursorState {
        self.cursor
    }

    /// The line highlighted as in progress.
    pub fn current_line(&self) -> Option<usize> {
        self.highlight
    }

    /// Original lines the stream hasn't reached yet.
    pub fn unfinished_lines(&self) -> impl Iterator<Item = usize> + '_ {
        self.unfinished.iter().copied()
    }

    /// The lines being rewritten, as they were before any event.
    pub fn original_lines(&self) -> &[String] {
        &self.original
    }

    /// Apply one diff line. Failures are logged and the line skipped.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn apply(&mut self, line: &DiffLine) {
        match self.state {
            SessionState::Idle => self.state = SessionState::Running,
            SessionState::Running => {}
            SessionState::Finished | SessionState::Closed => {
                tracing::debug!(state = ?self.state, "ignoring diff line after the stream ended");
                return;
            }
        }

        let result = match line {
            DiffLine::Same(_) => {
                self.handle_same();
                Ok(())
            }
            DiffLine::New(text) => self.handle_new(text),
            DiffLine::Old(_) => self.handle_old(),
        };
        if let Err(error) = result {
            tracing::warn!(%error, index = self.cursor.index, %line, "could not apply diff line");
        }

        self.update_progress(line.is_old());
    }

    /// The stream ended normally.
    pub fn finish(&mut self) {
        if matches!(self.state, SessionState::Finished | SessionState::Closed) {
            return;
        }
        self.end_active_block();
        self.state = SessionState::Finished;
        self.clear_progress();
        if let Some(on_finish) = self.on_finish.as_mut() {
            on_finish();
        }
    }

    /// Stop consuming events. Edits already applied stay.
    pub fn cancel(&mut self) {
        self.end_active_block();
        self.state = SessionState::Closed;
        self.clear_progress();
    }

    pub fn accept_block(&mut self, id: usize) -> bool {
        self.handle_accept_or_reject(id, true)
    }

    pub fn reject_block(&mut self, id: usize) -> bool {
        self.handle_accept_or_reject(id, false)
    }

    /// Keep every edit.
    pub fn accept_all(&mut self) {
        self.reset();
    }

    /// Undo the remaining edits.
    ///
    /// Without individual decisions this reverts the document to its state
    /// before the stream. Once a block was accepted or rejected, only the
    /// remaining blocks are reverted so an accepted block survives.
    pub fn reject_all(&mut self) {
        if self.touched {
            self.blocks.sort_by_key(|b| b.start_line);
            while !self.blocks.is_empty() {
                let block = self.blocks.remove(0);
                self.revert(&block);
            }
        } else {
            let undone = self.document.undo_all();
            tracing::debug!(undone, "reverted every edit");
        }
        self.reset();
    }

    fn handle_same(&mut self) {
        self.end_active_block();
        self.cursor.index += 1;
    }

    fn handle_new(&mut self, text: &str) -> Result<(), DocumentError> {
        let pos = self.active_block_position();
        self.blocks[pos].add_new_line(&mut self.document, text, self.cursor.index)?;
        self.cursor.index += 1;
        Ok(())
    }

    fn handle_old(&mut self) -> Result<(), DocumentError> {
        let pos = self.active_block_position();
        self.blocks[pos].delete_line_at(&mut self.document, self.cursor.index)
    }

    fn end_active_block(&mut self) {
        if let Some(id) = self.cursor.active_block.take()
            && let Some(block) = self.blocks.iter_mut().find(|b| b.id == id)
        {
            block.on_last_diff_line();
        }
    }

    /// Position of the active block, starting one at the cursor if needed.
    fn active_block_position(&mut self) -> usize {
        if let Some(id) = self.cursor.active_block
            && let Some(pos) = self.blocks.iter().position(|b| b.id == id)
        {
            return pos;
        }

        let id = self.next_block_id;
        self.next_block_id += 1;
        self.blocks.push(DiffBlock::new(id, self.cursor.index));
        self.cursor.active_block = Some(id);
        self.blocks.len() - 1
    }

    fn update_progress(&mut self, is_old: bool) {
        let last = self.document.line_count().saturating_sub(1);
        self.highlight = Some(self.cursor.index.min(last));
        if !is_old {
            self.unfinished.pop_front();
        }
    }

    fn clear_progress(&mut self) {
        self.highlight = None;
        self.unfinished.clear();
    }

    fn handle_accept_or_reject(&mut self, id: usize, accept: bool) -> bool {
        let Some(pos) = self.blocks.iter().position(|b| b.id == id) else {
            return false;
        };
        self.touched = true;
        let block = self.blocks.remove(pos);
        if self.cursor.active_block == Some(id) {
            self.cursor.active_block = None;
        }

        if !accept {
            self.revert(&block);
        }

        if self.blocks.is_empty() {
            if self.state != SessionState::Running {
                self.state = SessionState::Closed;
            }
            self.fire_close();
        }
        true
    }

    /// Revert a block already removed from the list and shift the blocks
    /// after it.
    fn revert(&mut self, block: &DiffBlock) {
        if let Err(error) = block.revert(&mut self.document) {
            tracing::warn!(%error, block = block.id, "could not revert block");
            return;
        }

        let offset = block.reject_offset();
        for other in &mut self.blocks {
            if other.start_line > block.start_line {
                other.start_line = other.start_line.saturating_add_signed(offset);
            }
        }
        if self.state == SessionState::Running && self.cursor.index > block.start_line {
            self.cursor.index = self.cursor.index.saturating_add_signed(offset);
        }
    }

    fn reset(&mut self) {
        self.blocks.clear();
        self.cursor = CursorState {
            index: self.start_line,
            active_block: None,
        };
        self.clear_progress();
        self.state = SessionState::Closed;
        self.fire_close();
    }

    fn fire_close(&mut self) {
        if let Some(on_close) = self.on_close.as_mut() {
            on_close();
        }
    }
}

impl Debug for DiffSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffSession")
            .field("lines", &(self.start_line..self.end_line))
            .field("cursor", &self.cursor)
            .field("blocks", &self.blocks)
            .field("state", &self.state)
            .field("touched", &self.touched)
            .finish_non_exhaustive()
    }
}
