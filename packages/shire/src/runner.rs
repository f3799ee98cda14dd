//! Run a script end to end: compile, hand the prompt to a model or agent,
//! and post-process the response.

use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::eyre::{Context, OptionExt, Result};
use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::collab::{ChunkStream, FileStore, LlmRequest};
use crate::compiler::{CompiledResult, Compiler, EditorContext};
use crate::config::{InteractionType, TaskStep};
use crate::diff::{DiffSession, DiffStream, StreamEnd};
use crate::error::contains_marker;
use crate::pipeline::{self, PipelineEnv, PipelineValue};
use crate::postprocess::{self, PostProcessContext};
use crate::session::SessionStore;
use crate::variable::SymbolTable;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The compiled prompt contains an error marker; nothing was sent.
    CompileFailed,

    /// The `when` condition didn't hold.
    NotApplicable,

    /// The script ran local commands only; the compiled output is the result.
    LocalCommand,

    /// The model or agent answered in full.
    Responded,

    /// Cancelled while the response streamed in.
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub compiled: CompiledResult,

    /// The raw response, empty when nothing was sent.
    pub response: String,

    /// What the user sees: the response after post-processing, or the
    /// compiled output when nothing was sent.
    pub output: String,

    /// The current file after reconciling the response into it, for scripts
    /// that replace the current file.
    pub edited: Option<String>,

    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(elapsed.as_millis())
}

#[derive(Debug, Clone)]
pub struct ShireRunner {
    compiler: Compiler,
}

impl ShireRunner {
    pub fn new(compiler: Compiler) -> Self {
        Self { compiler }
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        self.compiler.session()
    }

    /// Compile and run the script at `script_path`.
    ///
    /// Only parse errors and a missing model fail the run; failures inside
    /// the script surface as [`RunStatus::CompileFailed`].
    #[tracing::instrument(skip(self, source, editor, cancel))]
    pub async fn run(
        &self,
        script_path: &str,
        source: &str,
        editor: &EditorContext,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let started = Instant::now();
        let compiled = self
            .compiler
            .compile(script_path, source, editor)
            .with_context(|| format!("compile script: {script_path}"))?;

        let session = self.session();
        session.start_conversation(script_path, &compiled.shire_output);

        let finish = |status, compiled: CompiledResult, output: String| {
            session.update_ide_output(script_path, &output);
            RunOutcome {
                status,
                compiled,
                response: String::new(),
                output,
                edited: None,
                elapsed: started.elapsed(),
            }
        };

        if contains_marker(&compiled.shire_output) {
            tracing::warn!(script_path, "compiled output contains an error marker");
            let output = compiled.shire_output.clone();
            return Ok(finish(RunStatus::CompileFailed, compiled, output));
        }
        if !compiled.is_applicable {
            tracing::debug!(script_path, "when condition does not hold");
            return Ok(finish(RunStatus::NotApplicable, compiled, String::new()));
        }
        if compiled.is_local_command {
            let output = compiled.shire_output.clone();
            return Ok(finish(RunStatus::LocalCommand, compiled, output));
        }

        let chunks = self.open_stream(&compiled)?;
        let (response, edited, end) = if compiled.config.interaction == InteractionType::ReplaceCurrentFile
            && let Some(text) = editor.text.as_deref()
        {
            let mut diff = DiffStream::new(DiffSession::for_text(text));
            let end = diff.consume(chunks, cancel).await;
            let response = diff.buffer().to_string();
            let mut session = diff.into_session();
            session.accept_all();
            (response, Some(session.text()), end)
        } else {
            let (response, end) = collect(chunks, cancel).await;
            (response, None, end)
        };
        session.update_llm_response(script_path, &response);

        let status = match end {
            StreamEnd::Finished => RunStatus::Responded,
            StreamEnd::Cancelled => RunStatus::Cancelled,
        };
        let output = if status == RunStatus::Responded {
            self.post_process(&compiled, editor, response.clone(), started.elapsed())
        } else {
            response.clone()
        };
        session.update_ide_output(script_path, &output);

        Ok(RunOutcome {
            status,
            compiled,
            response,
            output,
            edited,
            elapsed: started.elapsed(),
        })
    }

    fn open_stream(&self, compiled: &CompiledResult) -> Result<ChunkStream> {
        let collaborators = self.compiler.collaborators();
        if let Some(agent) = &compiled.execute_agent {
            let executor = collaborators
                .agent_executor
                .as_ref()
                .ok_or_eyre("script references an agent but no agent executor is configured")?;
            tracing::debug!(agent = %agent.name, "handing prompt to agent");
            return Ok(executor.execute(agent, &compiled.shire_output));
        }

        let llm = collaborators
            .llm
            .as_ref()
            .ok_or_eyre("no language model is configured")?;
        let request = LlmRequest::builder()
            .prompt(compiled.shire_output.clone())
            .maybe_model(compiled.config.model.clone())
            .build();
        Ok(llm.stream(request))
    }

    /// Run `onStreamingEnd`, then the routed task, over the response.
    fn post_process(&self, compiled: &CompiledResult, editor: &EditorContext, response: String, elapsed: Duration) -> String {
        let collaborators = self.compiler.collaborators();
        let ctx = PostProcessContext {
            collaborators,
            editor,
            elapsed,
        };
        let mut text = postprocess::run_all(&compiled.config.on_streaming_end, response, &ctx);

        let Some(task) = &compiled.task else {
            return text;
        };
        tracing::debug!(route = %task.route, steps = task.steps.len(), "running routed task");
        let mut env = TaskEnv {
            files: collaborators.files.as_ref(),
            table: &compiled.symbol_table,
        };
        for step in &task.steps {
            text = match step {
                TaskStep::Process(processor) => postprocess::run_all(std::slice::from_ref(processor), text, &ctx),
                TaskStep::Func(func) => {
                    match pipeline::evaluate(&task.route, std::slice::from_ref(func), PipelineValue::Text(text), &mut env) {
                        Ok(value) => value.render(),
                        Err(error) => {
                            tracing::warn!(%error, func = func.name(), "task step failed");
                            error.to_marker()
                        }
                    }
                }
            };
        }
        text
    }
}

/// Read a response to its end, or until cancelled.
async fn collect(mut chunks: ChunkStream, cancel: &CancellationToken) -> (String, StreamEnd) {
    let mut response = String::new();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return (response, StreamEnd::Cancelled),
            next = chunks.next() => match next {
                Some(Ok(chunk)) => response.push_str(&chunk),
                Some(Err(error)) => tracing::warn!(?error, "skipping failed chunk"),
                None => return (response, StreamEnd::Finished),
            },
        }
    }
}

/// Pipeline access for routed task steps: project files and the compiled
/// symbol table.
struct TaskEnv<'a> {
    files: &'a dyn FileStore,
    table: &'a SymbolTable,
}

impl PipelineEnv for TaskEnv<'_> {
    fn read_file(&mut self, path: &str) -> Result<String> {
        let file = self
            .files
            .lookup(path)
            .ok_or_else(|| color_eyre::eyre::eyre!("file not found: {path}"))?;
        self.files.read(&file)
    }

    fn project_files(&mut self) -> Result<Vec<String>> {
        self.files.walk()
    }

    fn lookup(&mut self, name: &str) -> Option<String> {
        self.table.get(name).map(String::from)
    }
}
