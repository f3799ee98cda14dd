//! Collaborators backed by child processes.

use std::process::{Command, Stdio};

use color_eyre::eyre::{Context, Result, bail, eyre};
use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{ChunkStream, LlmProvider, LlmRequest, ShellRunner};

/// Runs snippets with `<shell> -c <snippet>`.
#[derive(Debug, Clone)]
pub struct ProcessShellRunner {
    shell: String,
}

impl ProcessShellRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ProcessShellRunner {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl ShellRunner for ProcessShellRunner {
    #[tracing::instrument(skip(self))]
    fn run(&self, command: &str) -> Result<String> {
        let output = Command::new(&self.shell)
            .args(["-c", command])
            .output()
            .with_context(|| format!("spawn shell: {}", self.shell))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            bail!("shell exited with {}: {}", output.status, text.trim());
        }
        Ok(text)
    }
}

/// Treats an external program as the model: the prompt is written to its
/// stdin and its stdout is streamed back as chunks.
#[derive(Debug, Clone)]
pub struct ProcessLlmProvider {
    argv: Vec<String>,
}

impl ProcessLlmProvider {
    /// Parse a command line such as `llm -m gpt-4o`.
    pub fn parse(command: &str) -> Result<Self> {
        let argv = shell_words::split(command)
            .with_context(|| format!("parse model command: {command}"))?;
        if argv.is_empty() {
            bail!("model command is empty");
        }
        Ok(Self { argv })
    }
}

/// Size of each read from the model's stdout.
const CHUNK_SIZE: usize = 256;

impl LlmProvider for ProcessLlmProvider {
    fn stream(&self, request: LlmRequest) -> ChunkStream {
        // Dropping the stream closes the receiver, which ends the reader on
        // its next send.
        let (tx, rx) = mpsc::channel::<Result<String>>(32);
        let argv = self.argv.clone();

        tokio::spawn(async move {
            let result: Result<()> = async {
                let (program, args) = argv
                    .split_first()
                    .ok_or_else(|| eyre!("model command is empty"))?;
                let mut child = tokio::process::Command::new(program)
                    .args(args)
                    .stdin(Stdio::piped())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::inherit())
                    .kill_on_drop(true)
                    .spawn()
                    .with_context(|| format!("spawn model command: {program}"))?;

                if let Some(mut stdin) = child.stdin.take() {
                    let mut input = String::new();
                    if let Some(system) = &request.system_prompt {
                        input.push_str(system);
                        input.push_str("\n\n");
                    }
                    input.push_str(&request.prompt);
                    // Written concurrently so a large prompt can't fill the
                    // pipe while the program is blocked on its own output.
                    tokio::spawn(async move {
                        if let Err(error) = stdin.write_all(input.as_bytes()).await {
                            tracing::warn!(?error, "write prompt to model command");
                        }
                    });
                }

                let mut stdout = child
                    .stdout
                    .take()
                    .ok_or_else(|| eyre!("model command has no stdout"))?;
                let mut pending = Vec::new();
                let mut buf = [0u8; CHUNK_SIZE];
                loop {
                    let read = stdout.read(&mut buf).await.context("read model output")?;
                    if read == 0 {
                        break;
                    }
                    pending.extend_from_slice(&buf[..read]);

                    // Hold back an incomplete UTF-8 sequence until the next read.
                    let valid = match std::str::from_utf8(&pending) {
                        Ok(_) => pending.len(),
                        Err(e) if e.error_len().is_none() => e.valid_up_to(),
                        Err(_) => pending.len(),
                    };
                    let chunk = String::from_utf8_lossy(&pending[..valid]).into_owned();
                    pending.drain(..valid);
                    if !chunk.is_empty() && tx.send(Ok(chunk)).await.is_err() {
                        return Ok(());
                    }
                }
                if !pending.is_empty() {
                    let chunk = String::from_utf8_lossy(&pending).into_owned();
                    let _ = tx.send(Ok(chunk)).await;
                }

                let status = child.wait().await.context("wait for model command")?;
                if !status.success() {
                    bail!("model command exited with {status}");
                }
                Ok(())
            }
            .await;

            if let Err(error) = result {
                let _ = tx.send(Err(error)).await;
            }
        });

        ReceiverStream::new(rx).boxed()
    }
}
