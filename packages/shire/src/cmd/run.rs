//! Run a script against a model command.

use std::io::{Write as _, stdout};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Args;
use color_eyre::eyre::{Context, Result};
use color_print::cformat;
use tokio_util::sync::CancellationToken;

use shire::collab::process::ProcessLlmProvider;
use shire::runner::{RunStatus, ShireRunner};

use super::{EditorArgs, Project};

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Path to the script.
    pub script: PathBuf,

    /// Program acting as the model: it reads the prompt on stdin and writes
    /// the answer to stdout.
    #[arg(long, env = "SHIRE_LLM")]
    pub llm: String,

    #[command(flatten)]
    pub editor: EditorArgs,

    /// Print the run outcome as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn main(config: Config) -> Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?
        .block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let project = Project::discover()?;
    let editor = project.editor(&config.editor)?;
    let (origin, source) = super::read_script(&config.script)?;
    let llm = ProcessLlmProvider::parse(&config.llm)?;
    let runner = ShireRunner::new(project.compiler(Some(Arc::new(llm))));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let outcome = runner.run(&origin, &source, &editor, &cancel).await?;
    tracing::debug!(status = ?outcome.status, elapsed = ?outcome.elapsed, "run finished");

    let mut out = stdout().lock();
    if config.json {
        let json = serde_json::to_string_pretty(&outcome).context("serialize run outcome")?;
        writeln!(out, "{json}").context("write output")?;
    } else {
        writeln!(out, "{}", outcome.output).context("write output")?;
        if let Some(edited) = &outcome.edited {
            writeln!(out, "{}", cformat!("<dim>--- edited file ---</dim>")).context("write output")?;
            writeln!(out, "{edited}").context("write output")?;
        }
    }
    out.flush().context("flush output")?;

    match outcome.status {
        RunStatus::CompileFailed => {
            if let Some(prompt) = runner.session().try_fix_prompt(&origin) {
                tracing::info!(%prompt, "fix prompt available");
            }
            process::exit(1)
        }
        RunStatus::Cancelled => process::exit(130),
        RunStatus::NotApplicable | RunStatus::LocalCommand | RunStatus::Responded => Ok(()),
    }
}
