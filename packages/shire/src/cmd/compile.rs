//! Compile a script and print the prompt.

use std::io::{Write as _, stdout};
use std::path::PathBuf;
use std::process;

use clap::Args;
use color_eyre::eyre::{Context, Result};

use super::{EditorArgs, Project};

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Path to the script.
    pub script: PathBuf,

    #[command(flatten)]
    pub editor: EditorArgs,

    /// Print the whole compile result as JSON instead of the prompt.
    #[arg(long)]
    pub json: bool,
}

pub fn main(config: Config) -> Result<()> {
    let project = Project::discover()?;
    let editor = project.editor(&config.editor)?;
    let (origin, source) = super::read_script(&config.script)?;
    let compiled = super::compile(&project.compiler(None), &origin, &source, &editor)?;

    let mut out = stdout().lock();
    if config.json {
        let json = serde_json::to_string_pretty(&compiled).context("serialize compile result")?;
        writeln!(out, "{json}").context("write output")?;
    } else {
        write!(out, "{}", compiled.shire_output).context("write output")?;
    }
    out.flush().context("flush output")?;

    if compiled.has_error() {
        tracing::warn!(script = %origin, "compiled prompt contains an error marker");
        process::exit(1);
    }
    Ok(())
}
