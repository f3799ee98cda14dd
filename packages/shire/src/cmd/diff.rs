//! Replay a generated file through the reconciler.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::{Context, Result};
use color_print::cprintln;

use shire::diff::{DiffBlock, DiffSession, DiffStream};

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// The file before the change.
    pub original: PathBuf,

    /// The model's answer: a fenced code block, or bare code.
    pub generated: PathBuf,

    /// Reject every block instead of accepting them.
    #[arg(long)]
    pub reject: bool,

    /// Print the resulting text after the blocks.
    #[arg(long)]
    pub result: bool,
}

pub fn main(config: Config) -> Result<()> {
    let original = fs::read_to_string(&config.original)
        .with_context(|| format!("read original: {:?}", config.original))?;
    let generated = fs::read_to_string(&config.generated)
        .with_context(|| format!("read generated: {:?}", config.generated))?;

    let session = DiffSession::for_text(&original);
    let mut stream = if generated.contains("```") {
        DiffStream::new(session)
    } else {
        DiffStream::raw(session)
    };
    // Fed line by line, the way a model streams.
    for line in generated.split_inclusive('\n') {
        stream.push_chunk(line);
    }
    stream.finish();

    let mut session = stream.into_session();
    if session.blocks().is_empty() {
        println!("No changes.");
    }
    for block in session.blocks() {
        print_block(block);
    }

    if config.reject {
        session.reject_all();
    } else {
        session.accept_all();
    }
    if config.result {
        println!();
        println!("{}", session.text());
    }
    Ok(())
}

fn print_block(block: &DiffBlock) {
    cprintln!(
        "<cyan>@@ block {} at line {} (+{} -{})</cyan>",
        block.id,
        block.start_line + 1,
        block.added.len(),
        block.deleted.len(),
    );
    for line in &block.deleted {
        cprintln!("<red>- {}</red>", line);
    }
    for line in &block.added {
        cprintln!("<green>+ {}</green>", line);
    }
}
