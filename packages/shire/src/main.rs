//! Shire compiles prompt scripts and applies model answers to code.

use color_eyre::{Result, Section};
use tracing::{instrument, level_filters::LevelFilter};

mod cmd;

use clap::{Parser, Subcommand};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Shire compiles prompt scripts.
#[derive(Parser)]
#[command(author, version = env!("SHIRE_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a script and print the prompt.
    Compile(cmd::compile::Config),

    /// Parse a script's front matter and print its configuration.
    Validate(cmd::validate::Config),

    /// List the scripts in the project.
    List(cmd::list::Config),

    /// Reconcile a generated file against an original and print the blocks.
    Diff(cmd::diff::Config),

    /// Compile a script, send it to a model command and print the answer.
    Run(cmd::run::Config),
}

#[instrument]
fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Compiled prompts go to stdout, so logging stays on stderr and defaults
    // to warnings. Use `SHIRE_LOG` directives for more:
    // - `SHIRE_LOG=debug` for compile and run progress
    // - `SHIRE_LOG=shire::diff=trace` for every reconciled line
    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .pretty(),
        )
        .with(
            EnvFilter::builder()
                .with_env_var("SHIRE_LOG")
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    match cli.command {
        Commands::Compile(config) => cmd::compile::main(config),
        Commands::Validate(config) => cmd::validate::main(config),
        Commands::List(config) => cmd::list::main(config),
        Commands::Diff(config) => cmd::diff::main(config),
        Commands::Run(config) => cmd::run::main(config),
    }
    .suggestion("Run with `SHIRE_LOG=debug` to see how the script was compiled.")
}
