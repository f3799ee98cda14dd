//! Validate a script's front matter.

use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::{Context, Result};

use shire::config::ShireConfig;
use shire::script::Script;

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Path to the script.
    pub script: PathBuf,
}

pub fn main(config: Config) -> Result<()> {
    let (origin, source) = super::read_script(&config.script)?;
    let script = Script::parse(&source).map_err(|error| super::parse_failure(&origin, &source, error))?;

    let name = config
        .script
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| origin.clone());
    let parsed = match &script.front_matter {
        Some(front_matter) => ShireConfig::from_front_matter(front_matter, &name),
        None => Ok(ShireConfig::named(name)),
    };
    let parsed = parsed.map_err(|error| super::parse_failure(&origin, &source, error))?;

    let yaml = serde_yaml::to_string(&parsed).context("serialize config")?;
    println!("{yaml}");
    Ok(())
}
