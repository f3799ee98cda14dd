//! List the scripts in the project.

use std::fs;
use std::path::Path;

use clap::Args;
use color_eyre::eyre::{Context, Result};
use color_print::cprintln;
use walkdir::WalkDir;

use shire::config::ShireConfig;
use shire::script::Script;

use super::Project;

/// Extension of script files.
const EXTENSION: &str = "shire";

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Directory to scan instead of the configured scripts directory.
    pub dir: Option<std::path::PathBuf>,
}

pub fn main(config: Config) -> Result<()> {
    let project = Project::discover()?;
    let dir = config
        .dir
        .unwrap_or_else(|| project.root.join(&project.settings.scripts));
    if !dir.is_dir() {
        eprintln!("No scripts directory at {}", dir.display());
        return Ok(());
    }

    for entry in WalkDir::new(&dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk scripts directory: {dir:?}"))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != EXTENSION) {
            continue;
        }

        let relative = path.strip_prefix(&dir).unwrap_or(path).display();
        match describe(path) {
            Ok(config) => cprintln!(
                "<bold>{}</bold> <dim>({})</dim>\n  {}\n  <dim>location: {}, interaction: {}</dim>",
                config.name,
                relative,
                config.description,
                config.action_location,
                config.interaction,
            ),
            Err(error) => {
                tracing::warn!(?error, ?path, "skipping invalid script");
                cprintln!("<red>{}</red>: {:#}", relative, error);
            }
        }
    }
    Ok(())
}

fn describe(path: &Path) -> Result<ShireConfig> {
    let source = fs::read_to_string(path).context("read script")?;
    let script = Script::parse(&source).context("parse script")?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match &script.front_matter {
        Some(front_matter) => ShireConfig::from_front_matter(front_matter, &name).context("read front matter"),
        None => Ok(ShireConfig::named(name)),
    }
}
