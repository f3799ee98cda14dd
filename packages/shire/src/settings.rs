//! Settings discovery and YAML parsing.
//!
//! ```yaml
//! version: 1
//!
//! # Language used for files whose extension isn't recognized.
//! language: java
//!
//! # Connection used by `/database` when several are configured.
//! database: analytics
//!
//! # Program used to run `/shell` snippets.
//! shell: bash
//!
//! # Directory scanned by `shire list`.
//! scripts: .shire
//! ```

use std::fs::read_to_string;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use color_eyre::{
    SectionExt,
    eyre::{Context, Result},
};
use directories::ProjectDirs;
use monostate::MustBe;
use serde::{Deserialize, Serialize};
use tap::Tap;

/// Name of the project-level settings file.
pub const PROJECT_SETTINGS: &str = ".shire.yaml";

/// Get the project directories for the application.
#[tracing::instrument]
pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "shire", "shire")
}

/// A settings file as written on disk. Every field is optional so a project
/// file can override only what it names.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsFile {
    /// The version of the settings file.
    pub version: MustBe!(1),

    pub language: Option<String>,
    pub database: Option<String>,
    pub shell: Option<String>,
    pub scripts: Option<PathBuf>,
}

/// Effective settings after layering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Language for files whose extension isn't recognized.
    pub language: Option<String>,

    /// Preferred database connection.
    pub database: Option<String>,

    /// Program used to run shell snippets.
    pub shell: String,

    /// Directory holding scripts.
    pub scripts: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: None,
            database: None,
            shell: String::from("sh"),
            scripts: PathBuf::from(".shire"),
        }
    }
}

impl Settings {
    /// Apply the fields a file sets on top of these settings.
    pub fn merge(mut self, file: SettingsFile) -> Self {
        if let Some(language) = file.language {
            self.language = Some(language);
        }
        if let Some(database) = file.database {
            self.database = Some(database);
        }
        if let Some(shell) = file.shell {
            self.shell = shell;
        }
        if let Some(scripts) = file.scripts {
            self.scripts = scripts;
        }
        self
    }
}

/// Load settings from all sources.
///
/// Loading order (later wins field by field):
/// 1. User-level settings from `ProjectDirs::config_dir()/settings.yaml`
/// 2. `.shire.yaml` in `project_root`
#[tracing::instrument]
pub fn load(project_root: &Path) -> Result<Settings> {
    let mut settings = Settings::default();

    if let Some(dirs) = project_dirs() {
        let user_config = dirs.config_dir().join("settings.yaml");
        if let Some(file) = load_from(&user_config)
            .with_context(|| format!("load settings from user config: {user_config:?}"))?
        {
            settings = settings.merge(file);
        }
    }

    let project_config = project_root.join(PROJECT_SETTINGS);
    if let Some(file) = load_from(&project_config)
        .with_context(|| format!("load settings from project root: {project_config:?}"))?
    {
        settings = settings.merge(file);
    }

    Ok(settings)
}

/// Load a single settings file; a missing file is `None`.
#[tracing::instrument]
pub fn load_from(path: &Path) -> Result<Option<SettingsFile>> {
    let content = match read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context(format!("read settings file: {path:?}")),
    };

    serde_yaml::from_str::<SettingsFile>(&content)
        .with_context(|| format!("parse settings file: {path:?}"))
        .with_context(|| content.header("File content:"))
        .tap(|file| tracing::debug!(?file, "parsed settings file"))
        .map(Some)
}
