//! Version control via the `git` command line.

use std::path::PathBuf;
use std::process::Command;

use color_eyre::eyre::{Context, Result, bail};

use super::VcsProvider;

/// A [`VcsProvider`] for the repository containing `cwd`.
#[derive(Debug, Clone)]
pub struct GitCli {
    cwd: PathBuf,
}

impl GitCli {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.cwd)
            .args(args)
            .output()
            .context("run git")?;

        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        String::from_utf8(output.stdout).context("decode git output")
    }
}

impl VcsProvider for GitCli {
    #[tracing::instrument(skip(self))]
    fn show_revision(&self, revision: &str) -> Result<String> {
        self.git(&["show", "--format=%H%n%an%n%s%n", revision])
    }

    #[tracing::instrument(skip(self, message))]
    fn commit(&self, message: &str) -> Result<String> {
        self.git(&["commit", "-m", message])?;
        self.git(&["rev-parse", "HEAD"]).map(|rev| rev.trim().to_string())
    }
}
