//! A [`FileStore`] over a directory on the local filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result, bail};
use ignore::WalkBuilder;

use super::{DirListing, FileHandle, FileStore};

/// Files under `root`, addressed by root-relative paths.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            bail!("path escapes the project root: {path}");
        }
        Ok(self.root.join(relative))
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        Some(parts.join("/"))
    }
}

impl FileStore for LocalFileStore {
    fn lookup(&self, path: &str) -> Option<FileHandle> {
        let full = self.resolve(path).ok()?;
        let metadata = fs::metadata(&full).ok()?;
        let path = path.trim_matches('/').to_string();
        Some(if metadata.is_dir() {
            FileHandle::dir(path)
        } else {
            FileHandle::file(path)
        })
    }

    fn read(&self, file: &FileHandle) -> Result<String> {
        let full = self.resolve(&file.path)?;
        fs::read_to_string(&full).with_context(|| format!("read file: {full:?}"))
    }

    fn write(&self, file: &FileHandle, text: &str) -> Result<()> {
        let full = self.resolve(&file.path)?;
        fs::write(&full, text).with_context(|| format!("write file: {full:?}"))
    }

    fn create_file(&self, dir: &FileHandle, name: &str) -> Result<FileHandle> {
        let path = dir.child_path(name);
        let full = self.resolve(&path)?;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&full)
            .with_context(|| format!("create file: {full:?}"))?;
        Ok(FileHandle::file(path))
    }

    fn create_dir(&self, parent: &FileHandle, name: &str) -> Result<FileHandle> {
        let path = parent.child_path(name);
        let full = self.resolve(&path)?;
        fs::create_dir_all(&full).with_context(|| format!("create directory: {full:?}"))?;
        Ok(FileHandle::dir(path))
    }

    fn list(&self, dir: &FileHandle) -> Result<DirListing> {
        let full = self.resolve(&dir.path)?;
        let mut listing = DirListing::default();
        for entry in fs::read_dir(&full).with_context(|| format!("list directory: {full:?}"))? {
            let entry = entry.with_context(|| format!("read entry in {full:?}"))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = dir.child_path(&name);
            if entry.file_type().is_ok_and(|ft| ft.is_dir()) {
                listing.subdirs.push(FileHandle::dir(path));
            } else {
                listing.files.push(FileHandle::file(path));
            }
        }
        listing.files.sort();
        listing.subdirs.sort();
        Ok(listing)
    }

    /// Walks the tree honoring ignore files, so build output and VCS
    /// internals stay out of pattern-action inputs.
    fn walk(&self) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        for entry in WalkBuilder::new(&self.root).hidden(false).build() {
            let entry = entry.context("walk directory")?;
            if entry.file_type().is_some_and(|ft| ft.is_file()) {
                if entry.path().components().any(|c| c.as_os_str() == ".git") {
                    continue;
                }
                if let Some(path) = self.relative(entry.path()) {
                    paths.push(path);
                }
            }
        }
        paths.sort();
        Ok(paths)
    }
}
