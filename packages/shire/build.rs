//! Build script for shire that generates version information.
//!
//! The version string is `git describe --always --tags` when the crate is
//! built from a git checkout, with a short content hash of modified files
//! appended when the working tree is dirty. Builds outside a checkout (for
//! example from a packaged source tarball) use the package version.

use std::env;
use std::fs;
use std::hash::{DefaultHasher, Hasher as _};
use std::path::Path;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let version = git_version().unwrap_or_else(|| {
        env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| String::from("unknown"))
    });
    println!("cargo:rustc-env=SHIRE_VERSION={version}");
}

fn git_version() -> Option<String> {
    let base = run("git", &["describe", "--always", "--tags"])?;
    let status = run("git", &["status", "--porcelain"])?;
    if status.is_empty() {
        return Some(base);
    }

    let root = run("git", &["rev-parse", "--show-toplevel"])?;
    let mut paths = status
        .lines()
        .filter_map(|line| line.get(3..))
        .map(|path| path.rsplit(" -> ").next().unwrap_or(path).to_string())
        .collect::<Vec<_>>();
    paths.sort();
    paths.dedup();

    let mut hasher = DefaultHasher::new();
    for path in paths {
        let path = Path::new(&root).join(path);
        hasher.write(path.as_os_str().as_encoded_bytes());
        if let Ok(content) = fs::read(&path) {
            hasher.write(&content);
        }
    }
    let hash = format!("{:x}", hasher.finish());
    let short = &hash[..7.min(hash.len())];

    Some(format!("{base}-{short}"))
}

fn run(prog: &str, argv: &[&str]) -> Option<String> {
    let output = Command::new(prog).args(argv).output().ok()?;
    if !output.status.success() {
        return None;
    }

    String::from_utf8(output.stdout)
        .ok()
        .map(|out| out.trim_end().to_string())
}
