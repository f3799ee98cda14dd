//! Directory listing as a tree.
//!
//! ```text
//! src/
//!   ├── lib.rs
//!   ├── main.rs
//!   └── cmd/
//!     └── list.rs
//! ```
//!
//! Files come before subdirectories, and the last entry at each level gets
//! the closing branch.

use crate::collab::{FileHandle, FileStore};

use super::{CommandContext, CommandFailure, CommandResult};

pub fn execute(argument: &str, ctx: &CommandContext<'_>) -> CommandResult {
    let path = argument.trim().trim_matches('/');
    let files = ctx.collaborators.files.as_ref();
    let dir = if path.is_empty() || path == "." {
        FileHandle::root()
    } else {
        files
            .lookup(path)
            .ok_or_else(|| CommandFailure::new("Dir", format!("Directory not found: {path}")))?
    };
    if !dir.is_dir {
        return Err(CommandFailure::new("Dir", format!("Not a directory: {path}")));
    }

    let header = if path.is_empty() { "." } else { path };
    let mut output = format!("{header}/\n");
    render(files, &dir, 1, &mut output)?;
    Ok(Some(output))
}

fn render(files: &dyn FileStore, dir: &FileHandle, depth: usize, output: &mut String) -> Result<(), CommandFailure> {
    let listing = files
        .list(dir)
        .map_err(|e| CommandFailure::from_report("Dir", e))?;
    let total = listing.files.len() + listing.subdirs.len();
    let indent = "  ".repeat(depth);

    for (index, file) in listing.files.iter().enumerate() {
        let branch = if index + 1 == total { "└── " } else { "├── " };
        output.push_str(&format!("{indent}{branch}{}\n", file.name()));
    }
    for (index, subdir) in listing.subdirs.iter().enumerate() {
        let branch = if listing.files.len() + index + 1 == total {
            "└── "
        } else {
            "├── "
        };
        output.push_str(&format!("{indent}{branch}{}/\n", subdir.name()));
        render(files, subdir, depth + 1, output)?;
    }
    Ok(())
}
