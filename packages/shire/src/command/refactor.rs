//! `/refactor:<operation> <text>` through the language's refactoring tool.
//!
//! - `rename Foo to Bar`
//! - `safeDelete path/to/File.java` (also `delete`)
//! - `move path/to/File.java to path/to/dir`

use crate::collab::{FileHandle, FileStore};

use super::{CommandContext, CommandFailure, CommandResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefactorCommand {
    Rename,
    SafeDelete,
    Delete,
    Move,
}

impl RefactorCommand {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "rename" => Some(Self::Rename),
            "safeDelete" => Some(Self::SafeDelete),
            "delete" => Some(Self::Delete),
            "move" => Some(Self::Move),
            _ => None,
        }
    }
}

#[tracing::instrument(skip(text, ctx))]
pub fn execute(argument: &str, text: Option<&str>, ctx: &CommandContext<'_>) -> CommandResult {
    let command = RefactorCommand::from_name(argument.trim()).ok_or_else(|| {
        CommandFailure::new("Refactor", format!("Unknown refactor command: {argument}"))
    })?;

    let language = ctx
        .editor
        .language()
        .or(ctx.settings.language.as_deref())
        .ok_or_else(|| CommandFailure::new("Refactor", "Language not found"))?;
    let tool = ctx.collaborators.refactorings.find(language).ok_or_else(|| {
        CommandFailure::new("Refactor", format!("Refactoring tool not found for {language}"))
    })?;

    let files = ctx.collaborators.files.as_ref();
    let text = text.unwrap_or_default().trim();
    let fail = |e: color_eyre::eyre::Report| CommandFailure::from_report("Refactor", e);
    match command {
        RefactorCommand::Rename => {
            let (from, to) = split_to(text)?;
            tool.rename(from, to, ctx.editor.file.as_ref()).map_err(fail)?;
        }
        RefactorCommand::SafeDelete | RefactorCommand::Delete => {
            let file = lookup(files, text)?;
            tool.safe_delete(&file).map_err(fail)?;
        }
        RefactorCommand::Move => {
            let (from, to) = split_to(text)?;
            let file = lookup(files, from)?;
            let target = lookup(files, to)?;
            if !target.is_dir {
                return Err(CommandFailure::new("Refactor", format!("Not a directory: {to}")));
            }
            tool.move_to(&file, &target).map_err(fail)?;
        }
    }
    Ok(None)
}

fn split_to(text: &str) -> Result<(&str, &str), CommandFailure> {
    text.split_once(" to ")
        .map(|(from, to)| (from.trim(), to.trim()))
        .filter(|(from, to)| !from.is_empty() && !to.is_empty())
        .ok_or_else(|| CommandFailure::new("Refactor", format!("Expected `<from> to <to>`, found `{text}`")))
}

fn lookup(files: &dyn FileStore, path: &str) -> Result<FileHandle, CommandFailure> {
    files
        .lookup(path)
        .ok_or_else(|| CommandFailure::new("Refactor", format!("File not found: {path}")))
}
