use crate::lang;

use super::{CommandContext, CommandFailure, CommandResult, LineInfo};

/// Read a file, or a line range of it, as a fenced code block.
pub fn execute(argument: &str, ctx: &CommandContext<'_>) -> CommandResult {
    let (path, range) = LineInfo::split_path(argument.trim());
    let files = &ctx.collaborators.files;
    let file = files
        .lookup(path)
        .filter(|f| !f.is_dir)
        .ok_or_else(|| CommandFailure::new("File", format!("File not found: {path}")))?;

    let content = files
        .read(&file)
        .map_err(|e| CommandFailure::from_report("File", e))?;
    let content = match range {
        Some(range) => range.slice(&content),
        None => content.trim_end_matches('\n').to_string(),
    };

    let language = lang::language_of(path).unwrap_or_default();
    Ok(Some(format!("```{language}\n{content}\n```")))
}
