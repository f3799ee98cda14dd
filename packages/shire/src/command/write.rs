use std::collections::HashMap;

use crate::collab::{ensure_dir, split_path};

use super::{CommandContext, CommandFailure, CommandResult, LineInfo};

/// Targets written during one compile. A write without a range claims the
/// whole file.
#[derive(Debug, Default)]
pub struct WriteLedger {
    writes: HashMap<String, Vec<Option<LineInfo>>>,
}

impl WriteLedger {
    /// Record a write, refusing it if it overlaps an earlier one.
    pub fn claim(&mut self, path: &str, range: Option<LineInfo>) -> bool {
        let claimed = self.writes.entry(path.to_string()).or_default();
        let overlaps = claimed.iter().any(|existing| match (existing, &range) {
            (Some(a), Some(b)) => a.overlaps(b),
            _ => true,
        });
        if !overlaps {
            claimed.push(range);
        }
        !overlaps
    }
}

/// Create or update a file with the command's text.
#[tracing::instrument(skip(text, ctx))]
pub fn execute(argument: &str, text: Option<&str>, ctx: &mut CommandContext<'_>) -> CommandResult {
    let argument = argument.trim();
    let (path, range) = LineInfo::split_path(argument);
    let path = path.trim_matches('/');
    if path.is_empty() {
        return Err(CommandFailure::new("Write", "Missing file path"));
    }
    let content = text.unwrap_or_default();

    if !ctx.writes.claim(path, range) {
        return Err(CommandFailure::new(
            "Write",
            format!("Refusing overlapping write to {argument}"),
        ));
    }

    let files = ctx.collaborators.files.as_ref();
    let fail = |e: color_eyre::eyre::Report| CommandFailure::from_report("Write", e);
    match files.lookup(path) {
        None => {
            let (parent, name) = split_path(path).map_err(fail)?;
            let dir = ensure_dir(files, parent).map_err(|e| {
                CommandFailure::new("Write", format!("Create directory failed: {parent}: {e:#}"))
            })?;
            let file = files.create_file(&dir, name).map_err(|e| {
                CommandFailure::new("Write", format!("Create file failed: {argument}: {e:#}"))
            })?;
            files.write(&file, content).map_err(fail)?;
            Ok(Some(format!("Create file: {argument}")))
        }
        Some(file) if file.is_dir => Err(CommandFailure::new(
            "Write",
            format!("Cannot write to a directory: {path}"),
        )),
        Some(file) => {
            let updated = match range {
                Some(range) => {
                    let existing = files.read(&file).map_err(fail)?;
                    replace_lines(&existing, range, content)
                }
                None => content.to_string(),
            };
            files.write(&file, &updated).map_err(fail)?;
            Ok(Some(format!("Writing to file: {argument}")))
        }
    }
}

/// Replace the lines in `range` with `content`, keeping the rest of `text`.
fn replace_lines(text: &str, range: LineInfo, content: &str) -> String {
    let trailing_newline = text.ends_with('\n');
    let mut lines = text.lines().collect::<Vec<_>>();
    let start = (range.start - 1).min(lines.len());
    let end = range.end.min(lines.len()).max(start);
    lines.splice(start..end, content.lines());

    let mut out = lines.join("\n");
    if trailing_newline {
        out.push('\n');
    }
    out
}
