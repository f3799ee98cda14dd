use std::sync::Arc;

use crate::collab::VcsProvider;

use super::{CommandContext, CommandFailure, CommandResult};

fn provider<'a>(ctx: &'a CommandContext<'_>) -> Result<&'a Arc<dyn VcsProvider>, CommandFailure> {
    ctx.collaborators
        .vcs
        .as_ref()
        .ok_or_else(|| CommandFailure::new("Vcs", "No VCS provider found"))
}

/// `/rev:<revision>`: the change a revision introduced.
#[tracing::instrument(skip(ctx))]
pub fn show_revision(argument: &str, ctx: &CommandContext<'_>) -> CommandResult {
    let revision = argument.trim();
    if revision.is_empty() {
        return Err(CommandFailure::new("Vcs", "Missing revision"));
    }
    provider(ctx)?
        .show_revision(revision)
        .map(Some)
        .map_err(|e| CommandFailure::from_report("Vcs", e))
}

/// `/commit` with the message as its text (or argument).
#[tracing::instrument(skip(text, ctx))]
pub fn commit(argument: &str, text: Option<&str>, ctx: &CommandContext<'_>) -> CommandResult {
    let message = text
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(argument.trim());
    if message.is_empty() {
        return Err(CommandFailure::new("Commit", "Missing commit message"));
    }
    let revision = provider(ctx)?
        .commit(message)
        .map_err(|e| CommandFailure::from_report("Commit", e))?;
    Ok(Some(format!("Committed {revision}")))
}
