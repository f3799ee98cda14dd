use super::{CommandContext, CommandFailure, CommandResult};

/// Fetch a URL and return its body text.
#[tracing::instrument(skip(ctx))]
pub fn execute(argument: &str, ctx: &CommandContext<'_>) -> CommandResult {
    let url = argument.trim();
    if url.is_empty() {
        return Err(CommandFailure::new("Browse", "Missing URL"));
    }
    let browser = ctx
        .collaborators
        .browser
        .as_ref()
        .ok_or_else(|| CommandFailure::new("Browse", "No browser available"))?;

    let document = browser
        .fetch(url)
        .map_err(|e| CommandFailure::from_report("Browse", e))?;
    Ok(Some(document.body))
}
