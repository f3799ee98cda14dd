use super::{CommandContext, CommandFailure, CommandResult};

/// Run the attached snippet, or the script file named by the argument.
#[tracing::instrument(skip(text, ctx))]
pub fn execute(argument: &str, text: Option<&str>, ctx: &CommandContext<'_>) -> CommandResult {
    let runner = ctx
        .collaborators
        .shell
        .as_ref()
        .ok_or_else(|| CommandFailure::new("Shell", "No shell runner available"))?;

    let script = match text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => text.to_string(),
        None => {
            let argument = argument.trim();
            if argument.is_empty() {
                return Err(CommandFailure::new("Shell", "Nothing to run"));
            }
            let files = &ctx.collaborators.files;
            match files.lookup(argument).filter(|f| !f.is_dir) {
                Some(file) => files
                    .read(&file)
                    .map_err(|e| CommandFailure::from_report("Shell", e))?,
                None => argument.to_string(),
            }
        }
    };

    runner
        .run(&script)
        .map(Some)
        .map_err(|e| CommandFailure::from_report("Shell", e))
}
