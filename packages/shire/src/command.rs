//! Built-in commands invoked from a script body as `/name:argument`.
//!
//! Each handler returns the text substituted for the command in the compiled
//! output, or `None` when the command has no textual result. Handlers never
//! abort a compile: failures come back as [`CommandFailure`] and are embedded
//! as `ShireError[...]` markers by [`dispatch`].

use std::fmt::{self, Display, Formatter};

use derive_more::{Display as DeriveDisplay, Error};

use crate::collab::Collaborators;
use crate::compiler::EditorContext;
use crate::error::marker;
use crate::settings::Settings;

pub use line_info::LineInfo;
pub use write::WriteLedger;

pub mod browse;
pub mod database;
pub mod dir;
pub mod file;
pub mod line_info;
pub mod refactor;
pub mod shell;
pub mod vcs;
pub mod write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinCommand {
    File,
    Dir,
    Write,
    Shell,
    Database,
    Refactor,
    Browse,
    Rev,
    Commit,
}

impl BuiltinCommand {
    pub const ALL: [BuiltinCommand; 9] = [
        BuiltinCommand::File,
        BuiltinCommand::Dir,
        BuiltinCommand::Write,
        BuiltinCommand::Shell,
        BuiltinCommand::Database,
        BuiltinCommand::Refactor,
        BuiltinCommand::Browse,
        BuiltinCommand::Rev,
        BuiltinCommand::Commit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinCommand::File => "file",
            BuiltinCommand::Dir => "dir",
            BuiltinCommand::Write => "write",
            BuiltinCommand::Shell => "shell",
            BuiltinCommand::Database => "database",
            BuiltinCommand::Refactor => "refactor",
            BuiltinCommand::Browse => "browse",
            BuiltinCommand::Rev => "rev",
            BuiltinCommand::Commit => "commit",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            BuiltinCommand::File => "Read the content of a file, /file:path/to/file#L1-L2",
            BuiltinCommand::Dir => "List files and directories in a tree, /dir:path/to/dir",
            BuiltinCommand::Write => "Write content to a file, /write:path/to/file#L1-L2",
            BuiltinCommand::Shell => "Run a shell command or script file",
            BuiltinCommand::Database => "Read database tables and columns, or run a query",
            BuiltinCommand::Refactor => "Rename, delete or move code, /refactor:rename A to B",
            BuiltinCommand::Browse => "Get the content of a given URL",
            BuiltinCommand::Rev => "Read the change made by a revision",
            BuiltinCommand::Commit => "Commit staged changes with the given message",
        }
    }

    /// Whether the command acts on the workspace rather than producing prompt
    /// text. A script using one finishes without calling the model.
    pub fn is_local(self) -> bool {
        matches!(
            self,
            BuiltinCommand::Write
                | BuiltinCommand::Shell
                | BuiltinCommand::Refactor
                | BuiltinCommand::Commit
        )
    }

    /// Whether the rest of the line is the command's text when no fenced
    /// block follows.
    pub fn takes_inline_text(self) -> bool {
        matches!(
            self,
            BuiltinCommand::Refactor
                | BuiltinCommand::Database
                | BuiltinCommand::Commit
                | BuiltinCommand::Shell
        )
    }

    /// The registry as `- name. description` lines.
    pub fn describe_all() -> String {
        Self::ALL
            .iter()
            .map(|c| format!("- {}. {}", c.name(), c.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Display for BuiltinCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A command that could not do its job.
#[derive(Debug, Clone, PartialEq, Eq, DeriveDisplay, Error)]
#[display("{message}")]
pub struct CommandFailure {
    /// Category shown in the embedded marker.
    pub category: &'static str,

    pub message: String,
}

impl CommandFailure {
    pub fn new(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    /// Wrap a collaborator error.
    pub fn from_report(category: &'static str, error: color_eyre::eyre::Report) -> Self {
        Self::new(category, format!("{error:#}"))
    }

    pub fn to_marker(&self) -> String {
        marker(self.category, &self.message)
    }
}

/// What a command handler can reach.
pub struct CommandContext<'a> {
    pub collaborators: &'a Collaborators,
    pub settings: &'a Settings,
    pub editor: &'a EditorContext,

    /// Writes already made during this compile.
    pub writes: &'a mut WriteLedger,
}

pub type CommandResult = Result<Option<String>, CommandFailure>;

/// Run a command, embedding any failure as a marker.
#[tracing::instrument(skip(text, ctx))]
pub fn dispatch(
    command: BuiltinCommand,
    argument: &str,
    text: Option<&str>,
    ctx: &mut CommandContext<'_>,
) -> Option<String> {
    let result = match command {
        BuiltinCommand::File => file::execute(argument, ctx),
        BuiltinCommand::Dir => dir::execute(argument, ctx),
        BuiltinCommand::Write => write::execute(argument, text, ctx),
        BuiltinCommand::Shell => shell::execute(argument, text, ctx),
        BuiltinCommand::Database => database::execute(argument, text, ctx),
        BuiltinCommand::Refactor => refactor::execute(argument, text, ctx),
        BuiltinCommand::Browse => browse::execute(argument, ctx),
        BuiltinCommand::Rev => vcs::show_revision(argument, ctx),
        BuiltinCommand::Commit => vcs::commit(argument, text, ctx),
    };

    match result {
        Ok(output) => output,
        Err(failure) => {
            tracing::warn!(%failure, category = failure.category, "command failed");
            Some(failure.to_marker())
        }
    }
}
