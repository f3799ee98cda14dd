//! Error types and the inline error marker.
//!
//! Only structural problems in a script abort a compile; those are
//! [`ParseError`]s. Everything else (a missing file, an unreachable database,
//! a pipeline fed the wrong shape) degrades to text in the compiled output,
//! prefixed with [`SHIRE_ERROR`] so downstream consumers can scan for it.

use derive_more::{Display, Error};

/// Marker that prefixes every failure embedded into compiled output.
pub const SHIRE_ERROR: &str = "ShireError";

/// Format a failure for embedding into compiled output.
///
/// ```
/// assert_eq!(
///     shire::error::marker("File", "File not found: a.txt"),
///     "ShireError[File]: File not found: a.txt",
/// );
/// ```
pub fn marker(category: impl AsRef<str>, message: impl AsRef<str>) -> String {
    format!("{SHIRE_ERROR}[{}]: {}", category.as_ref(), message.as_ref())
}

/// Whether the text contains an embedded failure marker.
pub fn contains_marker(text: &str) -> bool {
    text.contains(SHIRE_ERROR)
}

/// A location in script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[display("{line}:{column}")]
pub struct Position {
    /// 1-based line number.
    pub line: usize,

    /// 1-based column, counted in characters.
    pub column: usize,

    /// Byte offset into the source.
    pub offset: usize,
}

impl Position {
    /// Compute the position of a byte offset within the source.
    pub fn locate(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = source.get(..offset).unwrap_or(source);
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before.get(line_start..).map(|s| s.chars().count()).unwrap_or(0) + 1;
        Self {
            line,
            column,
            offset,
        }
    }
}

/// Structural failure in a script.
#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum ParseError {
    /// The script opens a front-matter block that never closes.
    #[display("front matter opened at {at} has no closing `---` marker")]
    UnclosedFrontMatter {
        at: Position,
    },

    /// A `${` variable reference without its closing brace.
    #[display("unterminated variable reference at {at}")]
    UnterminatedVariable {
        at: Position,
    },

    /// A command's attached code block never closes.
    #[display("unterminated code block for command `/{command}` at {at}")]
    UnterminatedCommandBlock {
        command: String,
        at: Position,
    },

    /// Malformed front-matter entry.
    #[display("front matter syntax error at {at}: {message}")]
    FrontMatter {
        message: String,
        at: Position,
    },

    /// A malformed condition expression.
    #[display("invalid expression `{source_text}`: {message}")]
    Expression {
        source_text: String,
        message: String,
    },

    /// A function name in a pipeline that no handler knows.
    #[display("unknown function `{name}` in `{key}`")]
    UnknownFunction {
        name: String,
        key: String,
    },

    /// A known function called with arguments it can't accept.
    #[display("invalid arguments for `{name}`: {message}")]
    InvalidArguments {
        name: String,
        message: String,
    },
}

impl ParseError {
    /// Source position of the failure, when it has one.
    pub fn position(&self) -> Option<Position> {
        match self {
            ParseError::UnclosedFrontMatter { at }
            | ParseError::UnterminatedVariable { at }
            | ParseError::UnterminatedCommandBlock { at, .. }
            | ParseError::FrontMatter { at, .. } => Some(*at),
            ParseError::Expression { .. }
            | ParseError::UnknownFunction { .. }
            | ParseError::InvalidArguments { .. } => None,
        }
    }
}

/// A pattern-action function received an accumulator shape it doesn't accept.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("`{function}` expects {expected} input, got {actual}")]
pub struct PipelineTypeError {
    /// Name of the rejecting function.
    pub function: String,

    /// Shape the function accepts.
    pub expected: &'static str,

    /// Shape it was given.
    pub actual: &'static str,
}
