//! Streaming reconciliation of generated code against the original text.
//!
//! A model streams its answer in chunks. [`DiffStream`] buffers them, decodes
//! the code block, and feeds each completed line to a [`LineMatcher`], which
//! classifies it against the original lines as [`DiffLine::Same`],
//! [`DiffLine::New`] or [`DiffLine::Old`]. A [`DiffSession`] applies those
//! events to a [`Document`] as they arrive and groups the changes into
//! [`DiffBlock`]s the user can accept or reject.

use std::fmt::{self, Display, Formatter};

pub use block::DiffBlock;
pub use document::{Document, DocumentError};
pub use fence::CodeFence;
pub use matcher::{LineMatcher, diff_lines};
pub use session::{CursorState, DiffSession, SessionState};
pub use stream::{DiffStream, StreamEnd};

pub mod block;
pub mod document;
pub mod fence;
pub mod matcher;
pub mod session;
pub mod stream;

/// One line of a streamed diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    /// The original line is kept.
    Same(String),

    /// A line to insert.
    New(String),

    /// The original line is removed.
    Old(String),
}

impl DiffLine {
    pub fn text(&self) -> &str {
        match self {
            DiffLine::Same(text) | DiffLine::New(text) | DiffLine::Old(text) => text,
        }
    }

    pub fn is_old(&self) -> bool {
        matches!(self, DiffLine::Old(_))
    }
}

impl Display for DiffLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DiffLine::Same(text) => write!(f, "  {text}"),
            DiffLine::New(text) => write!(f, "+ {text}"),
            DiffLine::Old(text) => write!(f, "- {text}"),
        }
    }
}
