//! Script source: optional front matter followed by a free-text body.

use itertools::Itertools;

use crate::error::{ParseError, Position};

pub use body::{AgentRef, CommandRef, Segment, VariableRef};
pub use expr::Expr;
pub use frontmatter::{CONDITION_KEY, FrontMatter};
pub use value::{Case, Condition, ConditionCase, Expression, FrontMatterValue, FuncArg, FuncCall, PatternAction};

pub mod body;
pub mod expr;
pub mod frontmatter;
pub mod value;

/// Marker line that opens and closes the front-matter block.
const DELIMITER: &str = "---";

/// A parsed script.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub front_matter: Option<FrontMatter>,
    pub body: Vec<Segment>,
}

impl Script {
    /// Parse script source.
    ///
    /// The front-matter block is strict: a script whose first line is `---`
    /// must close it. The body is lenient and keeps anything that isn't a
    /// well-formed token as plain text.
    #[tracing::instrument(skip_all)]
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let (front_matter, body_start) = match split_front_matter(source)? {
            Some(split) => {
                let text = &source[split.text_start..split.text_end];
                let fm = FrontMatter::parse(source, text, split.text_start)?;
                (Some(fm), split.body_start)
            }
            None => (None, 0),
        };

        let body = body::parse(source, body_start)?;
        tracing::debug!(segments = body.len(), has_front_matter = front_matter.is_some(), "parsed script");
        Ok(Self { front_matter, body })
    }

    /// Whether the source opens with a front-matter block.
    pub fn has_front_matter(source: &str) -> bool {
        matches!(split_front_matter(source), Ok(Some(_)))
    }

    /// Every variable the body references, in order, without duplicates.
    pub fn referenced_variables(&self) -> Vec<&str> {
        self.body
            .iter()
            .filter_map(crate::fmap_match!(Segment::Variable))
            .map(|var| var.name.as_str())
            .unique()
            .collect()
    }
}

struct Split {
    text_start: usize,
    text_end: usize,
    body_start: usize,
}

fn split_front_matter(source: &str) -> Result<Option<Split>, ParseError> {
    let first_end = source.find('\n');
    let first_line = &source[..first_end.unwrap_or(source.len())];
    if first_line.trim_end_matches('\r') != DELIMITER {
        return Ok(None);
    }

    let unclosed = || ParseError::UnclosedFrontMatter {
        at: Position::locate(source, 0),
    };
    let text_start = first_end.ok_or_else(unclosed)? + 1;

    let mut pos = text_start;
    while pos <= source.len() {
        let line_end = source[pos..].find('\n').map_or(source.len(), |e| pos + e);
        if source[pos..line_end].trim_end_matches('\r') == DELIMITER {
            return Ok(Some(Split {
                text_start,
                text_end: pos,
                body_start: pos + DELIMITER.len(),
            }));
        }
        if line_end == source.len() {
            break;
        }
        pos = line_end + 1;
    }

    Err(unclosed())
}
