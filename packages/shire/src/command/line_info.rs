//! `#Lstart-Lend` line ranges attached to file paths.

use std::fmt::{self, Display, Formatter};

/// An inclusive, 1-based line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineInfo {
    pub start: usize,
    pub end: usize,
}

impl LineInfo {
    /// Parse `L3`, `L3-L7` or `L3C1-L7C9`; columns are accepted and ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let (start, end) = match text.split_once('-') {
            Some((start, end)) => (line_number(start)?, line_number(end)?),
            None => {
                let line = line_number(text)?;
                (line, line)
            }
        };
        (start >= 1 && end >= start).then_some(Self { start, end })
    }

    /// Split `path#L1-L2` into the path and its range. A fragment that isn't
    /// a valid range is left attached to the path.
    pub fn split_path(argument: &str) -> (&str, Option<Self>) {
        match argument.rsplit_once('#') {
            Some((path, fragment)) => match Self::parse(fragment) {
                Some(range) => (path, Some(range)),
                None => (argument, None),
            },
            None => (argument, None),
        }
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// The lines of `text` in this range, clamped to the text's length.
    pub fn slice(&self, text: &str) -> String {
        text.lines()
            .skip(self.start - 1)
            .take(self.end - self.start + 1)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Display for LineInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "L{}", self.start)
        } else {
            write!(f, "L{}-L{}", self.start, self.end)
        }
    }
}

fn line_number(text: &str) -> Option<usize> {
    let digits = text.strip_prefix('L')?;
    let digits = digits.split_once('C').map_or(digits, |(line, _)| line);
    digits.parse().ok()
}
