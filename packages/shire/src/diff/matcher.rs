//! Greedy line matching for streamed output.
//!
//! Each incoming line is matched against the original lines not yet
//! consumed. Original lines skipped over by a match are removed (`Old`); a
//! perfect match keeps the original (`Same`); a near match replaces it (`Old`
//! then `New`); no match inserts (`New`). The matcher never looks back, so it
//! can run as lines arrive.

use std::collections::VecDeque;

use super::DiffLine;

/// Lines that are too common to match far away.
const END_BRACKETS: [&str; 3] = ["}", "});", "})"];

/// Lines that only match when identical after trimming.
const EXACT_ONLY: [&str; 4] = ["}", "*", "});", "})"];

/// How far an end bracket may be from the next original line and still match.
const END_BRACKET_REACH: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct LineMatcher {
    old: VecDeque<String>,

    /// Once one line matched after fixing its indentation, later lines are
    /// fixed regardless of length.
    seen_indentation_mistake: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct LineMatch {
    index: usize,
    is_perfect: bool,

    /// The line to emit, which may be the original with its indentation.
    line: String,
}

impl LineMatcher {
    pub fn new<S: Into<String>>(old_lines: impl IntoIterator<Item = S>) -> Self {
        Self {
            old: old_lines.into_iter().map(Into::into).collect(),
            seen_indentation_mistake: false,
        }
    }

    /// Original lines not yet consumed.
    pub fn remaining(&self) -> usize {
        self.old.len()
    }

    /// Classify the next generated line.
    pub fn push(&mut self, new_line: &str) -> Vec<DiffLine> {
        if self.old.is_empty() {
            return vec![DiffLine::New(new_line.to_string())];
        }

        let Some(found) = match_line(new_line, &self.old, self.seen_indentation_mistake) else {
            return vec![DiffLine::New(new_line.to_string())];
        };
        if found.line != new_line {
            self.seen_indentation_mistake = true;
        }

        let mut events = self
            .old
            .drain(..found.index)
            .map(DiffLine::Old)
            .collect::<Vec<_>>();
        let Some(original) = self.old.pop_front() else {
            return events;
        };
        if found.is_perfect {
            events.push(DiffLine::Same(original));
        } else {
            events.push(DiffLine::Old(original));
            events.push(DiffLine::New(found.line));
        }
        events
    }

    /// Generation ended: every unconsumed original line is removed.
    pub fn finish(self) -> Vec<DiffLine> {
        self.old.into_iter().map(DiffLine::Old).collect()
    }
}

/// Diff two complete texts line by line.
pub fn diff_lines(old: &[&str], new: &[&str]) -> Vec<DiffLine> {
    let mut matcher = LineMatcher::new(old.iter().copied());
    let mut events = new
        .iter()
        .flat_map(|line| matcher.push(line))
        .collect::<Vec<_>>();
    events.extend(matcher.finish());
    events
}

fn match_line(new_line: &str, old: &VecDeque<String>, permissive: bool) -> Option<LineMatch> {
    let trimmed = new_line.trim();

    // Blank lines only match the very next original line.
    if trimmed.is_empty() {
        return old
            .front()
            .filter(|first| first.trim().is_empty())
            .map(|_| LineMatch {
                index: 0,
                is_perfect: true,
                line: String::new(),
            });
    }

    let is_end_bracket = END_BRACKETS.contains(&trimmed);
    for (i, old_line) in old.iter().enumerate() {
        if is_end_bracket && i > END_BRACKET_REACH {
            return None;
        }

        if new_line == old_line.as_str() {
            return Some(LineMatch {
                index: i,
                is_perfect: true,
                line: new_line.to_string(),
            });
        }

        if lines_match(new_line, old_line, i) {
            let indentation_only = new_line.trim_start() == old_line.trim_start();
            if indentation_only && (permissive || trimmed.len() > 8) {
                return Some(LineMatch {
                    index: i,
                    is_perfect: true,
                    line: old_line.clone(),
                });
            }
            return Some(LineMatch {
                index: i,
                is_perfect: false,
                line: new_line.to_string(),
            });
        }
    }
    None
}

/// Whether two lines are close enough to be an edit of one another. The
/// tolerance shrinks the further `b` is from the head of the original.
fn lines_match(a: &str, b: &str, distance_from_head: usize) -> bool {
    let trimmed = a.trim();
    if trimmed.is_empty() {
        return false;
    }
    if EXACT_ONLY.contains(&trimmed) {
        return trimmed == b.trim();
    }
    if trimmed == b.trim() {
        return true;
    }

    let longest = a.chars().count().max(b.chars().count());
    let threshold = (0.48 - distance_from_head as f64 * 0.06).max(0.0);
    levenshtein(a, b) as f64 / longest as f64 <= threshold
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b = b.chars().collect::<Vec<_>>();
    let mut previous = (0..=b.len()).collect::<Vec<_>>();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
