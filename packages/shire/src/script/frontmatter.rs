//! The front-matter block: an ordered mapping of keys to typed values.

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::error::{ParseError, Position};

use super::expr::quote;
use super::value::{
    ConditionCase, Expression, FrontMatterValue, open_brackets, parse_case_block, parse_quoted,
    parse_value,
};

/// Key that carries conditional task routing.
pub const CONDITION_KEY: &str = "condition";

/// Parsed front matter, in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrontMatter {
    entries: Vec<(String, FrontMatterValue)>,
}

impl FrontMatter {
    pub fn new(entries: Vec<(String, FrontMatterValue)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&FrontMatterValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn entries(&self) -> &[(String, FrontMatterValue)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the text between the `---` markers.
    ///
    /// `offset` is the byte offset of `text` within `source`, used to report
    /// positions relative to the whole script.
    #[tracing::instrument(skip_all)]
    pub fn parse(source: &str, text: &str, offset: usize) -> Result<Self, ParseError> {
        let lines = split_lines(text, offset);
        let mut cursor = 0;
        let entries = parse_block(source, &lines, &mut cursor, 0, false)?;
        Ok(Self { entries })
    }

    /// Serialize back into front-matter syntax (without the `---` markers).
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        write_entries(&mut out, &self.entries, 0);
        out
    }
}

impl Serialize for FrontMatter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug)]
struct Line<'a> {
    text: &'a str,
    indent: usize,
    offset: usize,
}

impl Line<'_> {
    fn is_skippable(&self) -> bool {
        let trimmed = self.text.trim();
        trimmed.is_empty() || trimmed.starts_with('#')
    }
}

fn split_lines(text: &str, base: usize) -> Vec<Line<'_>> {
    let mut offset = base;
    text.split('\n')
        .map(|raw| {
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            let indent = line.len() - line.trim_start().len();
            let entry = Line {
                text: line,
                indent,
                offset,
            };
            offset += raw.len() + 1;
            entry
        })
        .collect()
}

fn error(source: &str, offset: usize, message: impl Into<String>) -> ParseError {
    ParseError::FrontMatter {
        message: message.into(),
        at: Position::locate(source, offset),
    }
}

fn parse_block(
    source: &str,
    lines: &[Line<'_>],
    cursor: &mut usize,
    indent: usize,
    force_expression: bool,
) -> Result<Vec<(String, FrontMatterValue)>, ParseError> {
    let mut entries: Vec<(String, FrontMatterValue)> = Vec::new();

    while *cursor < lines.len() {
        let line = &lines[*cursor];
        if line.is_skippable() {
            *cursor += 1;
            continue;
        }
        if line.indent < indent {
            break;
        }

        let content = line.text.trim();
        if let Some(rest) = content.strip_prefix("case condition") {
            let (body, next) = gather_continuation(lines, *cursor, rest, true);
            let (cases, default) =
                parse_case_block(&body).map_err(|message| error(source, line.offset, message))?;
            *cursor = next;

            let conditions = match entries.iter().position(|(k, _)| k == CONDITION_KEY) {
                Some(index) => {
                    let (_, value) = entries.remove(index);
                    conditions_from(source, line.offset, value)?
                }
                None => Vec::new(),
            };
            entries.push((
                CONDITION_KEY.to_string(),
                FrontMatterValue::Expression(Expression::ConditionCase(ConditionCase {
                    conditions,
                    cases,
                    default,
                })),
            ));
            continue;
        }

        let (key, rest) =
            split_key(content).map_err(|message| error(source, line.offset, message))?;
        let rest = rest.trim();

        if rest.is_empty() {
            *cursor += 1;
            let child_indent = lines[*cursor..]
                .iter()
                .find(|l| !l.is_skippable())
                .map(|l| l.indent)
                .filter(|&child| child > line.indent);
            let value = match child_indent {
                Some(child_indent) => {
                    let nested = parse_block(
                        source,
                        lines,
                        cursor,
                        child_indent,
                        force_expression || key == CONDITION_KEY,
                    )?;
                    FrontMatterValue::Object(nested)
                }
                None => FrontMatterValue::Object(Vec::new()),
            };
            entries.push((key, value));
            continue;
        }

        let force = force_expression || key == "when";
        let (value_text, next) =
            gather_continuation(lines, *cursor, rest, force || spans_lines(rest));
        let value = parse_value(&value_text, force)
            .map_err(|message| error(source, line.offset, format!("`{key}`: {message}")))?;
        *cursor = next;
        entries.push((key, value));
    }

    Ok(entries)
}

/// Whether a value opens with a construct that may continue on later lines.
///
/// Plain scalars never do, so a stray `(` in prose stays on its own line.
fn spans_lines(value: &str) -> bool {
    value.trim_start().starts_with(['[', '{', '(', '/', '$', '!'])
}

/// Join `first` with following lines until its brackets balance.
fn gather_continuation(
    lines: &[Line<'_>],
    start: usize,
    first: &str,
    multiline: bool,
) -> (String, usize) {
    let mut text = first.to_string();
    let mut next = start + 1;
    while multiline && open_brackets(&text) > 0 && next < lines.len() {
        text.push('\n');
        text.push_str(lines[next].text);
        next += 1;
    }
    (text, next)
}

fn split_key(content: &str) -> Result<(String, &str), String> {
    if content.starts_with(['"', '\'']) {
        let (key, rest) = parse_quoted(content)?;
        let rest = rest
            .trim_start()
            .strip_prefix(':')
            .ok_or_else(|| format!("expected `:` after key `{key}`"))?;
        return Ok((key, rest));
    }

    let (key, rest) = content
        .split_once(':')
        .ok_or_else(|| format!("expected `key: value`, found `{content}`"))?;
    let key = key.trim();
    if key.is_empty() || !key.chars().all(is_key_char) {
        return Err(format!("invalid key `{key}`"));
    }
    Ok((key.to_string(), rest))
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn conditions_from(
    source: &str,
    offset: usize,
    value: FrontMatterValue,
) -> Result<Vec<super::value::Condition>, ParseError> {
    let FrontMatterValue::Object(entries) = value else {
        return Err(error(
            source,
            offset,
            format!("`{CONDITION_KEY}` must be a block of named conditions"),
        ));
    };

    entries
        .into_iter()
        .map(|(key, value)| match value {
            FrontMatterValue::Expression(Expression::Condition(expr)) => {
                Ok(super::value::Condition { key, expr })
            }
            other => Err(error(
                source,
                offset,
                format!("condition `{key}` must be an expression, found {}", other.kind()),
            )),
        })
        .collect()
}

fn write_key(out: &mut String, indent: usize, key: &str) {
    out.push_str(&" ".repeat(indent));
    if !key.is_empty() && key.chars().all(is_key_char) {
        out.push_str(key);
    } else {
        out.push_str(&quote(key));
    }
    out.push(':');
}

fn write_entries(out: &mut String, entries: &[(String, FrontMatterValue)], indent: usize) {
    for (key, value) in entries {
        match value {
            FrontMatterValue::Object(children) => {
                write_key(out, indent, key);
                out.push('\n');
                write_entries(out, children, indent + 2);
            }
            FrontMatterValue::Expression(Expression::ConditionCase(case)) if key == CONDITION_KEY => {
                if !case.conditions.is_empty() {
                    write_key(out, indent, key);
                    out.push('\n');
                    for condition in &case.conditions {
                        write_key(out, indent + 2, &condition.key);
                        out.push_str(&format!(" {}\n", condition.expr));
                    }
                }
                out.push_str(&case.case_block());
                out.push('\n');
            }
            value => {
                write_key(out, indent, key);
                out.push_str(&format!(" {value}\n"));
            }
        }
    }
}
