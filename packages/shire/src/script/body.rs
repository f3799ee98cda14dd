//! Tokenizing the free-text body of a script.
//!
//! The body is mostly plain text. Three kinds of token are recognized:
//! - `$name` / `${name}` variable references,
//! - `/command:argument` built-in commands, where `/` starts a line or follows
//!   whitespace and the name is a registered command,
//! - `@agent` references.
//!
//! Anything that doesn't form a valid token stays plain text.

use crate::command::BuiltinCommand;
use crate::error::{ParseError, Position};

/// A piece of the script body.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Command(CommandRef),
    Variable(VariableRef),
    Agent(AgentRef),
}

/// A built-in command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRef {
    pub command: BuiltinCommand,

    /// Text after `:` up to the next whitespace; empty when absent.
    pub argument: String,

    /// The attached fenced block, or inline text for commands that take it.
    pub text: Option<String>,

    pub at: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableRef {
    pub name: String,
    pub at: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentRef {
    pub name: String,
    pub at: Position,
}

/// Tokenize `source[start..]` into segments.
pub fn parse(source: &str, start: usize) -> Result<Vec<Segment>, ParseError> {
    let body = &source[start..];
    let mut lexer = Lexer {
        source,
        body,
        start,
        segments: Vec::new(),
        text_start: 0,
    };
    lexer.run()?;
    Ok(lexer.segments)
}

struct Lexer<'a> {
    source: &'a str,
    body: &'a str,
    start: usize,
    segments: Vec<Segment>,
    text_start: usize,
}

impl Lexer<'_> {
    fn run(&mut self) -> Result<(), ParseError> {
        let bytes = self.body.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let token = match bytes[i] {
                b'$' => self.variable(i)?,
                b'/' if self.at_boundary(i) => self.command(i)?,
                b'@' if self.at_boundary(i) => self.agent(i),
                _ => None,
            };

            match token {
                Some((segment, end)) => {
                    self.flush_text(i);
                    self.segments.push(segment);
                    self.text_start = end;
                    i = end;
                }
                None => i += self.body[i..].chars().next().map_or(1, char::len_utf8),
            }
        }
        self.flush_text(bytes.len());
        Ok(())
    }

    fn position(&self, i: usize) -> Position {
        Position::locate(self.source, self.start + i)
    }

    fn at_boundary(&self, i: usize) -> bool {
        self.body[..i]
            .chars()
            .next_back()
            .is_none_or(char::is_whitespace)
    }

    fn flush_text(&mut self, end: usize) {
        if end <= self.text_start {
            return;
        }
        let text = &self.body[self.text_start..end];
        match self.segments.last_mut() {
            Some(Segment::Text(existing)) => existing.push_str(text),
            _ => self.segments.push(Segment::Text(text.to_string())),
        }
    }

    fn variable(&self, i: usize) -> Result<Option<(Segment, usize)>, ParseError> {
        let rest = &self.body[i + 1..];
        if let Some(inner) = rest.strip_prefix('{') {
            let line = inner.split('\n').next().unwrap_or(inner);
            let Some(close) = line.find('}') else {
                return Err(ParseError::UnterminatedVariable {
                    at: self.position(i),
                });
            };
            let name = line[..close].trim();
            if !is_identifier(name) {
                return Ok(None);
            }
            let segment = Segment::Variable(VariableRef {
                name: name.to_string(),
                at: self.position(i),
            });
            return Ok(Some((segment, i + 2 + close + 1)));
        }

        if !rest.starts_with(|c: char| c.is_alphabetic() || c == '_') {
            return Ok(None);
        }
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let segment = Segment::Variable(VariableRef {
            name: rest[..len].to_string(),
            at: self.position(i),
        });
        Ok(Some((segment, i + 1 + len)))
    }

    fn command(&self, i: usize) -> Result<Option<(Segment, usize)>, ParseError> {
        let rest = &self.body[i + 1..];
        let name_len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(rest.len());
        let Some(command) = BuiltinCommand::from_name(&rest[..name_len]) else {
            return Ok(None);
        };

        let mut end = i + 1 + name_len;
        let mut argument = String::new();
        if let Some(after_colon) = self.body[end..].strip_prefix(':') {
            let arg_len = after_colon
                .find(char::is_whitespace)
                .unwrap_or(after_colon.len());
            argument = after_colon[..arg_len].to_string();
            end += 1 + arg_len;
        }

        let line_rest = self.body[end..].split('\n').next().unwrap_or_default();
        let next_line_start = end + line_rest.len() + 1;
        let opens_fence = line_rest.trim().is_empty()
            && self
                .body
                .get(next_line_start..)
                .is_some_and(|next| next.trim_start_matches([' ', '\t']).starts_with("```"));

        let text = if opens_fence {
            let (text, fence_end) = self.fenced_block(next_line_start).ok_or_else(|| {
                ParseError::UnterminatedCommandBlock {
                    command: command.to_string(),
                    at: self.position(i),
                }
            })?;
            end = fence_end;
            Some(text)
        } else if command.takes_inline_text() && !line_rest.trim().is_empty() {
            end += line_rest.len();
            Some(line_rest.trim().to_string())
        } else {
            None
        };

        let segment = Segment::Command(CommandRef {
            command,
            argument,
            text,
            at: self.position(i),
        });
        Ok(Some((segment, end)))
    }

    /// Read a fenced block whose opening line starts at `open`. Returns the
    /// block content and the offset just past the closing fence.
    fn fenced_block(&self, open: usize) -> Option<(String, usize)> {
        let after_open = open + self.body[open..].find('\n')? + 1;
        let mut content = Vec::new();
        let mut pos = after_open;
        loop {
            let line_end = self.body[pos..]
                .find('\n')
                .map_or(self.body.len(), |e| pos + e);
            let line = self.body[pos..line_end].trim_end_matches('\r');
            if line.trim() == "```" {
                return Some((content.join("\n"), line_end));
            }
            content.push(line);
            if line_end == self.body.len() {
                return None;
            }
            pos = line_end + 1;
        }
    }

    fn agent(&self, i: usize) -> Option<(Segment, usize)> {
        let rest = &self.body[i + 1..];
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(rest.len());
        if len == 0 {
            return None;
        }
        let segment = Segment::Agent(AgentRef {
            name: rest[..len].to_string(),
            at: self.position(i),
        });
        Some((segment, i + 1 + len))
    }
}

fn is_identifier(name: &str) -> bool {
    name.starts_with(|c: char| c.is_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}
