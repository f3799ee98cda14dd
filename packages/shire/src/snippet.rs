//! Source snippet rendering for parse errors.
//!
//! Uses `annotate-snippets` to render compiler-like diagnostics pointing at
//! the failing location in a script.

use annotate_snippets::{Level, Renderer, Snippet};

use crate::error::ParseError;

/// Render a parse error against the script source.
///
/// # Examples
///
/// Produces output similar to Rust compiler diagnostics:
///
/// ```text
/// error: unterminated variable reference at 1:7
///  --> review.shire:1:7
///   |
/// 1 | Check ${selection
///   |       ^ missing `}`
///   |
/// ```
pub fn render_parse_error(source: &str, origin: &str, error: &ParseError) -> String {
    let title = error.to_string();
    let Some(at) = error.position() else {
        return Renderer::plain().render(Level::Error.title(&title)).to_string();
    };

    let span = char_span(source, at.offset);
    let snippet = Snippet::source(source)
        .origin(origin)
        .fold(true)
        .annotation(Level::Error.span(span).label(label(error)));
    let message = Level::Error.title(&title).snippet(snippet);
    Renderer::plain().render(message).to_string()
}

fn label(error: &ParseError) -> &'static str {
    match error {
        ParseError::UnclosedFrontMatter { .. } => "front matter starts here",
        ParseError::UnterminatedVariable { .. } => "missing `}`",
        ParseError::UnterminatedCommandBlock { .. } => "code block starts here",
        ParseError::FrontMatter { .. } => "here",
        ParseError::Expression { .. }
        | ParseError::UnknownFunction { .. }
        | ParseError::InvalidArguments { .. } => "",
    }
}

/// The character at `offset`, or the last one when `offset` is at the end.
fn char_span(source: &str, offset: usize) -> std::ops::Range<usize> {
    let mut start = offset.min(source.len());
    while !source.is_char_boundary(start) {
        start -= 1;
    }
    match source[start..].chars().next() {
        Some(c) => start..start + c.len_utf8(),
        None => match source.char_indices().next_back() {
            Some((i, c)) => i..i + c.len_utf8(),
            None => 0..0,
        },
    }
}
