//! Typed front-matter values.

use std::fmt::{self, Display, Formatter};

use chrono::NaiveDate;
use serde::{Serialize, Serializer, ser::SerializeMap};

use super::expr::{Expr, quote};

/// A value in the front-matter block.
///
/// Only [`FrontMatterValue::Expression`] may carry conditionals or pipelines;
/// every other variant is terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontMatterValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    Array(Vec<FrontMatterValue>),
    Object(Vec<(String, FrontMatterValue)>),
    Expression(Expression),
}

impl FrontMatterValue {
    /// Name of the value's type tag.
    pub fn kind(&self) -> &'static str {
        match self {
            FrontMatterValue::String(_) => "STRING",
            FrontMatterValue::Number(_) => "NUMBER",
            FrontMatterValue::Boolean(_) => "BOOLEAN",
            FrontMatterValue::Date(_) => "DATE",
            FrontMatterValue::Array(_) => "ARRAY",
            FrontMatterValue::Object(_) => "OBJECT",
            FrontMatterValue::Expression(_) => "EXPRESSION",
        }
    }

    /// Render a scalar as plain text, as a variable value would see it.
    ///
    /// Arrays render one element per line; objects and expressions render
    /// their source form.
    pub fn display_text(&self) -> String {
        match self {
            FrontMatterValue::String(s) => s.clone(),
            FrontMatterValue::Number(n) => n.to_string(),
            FrontMatterValue::Boolean(b) => b.to_string(),
            FrontMatterValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FrontMatterValue::Array(items) => items
                .iter()
                .map(FrontMatterValue::display_text)
                .collect::<Vec<_>>()
                .join("\n"),
            FrontMatterValue::Object(_) | FrontMatterValue::Expression(_) => self.to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FrontMatterValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FrontMatterValue::Boolean(b) => Some(*b),
            FrontMatterValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, FrontMatterValue)]> {
        match self {
            FrontMatterValue::Object(entries) => Some(entries),
            _ => None,
        }
    }
}

/// Inline source form. Objects print as `{ key: value, ... }` here; the
/// block form is produced by [`super::FrontMatter::to_source`].
impl Display for FrontMatterValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FrontMatterValue::String(s) => f.write_str(&quote(s)),
            FrontMatterValue::Number(n) => write!(f, "{n}"),
            FrontMatterValue::Boolean(b) => write!(f, "{b}"),
            FrontMatterValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FrontMatterValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            FrontMatterValue::Object(entries) => {
                f.write_str("{ ")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str(" }")
            }
            FrontMatterValue::Expression(expr) => write!(f, "{expr}"),
        }
    }
}

impl Serialize for FrontMatterValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FrontMatterValue::String(s) => serializer.serialize_str(s),
            FrontMatterValue::Number(n) => serializer.serialize_f64(*n),
            FrontMatterValue::Boolean(b) => serializer.serialize_bool(*b),
            FrontMatterValue::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
            FrontMatterValue::Array(items) => serializer.collect_seq(items),
            FrontMatterValue::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            FrontMatterValue::Expression(expr) => serializer.collect_str(expr),
        }
    }
}

/// A front-matter value that is evaluated rather than read.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A condition such as `$selection.length() > 1`.
    Condition(Expr),

    /// A `condition:` block paired with its `case condition { ... }` routes.
    ConditionCase(ConditionCase),

    /// A pattern-action pipeline such as `/.*\.rs/ { grep("fn") | head(3) }`.
    PatternAction(PatternAction),
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Condition(expr) if expr.starts_with_marker() => write!(f, "{expr}"),
            Expression::Condition(expr) => write!(f, "({expr})"),
            Expression::ConditionCase(case) => write!(f, "{case}"),
            Expression::PatternAction(action) => write!(f, "{action}"),
        }
    }
}

/// Conditions paired with the tasks they route to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConditionCase {
    /// Conditions in declaration order; the first satisfied one wins.
    pub conditions: Vec<Condition>,

    /// Tasks keyed by condition name.
    pub cases: Vec<Case>,

    /// Task used when no condition holds.
    pub default: Option<Vec<FuncCall>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub key: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub key: String,
    pub task: Vec<FuncCall>,
}

impl ConditionCase {
    /// The `case condition { ... }` block in source form.
    pub fn case_block(&self) -> String {
        let mut out = String::from("case condition {\n");
        for case in &self.cases {
            out.push_str(&format!(
                "  {} {{\n    {}\n  }}\n",
                quote(&case.key),
                join_calls(&case.task)
            ));
        }
        if let Some(default) = &self.default {
            out.push_str(&format!("  default {{\n    {}\n  }}\n", join_calls(default)));
        }
        out.push('}');
        out
    }
}

impl Display for ConditionCase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("{ ")?;
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", quote(&condition.key), condition.expr)?;
        }
        write!(f, " }} {}", self.case_block().replace('\n', " "))
    }
}

/// A pipeline, optionally scoped by a file-path pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternAction {
    /// Regex matched against project file paths; `None` for a bare `{ ... }`.
    pub pattern: Option<String>,

    pub pipeline: Vec<FuncCall>,
}

impl Display for PatternAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(pattern) = &self.pattern {
            write!(f, "/{}/ ", pattern.replace('/', "\\/"))?;
        }
        if self.pipeline.is_empty() {
            f.write_str("{ }")
        } else {
            write!(f, "{{ {} }}", join_calls(&self.pipeline))
        }
    }
}

/// A function call inside a pipeline, before it is given meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncCall {
    pub name: String,
    pub args: Vec<FuncArg>,
}

impl FuncCall {
    /// Arguments rendered as text.
    pub fn text_args(&self) -> Vec<String> {
        self.args.iter().map(FuncArg::as_text).collect()
    }
}

impl Display for FuncCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("(")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FuncArg {
    String(String),
    Number(f64),
}

impl FuncArg {
    pub fn as_text(&self) -> String {
        match self {
            FuncArg::String(s) => s.clone(),
            FuncArg::Number(n) => n.to_string(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FuncArg::Number(n) => Some(*n),
            FuncArg::String(s) => s.trim().parse().ok(),
        }
    }
}

impl Display for FuncArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FuncArg::String(s) => f.write_str(&quote(s)),
            FuncArg::Number(n) => write!(f, "{n}"),
        }
    }
}

fn join_calls(calls: &[FuncCall]) -> String {
    calls
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Parse a single-line (or brace-joined) value.
///
/// `force_expression` makes any text parse as a condition expression, which is
/// how `when:` and the entries of a `condition:` block are read.
pub fn parse_value(text: &str, force_expression: bool) -> Result<FrontMatterValue, String> {
    let text = text.trim();

    if force_expression {
        return Expr::parse(text)
            .map(|expr| FrontMatterValue::Expression(Expression::Condition(expr)))
            .map_err(|e| e.to_string());
    }

    let Some(first) = text.chars().next() else {
        return Ok(FrontMatterValue::String(String::new()));
    };

    match first {
        '"' | '\'' => {
            let (value, rest) = parse_quoted(text)?;
            if !rest.trim().is_empty() {
                return Err(format!("unexpected text after string: `{}`", rest.trim()));
            }
            Ok(FrontMatterValue::String(value))
        }
        '[' => parse_array(text).map(FrontMatterValue::Array),
        '/' => parse_pattern_action(text)
            .map(|action| FrontMatterValue::Expression(Expression::PatternAction(action))),
        '{' => parse_pipeline(text).map(|pipeline| {
            FrontMatterValue::Expression(Expression::PatternAction(PatternAction {
                pattern: None,
                pipeline,
            }))
        }),
        '$' | '!' | '(' => Expr::parse(text)
            .map(|expr| FrontMatterValue::Expression(Expression::Condition(expr)))
            .map_err(|e| e.to_string()),
        _ => Ok(parse_scalar(text)),
    }
}

fn parse_scalar(text: &str) -> FrontMatterValue {
    match text {
        "true" => return FrontMatterValue::Boolean(true),
        "false" => return FrontMatterValue::Boolean(false),
        _ => {}
    }

    let numeric = text
        .strip_prefix('-')
        .unwrap_or(text)
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.');
    if numeric && text.chars().any(|c| c.is_ascii_digit()) {
        if let Ok(n) = text.parse::<f64>() {
            return FrontMatterValue::Number(n);
        }
    }

    let is_date_shape = text.len() == 10
        && text
            .char_indices()
            .all(|(i, c)| if i == 4 || i == 7 { c == '-' } else { c.is_ascii_digit() });
    if is_date_shape {
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return FrontMatterValue::Date(date);
        }
    }

    FrontMatterValue::String(text.to_string())
}

/// Parse a quoted string at the start of `text`, returning it and the remainder.
pub fn parse_quoted(text: &str) -> Result<(String, &str), String> {
    let mut chars = text.char_indices();
    let quote = match chars.next() {
        Some((_, c @ ('"' | '\''))) => c,
        _ => return Err(String::from("expected a quoted string")),
    };

    let mut value = String::new();
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            match c {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                '\\' | '"' | '\'' => value.push(c),
                other => {
                    value.push('\\');
                    value.push(other);
                }
            }
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((value, &text[i + c.len_utf8()..]));
        } else {
            value.push(c);
        }
    }

    Err(String::from("unterminated string"))
}

fn parse_array(text: &str) -> Result<Vec<FrontMatterValue>, String> {
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| String::from("unterminated array"))?;

    split_top_level(inner, ',')?
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_value(item, false))
        .collect()
}

fn parse_pattern_action(text: &str) -> Result<PatternAction, String> {
    let mut pattern = String::new();
    let mut end = None;
    let mut chars = text.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, '/')) => pattern.push('/'),
                Some((_, other)) => {
                    pattern.push('\\');
                    pattern.push(other);
                }
                None => pattern.push('\\'),
            },
            '/' => {
                end = Some(i + 1);
                break;
            }
            c => pattern.push(c),
        }
    }

    let end = end.ok_or_else(|| String::from("unterminated pattern"))?;
    let rest = text[end..].trim();
    if !rest.starts_with('{') {
        return Err(String::from("expected `{` after pattern"));
    }

    Ok(PatternAction {
        pattern: Some(pattern),
        pipeline: parse_pipeline(rest)?,
    })
}

/// Parse `{ f | g(args) }` into its calls.
pub fn parse_pipeline(text: &str) -> Result<Vec<FuncCall>, String> {
    let inner = text
        .trim()
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .ok_or_else(|| String::from("expected a `{ ... }` pipeline"))?;

    split_top_level(inner, '|')?
        .into_iter()
        .map(str::trim)
        .filter(|call| !call.is_empty())
        .map(parse_call)
        .collect()
}

fn parse_call(text: &str) -> Result<FuncCall, String> {
    let name_end = text
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    let name = &text[..name_end];
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(format!("expected function name in `{text}`"));
    }

    let rest = text[name_end..].trim();
    if rest.is_empty() {
        return Ok(FuncCall {
            name: name.to_string(),
            args: Vec::new(),
        });
    }

    let inner = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| format!("malformed call `{text}`"))?;

    let args = split_top_level(inner, ',')?
        .into_iter()
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .map(|arg| {
            if arg.starts_with(['"', '\'']) {
                let (value, rest) = parse_quoted(arg)?;
                if !rest.trim().is_empty() {
                    return Err(format!("unexpected text after argument `{arg}`"));
                }
                Ok(FuncArg::String(value))
            } else if let Ok(n) = arg.parse::<f64>() {
                Ok(FuncArg::Number(n))
            } else {
                Ok(FuncArg::String(arg.to_string()))
            }
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(FuncCall {
        name: name.to_string(),
        args,
    })
}

/// Parse the brace body of `case condition { ... }`.
pub fn parse_case_block(text: &str) -> Result<(Vec<Case>, Option<Vec<FuncCall>>), String> {
    let inner = text
        .trim()
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .ok_or_else(|| String::from("expected `{ ... }` after `case condition`"))?;

    let mut cases = Vec::new();
    let mut default = None;
    let mut rest = inner.trim_start();
    while !rest.is_empty() {
        let (key, after_key) = if rest.starts_with(['"', '\'']) {
            let (key, after) = parse_quoted(rest)?;
            (Some(key), after)
        } else if let Some(after) = rest.strip_prefix("default") {
            (None, after)
        } else {
            return Err(format!("expected a case key, found `{}`", first_line(rest)));
        };

        let after_key = after_key.trim_start();
        let close = matching_brace(after_key)
            .ok_or_else(|| String::from("unterminated case body"))?;
        let task = parse_pipeline(&after_key[..=close])?;
        match key {
            Some(key) => cases.push(Case { key, task }),
            None => default = Some(task),
        }
        rest = after_key[close + 1..].trim_start();
    }

    Ok((cases, default))
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text)
}

/// Index of the `}` closing the `{` that `text` starts with.
fn matching_brace(text: &str) -> Option<usize> {
    if !text.starts_with('{') {
        return None;
    }
    let mut depth = 0usize;
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `sep` where it appears outside quotes and brackets.
fn split_top_level(text: &str, sep: char) -> Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err(String::from("unterminated string"));
    }
    if depth != 0 {
        return Err(String::from("unbalanced brackets"));
    }
    parts.push(&text[start..]);
    Ok(parts)
}

/// Net count of opening brackets in `text`, ignoring quoted strings and a
/// leading `/pattern/`. Positive means the value continues on later lines.
pub fn open_brackets(text: &str) -> i32 {
    let mut text = text.trim_start();
    if let Some(rest) = text.strip_prefix('/') {
        let mut escaped = false;
        let mut end = None;
        for (i, c) in rest.char_indices() {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '/' {
                end = Some(i + 1);
                break;
            }
        }
        text = end.map(|end| &rest[end..]).unwrap_or("");
    }

    let mut depth = 0;
    let mut quote = None;
    let mut escaped = false;
    for c in text.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    depth
}
