//! Condition expressions used by `when:` and `condition:` entries.
//!
//! The grammar is small:
//!
//! ```text
//! or      := and ("||" and)*
//! and     := compare ("&&" compare)*
//! compare := unary (("==" | "!=" | ">" | "<" | ">=" | "<=") unary)?
//! unary   := "!" unary | postfix
//! postfix := primary ("." method ("(" args ")")?)*
//! primary := $variable | "string" | 'string' | number | true | false | "(" or ")"
//! ```

use std::fmt::{self, Display, Formatter};

use derive_more::Display as DeriveDisplay;
use regex::Regex;

use crate::error::ParseError;

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `$name`
    Variable(String),
    String(String),
    Number(f64),
    Boolean(bool),
    Not(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `receiver.method(args)`
    Call {
        receiver: Box<Expr>,
        method: Method,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveDisplay)]
pub enum BinaryOp {
    #[display("||")]
    Or,
    #[display("&&")]
    And,
    #[display("==")]
    Eq,
    #[display("!=")]
    Ne,
    #[display(">")]
    Gt,
    #[display("<")]
    Lt,
    #[display(">=")]
    Ge,
    #[display("<=")]
    Le,
}

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            _ => 3,
        }
    }
}

/// Methods callable on a value with `.name()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveDisplay)]
pub enum Method {
    #[display("length")]
    Length,
    #[display("contains")]
    Contains,
    #[display("startsWith")]
    StartsWith,
    #[display("endsWith")]
    EndsWith,
    #[display("matches")]
    Matches,
    #[display("lowercase")]
    Lowercase,
    #[display("uppercase")]
    Uppercase,
    #[display("isEmpty")]
    IsEmpty,
    #[display("isNotEmpty")]
    IsNotEmpty,
    #[display("first")]
    First,
    #[display("last")]
    Last,
    #[display("trim")]
    Trim,
}

impl Method {
    /// Every method, for lookups by name.
    pub const ALL: [Method; 12] = [
        Method::Length,
        Method::Contains,
        Method::StartsWith,
        Method::EndsWith,
        Method::Matches,
        Method::Lowercase,
        Method::Uppercase,
        Method::IsEmpty,
        Method::IsNotEmpty,
        Method::First,
        Method::Last,
        Method::Trim,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.to_string() == name)
    }

    fn arity(self) -> usize {
        match self {
            Method::Contains | Method::StartsWith | Method::EndsWith | Method::Matches => 1,
            _ => 0,
        }
    }
}

/// The runtime value of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Value {
    /// Whether the value counts as true in a condition.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty() && s != "false",
        }
    }

    /// Render the value as text.
    pub fn as_text(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Num(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Bool(_) => None,
        }
    }
}

impl Expr {
    /// Parse an expression from source text.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let tokens = tokenize(source).map_err(|message| ParseError::Expression {
            source_text: source.to_string(),
            message,
        })?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.or().and_then(|expr| match parser.peek() {
            None => Ok(expr),
            Some(token) => Err(format!("unexpected `{token}`")),
        });
        expr.map_err(|message| ParseError::Expression {
            source_text: source.to_string(),
            message,
        })
    }

    /// Evaluate the expression, resolving `$variables` through `lookup`.
    pub fn evaluate(&self, lookup: &mut dyn FnMut(&str) -> String) -> Value {
        match self {
            Expr::Variable(name) => Value::Str(lookup(name)),
            Expr::String(s) => Value::Str(s.clone()),
            Expr::Number(n) => Value::Num(*n),
            Expr::Boolean(b) => Value::Bool(*b),
            Expr::Not(inner) => Value::Bool(!inner.evaluate(lookup).is_truthy()),
            Expr::Binary { op, left, right } => match op {
                BinaryOp::Or => {
                    Value::Bool(left.evaluate(lookup).is_truthy() || right.evaluate(lookup).is_truthy())
                }
                BinaryOp::And => {
                    Value::Bool(left.evaluate(lookup).is_truthy() && right.evaluate(lookup).is_truthy())
                }
                op => {
                    let left = left.evaluate(lookup);
                    let right = right.evaluate(lookup);
                    Value::Bool(compare(*op, &left, &right))
                }
            },
            Expr::Call {
                receiver,
                method,
                args,
            } => {
                let receiver = receiver.evaluate(lookup).as_text();
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(lookup).as_text())
                    .collect::<Vec<_>>();
                call(*method, &receiver, &args)
            }
        }
    }

    /// Evaluate the expression as a condition.
    pub fn is_satisfied(&self, lookup: &mut dyn FnMut(&str) -> String) -> bool {
        self.evaluate(lookup).is_truthy()
    }

    /// Names of every variable the expression references, in order of appearance.
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Variable(name) => names.push(name),
            Expr::String(_) | Expr::Number(_) | Expr::Boolean(_) => {}
            Expr::Not(inner) => inner.collect_variables(names),
            Expr::Binary { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Expr::Call { receiver, args, .. } => {
                receiver.collect_variables(names);
                args.iter().for_each(|arg| arg.collect_variables(names));
            }
        }
    }

    /// Whether the printed form starts with a token that marks an expression
    /// in front matter (`$`, `!` or `(`).
    pub fn starts_with_marker(&self) -> bool {
        match self {
            Expr::Variable(_) | Expr::Not(_) => true,
            Expr::Binary { op, left, .. } => {
                let min = if op.precedence() == 3 { 4 } else { op.precedence() };
                left.precedence() < min || left.starts_with_marker()
            }
            Expr::Call { receiver, .. } => receiver.precedence() < 5 || receiver.starts_with_marker(),
            Expr::String(_) | Expr::Number(_) | Expr::Boolean(_) => false,
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Not(_) => 4,
            _ => 5,
        }
    }

    fn fmt_child(&self, f: &mut Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Variable(name) => write!(f, "${name}"),
            Expr::String(s) => write!(f, "{}", quote(s)),
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Boolean(b) => write!(f, "{b}"),
            Expr::Not(inner) => {
                f.write_str("!")?;
                inner.fmt_child(f, 4)
            }
            Expr::Binary { op, left, right } => {
                let prec = op.precedence();
                let (left_min, right_min) = if prec == 3 { (4, 4) } else { (prec, prec + 1) };
                left.fmt_child(f, left_min)?;
                write!(f, " {op} ")?;
                right.fmt_child(f, right_min)
            }
            Expr::Call {
                receiver,
                method,
                args,
            } => {
                receiver.fmt_child(f, 5)?;
                write!(f, ".{method}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Quote a string with double quotes, escaping as needed.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    if let (Some(l), Some(r)) = (left.as_number(), right.as_number()) {
        return match op {
            BinaryOp::Eq => l == r,
            BinaryOp::Ne => l != r,
            BinaryOp::Gt => l > r,
            BinaryOp::Lt => l < r,
            BinaryOp::Ge => l >= r,
            BinaryOp::Le => l <= r,
            BinaryOp::Or | BinaryOp::And => false,
        };
    }

    let (l, r) = (left.as_text(), right.as_text());
    match op {
        BinaryOp::Eq => l == r,
        BinaryOp::Ne => l != r,
        BinaryOp::Gt => l > r,
        BinaryOp::Lt => l < r,
        BinaryOp::Ge => l >= r,
        BinaryOp::Le => l <= r,
        BinaryOp::Or | BinaryOp::And => false,
    }
}

fn call(method: Method, receiver: &str, args: &[String]) -> Value {
    let arg = args.first().map(String::as_str).unwrap_or_default();
    match method {
        Method::Length => Value::Num(receiver.chars().count() as f64),
        Method::Contains => Value::Bool(receiver.contains(arg)),
        Method::StartsWith => Value::Bool(receiver.starts_with(arg)),
        Method::EndsWith => Value::Bool(receiver.ends_with(arg)),
        Method::Matches => match Regex::new(arg) {
            Ok(regex) => Value::Bool(regex.is_match(receiver)),
            Err(error) => {
                tracing::warn!(?error, pattern = arg, "invalid regex in condition");
                Value::Bool(false)
            }
        },
        Method::Lowercase => Value::Str(receiver.to_lowercase()),
        Method::Uppercase => Value::Str(receiver.to_uppercase()),
        Method::IsEmpty => Value::Bool(receiver.is_empty()),
        Method::IsNotEmpty => Value::Bool(!receiver.is_empty()),
        Method::First => Value::Str(receiver.lines().next().unwrap_or_default().to_string()),
        Method::Last => Value::Str(receiver.lines().last().unwrap_or_default().to_string()),
        Method::Trim => Value::Str(receiver.trim().to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, DeriveDisplay)]
enum Token {
    #[display("${_0}")]
    Variable(String),
    #[display("{}", quote(_0))]
    String(String),
    #[display("{_0}")]
    Number(f64),
    #[display("{_0}")]
    Ident(String),
    #[display("{_0}")]
    Op(BinaryOp),
    #[display("!")]
    Bang,
    #[display(".")]
    Dot,
    #[display(",")]
    Comma,
    #[display("(")]
    Open,
    #[display(")")]
    Close,
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars = source.chars().collect::<Vec<_>>();
    let mut tokens = Vec::new();
    let mut i = 0;

    let ident_end = |start: usize| {
        let mut end = start;
        while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
            end += 1;
        }
        end
    };

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '$' => {
                let end = ident_end(i + 1);
                if end == i + 1 {
                    return Err(String::from("expected variable name after `$`"));
                }
                tokens.push(Token::Variable(chars[i + 1..end].iter().collect()));
                i = end;
            }
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(String::from("unterminated string")),
                        Some('\\') => {
                            match chars.get(i + 1) {
                                Some('n') => value.push('\n'),
                                Some('t') => value.push('\t'),
                                Some(&ch @ ('\\' | '"' | '\'')) => value.push(ch),
                                Some(&other) => {
                                    value.push('\\');
                                    value.push(other);
                                }
                                None => return Err(String::from("unterminated string")),
                            }
                            i += 2;
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            value.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::String(value));
            }
            c if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    // A dot followed by a letter is a method call, not a fraction.
                    if chars[i] == '.' && !chars.get(i + 1).is_some_and(char::is_ascii_digit) {
                        break;
                    }
                    i += 1;
                }
                let text = chars[start..i].iter().collect::<String>();
                let number = text.parse().map_err(|_| format!("invalid number `{text}`"))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let end = ident_end(i);
                tokens.push(Token::Ident(chars[i..end].iter().collect()));
                i = end;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Op(BinaryOp::Or));
                i += 2;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::Op(BinaryOp::And));
                i += 2;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Op(BinaryOp::Eq));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Op(BinaryOp::Ne));
                i += 2;
            }
            '>' if next == Some('=') => {
                tokens.push(Token::Op(BinaryOp::Ge));
                i += 2;
            }
            '<' if next == Some('=') => {
                tokens.push(Token::Op(BinaryOp::Le));
                i += 2;
            }
            '>' => {
                tokens.push(Token::Op(BinaryOp::Gt));
                i += 1;
            }
            '<' => {
                tokens.push(Token::Op(BinaryOp::Lt));
                i += 1;
            }
            '!' => {
                tokens.push(Token::Bang);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            other => return Err(format!("unexpected character `{other}`")),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(format!("expected `{expected}`, found `{token}`")),
            None => Err(format!("expected `{expected}`, found end of input")),
        }
    }

    fn or(&mut self) -> Result<Expr, String> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::Op(BinaryOp::Or)) {
            self.pos += 1;
            let right = self.and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut left = self.compare()?;
        while self.peek() == Some(&Token::Op(BinaryOp::And)) {
            self.pos += 1;
            let right = self.compare()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn compare(&mut self) -> Result<Expr, String> {
        let left = self.unary()?;
        match self.peek() {
            Some(Token::Op(op)) if op.precedence() == 3 => {
                let op = *op;
                self.pos += 1;
                let right = self.unary()?;
                Ok(binary(op, left, right))
            }
            _ => Ok(left),
        }
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Token::Bang) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        while self.peek() == Some(&Token::Dot) {
            self.pos += 1;
            let name = match self.next() {
                Some(Token::Ident(name)) => name,
                Some(token) => return Err(format!("expected method name, found `{token}`")),
                None => return Err(String::from("expected method name")),
            };
            let method = Method::from_name(&name).ok_or_else(|| format!("unknown method `{name}`"))?;

            let mut args = Vec::new();
            if self.peek() == Some(&Token::Open) {
                self.pos += 1;
                if self.peek() != Some(&Token::Close) {
                    args.push(self.or()?);
                    while self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                        args.push(self.or()?);
                    }
                }
                self.expect(Token::Close)?;
            }

            if args.len() != method.arity() {
                return Err(format!(
                    "`{method}` takes {} argument(s), got {}",
                    method.arity(),
                    args.len()
                ));
            }

            expr = Expr::Call {
                receiver: Box::new(expr),
                method,
                args,
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Variable(name)) => Ok(Expr::Variable(name)),
            Some(Token::String(s)) => Ok(Expr::String(s)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Ident(word)) if word == "true" => Ok(Expr::Boolean(true)),
            Some(Token::Ident(word)) if word == "false" => Ok(Expr::Boolean(false)),
            Some(Token::Open) => {
                let inner = self.or()?;
                self.expect(Token::Close)?;
                Ok(inner)
            }
            Some(token) => Err(format!("unexpected `{token}`")),
            None => Err(String::from("unexpected end of expression")),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
