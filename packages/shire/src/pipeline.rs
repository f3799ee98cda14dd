//! Pattern-action pipelines: Unix-pipe-like chains of text functions.
//!
//! A pipeline threads an accumulator through its functions left to right.
//! The accumulator is either a single string or an ordered list of strings.
//! Each function accepts and produces a declared shape; a single string is
//! always promoted to a one-element list where a list is expected, and any
//! other mismatch stops the pipeline with a [`PipelineTypeError`].

use std::fmt::{self, Display, Formatter};

use color_eyre::eyre::Result;
use derive_more::{Display as DeriveDisplay, Error, From};
use itertools::Itertools;
use regex::Regex;

use crate::error::{ParseError, PipelineTypeError, marker};
use crate::script::{FuncArg, FuncCall, PatternAction};
use crate::template;

/// A function in a pattern-action pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternActionFunc {
    /// Replace the accumulator with a message.
    Prompt(String),

    /// Keep lines (or elements) matching any of the patterns.
    Grep(Vec<String>),

    /// Regex substitution over text.
    Sed { pattern: String, replacement: String },

    /// Sort the list, or the literal arguments when given.
    Sort(Vec<String>),

    /// Drop duplicates, keeping first occurrences; or dedupe the arguments.
    Uniq(Vec<String>),

    /// First `n` elements.
    Head(usize),

    /// Last `n` elements.
    Tail(usize),

    /// Map each element through argument templates (`$0` is the element).
    Xargs(Vec<String>),

    /// Emit text and stop the pipeline.
    Print(Vec<String>),

    /// Concatenate file contents, from the arguments or the accumulator.
    Cat(Vec<String>),
}

impl PatternActionFunc {
    /// Names of every function, in declaration order.
    pub const NAMES: [&str; 10] = [
        "prompt", "grep", "sed", "sort", "uniq", "head", "tail", "xargs", "print", "cat",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PatternActionFunc::Prompt(_) => "prompt",
            PatternActionFunc::Grep(_) => "grep",
            PatternActionFunc::Sed { .. } => "sed",
            PatternActionFunc::Sort(_) => "sort",
            PatternActionFunc::Uniq(_) => "uniq",
            PatternActionFunc::Head(_) => "head",
            PatternActionFunc::Tail(_) => "tail",
            PatternActionFunc::Xargs(_) => "xargs",
            PatternActionFunc::Print(_) => "print",
            PatternActionFunc::Cat(_) => "cat",
        }
    }

    /// Give a parsed call its meaning. `key` names the entry it came from,
    /// for error messages.
    pub fn from_call(call: &FuncCall, key: &str) -> Result<Self, ParseError> {
        let args = call.text_args();
        let invalid = |message: &str| ParseError::InvalidArguments {
            name: call.name.clone(),
            message: message.to_string(),
        };
        let count = || -> Result<usize, ParseError> {
            match call.args.as_slice() {
                [arg] => arg
                    .as_number()
                    .filter(|n| *n >= 0.0 && n.fract() == 0.0)
                    .map(|n| n as usize)
                    .ok_or_else(|| invalid("expected a non-negative whole number")),
                _ => Err(invalid("expected exactly one number")),
            }
        };
        let patterns = |args: &[String]| -> Result<(), ParseError> {
            args.iter()
                .try_for_each(|p| Regex::new(p).map(drop))
                .map_err(|e| invalid(&e.to_string()))
        };

        let func = match call.name.as_str() {
            "prompt" => PatternActionFunc::Prompt(args.join(" ")),
            "grep" => {
                if args.is_empty() {
                    return Err(invalid("expected at least one pattern"));
                }
                patterns(&args)?;
                PatternActionFunc::Grep(args)
            }
            "sed" => match args.as_slice() {
                [pattern, replacement] => {
                    patterns(std::slice::from_ref(pattern))?;
                    PatternActionFunc::Sed {
                        pattern: pattern.clone(),
                        replacement: replacement.clone(),
                    }
                }
                _ => return Err(invalid("expected a pattern and a replacement")),
            },
            "sort" => PatternActionFunc::Sort(args),
            "uniq" => PatternActionFunc::Uniq(args),
            "head" => PatternActionFunc::Head(count()?),
            "tail" => PatternActionFunc::Tail(count()?),
            "xargs" => PatternActionFunc::Xargs(args),
            "print" => PatternActionFunc::Print(args),
            "cat" => PatternActionFunc::Cat(args),
            _ => {
                return Err(ParseError::UnknownFunction {
                    name: call.name.clone(),
                    key: key.to_string(),
                });
            }
        };
        Ok(func)
    }

    fn to_call(&self) -> FuncCall {
        let strings = |args: &[String]| args.iter().cloned().map(FuncArg::String).collect();
        let args = match self {
            PatternActionFunc::Prompt(message) => vec![FuncArg::String(message.clone())],
            PatternActionFunc::Sed {
                pattern,
                replacement,
            } => vec![
                FuncArg::String(pattern.clone()),
                FuncArg::String(replacement.clone()),
            ],
            PatternActionFunc::Head(n) | PatternActionFunc::Tail(n) => {
                vec![FuncArg::Number(*n as f64)]
            }
            PatternActionFunc::Grep(args)
            | PatternActionFunc::Sort(args)
            | PatternActionFunc::Uniq(args)
            | PatternActionFunc::Xargs(args)
            | PatternActionFunc::Print(args)
            | PatternActionFunc::Cat(args) => strings(args),
        };
        FuncCall {
            name: self.name().to_string(),
            args,
        }
    }
}

impl Display for PatternActionFunc {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_call())
    }
}

/// A typed pattern-action pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    /// Regex over project file paths that seeds the accumulator.
    pub pattern: Option<String>,

    pub funcs: Vec<PatternActionFunc>,
}

impl Pipeline {
    /// Convert a parsed pattern action, validating every function.
    pub fn from_action(action: &PatternAction, key: &str) -> Result<Self, ParseError> {
        if let Some(pattern) = &action.pattern {
            Regex::new(pattern).map_err(|e| ParseError::InvalidArguments {
                name: format!("/{pattern}/"),
                message: e.to_string(),
            })?;
        }

        Ok(Self {
            pattern: action.pattern.clone(),
            funcs: action
                .pipeline
                .iter()
                .map(|call| PatternActionFunc::from_call(call, key))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Evaluate the pipeline for the variable `variable`.
    ///
    /// Pattern pipelines start from the matching project file paths; bare
    /// pipelines start from an empty string.
    #[tracing::instrument(skip(self, env), fields(funcs = self.funcs.len()))]
    pub fn run(&self, variable: &str, env: &mut dyn PipelineEnv) -> Result<PipelineValue, PipelineError> {
        let initial = match &self.pattern {
            Some(pattern) => {
                let regex = Regex::new(pattern).map_err(|e| PipelineError::Regex {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                let files = env.project_files().map_err(|e| PipelineError::Collaborator {
                    message: format!("{e:#}"),
                })?;
                PipelineValue::List(files.into_iter().filter(|f| regex.is_match(f)).collect())
            }
            None => PipelineValue::Text(String::new()),
        };
        evaluate(variable, &self.funcs, initial, env)
    }
}

impl Display for Pipeline {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(pattern) = &self.pattern {
            write!(f, "/{}/ ", pattern.replace('/', "\\/"))?;
        }
        write!(f, "{{ {} }}", self.funcs.iter().join(" | "))
    }
}

/// The accumulator threaded through a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineValue {
    Text(String),
    List(Vec<String>),
}

impl PipelineValue {
    pub fn shape(&self) -> &'static str {
        match self {
            PipelineValue::Text(_) => "text",
            PipelineValue::List(_) => "list",
        }
    }

    /// Promote to a list; a single string becomes a one-element list.
    pub fn into_list(self) -> Vec<String> {
        match self {
            PipelineValue::Text(text) => vec![text],
            PipelineValue::List(items) => items,
        }
    }

    /// Render as text, one element per line for lists.
    pub fn render(&self) -> String {
        match self {
            PipelineValue::Text(text) => text.clone(),
            PipelineValue::List(items) => items.join("\n"),
        }
    }
}

/// Why a pipeline stopped early.
#[derive(Debug, Clone, PartialEq, DeriveDisplay, Error, From)]
pub enum PipelineError {
    #[display("{_0}")]
    Type(PipelineTypeError),

    #[display("invalid regex `{pattern}`: {message}")]
    #[from(ignore)]
    Regex { pattern: String, message: String },

    #[display("{message}")]
    #[from(ignore)]
    Collaborator { message: String },
}

impl PipelineError {
    /// The error as text for embedding into compiled output.
    pub fn to_marker(&self) -> String {
        marker("Pipeline", self.to_string())
    }
}

/// What a pipeline can reach while it runs.
pub trait PipelineEnv {
    /// Read a project file.
    fn read_file(&mut self, path: &str) -> Result<String>;

    /// Every project file path, `/`-separated and relative to the root.
    fn project_files(&mut self) -> Result<Vec<String>>;

    /// Resolve a variable for `xargs` templates.
    fn lookup(&mut self, name: &str) -> Option<String>;

    /// Observe the value after each step.
    fn record(&mut self, _variable: &str, _func: &PatternActionFunc, _value: &PipelineValue) {}
}

/// Run `funcs` over `initial`.
pub fn evaluate(
    variable: &str,
    funcs: &[PatternActionFunc],
    initial: PipelineValue,
    env: &mut dyn PipelineEnv,
) -> Result<PipelineValue, PipelineError> {
    let mut value = initial;
    for func in funcs {
        let (next, terminal) = step(func, value, env)?;
        env.record(variable, func, &next);
        tracing::trace!(func = func.name(), shape = next.shape(), "pipeline step");
        value = next;
        if terminal {
            break;
        }
    }
    Ok(value)
}

fn step(
    func: &PatternActionFunc,
    value: PipelineValue,
    env: &mut dyn PipelineEnv,
) -> Result<(PipelineValue, bool), PipelineError> {
    let next = match func {
        PatternActionFunc::Prompt(message) => PipelineValue::Text(message.clone()),
        PatternActionFunc::Grep(patterns) => {
            let regexes = compile_all(patterns)?;
            let keep = |line: &str| regexes.iter().any(|r| r.is_match(line));
            match value {
                PipelineValue::Text(text) => {
                    PipelineValue::Text(text.lines().filter(|l| keep(l)).join("\n"))
                }
                PipelineValue::List(items) => {
                    PipelineValue::List(items.into_iter().filter(|i| keep(i)).collect())
                }
            }
        }
        PatternActionFunc::Sed {
            pattern,
            replacement,
        } => match value {
            PipelineValue::Text(text) => {
                let regex = compile(pattern)?;
                PipelineValue::Text(regex.replace_all(&text, replacement.as_str()).into_owned())
            }
            PipelineValue::List(_) => {
                return Err(PipelineTypeError {
                    function: func.name().to_string(),
                    expected: "text",
                    actual: "list",
                }
                .into());
            }
        },
        PatternActionFunc::Sort(args) => {
            let mut items = if args.is_empty() {
                value.into_list()
            } else {
                args.clone()
            };
            items.sort();
            PipelineValue::List(items)
        }
        PatternActionFunc::Uniq(args) => {
            let items = if args.is_empty() {
                value.into_list()
            } else {
                args.clone()
            };
            PipelineValue::List(items.into_iter().unique().collect())
        }
        PatternActionFunc::Head(n) => {
            PipelineValue::List(value.into_list().into_iter().take(*n).collect())
        }
        PatternActionFunc::Tail(n) => {
            let items = value.into_list();
            let skip = items.len().saturating_sub(*n);
            PipelineValue::List(items.into_iter().skip(skip).collect())
        }
        PatternActionFunc::Xargs(templates) => {
            if templates.is_empty() {
                PipelineValue::List(value.into_list())
            } else {
                let items = value
                    .into_list()
                    .into_iter()
                    .map(|element| {
                        templates
                            .iter()
                            .map(|t| {
                                template::interpolate_with(t, |key| {
                                    if key == "0" {
                                        Some(element.clone())
                                    } else {
                                        env.lookup(key)
                                    }
                                })
                            })
                            .join(" ")
                    })
                    .collect();
                PipelineValue::List(items)
            }
        }
        PatternActionFunc::Print(texts) => {
            let text = if texts.is_empty() {
                value.render()
            } else {
                texts.join("\n")
            };
            return Ok((PipelineValue::Text(text), true));
        }
        PatternActionFunc::Cat(paths) => {
            let paths = if paths.is_empty() {
                value.into_list()
            } else {
                expand_globs(paths, env)?
            };
            let contents = paths
                .iter()
                .filter(|p| !p.is_empty())
                .map(|path| match env.read_file(path) {
                    Ok(content) => content,
                    Err(error) => {
                        tracing::warn!(?error, path, "cat could not read file");
                        marker("File", format!("File not found: {path}"))
                    }
                })
                .join("\n");
            PipelineValue::Text(contents)
        }
    };
    Ok((next, false))
}

fn compile(pattern: &str) -> Result<Regex, PipelineError> {
    Regex::new(pattern).map_err(|e| PipelineError::Regex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, PipelineError> {
    patterns.iter().map(|p| compile(p)).collect()
}

fn expand_globs(paths: &[String], env: &mut dyn PipelineEnv) -> Result<Vec<String>, PipelineError> {
    let mut expanded = Vec::new();
    for path in paths {
        if !path.contains(['*', '?', '[']) {
            expanded.push(path.clone());
            continue;
        }
        let pattern = glob::Pattern::new(path).map_err(|e| PipelineError::Regex {
            pattern: path.clone(),
            message: e.to_string(),
        })?;
        let files = env.project_files().map_err(|e| PipelineError::Collaborator {
            message: format!("{e:#}"),
        })?;
        expanded.extend(files.into_iter().filter(|f| pattern.matches(f)));
    }
    Ok(expanded)
}
