//! Post-processors applied to a model response after streaming ends.
//!
//! They come from `onStreamingEnd: { parseCode | saveFile("out.rs") }` and
//! from the task selected by `case condition`. Each one sees the output of the
//! previous one.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use color_eyre::eyre::{Context, Result, eyre};

use crate::collab::{Collaborators, ensure_dir, split_path};
use crate::compiler::EditorContext;
use crate::diff::CodeFence;
use crate::error::ParseError;
use crate::script::{FuncArg, FuncCall};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessor {
    /// Keep the first fenced code block.
    ParseCode,

    /// Keep the first `/** ... */` doc comment.
    ParseComment,

    /// Write the text to a project file.
    SaveFile(String),

    /// Replace the current editor file with the text.
    UpdateEditorText,

    /// Replace the text with the elapsed milliseconds.
    TimeMetric,
}

impl PostProcessor {
    pub const NAMES: [&str; 5] = [
        "parseCode",
        "parseComment",
        "saveFile",
        "updateEditorText",
        "timeMetric",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PostProcessor::ParseCode => "parseCode",
            PostProcessor::ParseComment => "parseComment",
            PostProcessor::SaveFile(_) => "saveFile",
            PostProcessor::UpdateEditorText => "updateEditorText",
            PostProcessor::TimeMetric => "timeMetric",
        }
    }

    pub fn from_call(call: &FuncCall, key: &str) -> Result<Self, ParseError> {
        let processor = match call.name.as_str() {
            "parseCode" => PostProcessor::ParseCode,
            "parseComment" => PostProcessor::ParseComment,
            "saveFile" => match call.text_args().as_slice() {
                [path] if !path.trim().is_empty() => PostProcessor::SaveFile(path.trim().to_string()),
                _ => {
                    return Err(ParseError::InvalidArguments {
                        name: call.name.clone(),
                        message: String::from("expected a file path"),
                    });
                }
            },
            "updateEditorText" => PostProcessor::UpdateEditorText,
            "timeMetric" => PostProcessor::TimeMetric,
            _ => {
                return Err(ParseError::UnknownFunction {
                    name: call.name.clone(),
                    key: key.to_string(),
                });
            }
        };
        Ok(processor)
    }

    /// Apply to `text`, returning the new text.
    #[tracing::instrument(skip(text, ctx), fields(len = text.len()))]
    pub fn apply(&self, text: &str, ctx: &PostProcessContext<'_>) -> Result<String> {
        match self {
            PostProcessor::ParseCode => Ok(CodeFence::parse(text).text()),
            PostProcessor::ParseComment => Ok(parse_comment(text).unwrap_or(text).to_string()),
            PostProcessor::SaveFile(path) => {
                save(ctx.collaborators, path, text)?;
                Ok(text.to_string())
            }
            PostProcessor::UpdateEditorText => {
                let file = ctx
                    .editor
                    .file
                    .as_ref()
                    .ok_or_else(|| eyre!("no file is open in the editor"))?;
                ctx.collaborators
                    .files
                    .write(file, text)
                    .with_context(|| format!("update editor file: {}", file.path))?;
                Ok(text.to_string())
            }
            PostProcessor::TimeMetric => Ok(ctx.elapsed.as_millis().to_string()),
        }
    }
}

impl Display for PostProcessor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PostProcessor::SaveFile(path) => write!(
                f,
                "{}",
                FuncCall {
                    name: self.name().to_string(),
                    args: vec![FuncArg::String(path.clone())],
                }
            ),
            _ => f.write_str(self.name()),
        }
    }
}

/// What post-processors can reach.
pub struct PostProcessContext<'a> {
    pub collaborators: &'a Collaborators,
    pub editor: &'a EditorContext,

    /// Time since the run started.
    pub elapsed: Duration,
}

/// Run processors in order. A failing processor is logged and skipped; the
/// text it received passes on unchanged.
pub fn run_all(processors: &[PostProcessor], text: String, ctx: &PostProcessContext<'_>) -> String {
    processors.iter().fold(text, |text, processor| match processor.apply(&text, ctx) {
        Ok(next) => next,
        Err(error) => {
            tracing::warn!(?error, processor = processor.name(), "post-processor failed");
            text
        }
    })
}

fn save(collaborators: &Collaborators, path: &str, text: &str) -> Result<()> {
    let files = collaborators.files.as_ref();
    let file = match files.lookup(path) {
        Some(file) => file,
        None => {
            let (parent, name) = split_path(path)?;
            let dir = ensure_dir(files, parent)?;
            files.create_file(&dir, name)?
        }
    };
    files
        .write(&file, text)
        .with_context(|| format!("save file: {path}"))
}

fn parse_comment(text: &str) -> Option<&str> {
    let start = text.find("/**")?;
    let end = text[start..].find("*/")? + start + 2;
    Some(&text[start..end])
}
