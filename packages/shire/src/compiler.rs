//! Compiling a script into the prompt sent to the model.
//!
//! Compilation walks the parsed body once: text is copied, variables are
//! resolved through a [`VariableResolver`], commands run through
//! [`command::dispatch`] and their output is substituted in place. Only
//! [`ParseError`]s abort; every other failure is logged and either becomes an
//! empty string (variables) or an embedded `ShireError` marker (commands,
//! pipelines).

use std::ops::Range;
use std::path::Path;
use std::sync::{Arc, PoisonError};

use bon::Builder;
use serde::Serialize;

use crate::collab::{Collaborators, CustomAgent, FileHandle};
use crate::command::{self, CommandContext, WriteLedger};
use crate::config::{ShireConfig, TaskStep};
use crate::error::{ParseError, contains_marker};
use crate::lang;
use crate::script::{Script, Segment};
use crate::session::SessionStore;
use crate::settings::Settings;
use crate::variable::{SymbolTable, VariableResolver};

/// The editor state a script runs against.
///
/// Offsets are byte offsets into `text`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Builder)]
pub struct EditorContext {
    /// The file open in the editor.
    pub file: Option<FileHandle>,

    /// Full text of the open file.
    #[builder(into)]
    pub text: Option<String>,

    pub selection: Option<Range<usize>>,
    pub cursor: Option<usize>,

    /// Language id; derived from the file extension when unset.
    #[builder(into)]
    pub language: Option<String>,

    /// Text the user typed when starting the script.
    #[builder(into)]
    pub input: Option<String>,
}

impl EditorContext {
    pub fn language(&self) -> Option<&str> {
        self.language
            .as_deref()
            .or_else(|| self.file.as_ref().and_then(|f| lang::language_of(&f.path)))
    }

    pub fn selected_text(&self) -> Option<&str> {
        let range = self.selection.clone()?;
        self.text.as_deref()?.get(range)
    }

    /// The caret position; the start of the selection when only that is set.
    pub fn caret(&self) -> Option<usize> {
        self.cursor.or(self.selection.as_ref().map(|s| s.start))
    }

    pub fn before_cursor(&self) -> Option<&str> {
        self.text.as_deref()?.get(..self.caret()?)
    }

    pub fn after_cursor(&self) -> Option<&str> {
        self.text.as_deref()?.get(self.caret()?..)
    }
}

/// The task chosen by `case condition` routing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedTask {
    /// Key of the matching case, or `default`.
    pub route: String,
    pub steps: Vec<TaskStep>,
}

/// Everything a compile produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledResult {
    pub config: ShireConfig,
    pub symbol_table: SymbolTable,

    /// The compiled prompt.
    pub shire_output: String,

    /// Whether the script ran a command that acts on the workspace.
    pub is_local_command: bool,

    /// Agent the prompt is handed to instead of the model.
    #[serde(serialize_with = "serialize_agent")]
    pub execute_agent: Option<CustomAgent>,

    pub task: Option<SelectedTask>,

    /// Whether the `when` condition held.
    pub is_applicable: bool,
}

impl CompiledResult {
    /// Whether a command or pipeline embedded a failure marker.
    pub fn has_error(&self) -> bool {
        contains_marker(&self.shire_output)
    }
}

fn serialize_agent<S>(agent: &Option<CustomAgent>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match agent {
        Some(agent) => serializer.serialize_some(&agent.name),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone)]
pub struct Compiler {
    collaborators: Collaborators,
    session: Arc<SessionStore>,
    settings: Settings,
}

impl Compiler {
    pub fn new(collaborators: Collaborators, session: Arc<SessionStore>, settings: Settings) -> Self {
        Self {
            collaborators,
            session,
            settings,
        }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Compile script `source`, stored at `script_path`, against `editor`.
    ///
    /// Compiles of the same path are serialized; different paths may compile
    /// concurrently.
    #[tracing::instrument(skip(self, source, editor))]
    pub fn compile(
        &self,
        script_path: &str,
        source: &str,
        editor: &EditorContext,
    ) -> Result<CompiledResult, ParseError> {
        let lock = self.session.compile_lock(script_path);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let script = Script::parse(source)?;
        let fallback_name = Path::new(script_path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| script_path.to_string());
        let config = match &script.front_matter {
            Some(front_matter) => ShireConfig::from_front_matter(front_matter, &fallback_name)?,
            None => ShireConfig::named(fallback_name),
        };

        self.session.clear_snapshots(script_path);
        let mut resolver = VariableResolver::new(
            &config,
            &self.collaborators,
            editor,
            &self.settings,
            &self.session,
            script_path,
        );

        let is_applicable = config.is_applicable(&mut |name| resolver.resolve(name));
        let task = config.routes.as_ref().and_then(|routes| {
            routes
                .select(&mut |name| resolver.resolve(name))
                .map(|(route, steps)| SelectedTask {
                    route: route.to_string(),
                    steps: steps.to_vec(),
                })
        });

        let mut output = String::new();
        let mut is_local_command = false;
        let mut execute_agent = None;
        let mut writes = WriteLedger::default();

        for segment in &script.body {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Variable(var) => output.push_str(&resolver.resolve(&var.name)),
                Segment::Command(cmd) => {
                    is_local_command |= cmd.command.is_local();
                    let mut ctx = CommandContext {
                        collaborators: &self.collaborators,
                        settings: &self.settings,
                        editor,
                        writes: &mut writes,
                    };
                    let result = command::dispatch(cmd.command, &cmd.argument, cmd.text.as_deref(), &mut ctx);
                    if let Some(result) = result {
                        output.push_str(&result);
                    }
                }
                Segment::Agent(agent) => match self.collaborators.agent(&agent.name) {
                    Some(found) => execute_agent = Some(found.clone()),
                    None => {
                        output.push('@');
                        output.push_str(&agent.name);
                    }
                },
            }
        }

        let result = CompiledResult {
            symbol_table: resolver.into_table(),
            config,
            shire_output: output,
            is_local_command,
            execute_agent,
            task,
            is_applicable,
        };
        tracing::debug!(
            len = result.shire_output.len(),
            symbols = result.symbol_table.len(),
            is_local_command,
            has_error = result.has_error(),
            "compiled script"
        );
        Ok(result)
    }
}
