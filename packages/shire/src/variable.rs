//! Resolving `$name` references.
//!
//! Lookup order:
//! 1. user variables declared in front matter (`variables:`),
//! 2. `$commands`, the built-in command registry,
//! 3. editor variables ([`BuiltinVariable`]),
//! 4. language context variables ([`PsiVariable`]).
//!
//! A variable that can't be resolved becomes the empty string; the failure is
//! logged and the compile carries on.

use std::collections::BTreeMap;

use color_eyre::eyre::{Context, Result, eyre};
use itertools::Itertools;
use serde::Serialize;

use crate::collab::{Collaborators, VariableProvider};
use crate::command::BuiltinCommand;
use crate::compiler::EditorContext;
use crate::config::{ShireConfig, UserVariable};
use crate::pipeline::{PatternActionFunc, Pipeline, PipelineEnv, PipelineValue};
use crate::session::{SessionStore, VariableSnapshot};
use crate::settings::Settings;

pub use builtin::BuiltinVariable;
pub use psi::{DefaultProvider, PsiVariable};

pub mod builtin;
pub mod psi;

/// Variable name that renders the command registry.
pub const COMMANDS: &str = "commands";

/// Variables resolved during one compile, by name.
///
/// Each name is inserted once; later inserts for the same name are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct SymbolTable {
    values: BTreeMap<String, String>,
}

impl SymbolTable {
    /// Record a value. Returns `false` when the name was already present.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.values.contains_key(&name) {
            return false;
        }
        self.values.insert(name, value.into());
        true
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Resolves variables for one compile, caching each into a [`SymbolTable`].
pub struct VariableResolver<'a> {
    config: &'a ShireConfig,
    collaborators: &'a Collaborators,
    editor: &'a EditorContext,
    settings: &'a Settings,
    session: &'a SessionStore,
    script_path: &'a str,
    table: SymbolTable,

    /// Names currently being resolved, to break cycles between pipelines.
    resolving: Vec<String>,
}

impl<'a> VariableResolver<'a> {
    pub fn new(
        config: &'a ShireConfig,
        collaborators: &'a Collaborators,
        editor: &'a EditorContext,
        settings: &'a Settings,
        session: &'a SessionStore,
        script_path: &'a str,
    ) -> Self {
        Self {
            config,
            collaborators,
            editor,
            settings,
            session,
            script_path,
            table: SymbolTable::default(),
            resolving: Vec::new(),
        }
    }

    /// Resolve `name`, or the empty string when it can't be.
    pub fn resolve(&mut self, name: &str) -> String {
        self.try_resolve(name).unwrap_or_default()
    }

    /// Resolve `name`; `None` when no source knows it.
    #[tracing::instrument(skip(self))]
    pub fn try_resolve(&mut self, name: &str) -> Option<String> {
        if let Some(value) = self.table.get(name) {
            return Some(value.to_string());
        }
        if self.resolving.iter().any(|n| n == name) {
            tracing::warn!(name, chain = ?self.resolving, "variable refers to itself");
            return Some(String::new());
        }

        self.resolving.push(name.to_string());
        let value = self.lookup(name);
        self.resolving.pop();

        match value {
            Some(value) => {
                self.table.insert(name, value.clone());
                Some(value)
            }
            None => {
                tracing::warn!(name, "unknown variable");
                self.table.insert(name, "");
                None
            }
        }
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn into_table(self) -> SymbolTable {
        self.table
    }

    fn lookup(&mut self, name: &str) -> Option<String> {
        let config = self.config;
        if let Some(variable) = config.variable(name) {
            return Some(match variable {
                UserVariable::Literal(text) => text.clone(),
                UserVariable::Pipeline(pipeline) => self.run_pipeline(name, pipeline),
            });
        }

        if name == COMMANDS {
            return Some(BuiltinCommand::describe_all());
        }

        if let Some(builtin) = BuiltinVariable::from_name(name) {
            return Some(builtin.resolve(self.editor, self.settings.language.as_deref()));
        }

        let psi = PsiVariable::from_name(name)?;
        Some(self.resolve_psi(psi).unwrap_or_else(|error| {
            tracing::warn!(?error, name, "language variable failed to resolve");
            String::new()
        }))
    }

    fn run_pipeline(&mut self, name: &str, pipeline: &Pipeline) -> String {
        let mut env = ResolverEnv { resolver: self };
        match pipeline.run(name, &mut env) {
            Ok(value) => value.render(),
            Err(error) => {
                tracing::warn!(%error, name, "pipeline failed");
                error.to_marker()
            }
        }
    }

    fn resolve_psi(&self, variable: PsiVariable) -> Result<String> {
        let language = self
            .editor
            .language()
            .or(self.settings.language.as_deref())
            .unwrap_or_default();

        if variable.is_test_related()
            && let Some(value) = self.from_testing_service(variable, language)?
        {
            return Ok(value);
        }

        let provider: &dyn VariableProvider = match self.collaborators.variables.find(language) {
            Some(provider) => provider.as_ref(),
            None => &DefaultProvider,
        };
        provider
            .resolve(variable, self.editor)
            .with_context(|| format!("resolve `{}` for language `{language}`", variable.name()))
    }

    fn from_testing_service(&self, variable: PsiVariable, language: &str) -> Result<Option<String>> {
        let Some(service) = self.collaborators.testing.find(language) else {
            return Ok(None);
        };
        let Some(file) = &self.editor.file else {
            return Ok(None);
        };

        let context = service
            .find_or_create_test_file(file, self.editor)
            .context("find test file")?;
        if let Some(value) = context.as_ref().and_then(|c| variable.from_test_context(c))
            && !value.is_empty()
        {
            return Ok(Some(value));
        }

        if variable == PsiVariable::RelatedClasses {
            let element = self
                .editor
                .selected_text()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(&file.path);
            let classes = service
                .lookup_relevant_class(element)
                .context("look up relevant classes")?;
            return Ok(Some(classes.into_iter().map(|c| c.text).join("\n\n")));
        }
        Ok(None)
    }
}

/// Gives a pipeline access to project files and other variables.
struct ResolverEnv<'r, 'a> {
    resolver: &'r mut VariableResolver<'a>,
}

impl PipelineEnv for ResolverEnv<'_, '_> {
    fn read_file(&mut self, path: &str) -> Result<String> {
        let files = self.resolver.collaborators.files.as_ref();
        let file = files.lookup(path).ok_or_else(|| eyre!("file not found: {path}"))?;
        files.read(&file)
    }

    fn project_files(&mut self) -> Result<Vec<String>> {
        self.resolver.collaborators.files.walk()
    }

    fn lookup(&mut self, name: &str) -> Option<String> {
        self.resolver.try_resolve(name)
    }

    fn record(&mut self, variable: &str, func: &PatternActionFunc, value: &PipelineValue) {
        self.resolver.session.record_snapshot(
            self.resolver.script_path,
            VariableSnapshot {
                variable: variable.to_string(),
                function: func.to_string(),
                value: value.render(),
            },
        );
    }
}
