//! Interfaces to the systems the compiler calls into.
//!
//! The core never touches the filesystem, a shell, a database or a model
//! directly; it goes through these traits. Implementations backed by the local
//! machine live in the submodules, and tests supply their own fakes.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use bon::Builder;
use color_eyre::eyre::{Result, bail};
use futures::stream::BoxStream;

use crate::compiler::EditorContext;
use crate::variable::PsiVariable;

pub mod git;
pub mod local;
pub mod process;

/// A file or directory known to a [`FileStore`].
///
/// Paths are relative to the project root and `/`-separated; the root itself
/// is the empty path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileHandle {
    pub path: String,
    pub is_dir: bool,
}

impl FileHandle {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
        }
    }

    /// The project root.
    pub fn root() -> Self {
        Self::dir("")
    }

    /// The last path component.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// The file extension, if any.
    pub fn extension(&self) -> Option<&str> {
        let name = self.name();
        name.rfind('.').filter(|&i| i > 0).map(|i| &name[i + 1..])
    }

    /// Path of a child entry of this directory.
    pub fn child_path(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", self.path)
        }
    }
}

/// Contents of a directory, each list sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirListing {
    pub files: Vec<FileHandle>,
    pub subdirs: Vec<FileHandle>,
}

pub trait FileStore: Send + Sync {
    /// Find an existing file or directory.
    fn lookup(&self, path: &str) -> Option<FileHandle>;

    fn read(&self, file: &FileHandle) -> Result<String>;

    fn write(&self, file: &FileHandle, text: &str) -> Result<()>;

    /// Create an empty file named `name` inside `dir`.
    fn create_file(&self, dir: &FileHandle, name: &str) -> Result<FileHandle>;

    /// Create a directory named `name` inside `parent`.
    fn create_dir(&self, parent: &FileHandle, name: &str) -> Result<FileHandle>;

    fn list(&self, dir: &FileHandle) -> Result<DirListing>;

    /// Every file path in the project, sorted.
    fn walk(&self) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        let mut pending = vec![FileHandle::root()];
        while let Some(dir) = pending.pop() {
            let listing = self.list(&dir)?;
            paths.extend(listing.files.into_iter().map(|f| f.path));
            pending.extend(listing.subdirs);
        }
        paths.sort();
        Ok(paths)
    }
}

/// A collaborator that only serves some source languages.
pub trait LanguageScoped {
    fn is_applicable(&self, language: &str) -> bool;
}

/// Resolves language context variables for the current editor.
pub trait VariableProvider: LanguageScoped + Send + Sync {
    fn resolve(&self, variable: PsiVariable, context: &EditorContext) -> Result<String>;
}

pub trait RefactoringTool: LanguageScoped + Send + Sync {
    /// Rename the symbol `from` to `to`, scoped to `file` when given.
    fn rename(&self, from: &str, to: &str, file: Option<&FileHandle>) -> Result<()>;

    /// Delete the element after checking nothing uses it.
    fn safe_delete(&self, file: &FileHandle) -> Result<()>;

    fn move_to(&self, file: &FileHandle, target_dir: &FileHandle) -> Result<()>;
}

/// Outline of a class, as shown to the model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassStructure {
    pub name: String,
    pub text: String,
}

/// What a testing service knows about writing a test for the current file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TestPromptContext {
    /// Whether the test file had to be created.
    pub is_new_file: bool,
    pub test_file: Option<FileHandle>,
    pub test_class_name: Option<String>,
    pub framework: Vec<String>,
    pub related_classes: Vec<ClassStructure>,
    pub similar_test_case: Option<String>,
}

pub trait TestingService: LanguageScoped + Send + Sync {
    fn find_or_create_test_file(
        &self,
        source: &FileHandle,
        context: &EditorContext,
    ) -> Result<Option<TestPromptContext>>;

    fn lookup_relevant_class(&self, element: &str) -> Result<Vec<ClassStructure>>;
}

pub trait ShellRunner: Send + Sync {
    /// Run a shell snippet, returning its combined output.
    fn run(&self, command: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

/// Rows returned by a query, with their header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub trait DatabaseGateway: Send + Sync {
    /// Names of the configured connections, in preference order.
    fn connections(&self) -> Vec<String>;

    fn execute_query(&self, connection: &str, sql: &str) -> Result<QueryResult>;

    fn list_tables(&self, connection: &str) -> Result<Vec<Table>>;

    fn list_columns(&self, connection: &str, table: &str) -> Result<Vec<Column>>;
}

/// A fetched web page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentContent {
    pub title: Option<String>,
    pub body: String,
    pub language: Option<String>,
}

pub trait BrowseTool: Send + Sync {
    fn fetch(&self, url: &str) -> Result<DocumentContent>;
}

/// Text chunks from a model or agent, in arrival order.
pub type ChunkStream = BoxStream<'static, Result<String>>;

/// A prompt for a language model.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct LlmRequest {
    #[builder(into)]
    pub prompt: String,

    #[builder(into)]
    pub system_prompt: Option<String>,

    #[builder(into)]
    pub model: Option<String>,

    /// Continue the previous conversation instead of starting fresh.
    #[builder(default)]
    pub keep_history: bool,
}

/// A language model endpoint. Each stream is finite and can't be restarted.
pub trait LlmProvider: Send + Sync {
    fn stream(&self, request: LlmRequest) -> ChunkStream;
}

pub trait VcsProvider: Send + Sync {
    /// The diff introduced by a revision.
    fn show_revision(&self, revision: &str) -> Result<String>;

    /// Commit staged changes, returning the new revision.
    fn commit(&self, message: &str) -> Result<String>;
}

/// An agent that a script can hand its prompt to with `@name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomAgent {
    pub name: String,
    pub description: String,
}

pub trait AgentExecutor: Send + Sync {
    fn execute(&self, agent: &CustomAgent, input: &str) -> ChunkStream;
}

/// Collaborators keyed by language, tried in registration order.
pub struct LanguageRegistry<T: ?Sized> {
    entries: Vec<Arc<T>>,
}

impl<T: ?Sized + LanguageScoped> LanguageRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with(mut self, entry: Arc<T>) -> Self {
        self.entries.push(entry);
        self
    }

    /// The first entry that serves `language`.
    pub fn find(&self, language: &str) -> Option<&Arc<T>> {
        self.entries.iter().find(|e| e.is_applicable(language))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: ?Sized + LanguageScoped> Default for LanguageRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for LanguageRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T: ?Sized> Debug for LanguageRegistry<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageRegistry")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Everything the compiler and runner may call into.
#[derive(Clone, Builder)]
pub struct Collaborators {
    pub files: Arc<dyn FileStore>,

    #[builder(default)]
    pub variables: LanguageRegistry<dyn VariableProvider>,

    #[builder(default)]
    pub refactorings: LanguageRegistry<dyn RefactoringTool>,

    #[builder(default)]
    pub testing: LanguageRegistry<dyn TestingService>,

    pub shell: Option<Arc<dyn ShellRunner>>,
    pub database: Option<Arc<dyn DatabaseGateway>>,
    pub browser: Option<Arc<dyn BrowseTool>>,
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub vcs: Option<Arc<dyn VcsProvider>>,
    pub agent_executor: Option<Arc<dyn AgentExecutor>>,

    #[builder(default)]
    pub agents: Vec<CustomAgent>,
}

impl Collaborators {
    pub fn agent(&self, name: &str) -> Option<&CustomAgent> {
        self.agents.iter().find(|a| a.name == name)
    }
}

impl Debug for Collaborators {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("variables", &self.variables)
            .field("refactorings", &self.refactorings)
            .field("testing", &self.testing)
            .field("shell", &self.shell.is_some())
            .field("database", &self.database.is_some())
            .field("browser", &self.browser.is_some())
            .field("llm", &self.llm.is_some())
            .field("vcs", &self.vcs.is_some())
            .field("agents", &self.agents)
            .finish_non_exhaustive()
    }
}

/// Split a relative path into its parent directory path and file name.
pub fn split_path(path: &str) -> Result<(&str, &str)> {
    let path = path.trim_matches('/');
    if path.is_empty() {
        bail!("empty path");
    }
    Ok(match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    })
}

/// Look up `dir`, creating it and any missing parents.
pub fn ensure_dir(files: &dyn FileStore, dir: &str) -> Result<FileHandle> {
    let mut current = FileHandle::root();
    for component in dir.split('/').filter(|c| !c.is_empty()) {
        let path = current.child_path(component);
        current = match files.lookup(&path) {
            Some(existing) if existing.is_dir => existing,
            Some(_) => bail!("`{path}` is a file, not a directory"),
            None => files.create_dir(&current, component)?,
        };
    }
    Ok(current)
}
