//! Integration tests for the script compiler, runner and reconciler.
//!
//! Collaborators are in-memory fakes so each test controls exactly what the
//! compiler can see:
//! - `MemoryFiles` holds the project files
//! - `RecordingShell` returns canned output and records what it ran
//! - `ScriptedModel` streams a fixed answer in chunks
//! - `FakeDatabase`, `RecordingRefactorings`, `StaticBrowser` and `MemoryVcs`
//!   back the workspace commands
//! - `CannedTesting` and `LanguageVariables` answer language variables

mod cli;
mod collaborators;
mod frontmatter;
mod pipeline;
mod reconciler;
mod runner;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use color_eyre::eyre::{Result, bail};
use futures::{StreamExt, stream};

use shire::collab::{
    AgentExecutor, BrowseTool, ChunkStream, ClassStructure, Collaborators, Column, CustomAgent,
    DatabaseGateway, DirListing, DocumentContent, FileHandle, FileStore, LanguageScoped, LlmProvider,
    LlmRequest, QueryResult, RefactoringTool, ShellRunner, Table, TestPromptContext, TestingService,
    VariableProvider, VcsProvider,
};
use shire::compiler::{Compiler, EditorContext};
use shire::session::SessionStore;
use shire::settings::Settings;
use shire::variable::PsiVariable;

/// Project files held in memory.
#[derive(Debug, Default)]
pub struct MemoryFiles {
    files: Mutex<BTreeMap<String, String>>,
    dirs: Mutex<BTreeSet<String>>,
}

impl MemoryFiles {
    pub fn with(files: &[(&str, &str)]) -> Arc<Self> {
        let store = Self::default();
        {
            let mut map = store.files.lock().expect("lock files");
            for (path, content) in files {
                map.insert(path.to_string(), content.to_string());
            }
        }
        Arc::new(store)
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.files.lock().expect("lock files").get(path).cloned()
    }

    fn is_dir(&self, path: &str) -> bool {
        let prefix = format!("{path}/");
        self.dirs.lock().expect("lock dirs").contains(path)
            || self.files.lock().expect("lock files").keys().any(|f| f.starts_with(&prefix))
    }
}

impl FileStore for MemoryFiles {
    fn lookup(&self, path: &str) -> Option<FileHandle> {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Some(FileHandle::root());
        }
        if self.files.lock().expect("lock files").contains_key(path) {
            return Some(FileHandle::file(path));
        }
        self.is_dir(path).then(|| FileHandle::dir(path))
    }

    fn read(&self, file: &FileHandle) -> Result<String> {
        match self.get(&file.path) {
            Some(content) => Ok(content),
            None => bail!("no such file: {}", file.path),
        }
    }

    fn write(&self, file: &FileHandle, text: &str) -> Result<()> {
        self.files
            .lock()
            .expect("lock files")
            .insert(file.path.clone(), text.to_string());
        Ok(())
    }

    fn create_file(&self, dir: &FileHandle, name: &str) -> Result<FileHandle> {
        let path = dir.child_path(name);
        self.files
            .lock()
            .expect("lock files")
            .entry(path.clone())
            .or_default();
        Ok(FileHandle::file(path))
    }

    fn create_dir(&self, parent: &FileHandle, name: &str) -> Result<FileHandle> {
        let path = parent.child_path(name);
        self.dirs.lock().expect("lock dirs").insert(path.clone());
        Ok(FileHandle::dir(path))
    }

    fn list(&self, dir: &FileHandle) -> Result<DirListing> {
        let prefix = if dir.path.is_empty() {
            String::new()
        } else {
            format!("{}/", dir.path)
        };

        let mut files = Vec::new();
        let mut subdirs = BTreeSet::new();
        let paths = self
            .files
            .lock()
            .expect("lock files")
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        let dirs = self.dirs.lock().expect("lock dirs").iter().cloned().collect::<Vec<_>>();
        for path in paths.iter().chain(&dirs) {
            let Some(rest) = path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((child, _)) => {
                    subdirs.insert(dir.child_path(child));
                }
                None if dirs.contains(path) => {
                    subdirs.insert(path.clone());
                }
                None if !rest.is_empty() => files.push(FileHandle::file(path.clone())),
                None => {}
            }
        }

        files.sort();
        Ok(DirListing {
            files,
            subdirs: subdirs.into_iter().map(FileHandle::dir).collect(),
        })
    }
}

/// Returns `output` for every snippet and records what ran.
#[derive(Debug, Default)]
pub struct RecordingShell {
    pub output: String,
    pub ran: Mutex<Vec<String>>,
}

impl RecordingShell {
    pub fn new(output: &str) -> Arc<Self> {
        Arc::new(Self {
            output: output.to_string(),
            ran: Mutex::default(),
        })
    }

    pub fn ran(&self) -> Vec<String> {
        self.ran.lock().expect("lock shell").clone()
    }
}

impl ShellRunner for RecordingShell {
    fn run(&self, command: &str) -> Result<String> {
        self.ran.lock().expect("lock shell").push(command.to_string());
        Ok(self.output.clone())
    }
}

/// Streams a fixed answer, split into chunks, and records each prompt.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    chunks: Vec<String>,
    pub prompts: Mutex<Vec<LlmRequest>>,
}

impl ScriptedModel {
    pub fn new(chunks: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            prompts: Mutex::default(),
        })
    }

    pub fn prompts(&self) -> Vec<LlmRequest> {
        self.prompts.lock().expect("lock prompts").clone()
    }

    fn replay(&self) -> ChunkStream {
        let chunks = self.chunks.iter().cloned().map(Ok).collect::<Vec<_>>();
        stream::iter(chunks).boxed()
    }
}

impl LlmProvider for ScriptedModel {
    fn stream(&self, request: LlmRequest) -> ChunkStream {
        self.prompts.lock().expect("lock prompts").push(request);
        self.replay()
    }
}

impl AgentExecutor for ScriptedModel {
    fn execute(&self, agent: &CustomAgent, input: &str) -> ChunkStream {
        let request = LlmRequest::builder()
            .prompt(input)
            .system_prompt(agent.name.clone())
            .build();
        self.prompts.lock().expect("lock prompts").push(request);
        self.replay()
    }
}

/// Named connections that all hold the same tables, recording each query.
#[derive(Debug, Default)]
pub struct FakeDatabase {
    connections: Vec<String>,
    tables: Vec<Table>,
    rows: QueryResult,
    pub queries: Mutex<Vec<(String, String)>>,
}

impl FakeDatabase {
    pub fn new(connections: &[&str], tables: &[(&str, &[(&str, &str)])], rows: QueryResult) -> Arc<Self> {
        let tables = tables
            .iter()
            .map(|(name, columns)| Table {
                name: name.to_string(),
                columns: columns
                    .iter()
                    .map(|(name, data_type)| Column {
                        name: name.to_string(),
                        data_type: data_type.to_string(),
                    })
                    .collect(),
            })
            .collect();
        Arc::new(Self {
            connections: connections.iter().map(|c| c.to_string()).collect(),
            tables,
            rows,
            queries: Mutex::default(),
        })
    }

    pub fn queries(&self) -> Vec<(String, String)> {
        self.queries.lock().expect("lock queries").clone()
    }
}

impl DatabaseGateway for FakeDatabase {
    fn connections(&self) -> Vec<String> {
        self.connections.clone()
    }

    fn execute_query(&self, connection: &str, sql: &str) -> Result<QueryResult> {
        self.queries
            .lock()
            .expect("lock queries")
            .push((connection.to_string(), sql.to_string()));
        if sql.to_ascii_uppercase().starts_with("DROP") {
            bail!("permission denied");
        }
        Ok(self.rows.clone())
    }

    fn list_tables(&self, _connection: &str) -> Result<Vec<Table>> {
        Ok(self.tables.clone())
    }

    fn list_columns(&self, _connection: &str, table: &str) -> Result<Vec<Column>> {
        match self.tables.iter().find(|t| t.name == table) {
            Some(found) => Ok(found.columns.clone()),
            None => bail!("no table {table}"),
        }
    }
}

/// Records refactorings for one language instead of performing them.
#[derive(Debug)]
pub struct RecordingRefactorings {
    language: &'static str,
    pub calls: Mutex<Vec<String>>,
}

impl RecordingRefactorings {
    pub fn new(language: &'static str) -> Arc<Self> {
        Arc::new(Self {
            language,
            calls: Mutex::default(),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock calls").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("lock calls").push(call);
    }
}

impl LanguageScoped for RecordingRefactorings {
    fn is_applicable(&self, language: &str) -> bool {
        language == self.language
    }
}

impl RefactoringTool for RecordingRefactorings {
    fn rename(&self, from: &str, to: &str, file: Option<&FileHandle>) -> Result<()> {
        let scope = file.map(|f| f.path.as_str()).unwrap_or("project");
        self.record(format!("rename {from} -> {to} in {scope}"));
        Ok(())
    }

    fn safe_delete(&self, file: &FileHandle) -> Result<()> {
        if file.path.ends_with("Used.java") {
            bail!("{} is still referenced", file.path);
        }
        self.record(format!("safeDelete {}", file.path));
        Ok(())
    }

    fn move_to(&self, file: &FileHandle, target_dir: &FileHandle) -> Result<()> {
        self.record(format!("move {} -> {}", file.path, target_dir.path));
        Ok(())
    }
}

/// Serves fixed pages by URL.
#[derive(Debug, Default)]
pub struct StaticBrowser {
    pages: BTreeMap<String, String>,
}

impl StaticBrowser {
    pub fn with(pages: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            pages: pages.iter().map(|(u, b)| (u.to_string(), b.to_string())).collect(),
        })
    }
}

impl BrowseTool for StaticBrowser {
    fn fetch(&self, url: &str) -> Result<DocumentContent> {
        match self.pages.get(url) {
            Some(body) => Ok(DocumentContent {
                title: None,
                body: body.clone(),
                language: None,
            }),
            None => bail!("no page at {url}"),
        }
    }
}

/// Known revisions, and commits numbered in order.
#[derive(Debug, Default)]
pub struct MemoryVcs {
    revisions: BTreeMap<String, String>,
    pub commits: Mutex<Vec<String>>,
}

impl MemoryVcs {
    pub fn with(revisions: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            revisions: revisions.iter().map(|(r, d)| (r.to_string(), d.to_string())).collect(),
            commits: Mutex::default(),
        })
    }

    pub fn commits(&self) -> Vec<String> {
        self.commits.lock().expect("lock commits").clone()
    }
}

impl VcsProvider for MemoryVcs {
    fn show_revision(&self, revision: &str) -> Result<String> {
        match self.revisions.get(revision) {
            Some(diff) => Ok(diff.clone()),
            None => bail!("unknown revision {revision}"),
        }
    }

    fn commit(&self, message: &str) -> Result<String> {
        let mut commits = self.commits.lock().expect("lock commits");
        commits.push(message.to_string());
        Ok(format!("rev{}", commits.len()))
    }
}

/// A testing service for one language with a fixed answer.
#[derive(Debug)]
pub struct CannedTesting {
    language: &'static str,
    context: Option<TestPromptContext>,
    classes: Vec<ClassStructure>,
    pub looked_up: Mutex<Vec<String>>,
}

impl CannedTesting {
    pub fn new(
        language: &'static str,
        context: Option<TestPromptContext>,
        classes: &[(&str, &str)],
    ) -> Arc<Self> {
        Arc::new(Self {
            language,
            context,
            classes: classes
                .iter()
                .map(|(name, text)| ClassStructure {
                    name: name.to_string(),
                    text: text.to_string(),
                })
                .collect(),
            looked_up: Mutex::default(),
        })
    }

    pub fn looked_up(&self) -> Vec<String> {
        self.looked_up.lock().expect("lock lookups").clone()
    }
}

impl LanguageScoped for CannedTesting {
    fn is_applicable(&self, language: &str) -> bool {
        language == self.language
    }
}

impl TestingService for CannedTesting {
    fn find_or_create_test_file(
        &self,
        _source: &FileHandle,
        _context: &EditorContext,
    ) -> Result<Option<TestPromptContext>> {
        Ok(self.context.clone())
    }

    fn lookup_relevant_class(&self, element: &str) -> Result<Vec<ClassStructure>> {
        self.looked_up
            .lock()
            .expect("lock lookups")
            .push(element.to_string());
        Ok(self.classes.clone())
    }
}

/// Answers every language variable with `<tag>:<variable>`.
#[derive(Debug)]
pub struct LanguageVariables {
    languages: &'static [&'static str],
    tag: &'static str,
}

impl LanguageVariables {
    pub fn new(languages: &'static [&'static str], tag: &'static str) -> Arc<Self> {
        Arc::new(Self { languages, tag })
    }
}

impl LanguageScoped for LanguageVariables {
    fn is_applicable(&self, language: &str) -> bool {
        self.languages.contains(&language)
    }
}

impl VariableProvider for LanguageVariables {
    fn resolve(&self, variable: PsiVariable, _context: &EditorContext) -> Result<String> {
        Ok(format!("{}:{}", self.tag, variable.name()))
    }
}

/// Collaborators over `files` with nothing else configured.
pub fn collaborators(files: Arc<MemoryFiles>) -> Collaborators {
    Collaborators::builder().files(files).build()
}

pub fn compiler(collaborators: Collaborators) -> Compiler {
    Compiler::new(collaborators, Arc::new(SessionStore::new()), Settings::default())
}

/// Compile `source` against an empty project and editor, returning the prompt.
pub fn compile_plain(source: &str) -> String {
    compiler(collaborators(MemoryFiles::with(&[])))
        .compile("test.shire", source, &EditorContext::default())
        .expect("compile")
        .shire_output
}
