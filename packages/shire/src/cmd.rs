//! CLI subcommands and the project setup they share.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use color_eyre::{
    Section, SectionExt,
    eyre::{Context, Report, Result},
};

use shire::collab::git::GitCli;
use shire::collab::local::LocalFileStore;
use shire::collab::process::ProcessShellRunner;
use shire::collab::{Collaborators, FileHandle, FileStore, LlmProvider};
use shire::compiler::{CompiledResult, Compiler, EditorContext};
use shire::error::ParseError;
use shire::session::SessionStore;
use shire::settings::{self, Settings};
use shire::snippet;

pub mod compile;
pub mod diff;
pub mod list;
pub mod run;
pub mod validate;

/// Editor state given on the command line.
#[derive(Args, Clone, Debug, Default)]
pub struct EditorArgs {
    /// File treated as open in the editor, relative to the project root.
    #[arg(long)]
    pub file: Option<String>,

    /// Text treated as selected. Located in `--file` when it occurs there.
    #[arg(long)]
    pub selection: Option<String>,

    /// Text typed by the user when starting the script.
    #[arg(long)]
    pub input: Option<String>,
}

/// The project in the current directory.
#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    pub settings: Settings,
    pub files: Arc<LocalFileStore>,
}

impl Project {
    pub fn discover() -> Result<Self> {
        let root = env::current_dir().context("read current directory")?;
        let settings = settings::load(&root).context("load settings")?;
        tracing::debug!(?root, ?settings, "discovered project");
        Ok(Self {
            files: Arc::new(LocalFileStore::new(&root)),
            root,
            settings,
        })
    }

    pub fn compiler(&self, llm: Option<Arc<dyn LlmProvider>>) -> Compiler {
        let collaborators = Collaborators::builder()
            .files(self.files.clone())
            .shell(Arc::new(ProcessShellRunner::new(self.settings.shell.clone())))
            .vcs(Arc::new(GitCli::new(&self.root)))
            .maybe_llm(llm)
            .build();
        Compiler::new(collaborators, Arc::new(SessionStore::new()), self.settings.clone())
    }

    pub fn editor(&self, args: &EditorArgs) -> Result<EditorContext> {
        let file = args.file.as_deref().map(FileHandle::file);
        let text = match &file {
            Some(file) => Some(
                self.files
                    .read(file)
                    .with_context(|| format!("read current file: {}", file.path))?,
            ),
            None => args.selection.clone(),
        };

        let selection = args.selection.as_deref().and_then(|selected| {
            let start = text.as_deref()?.find(selected)?;
            Some(start..start + selected.len())
        });
        if args.selection.is_some() && selection.is_none() {
            tracing::warn!("selection does not occur in the current file");
        }

        Ok(EditorContext::builder()
            .maybe_file(file)
            .maybe_text(text)
            .maybe_selection(selection)
            .maybe_input(args.input.clone())
            .build())
    }
}

/// Read a script, returning the path it is keyed by and its source.
pub fn read_script(path: &Path) -> Result<(String, String)> {
    let source = fs::read_to_string(path).with_context(|| format!("read script: {path:?}"))?;
    Ok((path.display().to_string(), source))
}

/// Compile, rendering parse errors against the source.
pub fn compile(compiler: &Compiler, origin: &str, source: &str, editor: &EditorContext) -> Result<CompiledResult> {
    compiler
        .compile(origin, source, editor)
        .map_err(|error| parse_failure(origin, source, error))
}

pub fn parse_failure(origin: &str, source: &str, error: ParseError) -> Report {
    let rendered = snippet::render_parse_error(source, origin, &error);
    Report::new(error)
        .wrap_err(format!("parse script: {origin}"))
        .section(rendered.header("Diagnostic:"))
}
