//! Commands and variables that reach past the file store.

use std::sync::Arc;

use pretty_assertions::assert_eq as pretty_assert_eq;
use simple_test_case::test_case;

use shire::collab::{
    Collaborators, FileHandle, LanguageRegistry, QueryResult, RefactoringTool, TestPromptContext,
    TestingService, VariableProvider,
};
use shire::compiler::{CompiledResult, Compiler, EditorContext};
use shire::session::SessionStore;
use shire::settings::Settings;

use crate::{
    CannedTesting, FakeDatabase, LanguageVariables, MemoryFiles, MemoryVcs, RecordingRefactorings,
    StaticBrowser, compile_plain, compiler,
};

fn compile(collaborators: Collaborators, source: &str, editor: &EditorContext) -> CompiledResult {
    compiler(collaborators)
        .compile("t.shire", source, editor)
        .expect("compile")
}

fn editing(path: &str) -> EditorContext {
    EditorContext::builder().file(FileHandle::file(path)).build()
}

fn shop() -> Arc<FakeDatabase> {
    let rows = QueryResult {
        columns: vec!["id".into(), "name".into()],
        rows: vec![vec!["1".into(), "ada".into()], vec!["2".into(), "grace".into()]],
    };
    FakeDatabase::new(
        &["main", "analytics"],
        &[
            ("users", &[("id", "INTEGER"), ("name", "TEXT")][..]),
            ("orders", &[("id", "INTEGER")][..]),
        ],
        rows,
    )
}

fn with_database(database: Arc<FakeDatabase>) -> Collaborators {
    Collaborators::builder()
        .files(MemoryFiles::with(&[]))
        .database(database)
        .build()
}

#[test_case("/database:table users", "Table: users\n  - id: INTEGER\n  - name: TEXT"; "one table")]
#[test_case("/database:table", "Table: users\n  - id: INTEGER\n  - name: TEXT\nTable: orders\n  - id: INTEGER"; "every table")]
#[test_case("/database:column [orders]", "Table: orders\n  - id: INTEGER"; "columns of a listed table")]
#[test_case("/database:column nope", "ShireError[Database]: Table not found: nope: no table nope"; "unknown table")]
#[test_case("/database:query DROP TABLE users", "ShireError[Database]: permission denied"; "failing query")]
#[test_case("/database:query", "ShireError[Database]: Query requires SQL"; "query without sql")]
#[test_case("/database:vacuum", "ShireError[Database]: Unknown database function: vacuum"; "unknown function")]
#[test]
fn database_commands(source: &str, expected: &str) {
    let compiled = compile(with_database(shop()), source, &EditorContext::default());
    pretty_assert_eq!(compiled.shire_output, expected);
}

#[test]
fn database_query_renders_rows() {
    let database = shop();
    let compiled = compile(
        with_database(database.clone()),
        "/database:query SELECT id, name FROM users",
        &EditorContext::default(),
    );

    pretty_assert_eq!(
        compiled.shire_output,
        "| id | name |\n| --- | --- |\n| 1 | ada |\n| 2 | grace |\n"
    );
    pretty_assert_eq!(
        database.queries(),
        vec![("main".to_string(), "SELECT id, name FROM users".to_string())]
    );
}

#[test_case(None, "main"; "first connection by default")]
#[test_case(Some("analytics"), "analytics"; "configured connection")]
#[test_case(Some("archive"), "main"; "unknown connection falls back")]
#[test]
fn database_connection_follows_settings(preferred: Option<&str>, expected: &str) {
    let database = shop();
    let settings = Settings {
        database: preferred.map(String::from),
        ..Settings::default()
    };
    Compiler::new(with_database(database.clone()), Arc::new(SessionStore::new()), settings)
        .compile("t.shire", "/database:query SELECT 1", &EditorContext::default())
        .expect("compile");

    let used = database.queries().into_iter().map(|(c, _)| c).collect::<Vec<_>>();
    pretty_assert_eq!(used, vec![expected.to_string()]);
}

#[test]
fn database_without_gateway_is_a_marker() {
    pretty_assert_eq!(
        compile_plain("/database:table"),
        "ShireError[Database]: No database found"
    );
}

fn java_project(tool: Arc<RecordingRefactorings>) -> Collaborators {
    Collaborators::builder()
        .files(MemoryFiles::with(&[
            ("src/Main.java", "class Main {}"),
            ("src/Old.java", "class Old {}"),
            ("src/Used.java", "class Used {}"),
            ("src/util/Helper.java", "class Helper {}"),
        ]))
        .refactorings(LanguageRegistry::<dyn RefactoringTool>::new().with(tool))
        .build()
}

#[test_case("/refactor:rename Foo to Bar", "rename Foo -> Bar in src/Main.java"; "rename in the open file")]
#[test_case("/refactor:safeDelete src/Old.java", "safeDelete src/Old.java"; "safe delete")]
#[test_case("/refactor:delete src/Old.java", "safeDelete src/Old.java"; "delete is safe delete")]
#[test_case("/refactor:move src/Old.java to src/util", "move src/Old.java -> src/util"; "move into a directory")]
#[test]
fn refactorings_reach_the_tool(source: &str, call: &str) {
    let tool = RecordingRefactorings::new("java");
    let compiled = compile(java_project(tool.clone()), source, &editing("src/Main.java"));

    pretty_assert_eq!(compiled.shire_output, "");
    assert!(compiled.is_local_command);
    pretty_assert_eq!(tool.calls(), vec![call.to_string()]);
}

#[test_case("src/Main.java", "/refactor:safeDelete src/Used.java", "ShireError[Refactor]: src/Used.java is still referenced"; "tool refuses")]
#[test_case("src/Main.java", "/refactor:move src/Old.java to src/Main.java", "ShireError[Refactor]: Not a directory: src/Main.java"; "move onto a file")]
#[test_case("src/Main.java", "/refactor:safeDelete src/Gone.java", "ShireError[Refactor]: File not found: src/Gone.java"; "missing file")]
#[test_case("src/Main.java", "/refactor:rename Foo", "ShireError[Refactor]: Expected `<from> to <to>`, found `Foo`"; "rename without target")]
#[test_case("src/Main.java", "/refactor:inline Foo", "ShireError[Refactor]: Unknown refactor command: inline"; "unknown operation")]
#[test_case("src/App.kt", "/refactor:rename Foo to Bar", "ShireError[Refactor]: Refactoring tool not found for kotlin"; "no tool for the language")]
#[test_case("README", "/refactor:rename Foo to Bar", "ShireError[Refactor]: Language not found"; "no language")]
#[test]
fn refactoring_failures_are_markers(file: &str, source: &str, expected: &str) {
    let tool = RecordingRefactorings::new("java");
    let compiled = compile(java_project(tool.clone()), source, &editing(file));

    pretty_assert_eq!(compiled.shire_output, expected);
    assert!(tool.calls().is_empty());
}

fn with_browser() -> Collaborators {
    Collaborators::builder()
        .files(MemoryFiles::with(&[]))
        .browser(StaticBrowser::with(&[("https://example.com/docs", "Read the docs.")]))
        .build()
}

#[test_case("/browse:https://example.com/docs", "Read the docs."; "known page")]
#[test_case("/browse:https://example.com/gone", "ShireError[Browse]: no page at https://example.com/gone"; "fetch fails")]
#[test_case("/browse", "ShireError[Browse]: Missing URL"; "missing url")]
#[test]
fn browse_fetches_pages(source: &str, expected: &str) {
    let compiled = compile(with_browser(), source, &EditorContext::default());
    pretty_assert_eq!(compiled.shire_output, expected);
}

#[test]
fn browse_without_browser_is_a_marker() {
    pretty_assert_eq!(
        compile_plain("/browse:https://example.com/docs"),
        "ShireError[Browse]: No browser available"
    );
}

fn with_vcs(vcs: Arc<MemoryVcs>) -> Collaborators {
    Collaborators::builder()
        .files(MemoryFiles::with(&[]))
        .vcs(vcs)
        .build()
}

#[test_case("/rev:abc123", "-old\n+new"; "known revision")]
#[test_case("/rev:zzz", "ShireError[Vcs]: unknown revision zzz"; "unknown revision")]
#[test_case("/rev", "ShireError[Vcs]: Missing revision"; "missing revision")]
#[test]
fn revisions_show_their_diff(source: &str, expected: &str) {
    let vcs = MemoryVcs::with(&[("abc123", "-old\n+new")]);
    let compiled = compile(with_vcs(vcs), source, &EditorContext::default());
    pretty_assert_eq!(compiled.shire_output, expected);
}

#[test]
fn commit_uses_the_inline_message() {
    let vcs = MemoryVcs::with(&[]);
    let compiled = compile(with_vcs(vcs.clone()), "/commit Fix the parser", &EditorContext::default());

    pretty_assert_eq!(compiled.shire_output, "Committed rev1");
    assert!(compiled.is_local_command);
    pretty_assert_eq!(vcs.commits(), vec!["Fix the parser".to_string()]);
}

#[test]
fn commit_failures_are_markers() {
    let vcs = MemoryVcs::with(&[]);
    let compiled = compile(with_vcs(vcs.clone()), "/commit", &EditorContext::default());
    pretty_assert_eq!(compiled.shire_output, "ShireError[Commit]: Missing commit message");
    assert!(vcs.commits().is_empty());

    pretty_assert_eq!(
        compile_plain("/commit Fix the parser"),
        "ShireError[Vcs]: No VCS provider found"
    );
}

fn with_language(
    testing: Option<Arc<CannedTesting>>,
    variables: &[Arc<LanguageVariables>],
) -> Collaborators {
    let testing = testing
        .into_iter()
        .fold(LanguageRegistry::<dyn TestingService>::new(), |registry, service| {
            registry.with(service)
        });
    let variables = variables
        .iter()
        .fold(LanguageRegistry::<dyn VariableProvider>::new(), |registry, provider| {
            registry.with(provider.clone())
        });
    Collaborators::builder()
        .files(MemoryFiles::with(&[]))
        .testing(testing)
        .variables(variables)
        .build()
}

#[test]
fn testing_service_answers_test_variables() {
    let context = TestPromptContext {
        is_new_file: true,
        test_file: Some(FileHandle::file("src/test/MainTest.java")),
        framework: vec!["JUnit 5".into(), "Mockito".into()],
        ..TestPromptContext::default()
    };
    let testing = CannedTesting::new(
        "java",
        Some(context),
        &[("Repo", "class Repo {}"), ("Service", "class Service {}")],
    );
    let compiled = compile(
        with_language(Some(testing.clone()), &[]),
        "$targetTestFileName|$isNeedCreateFile|$frameworkContext|$relatedClasses",
        &editing("src/Main.java"),
    );

    pretty_assert_eq!(
        compiled.shire_output,
        "MainTest.java|true|JUnit 5\nMockito|class Repo {}\n\nclass Service {}"
    );
    pretty_assert_eq!(testing.looked_up(), vec!["src/Main.java".to_string()]);
}

#[test]
fn test_variables_fall_back_to_the_language_provider() {
    let testing = CannedTesting::new("java", None, &[]);
    let provider = LanguageVariables::new(&["java"], "jvm");
    let compiled = compile(
        with_language(Some(testing), &[provider]),
        "$isNeedCreateFile",
        &editing("src/Main.java"),
    );
    pretty_assert_eq!(compiled.shire_output, "jvm:isNeedCreateFile");
}

#[test]
fn unanswered_test_variables_are_empty() {
    let compiled = compile(with_language(None, &[]), "[$similarTestCase]", &editing("src/Main.java"));
    pretty_assert_eq!(compiled.shire_output, "[]");
}

#[test_case("src/Main.java", "java-only:currentClassName"; "first registered provider wins")]
#[test_case("src/App.kt", "jvm:currentClassName"; "later provider serves other languages")]
#[test_case("src/main.rs", "Point"; "text fallback without a provider")]
#[test]
fn language_providers_are_chosen_per_language(file: &str, expected: &str) {
    let providers = [
        LanguageVariables::new(&["java"], "java-only"),
        LanguageVariables::new(&["java", "kotlin"], "jvm"),
    ];
    let editor = EditorContext::builder()
        .file(FileHandle::file(file))
        .text("struct Point;\n")
        .build();
    let compiled = compile(with_language(None, &providers), "$currentClassName", &editor);
    pretty_assert_eq!(compiled.shire_output, expected);
}
