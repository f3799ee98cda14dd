//! Pattern-action variables.

use color_eyre::eyre::{Result, bail};
use indoc::indoc;
use pretty_assertions::assert_eq as pretty_assert_eq;
use simple_test_case::test_case;

use shire::compiler::EditorContext;
use shire::pipeline::{PatternActionFunc, PipelineEnv, PipelineValue, evaluate};

use crate::{MemoryFiles, collaborators, compiler};

/// A pipeline environment with nothing in it.
struct Empty;

impl PipelineEnv for Empty {
    fn read_file(&mut self, path: &str) -> Result<String> {
        bail!("no files: {path}")
    }

    fn project_files(&mut self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn lookup(&mut self, _name: &str) -> Option<String> {
        None
    }
}

fn list(items: &[&str]) -> PipelineValue {
    PipelineValue::List(items.iter().map(|s| s.to_string()).collect())
}

#[test_case(0; "none")]
#[test_case(2; "some")]
#[test_case(5; "all")]
#[test_case(9; "more than there are")]
#[test]
fn head_and_tail_slice_the_list(n: usize) {
    let items = ["a", "b", "c", "d", "e"];
    let head = evaluate("v", &[PatternActionFunc::Head(n)], list(&items), &mut Empty).expect("head");
    let tail = evaluate("v", &[PatternActionFunc::Tail(n)], list(&items), &mut Empty).expect("tail");

    let take = n.min(items.len());
    pretty_assert_eq!(head, list(&items[..take]));
    pretty_assert_eq!(tail, list(&items[items.len() - take..]));
}

#[test_case(3, 2; "tail within head")]
#[test_case(2, 5; "tail longer than head")]
#[test_case(8, 1; "head past the end")]
#[test_case(0, 3; "empty head")]
#[test]
fn head_then_tail_is_a_window(n: usize, m: usize) {
    let items = ["a", "b", "c", "d", "e"];
    let funcs = [PatternActionFunc::Head(n), PatternActionFunc::Tail(m)];
    let value = evaluate("v", &funcs, list(&items), &mut Empty).expect("evaluate");

    let end = n.min(items.len());
    pretty_assert_eq!(value, list(&items[end.saturating_sub(m)..end]));
}

#[test]
fn print_stops_the_pipeline() {
    let funcs = [
        PatternActionFunc::Print(vec!["done".into()]),
        PatternActionFunc::Head(0),
    ];
    let value = evaluate("v", &funcs, list(&["x"]), &mut Empty).expect("evaluate");
    pretty_assert_eq!(value, PipelineValue::Text("done".into()));
}

fn project() -> std::sync::Arc<MemoryFiles> {
    MemoryFiles::with(&[
        ("src/main.rs", "fn main() {}\n"),
        ("src/lib.rs", "pub mod cmd;\n"),
        ("src/cmd/run.rs", "pub fn run() {}\n"),
        ("README.md", "# Demo\n"),
    ])
}

#[test]
fn pattern_selects_project_files() {
    let source = indoc! {r#"
        ---
        variables:
          "files": /.*\.rs/ { sort | head(2) }
        ---
        $files
    "#};
    let compiled = compiler(collaborators(project()))
        .compile("files.shire", source, &EditorContext::default())
        .expect("compile");
    pretty_assert_eq!(compiled.shire_output, "\nsrc/cmd/run.rs\nsrc/lib.rs\n");
    pretty_assert_eq!(compiled.symbol_table.get("files"), Some("src/cmd/run.rs\nsrc/lib.rs"));
}

#[test]
fn cat_reads_what_the_pattern_found() {
    let source = indoc! {r#"
        ---
        variables:
          "readme": /README\.md/ { cat }
        ---
        $readme
    "#};
    let compiled = compiler(collaborators(project()))
        .compile("cat.shire", source, &EditorContext::default())
        .expect("compile");
    pretty_assert_eq!(compiled.shire_output, "\n# Demo\n\n");
}

#[test]
fn every_step_is_recorded() {
    let source = indoc! {r#"
        ---
        variables:
          "files": /^src/ { grep("cmd") | sort }
        ---
        $files
    "#};
    let compiler = compiler(collaborators(project()));
    compiler
        .compile("steps.shire", source, &EditorContext::default())
        .expect("compile");

    let snapshots = compiler.session().snapshots("steps.shire");
    let steps = snapshots
        .iter()
        .map(|s| (s.variable.as_str(), s.value.as_str()))
        .collect::<Vec<_>>();
    pretty_assert_eq!(steps, vec![("files", "src/cmd/run.rs"), ("files", "src/cmd/run.rs")]);
    assert!(snapshots[0].function.starts_with("grep"), "{snapshots:?}");
}

#[test]
fn shape_mismatch_becomes_a_marker() {
    let source = indoc! {r#"
        ---
        variables:
          "broken": /.*\.rs/ { sed("a", "b") }
        ---
        before $broken after
    "#};
    let compiled = compiler(collaborators(project()))
        .compile("broken.shire", source, &EditorContext::default())
        .expect("compile");
    assert!(
        compiled.shire_output.contains("ShireError[Pipeline]: "),
        "{}",
        compiled.shire_output
    );
    assert!(compiled.shire_output.ends_with(" after\n"));
    assert!(compiled.has_error());
}

#[test]
fn literal_variables_are_used_as_is() {
    let source = "---\nvariables:\n  greeting: \"hello\"\n---\n$greeting, world";
    let compiled = compiler(collaborators(MemoryFiles::with(&[])))
        .compile("literal.shire", source, &EditorContext::default())
        .expect("compile");
    pretty_assert_eq!(compiled.shire_output, "\nhello, world");
}
