//! Front matter as seen through a whole script.

use indoc::indoc;
use pretty_assertions::assert_eq as pretty_assert_eq;
use simple_test_case::test_case;

use shire::collab::FileHandle;
use shire::compiler::EditorContext;
use shire::config::{ActionLocation, InteractionType, TaskStep};
use shire::pipeline::PatternActionFunc;
use shire::postprocess::PostProcessor;
use shire::script::{FrontMatter, FrontMatterValue, Script};

use crate::{MemoryFiles, collaborators, compiler};

#[test]
fn declared_fields_become_config() {
    let source = indoc! {r#"
        ---
        name: Summary
        description: "Summarize the selection"
        interaction: AppendCursor
        actionLocation: ContextMenu
        ---
        Summarize: $selection
    "#};
    let compiled = compiler(collaborators(MemoryFiles::with(&[])))
        .compile("summary.shire", source, &EditorContext::default())
        .expect("compile");

    pretty_assert_eq!(compiled.config.name, "Summary");
    pretty_assert_eq!(compiled.config.description, "Summarize the selection");
    pretty_assert_eq!(compiled.config.interaction, InteractionType::AppendCursor);
    pretty_assert_eq!(compiled.config.action_location, ActionLocation::ContextMenu);
    pretty_assert_eq!(compiled.shire_output, "\nSummarize: \n");
}

#[test]
fn stray_bracket_in_prose_stays_on_its_line() {
    let source = indoc! {r#"
        ---
        name: Summary
        description: Explain code (short
        interaction: AppendCursor
        actionLocation: ContextMenu
        ---
        Go
    "#};
    let compiled = compiler(collaborators(MemoryFiles::with(&[])))
        .compile("summary.shire", source, &EditorContext::default())
        .expect("compile");

    pretty_assert_eq!(compiled.config.description, "Explain code (short");
    pretty_assert_eq!(compiled.config.interaction, InteractionType::AppendCursor);
    pretty_assert_eq!(compiled.config.action_location, ActionLocation::ContextMenu);
}

#[test]
fn name_defaults_to_the_file_stem() {
    let compiled = compiler(collaborators(MemoryFiles::with(&[])))
        .compile("scripts/explain.shire", "body", &EditorContext::default())
        .expect("compile");
    pretty_assert_eq!(compiled.config.name, "explain");
}

#[test]
fn array_elements_keep_their_own_types() {
    let script = Script::parse("---\nlist: [\"a\", 2, true, 2024-02-29]\n---\n").expect("parse");
    let front_matter = script.front_matter.expect("front matter");
    let Some(FrontMatterValue::Array(items)) = front_matter.get("list") else {
        panic!("expected an array, got {front_matter:?}");
    };
    let kinds = items.iter().map(FrontMatterValue::kind).collect::<Vec<_>>();
    pretty_assert_eq!(kinds, vec!["STRING", "NUMBER", "BOOLEAN", "DATE"]);
}

#[test]
fn printed_front_matter_parses_back() {
    let source = indoc! {r#"
        ---
        name: Review
        enabled: false
        variables:
          tests: /.*Test\.java/ { sort | head(2) }
        onStreamingEnd: { parseCode | saveFile("out/Review.java") }
        ---
        body
    "#};
    let front_matter = Script::parse(source)
        .expect("parse")
        .front_matter
        .expect("front matter");
    let printed = front_matter.to_source();
    let reparsed = FrontMatter::parse(&printed, &printed, 0).expect("reparse");
    pretty_assert_eq!(reparsed, front_matter);
}

fn routed_script() -> &'static str {
    indoc! {r#"
        ---
        condition:
          "isTest": $fileName.endsWith("Test.java")
          "isJava": $fileName.endsWith(".java")
        case condition {
          "isTest" {
            print("test")
          }
          "isJava" {
            parseCode | saveFile("Out.java")
          }
          default {
            print("other")
          }
        }
        ---
        Go.
    "#}
}

#[test_case("src/MainTest.java", "isTest"; "first matching condition wins")]
#[test_case("src/Main.java", "isJava"; "second condition")]
#[test_case("src/main.rs", "default"; "no condition holds")]
#[test]
fn task_routes_select_first_match(file: &str, expected: &str) {
    let editor = EditorContext::builder().file(FileHandle::file(file)).build();
    let compiled = compiler(collaborators(MemoryFiles::with(&[])))
        .compile("routed.shire", routed_script(), &editor)
        .expect("compile");
    let task = compiled.task.expect("task selected");
    pretty_assert_eq!(task.route, expected);
}

#[test]
fn routed_task_steps() {
    let editor = EditorContext::builder().file(FileHandle::file("Main.java")).build();
    let compiled = compiler(collaborators(MemoryFiles::with(&[])))
        .compile("routed.shire", routed_script(), &editor)
        .expect("compile");
    pretty_assert_eq!(
        compiled.task.expect("task").steps,
        vec![
            TaskStep::Process(PostProcessor::ParseCode),
            TaskStep::Process(PostProcessor::SaveFile("Out.java".into())),
        ]
    );

    let editor = EditorContext::builder().file(FileHandle::file("lib.rs")).build();
    let compiled = compiler(collaborators(MemoryFiles::with(&[])))
        .compile("routed.shire", routed_script(), &editor)
        .expect("compile");
    pretty_assert_eq!(
        compiled.task.expect("task").steps,
        vec![TaskStep::Func(PatternActionFunc::Print(vec!["other".into()]))]
    );
}

#[test_case("lib.rs", true; "condition holds")]
#[test_case("Main.kt", false; "condition fails")]
#[test]
fn when_gates_applicability(file: &str, applicable: bool) {
    let source = "---\nwhen: $fileName.endsWith(\".rs\")\n---\nbody";
    let editor = EditorContext::builder().file(FileHandle::file(file)).build();
    let compiled = compiler(collaborators(MemoryFiles::with(&[])))
        .compile("gated.shire", source, &editor)
        .expect("compile");
    pretty_assert_eq!(compiled.is_applicable, applicable);
}
