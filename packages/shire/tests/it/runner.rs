//! Running scripts end to end against a scripted model.

use std::sync::Arc;

use indoc::indoc;
use pretty_assertions::assert_eq as pretty_assert_eq;
use tokio_util::sync::CancellationToken;

use shire::collab::{Collaborators, CustomAgent, FileHandle};
use shire::compiler::EditorContext;
use shire::runner::{RunOutcome, RunStatus, ShireRunner};

use crate::{MemoryFiles, ScriptedModel, compiler};

fn runner(files: Arc<MemoryFiles>, model: Arc<ScriptedModel>) -> ShireRunner {
    let collaborators = Collaborators::builder().files(files).llm(model).build();
    ShireRunner::new(compiler(collaborators))
}

async fn run(runner: &ShireRunner, path: &str, source: &str) -> RunOutcome {
    runner
        .run(path, source, &EditorContext::default(), &CancellationToken::new())
        .await
        .expect("run")
}

#[tokio::test]
async fn prompt_goes_to_the_model() {
    let model = ScriptedModel::new(&["Hel", "lo"]);
    let runner = runner(MemoryFiles::with(&[]), model.clone());
    let outcome = run(&runner, "hi.shire", "---\nmodel: small\n---\nSay hi").await;

    pretty_assert_eq!(outcome.status, RunStatus::Responded);
    pretty_assert_eq!(outcome.response, "Hello");
    pretty_assert_eq!(outcome.output, "Hello");

    let prompts = model.prompts();
    pretty_assert_eq!(prompts.len(), 1);
    pretty_assert_eq!(prompts[0].prompt, "\nSay hi");
    pretty_assert_eq!(prompts[0].model.as_deref(), Some("small"));

    let conversation = runner.session().conversation("hi.shire").expect("conversation");
    pretty_assert_eq!(conversation.compiled, "\nSay hi");
    pretty_assert_eq!(conversation.llm_response, "Hello");
    pretty_assert_eq!(conversation.ide_output, "Hello");
}

#[tokio::test]
async fn streaming_end_processors_shape_the_output() {
    let files = MemoryFiles::with(&[]);
    let model = ScriptedModel::new(&["Here:\n```rust\n", "fn x() {}\n```\nEnjoy."]);
    let runner = runner(files.clone(), model);
    let source = indoc! {r#"
        ---
        onStreamingEnd: { parseCode | saveFile("out/x.rs") }
        ---
        Write x.
    "#};
    let outcome = run(&runner, "x.shire", source).await;

    pretty_assert_eq!(outcome.status, RunStatus::Responded);
    pretty_assert_eq!(outcome.output, "fn x() {}");
    pretty_assert_eq!(files.get("out/x.rs").as_deref(), Some("fn x() {}"));
}

#[tokio::test]
async fn routed_task_runs_after_the_response() {
    let model = ScriptedModel::new(&["keep 1\ndrop\nkeep 2"]);
    let runner = runner(MemoryFiles::with(&[]), model);
    let source = indoc! {r#"
        ---
        condition:
          "never": $fileName.endsWith(".none")
        case condition {
          "never" {
            print("unreachable")
          }
          default {
            grep("keep")
          }
        }
        ---
        List.
    "#};
    let outcome = run(&runner, "routed.shire", source).await;

    pretty_assert_eq!(outcome.compiled.task.as_ref().map(|t| t.route.as_str()), Some("default"));
    pretty_assert_eq!(outcome.output, "keep 1\nkeep 2");
}

#[tokio::test]
async fn error_markers_stop_before_the_model() {
    let model = ScriptedModel::new(&["unused"]);
    let runner = runner(MemoryFiles::with(&[]), model.clone());
    let outcome = run(&runner, "broken.shire", "/file:missing.txt").await;

    pretty_assert_eq!(outcome.status, RunStatus::CompileFailed);
    assert!(model.prompts().is_empty());
    assert!(outcome.response.is_empty());

    let conversation = runner.session().conversation("broken.shire").expect("conversation");
    assert!(conversation.ide_output.contains("ShireError[File]"), "{conversation:?}");

    let fix = runner.session().try_fix_prompt("broken.shire").expect("first fix prompt");
    assert!(fix.contains("File not found: missing.txt"), "{fix}");
    pretty_assert_eq!(runner.session().try_fix_prompt("broken.shire"), None);
}

#[tokio::test]
async fn local_commands_do_not_reach_the_model() {
    let files = MemoryFiles::with(&[]);
    let model = ScriptedModel::new(&["unused"]);
    let runner = runner(files.clone(), model.clone());
    let outcome = run(&runner, "write.shire", "/write:notes.md\n```markdown\nhello\n```\n").await;

    pretty_assert_eq!(outcome.status, RunStatus::LocalCommand);
    pretty_assert_eq!(outcome.output, outcome.compiled.shire_output);
    assert!(model.prompts().is_empty());
    pretty_assert_eq!(files.get("notes.md").as_deref(), Some("hello"));
}

#[tokio::test]
async fn failing_when_skips_the_run() {
    let model = ScriptedModel::new(&["unused"]);
    let runner = runner(MemoryFiles::with(&[]), model.clone());
    let outcome = run(&runner, "gated.shire", "---\nwhen: $fileName.endsWith(\".rs\")\n---\nGo").await;

    pretty_assert_eq!(outcome.status, RunStatus::NotApplicable);
    assert!(outcome.output.is_empty());
    assert!(model.prompts().is_empty());
}

#[tokio::test]
async fn agents_receive_the_prompt() {
    let model = ScriptedModel::new(&["Reviewed."]);
    let collaborators = Collaborators::builder()
        .files(MemoryFiles::with(&[]))
        .agent_executor(model.clone())
        .agents(vec![CustomAgent {
            name: "reviewer".into(),
            description: "Reviews code".into(),
        }])
        .build();
    let runner = ShireRunner::new(compiler(collaborators));
    let outcome = run(&runner, "agent.shire", "@reviewer check this").await;

    pretty_assert_eq!(outcome.status, RunStatus::Responded);
    pretty_assert_eq!(outcome.output, "Reviewed.");
    let prompts = model.prompts();
    pretty_assert_eq!(prompts[0].system_prompt.as_deref(), Some("reviewer"));
    pretty_assert_eq!(prompts[0].prompt, " check this");
}

#[tokio::test]
async fn missing_model_is_an_error() {
    let runner = ShireRunner::new(compiler(crate::collaborators(MemoryFiles::with(&[]))));
    let result = runner
        .run("x.shire", "Hello", &EditorContext::default(), &CancellationToken::new())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn replace_current_file_reconciles_the_answer() {
    let model = ScriptedModel::new(&["```rust\nfn keep() {}\n", "fn added() {}\n```"]);
    let runner = runner(MemoryFiles::with(&[]), model);
    let editor = EditorContext::builder()
        .file(FileHandle::file("src/lib.rs"))
        .text("fn keep() {}\nfn removed_entirely() {}")
        .build();
    let source = "---\ninteraction: ReplaceCurrentFile\n---\nRewrite $fileName";

    let outcome = runner
        .run("rewrite.shire", source, &editor, &CancellationToken::new())
        .await
        .expect("run");
    pretty_assert_eq!(outcome.status, RunStatus::Responded);
    pretty_assert_eq!(outcome.edited.as_deref(), Some("fn keep() {}\nfn added() {}"));
}

#[tokio::test]
async fn cancelled_runs_report_it() {
    let model = ScriptedModel::new(&["never ", "read"]);
    let runner = runner(MemoryFiles::with(&[]), model);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = runner
        .run("slow.shire", "Take your time", &EditorContext::default(), &cancel)
        .await
        .expect("run");
    pretty_assert_eq!(outcome.status, RunStatus::Cancelled);
    assert!(outcome.response.is_empty());
}
