//! CLI subcommand smoke tests.

use std::process::Output;

use pretty_assertions::assert_eq as pretty_assert_eq;
use tempfile::TempDir;
use xshell::{Shell, cmd};

const BIN: &str = env!("CARGO_BIN_EXE_shire");

/// A shell inside a fresh project directory.
fn project() -> (Shell, TempDir) {
    let dir = TempDir::new().expect("create project dir");
    let sh = Shell::new().expect("create shell");
    sh.change_dir(dir.path());
    (sh, dir)
}

fn run(sh: &Shell, args: &[&str]) -> (i32, String, String) {
    let bin = BIN;
    let Output {
        status,
        stdout,
        stderr,
    } = cmd!(sh, "{bin} {args...}")
        .env("SHIRE_LOG", "off")
        .ignore_status()
        .output()
        .expect("run shire");
    (
        status.code().unwrap_or(-1),
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    )
}

#[test]
fn compile_prints_the_prompt() {
    let (sh, _dir) = project();
    sh.write_file("src/Main.java", "class Main {}\n").expect("write file");
    sh.write_file("explain.shire", "Explain $fileName.").expect("write script");

    let (code, stdout, stderr) = run(&sh, &["compile", "explain.shire", "--file", "src/Main.java"]);
    pretty_assert_eq!(code, 0, "stderr: {stderr}");
    pretty_assert_eq!(stdout, "Explain Main.java.");
}

#[test]
fn compile_fails_on_error_markers() {
    let (sh, _dir) = project();
    sh.write_file("broken.shire", "/file:missing.txt").expect("write script");

    let (code, stdout, _) = run(&sh, &["compile", "broken.shire"]);
    pretty_assert_eq!(code, 1);
    assert!(stdout.starts_with("ShireError[File]"), "{stdout}");
}

#[test]
fn validate_prints_the_config() {
    let (sh, _dir) = project();
    sh.write_file(
        "summary.shire",
        "---\nname: Summary\ninteraction: AppendCursor\n---\nSummarize.",
    )
    .expect("write script");

    let (code, stdout, stderr) = run(&sh, &["validate", "summary.shire"]);
    pretty_assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("name: Summary"), "{stdout}");
    assert!(stdout.contains("interaction: AppendCursor"), "{stdout}");
}

#[test]
fn validate_reports_parse_errors() {
    let (sh, _dir) = project();
    sh.write_file("open.shire", "---\nname: Open\n").expect("write script");

    let (code, _, stderr) = run(&sh, &["validate", "open.shire"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("open.shire"), "{stderr}");
}

#[test]
fn list_finds_scripts() {
    let (sh, _dir) = project();
    sh.write_file(".shire/summary.shire", "---\nname: Summary\ndescription: Sum it up\n---\nGo.")
        .expect("write script");
    sh.write_file(".shire/notes.txt", "not a script").expect("write file");

    let (code, stdout, stderr) = run(&sh, &["list"]);
    pretty_assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("Summary"), "{stdout}");
    assert!(stdout.contains("summary.shire"), "{stdout}");
    assert!(stdout.contains("Sum it up"), "{stdout}");
    assert!(!stdout.contains("notes.txt"), "{stdout}");
}

#[test]
fn diff_prints_blocks_and_the_result() {
    let (sh, _dir) = project();
    sh.write_file("original.txt", "a\nb").expect("write original");
    sh.write_file("generated.txt", "a\nc\n").expect("write generated");

    let (code, stdout, stderr) = run(&sh, &["diff", "original.txt", "generated.txt", "--result"]);
    pretty_assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("@@ block 0 at line 2 (+1 -1)"), "{stdout}");
    assert!(stdout.contains("- b"), "{stdout}");
    assert!(stdout.contains("+ c"), "{stdout}");
    assert!(stdout.ends_with("\na\nc\n"), "{stdout}");
}

#[test]
fn diff_reject_keeps_the_original() {
    let (sh, _dir) = project();
    sh.write_file("original.txt", "a\nb").expect("write original");
    sh.write_file("generated.txt", "```text\na\nc\n```\n").expect("write generated");

    let (code, stdout, _) = run(&sh, &["diff", "original.txt", "generated.txt", "--reject", "--result"]);
    pretty_assert_eq!(code, 0);
    assert!(stdout.ends_with("\na\nb\n"), "{stdout}");
}
