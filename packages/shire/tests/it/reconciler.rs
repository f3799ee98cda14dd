//! Streaming generated code into an open document.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use color_eyre::eyre::Result;
use futures::{StreamExt, stream};
use pretty_assertions::assert_eq as pretty_assert_eq;
use simple_test_case::test_case;
use tokio_util::sync::CancellationToken;

use shire::diff::{DiffLine, DiffSession, DiffStream, SessionState, StreamEnd, diff_lines};

const ORIGINAL: &str = "use a;\n\nstruct Point;\nimpl Point {}\nconst LIMIT: u32 = 7;";
const GENERATED: &str = "use a;\nuse std::fmt;\n\nstruct Point;\nconst LIMIT: u32 = 7;\nfn main() {}";

fn lines(text: &str) -> Vec<&str> {
    text.split('\n').collect()
}

/// A finished session that rewrote `ORIGINAL` into `GENERATED`.
fn reconciled() -> DiffSession {
    let mut session = DiffSession::for_text(ORIGINAL);
    for event in diff_lines(&lines(ORIGINAL), &lines(GENERATED)) {
        session.apply(&event);
    }
    session.finish();
    session
}

fn block_starts(session: &DiffSession) -> Vec<usize> {
    session.blocks().iter().map(|b| b.start_line).collect()
}

#[test]
fn matching_lines_make_no_blocks() {
    let mut session = DiffSession::for_text(ORIGINAL);
    for line in lines(ORIGINAL) {
        session.apply(&DiffLine::Same(line.to_string()));
    }
    session.finish();

    assert!(session.blocks().is_empty());
    pretty_assert_eq!(session.cursor().index, 5);
    pretty_assert_eq!(session.text(), ORIGINAL);
    pretty_assert_eq!(session.state(), SessionState::Finished);
}

#[test]
fn events_group_into_blocks() {
    let session = reconciled();
    pretty_assert_eq!(session.text(), GENERATED);

    let shapes = session
        .blocks()
        .iter()
        .map(|b| (b.start_line, b.added.len(), b.deleted.len(), b.finished))
        .collect::<Vec<_>>();
    pretty_assert_eq!(shapes, vec![(1, 1, 0, true), (4, 0, 1, true), (5, 1, 0, true)]);
    pretty_assert_eq!(session.blocks()[1].deleted, vec!["impl Point {}".to_string()]);
}

#[test]
fn reject_all_restores_the_original_bytes() {
    let mut session = reconciled();
    session.reject_all();
    pretty_assert_eq!(session.text(), ORIGINAL);
    pretty_assert_eq!(session.state(), SessionState::Closed);
    assert!(session.blocks().is_empty());
}

#[test]
fn rejecting_a_block_shifts_the_rest() {
    let mut session = reconciled();
    let first = session.blocks()[0].id;

    assert!(session.reject_block(first));
    pretty_assert_eq!(block_starts(&session), vec![3, 4]);
    pretty_assert_eq!(
        session.text(),
        "use a;\n\nstruct Point;\nconst LIMIT: u32 = 7;\nfn main() {}"
    );
}

#[test]
fn decided_blocks_survive_reject_all() {
    let mut session = reconciled();
    let first = session.blocks()[0].id;
    let last = session.blocks()[2].id;

    assert!(session.reject_block(first));
    assert!(session.accept_block(last));
    session.reject_all();

    pretty_assert_eq!(
        session.text(),
        "use a;\n\nstruct Point;\nimpl Point {}\nconst LIMIT: u32 = 7;\nfn main() {}"
    );
}

#[test]
fn closing_fires_once_no_blocks_remain() {
    let closed = Arc::new(AtomicUsize::new(0));
    let counter = closed.clone();
    let mut session = DiffSession::for_text("a\nb").with_on_close(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    session.apply(&DiffLine::Same("a".into()));
    session.apply(&DiffLine::New("inserted line".into()));
    session.apply(&DiffLine::Same("b".into()));
    session.finish();

    let id = session.blocks()[0].id;
    assert!(session.accept_block(id));
    pretty_assert_eq!(closed.load(Ordering::SeqCst), 1);
    pretty_assert_eq!(session.state(), SessionState::Closed);
    pretty_assert_eq!(session.text(), "a\ninserted line\nb");
    assert!(!session.reject_block(id));
}

#[test_case(1; "one byte at a time")]
#[test_case(7; "odd boundaries")]
#[test_case(4096; "all at once")]
#[test]
fn chunking_does_not_change_the_result(size: usize) {
    let answer = format!("Here you go:\n```rust\n{GENERATED}\n```\nDone.");
    let mut stream = DiffStream::new(DiffSession::for_text(ORIGINAL));
    let bytes = answer.as_bytes();
    for chunk in bytes.chunks(size) {
        stream.push_chunk(std::str::from_utf8(chunk).expect("ascii answer"));
    }
    stream.finish();

    let session = stream.into_session();
    pretty_assert_eq!(session.text(), GENERATED);
    pretty_assert_eq!(block_starts(&session), vec![1, 4, 5]);
}

#[tokio::test]
async fn stream_consumes_a_model_answer() {
    let chunks = ["```rust\nuse a;\n", "use std::fmt;\n\nstruct Po", "int;\nconst LIMIT: u32 = 7;\n", "fn main() {}\n```"];
    let answer = stream::iter(chunks.map(|c| Ok(c.to_string()))).boxed();
    let mut stream = DiffStream::new(DiffSession::for_text(ORIGINAL));

    let end = stream.consume(answer, &CancellationToken::new()).await;
    pretty_assert_eq!(end, StreamEnd::Finished);
    pretty_assert_eq!(stream.session().text(), GENERATED);
    pretty_assert_eq!(stream.session().state(), SessionState::Finished);
}

#[tokio::test]
async fn cancelled_stream_keeps_applied_edits() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let stall = stream::once(async move {
        trigger.cancel();
        std::future::pending::<Result<String>>().await
    });
    let answer = stream::iter([Ok(String::from("```rust\nuse a;\nuse std::fmt;\n"))])
        .chain(stall)
        .chain(stream::iter([Ok(String::from(
            "\nstruct Point;\nconst LIMIT: u32 = 7;\nfn main() {}\n```",
        ))]))
        .boxed();
    let mut stream = DiffStream::new(DiffSession::for_text(ORIGINAL));

    let end = stream.consume(answer, &cancel).await;
    pretty_assert_eq!(end, StreamEnd::Cancelled);

    let session = stream.session();
    pretty_assert_eq!(session.state(), SessionState::Closed);
    pretty_assert_eq!(
        session.text(),
        "use a;\nuse std::fmt;\n\nstruct Point;\nimpl Point {}\nconst LIMIT: u32 = 7;"
    );
    let shapes = session
        .blocks()
        .iter()
        .map(|b| (b.start_line, b.added.len(), b.deleted.len()))
        .collect::<Vec<_>>();
    pretty_assert_eq!(shapes, vec![(1, 1, 0)]);
}
