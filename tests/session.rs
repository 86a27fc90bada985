//! End-to-end session tests over fabricated chunked byte streams.

use std::{io, time::Duration};

use bytes::Bytes;
use futures::stream;
use sheetstream::{Phase, SessionError, UploadConfig, UploadSession};
use tokio::sync::watch;

type Chunk = Result<Bytes, io::Error>;

fn ok_chunk(text: &str) -> Chunk { Ok(Bytes::copy_from_slice(text.as_bytes())) }

const START: &str = "data: {\"total\":3}\n\n";
const ROW_0: &str = "data: {\"index\":0,\"nombre\":\"fila 0\",\"success\":true}\n\nda";
const ROW_1: &str =
    "ta: {\"index\":1,\"nombre\":\"fila 1\",\"success\":false,\"error\":\"bad row\"}\n\n";
const ROW_2: &str = "data: {\"index\":2,\"nombre\":\"fila 2\",\"success\":true}\n\n";

async fn wait_for(
    receiver: &mut watch::Receiver<sheetstream::RunState>,
    predicate: impl Fn(&sheetstream::RunState) -> bool,
) {
    loop {
        if predicate(&receiver.borrow_and_update()) {
            return;
        }
        receiver.changed().await.expect("snapshot channel open");
    }
}

/// Chunks split mid-marker and mid-frame still fold into the right state,
/// and progress reflects the partial batch while the stream stays open.
#[tokio::test]
async fn partial_batch_reports_streaming_progress() {
    let (session, mut receiver) = UploadSession::new(&UploadConfig::default());
    let cancel = session.cancellation_token();

    let chunks = vec![ok_chunk(START), ok_chunk(ROW_0), ok_chunk(ROW_1)];
    let body = async_stream::stream! {
        for chunk in chunks {
            yield chunk;
        }
        futures::future::pending::<()>().await;
    };
    let task = tokio::spawn(session.run(body));

    wait_for(&mut receiver, |state| state.processed().len() == 2).await;
    let snapshot = receiver.borrow().clone();
    assert_eq!(snapshot.phase(), Phase::Streaming);
    assert_eq!(snapshot.total(), Some(3));
    assert_eq!(snapshot.error_count(), 1);
    assert!((snapshot.progress_percent() - 200.0 / 3.0).abs() < 0.1);

    cancel.cancel();
    let err = task.await.expect("task joined").expect_err("cancelled session fails");
    assert!(matches!(err, SessionError::Cancelled));
    assert_eq!(receiver.borrow().phase(), Phase::Failed);
}

/// The final record completes the batch exactly once; frames arriving after
/// completion are never folded.
#[tokio::test]
async fn completion_fires_on_count_equality() {
    let (session, receiver) = UploadSession::new(&UploadConfig::default());

    let extra = "data: {\"index\":9,\"nombre\":\"extra\",\"success\":true}\n\n";
    let body = stream::iter(vec![
        ok_chunk(START),
        ok_chunk(ROW_0),
        ok_chunk(ROW_1),
        ok_chunk(ROW_2),
        ok_chunk(extra),
    ]);
    let report = session.run(body).await.expect("batch completes");

    assert_eq!(report.processed_count(), 3);
    assert_eq!(report.error_count(), 1);
    assert_eq!(report.total(), Some(3));
    assert_eq!(report.state().phase(), Phase::Completed);
    assert!((report.state().progress_percent() - 100.0).abs() < f64::EPSILON);
    assert_eq!(receiver.borrow().phase(), Phase::Completed);
    assert_eq!(receiver.borrow().processed().len(), 3);
}

/// Stream closing right after the start event must not look like success.
#[tokio::test]
async fn abrupt_close_after_start_fails_without_false_completion() {
    let (session, receiver) = UploadSession::new(&UploadConfig::default());

    let body = stream::iter(vec![ok_chunk(START)]);
    let err = session.run(body).await.expect_err("incomplete batch fails");

    assert!(matches!(
        err,
        SessionError::StreamEnded {
            processed: 0,
            total: Some(3),
        }
    ));
    let snapshot = receiver.borrow().clone();
    assert_eq!(snapshot.phase(), Phase::Failed);
    assert!(snapshot.progress_percent().abs() < f64::EPSILON);
}

#[tokio::test]
async fn close_without_start_fails_with_unknown_total() {
    let (session, _receiver) = UploadSession::new(&UploadConfig::default());

    let row = "data: {\"index\":0,\"nombre\":\"fila 0\",\"success\":true}\n\n";
    let body = stream::iter(vec![ok_chunk(row)]);
    let err = session.run(body).await.expect_err("total never announced");

    assert!(matches!(
        err,
        SessionError::StreamEnded {
            processed: 1,
            total: None,
        }
    ));
}

#[tokio::test]
async fn transport_error_fails_the_session() {
    let (session, receiver) = UploadSession::new(&UploadConfig::default());

    let body = stream::iter(vec![
        ok_chunk(START),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
    ]);
    let err = session.run(body).await.expect_err("read failure is fatal");

    assert!(matches!(err, SessionError::Transport(_)));
    assert_eq!(receiver.borrow().phase(), Phase::Failed);
}

/// A partial frame buffered at cancellation time is never processed.
#[tokio::test]
async fn cancellation_discards_buffered_partial_frame() {
    let (session, mut receiver) = UploadSession::new(&UploadConfig::default());
    let cancel = session.cancellation_token();

    let body = async_stream::stream! {
        yield ok_chunk(START);
        // A record frame with no terminating delimiter.
        yield ok_chunk("data: {\"index\":0,\"nombre\":\"fila 0\",\"success\":true}");
        futures::future::pending::<()>().await;
    };
    let task = tokio::spawn(session.run(body));

    wait_for(&mut receiver, |state| state.total() == Some(3)).await;
    cancel.cancel();

    let err = task.await.expect("task joined").expect_err("cancelled");
    assert!(matches!(err, SessionError::Cancelled));
    assert_eq!(receiver.borrow().processed().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn idle_deadline_fails_a_silent_stream() {
    let config = UploadConfig::default().with_idle_timeout(Duration::from_secs(5));
    let (session, receiver) = UploadSession::new(&config);

    let body = stream::pending::<Chunk>();
    let err = session.run(body).await.expect_err("idle stream times out");

    assert!(matches!(err, SessionError::IdleTimeout(_)));
    assert_eq!(receiver.borrow().phase(), Phase::Failed);
}

#[tokio::test]
async fn oversized_frame_fails_the_session() {
    let config = UploadConfig::default()
        .with_max_frame_len(std::num::NonZeroUsize::new(64).expect("non-zero"));
    let (session, receiver) = UploadSession::new(&config);

    let body = stream::iter(vec![Ok::<_, io::Error>(Bytes::from(vec![b'x'; 256]))]);
    let err = session.run(body).await.expect_err("cap exceeded");

    assert!(matches!(err, SessionError::Reassembly(_)));
    assert_eq!(receiver.borrow().phase(), Phase::Failed);
}

/// An empty batch (total 0) completes immediately at the start event.
#[tokio::test]
async fn empty_batch_completes_at_start() {
    let (session, _receiver) = UploadSession::new(&UploadConfig::default());

    let body = stream::iter(vec![ok_chunk("data: {\"total\":0}\n\n")]);
    let report = session.run(body).await.expect("empty batch completes");

    assert_eq!(report.processed_count(), 0);
    assert_eq!(report.state().phase(), Phase::Completed);
    assert!(report.state().progress_percent().abs() < f64::EPSILON);
}
