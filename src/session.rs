//! Upload session driver and controller.
//!
//! [`UploadSession::run`] is the single sequential consumer of one response
//! stream: it reads chunks, drains complete frames, folds events, and
//! publishes snapshots, in that strict order. [`UploadController`] wraps a
//! session with the HTTP client and a hard guard that refuses to start a
//! second upload while one is live.

use std::{
    pin::{Pin, pin},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    aggregator::{Applied, EventAggregator},
    client::{UploadClient, UploadPayload},
    config::UploadConfig,
    error::SessionError,
    frame::FrameReassembler,
    metrics,
    state::{Phase, RunState},
};

/// Final accounting for a completed upload session.
#[derive(Clone, Debug)]
pub struct RunReport {
    state: RunState,
}

impl RunReport {
    /// Borrow the final state snapshot.
    #[must_use]
    pub fn state(&self) -> &RunState { &self.state }

    /// Consume the report, returning the final state.
    #[must_use]
    pub fn into_state(self) -> RunState { self.state }

    /// Number of records processed.
    #[must_use]
    pub fn processed_count(&self) -> usize { self.state.processed().len() }

    /// Number of failed records.
    #[must_use]
    pub fn error_count(&self) -> usize { self.state.error_count() }

    /// Announced batch size.
    #[must_use]
    pub fn total(&self) -> Option<u64> { self.state.total() }
}

/// One upload session: owns the reassembler, the aggregator, and the only
/// read loop allowed to touch them.
#[derive(Debug)]
pub struct UploadSession {
    aggregator: EventAggregator,
    reassembler: FrameReassembler,
    cancel: CancellationToken,
    idle_timeout: Option<Duration>,
}

impl UploadSession {
    /// Create a session and the snapshot channel observers subscribe to.
    #[must_use]
    pub fn new(config: &UploadConfig) -> (Self, watch::Receiver<RunState>) {
        let (aggregator, snapshots) = EventAggregator::new();
        (
            Self {
                aggregator,
                reassembler: FrameReassembler::with_max_frame_len(config.max_frame_len),
                cancel: CancellationToken::new(),
                idle_timeout: config.idle_timeout,
            },
            snapshots,
        )
    }

    /// Token that aborts the read loop when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken { self.cancel.clone() }

    /// Subscribe to state snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RunState> { self.aggregator.subscribe() }

    /// Mark the upload request as issued.
    pub fn begin_upload(&mut self) { self.aggregator.mark_uploading(); }

    /// Drain the response stream to completion.
    ///
    /// Consumes the session: ownership is the guard that no second consumer
    /// can ever drive the same run state. Returns once the batch completes,
    /// the stream closes, or a fatal condition arises.
    ///
    /// # Errors
    ///
    /// * [`SessionError::Transport`] when a stream read fails.
    /// * [`SessionError::Cancelled`] when the cancellation token fires; any
    ///   buffered partial frame is discarded unprocessed.
    /// * [`SessionError::IdleTimeout`] when a configured idle window elapses.
    /// * [`SessionError::StreamEnded`] when the stream closes before the
    ///   processed count reaches the announced total.
    /// * [`SessionError::Reassembly`] when the frame-size cap is exceeded.
    pub async fn run<S, E>(mut self, stream: S) -> Result<RunReport, SessionError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let cancel = self.cancel.clone();
        let mut stream = pin!(stream);

        'read: loop {
            let item = tokio::select! {
                () = cancel.cancelled() => {
                    return Err(fail(&mut self.aggregator, SessionError::Cancelled));
                }
                item = next_chunk(stream.as_mut(), self.idle_timeout) => match item {
                    Ok(item) => item,
                    Err(error) => return Err(fail(&mut self.aggregator, error)),
                },
            };

            match item {
                // Transport close is the only authoritative end signal.
                None => break 'read,
                Some(Err(source)) => {
                    return Err(fail(
                        &mut self.aggregator,
                        SessionError::Transport(Box::new(source)),
                    ));
                }
                Some(Ok(chunk)) => {
                    self.reassembler.push(&chunk);
                    loop {
                        match self.reassembler.next_frame() {
                            Ok(Some(frame)) => {
                                match self.aggregator.apply_frame(&frame) {
                                    Ok(Applied::Completed) => break 'read,
                                    Ok(_) => {}
                                    Err(rejected) => {
                                        tracing::debug!(error = %rejected, "frame dropped");
                                    }
                                }
                            }
                            Ok(None) => break,
                            Err(source) => {
                                return Err(fail(&mut self.aggregator, source.into()));
                            }
                        }
                    }
                }
            }
        }

        let _discarded = self.reassembler.finish();

        if self.aggregator.state().phase() == Phase::Completed {
            metrics::inc_sessions_completed();
            Ok(RunReport {
                state: self.aggregator.into_state(),
            })
        } else {
            let processed = self.aggregator.state().processed().len();
            let total = self.aggregator.state().total();
            Err(fail(
                &mut self.aggregator,
                SessionError::StreamEnded { processed, total },
            ))
        }
    }
}

async fn next_chunk<S, E>(
    mut stream: Pin<&mut S>,
    idle_timeout: Option<Duration>,
) -> Result<Option<Result<Bytes, E>>, SessionError>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    match idle_timeout {
        Some(window) => tokio::time::timeout(window, stream.next())
            .await
            .map_err(|_| SessionError::IdleTimeout(window)),
        None => Ok(stream.next().await),
    }
}

fn fail(aggregator: &mut EventAggregator, error: SessionError) -> SessionError {
    tracing::warn!(error = %error, "upload session failed");
    aggregator.mark_failed();
    metrics::inc_sessions_failed();
    error
}

/// RAII claim on a controller's single in-flight session.
#[derive(Debug)]
struct SessionSlot(Arc<AtomicBool>);

impl SessionSlot {
    fn claim(flag: &Arc<AtomicBool>) -> Result<Self, SessionError> {
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Ok(Self(Arc::clone(flag)))
        } else {
            Err(SessionError::AlreadyRunning)
        }
    }
}

impl Drop for SessionSlot {
    fn drop(&mut self) { self.0.store(false, Ordering::Release); }
}

/// Handle to an in-flight upload started by [`UploadController::start`].
#[derive(Debug)]
pub struct ActiveUpload {
    snapshots: watch::Receiver<RunState>,
    cancel: CancellationToken,
    task: JoinHandle<Result<RunReport, SessionError>>,
}

impl ActiveUpload {
    /// Subscribe to state snapshots.
    #[must_use]
    pub fn snapshots(&self) -> watch::Receiver<RunState> { self.snapshots.clone() }

    /// Token that aborts the session when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken { self.cancel.clone() }

    /// Abort the session.
    pub fn cancel(&self) { self.cancel.cancel(); }

    /// Wait for the session to finish.
    ///
    /// # Errors
    ///
    /// Propagates the session's [`SessionError`], or [`SessionError::Task`]
    /// if the session task panicked.
    pub async fn wait(self) -> Result<RunReport, SessionError> {
        self.task.await.map_err(SessionError::Task)?
    }
}

/// Starts upload sessions and enforces the one-at-a-time rule.
#[derive(Debug)]
pub struct UploadController {
    client: UploadClient,
    config: UploadConfig,
    in_flight: Arc<AtomicBool>,
}

impl UploadController {
    /// Build a controller for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Endpoint`] when the endpoint URL is invalid.
    pub fn new(config: UploadConfig) -> Result<Self, SessionError> {
        let client = UploadClient::new(&config)?;
        Ok(Self {
            client,
            config,
            in_flight: Arc::default(),
        })
    }

    /// Upload `payload` and spawn the session that drains the response.
    ///
    /// Returns immediately with a handle exposing snapshots and
    /// cancellation. The request itself runs inside the session task, so a
    /// rejected upload ([`SessionError::Status`], [`SessionError::Transport`])
    /// surfaces through [`ActiveUpload::wait`] and as a `Failed` snapshot,
    /// not here. The slot is released when the session task finishes,
    /// however it finishes.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyRunning`] while a previous session is
    /// live.
    pub fn start(&self, payload: UploadPayload) -> Result<ActiveUpload, SessionError> {
        let slot = SessionSlot::claim(&self.in_flight)?;
        let (mut session, snapshots) = UploadSession::new(&self.config);
        session.begin_upload();

        let client = self.client.clone();
        let cancel = session.cancellation_token();
        let request_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let _slot = slot;
            let stream = tokio::select! {
                () = request_cancel.cancelled() => {
                    return Err(fail(&mut session.aggregator, SessionError::Cancelled));
                }
                opened = client.open_stream(payload) => match opened {
                    Ok(stream) => stream,
                    Err(error) => return Err(fail(&mut session.aggregator, error)),
                },
            };
            session.run(stream).await
        });

        Ok(ActiveUpload {
            snapshots,
            cancel,
            task,
        })
    }
}
