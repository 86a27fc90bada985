//! Error types for upload sessions and frame handling.

use std::{num::NonZeroUsize, time::Duration};

/// Reasons a delimited frame is dropped without affecting run state.
///
/// Dropped frames are protocol noise or anomalies; none of them are fatal.
/// The session logs them and keeps folding subsequent frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameRejected {
    /// The payload is not valid JSON.
    #[error("frame payload is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    /// The payload parsed as JSON but matches no recognized event shape.
    #[error("frame payload matches no recognized event shape")]
    Shape,
    /// A second start event arrived after `total` was already announced.
    #[error("duplicate start event; total is already set")]
    DuplicateStart,
    /// A frame arrived after the session reached a terminal phase.
    #[error("frame arrived after the session terminated")]
    AfterCompletion,
}

/// Errors raised while reassembling frames from the byte stream.
#[derive(Debug, thiserror::Error)]
pub enum ReassemblyError {
    /// The buffer grew past the configured cap without a frame delimiter.
    #[error("frame exceeds {limit} bytes ({buffered} buffered without a delimiter)")]
    FrameTooLarge {
        /// Bytes currently held in the accumulation buffer.
        buffered: usize,
        /// Configured maximum frame length.
        limit: NonZeroUsize,
    },
}

/// Errors that terminate an upload session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The underlying stream read or the upload request failed.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The server rejected the upload before any frames arrived.
    #[error("server rejected the upload with status {status}")]
    Status {
        /// HTTP status returned by the endpoint.
        status: reqwest::StatusCode,
    },
    /// The configured endpoint is not a valid URL.
    #[error("invalid endpoint `{url}`")]
    Endpoint {
        /// The rejected endpoint string.
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// An upload is already in progress on this controller.
    #[error("an upload is already in progress")]
    AlreadyRunning,
    /// The session was cancelled before the stream completed.
    #[error("upload cancelled")]
    Cancelled,
    /// No chunk arrived within the caller-imposed idle window.
    #[error("stream idle for longer than {0:?}")]
    IdleTimeout(Duration),
    /// The stream closed before the batch completed.
    #[error("stream ended before the batch completed ({processed} of {} records)",
        .total.map_or_else(|| String::from("?"), |t| t.to_string()))]
    StreamEnded {
        /// Records folded before the stream closed.
        processed: usize,
        /// Announced batch size, if a start event ever arrived.
        total: Option<u64>,
    },
    /// Frame reassembly failed.
    #[error(transparent)]
    Reassembly(#[from] ReassemblyError),
    /// The spawned session task panicked or was aborted.
    #[error("upload task failed: {0}")]
    Task(#[source] tokio::task::JoinError),
}
