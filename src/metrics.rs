//! Metric helpers for `sheetstream`.
//!
//! Counter names and helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. The helpers compile to no-ops
//! when the `metrics` feature is disabled, so call sites stay unconditional.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Name of the counter tracking folded frames.
pub const FRAMES_PROCESSED: &str = "sheetstream_frames_processed_total";
/// Name of the counter tracking dropped frames.
pub const FRAMES_DROPPED: &str = "sheetstream_frames_dropped_total";
/// Name of the counter tracking completed sessions.
pub const SESSIONS_COMPLETED: &str = "sheetstream_sessions_completed_total";
/// Name of the counter tracking failed sessions.
pub const SESSIONS_FAILED: &str = "sheetstream_sessions_failed_total";

/// Record a successfully folded frame.
pub fn inc_frames() {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_PROCESSED).increment(1);
}

/// Record a frame dropped as malformed or anomalous.
pub fn inc_dropped_frames() {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_DROPPED).increment(1);
}

/// Record a session that reached `Completed`.
pub fn inc_sessions_completed() {
    #[cfg(feature = "metrics")]
    counter!(SESSIONS_COMPLETED).increment(1);
}

/// Record a session that reached `Failed`.
pub fn inc_sessions_failed() {
    #[cfg(feature = "metrics")]
    counter!(SESSIONS_FAILED).increment(1);
}
