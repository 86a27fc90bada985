//! Upload session configuration.

use std::{num::NonZeroUsize, time::Duration};

use crate::frame::DEFAULT_MAX_FRAME_LEN;

/// Default endpoint of the processing service.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/upload/";

/// Options shared by every session a controller starts.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    /// Full URL of the upload endpoint.
    pub endpoint: String,
    /// Fail the session when no chunk arrives within this window.
    ///
    /// Off by default: the protocol itself implies no timeout, so the
    /// deadline is a caller-imposed policy.
    pub idle_timeout: Option<Duration>,
    /// Cap on bytes buffered while waiting for a frame delimiter.
    pub max_frame_len: NonZeroUsize,
}

impl UploadConfig {
    /// Configuration pointing at `endpoint` with defaults otherwise.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Impose an idle deadline on the response stream.
    #[must_use]
    pub fn with_idle_timeout(mut self, window: Duration) -> Self {
        self.idle_timeout = Some(window);
        self
    }

    /// Override the frame-size cap.
    #[must_use]
    pub fn with_max_frame_len(mut self, max_frame_len: NonZeroUsize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            idle_timeout: None,
            max_frame_len: NonZeroUsize::new(DEFAULT_MAX_FRAME_LEN)
                .unwrap_or(NonZeroUsize::MIN),
        }
    }
}
