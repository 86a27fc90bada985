//! Frame reassembly for the event stream.
//!
//! [`FrameReassembler`] converts arbitrarily-sized byte chunks into complete
//! logical frames. Frames are UTF-8 text prefixed with the [`EVENT_MARKER`]
//! and terminated by a blank line. Chunk boundaries carry no meaning: a
//! delimiter, a marker, or a multi-byte character may be split across chunks,
//! so raw bytes are buffered and decoded only once a full frame is present.

use std::num::NonZeroUsize;

use bytes::BytesMut;

use crate::error::ReassemblyError;

/// Marker that identifies an event-bearing segment.
///
/// Segments without the marker (keep-alives, comment lines) are dropped.
pub const EVENT_MARKER: &str = "data: ";

/// Default cap on the bytes buffered while waiting for a frame delimiter.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// One complete frame extracted from the byte stream.
///
/// The event marker has been stripped; `payload` is the raw JSON text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    payload: String,
}

impl Frame {
    /// Construct a frame from an already-decoded payload.
    #[must_use]
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Borrow the JSON payload text.
    #[must_use]
    pub fn payload(&self) -> &str { &self.payload }

    /// Consume the frame, returning the owned payload.
    #[must_use]
    pub fn into_payload(self) -> String { self.payload }
}

/// Stateful reassembler turning byte chunks into delimiter-bounded frames.
///
/// Feed chunks with [`push`](Self::push) and drain completed frames with
/// [`next_frame`](Self::next_frame). Frames come out strictly in arrival
/// order; the only buffering is the trailing partial frame carried across
/// calls. At end of stream, [`finish`](Self::finish) discards any buffered
/// remainder, which cannot be a valid frame since the protocol terminates
/// every frame with the delimiter.
#[derive(Debug)]
pub struct FrameReassembler {
    buf: BytesMut,
    /// Offset the next delimiter scan resumes from. Everything before it has
    /// already been scanned without a match, so repeated polling of a growing
    /// buffer never rescans the same bytes.
    scan_from: usize,
    max_frame_len: NonZeroUsize,
    dropped_segments: u64,
}

impl FrameReassembler {
    /// Create a reassembler with the default frame-size cap.
    #[must_use]
    pub fn new() -> Self {
        // DEFAULT_MAX_FRAME_LEN is a non-zero constant.
        let max = NonZeroUsize::new(DEFAULT_MAX_FRAME_LEN)
            .unwrap_or(NonZeroUsize::MIN);
        Self::with_max_frame_len(max)
    }

    /// Create a reassembler that fails once `max_frame_len` bytes accumulate
    /// without a delimiter.
    #[must_use]
    pub fn with_max_frame_len(max_frame_len: NonZeroUsize) -> Self {
        Self {
            buf: BytesMut::new(),
            scan_from: 0,
            max_frame_len,
            dropped_segments: 0,
        }
    }

    /// Append the next chunk of raw bytes.
    pub fn push(&mut self, chunk: &[u8]) { self.buf.extend_from_slice(chunk); }

    /// Extract the next complete frame, if the buffer holds one.
    ///
    /// Segments without the event marker and segments that are not valid
    /// UTF-8 are dropped internally; the method keeps scanning until it finds
    /// an event-bearing frame or runs out of complete segments.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::FrameTooLarge`] when the buffer exceeds the
    /// configured cap without containing a delimiter.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ReassemblyError> {
        loop {
            let Some((segment_end, delimiter_end)) = find_delimiter(&self.buf, self.scan_from)
            else {
                // A delimiter is at most three bytes, so only the last two
                // buffered bytes can still start one once more data arrives.
                self.scan_from = self.buf.len().saturating_sub(2);
                if self.buf.len() > self.max_frame_len.get() {
                    return Err(ReassemblyError::FrameTooLarge {
                        buffered: self.buf.len(),
                        limit: self.max_frame_len,
                    });
                }
                return Ok(None);
            };

            self.scan_from = 0;
            let mut segment = self.buf.split_to(delimiter_end);
            segment.truncate(segment_end);
            if segment.last() == Some(&b'\r') {
                segment.truncate(segment.len() - 1);
            }

            if let Some(frame) = self.accept_segment(&segment) {
                return Ok(Some(frame));
            }
        }
    }

    /// Consume the reassembler at end of stream.
    ///
    /// Returns the number of buffered bytes discarded; a non-zero value means
    /// the producer closed the stream mid-frame.
    #[must_use]
    pub fn finish(self) -> usize {
        let discarded = self.buf.len();
        if discarded > 0 {
            tracing::debug!(discarded, "partial frame discarded at end of stream");
        }
        discarded
    }

    /// Bytes currently buffered while waiting for a delimiter.
    #[must_use]
    pub fn buffered_len(&self) -> usize { self.buf.len() }

    /// Number of complete segments dropped for lacking the event marker or
    /// for invalid UTF-8.
    #[must_use]
    pub fn dropped_segments(&self) -> u64 { self.dropped_segments }

    fn accept_segment(&mut self, segment: &[u8]) -> Option<Frame> {
        let start = segment
            .iter()
            .position(|b| !matches!(b, b'\r' | b'\n'))
            .unwrap_or(segment.len());
        let segment = &segment[start..];
        if segment.is_empty() {
            return None;
        }

        let Ok(text) = std::str::from_utf8(segment) else {
            self.dropped_segments += 1;
            tracing::warn!(len = segment.len(), "non-UTF-8 segment dropped");
            return None;
        };

        let Some(payload) = text.strip_prefix(EVENT_MARKER) else {
            self.dropped_segments += 1;
            tracing::debug!(len = text.len(), "segment without event marker dropped");
            return None;
        };

        Some(Frame::new(payload))
    }
}

impl Default for FrameReassembler {
    fn default() -> Self { Self::new() }
}

/// Locate the first blank-line delimiter at or after `start`.
///
/// Returns `(segment_end, delimiter_end)`: the segment occupies
/// `buf[..segment_end]` and the delimiter is consumed up to `delimiter_end`.
/// Both `\n\n` and `\r\n\r\n` terminate a frame.
fn find_delimiter(buf: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut i = start.min(buf.len());
    while i < buf.len() {
        if buf[i] != b'\n' {
            i += 1;
            continue;
        }
        let rest = &buf[i + 1..];
        if rest.first() == Some(&b'\n') {
            return Some((i, i + 2));
        }
        if rest.len() >= 2 && rest[0] == b'\r' && rest[1] == b'\n' {
            return Some((i, i + 3));
        }
        i += 1;
    }
    None
}
