//! Typed events decoded from frame payloads.
//!
//! Events are recognized by payload shape, not by a producer-set
//! discriminator: a payload carrying `total` is a start event, one carrying
//! `index`, `name` and `success` is a record outcome. Anything else is an
//! explicit rejection, never a crash. The producer labels records in Spanish
//! (`nombre`), so that field name is accepted as an alias.

use serde::{Deserialize, Serialize};

use crate::error::FrameRejected;

/// The result of processing one spreadsheet record.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Outcome {
    /// Position reported by the producer. Display key only: values are not
    /// guaranteed contiguous or monotonic and are never used for completion.
    pub index: u64,
    /// Human-readable record label.
    #[serde(alias = "nombre")]
    pub name: String,
    /// Whether the record was processed successfully.
    pub success: bool,
    /// Failure detail, present when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Semantic meaning of one decoded frame.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Event {
    /// Start of a batch, announcing how many records will be processed.
    Start {
        /// Number of records in the batch.
        total: u64,
    },
    /// One record finished processing.
    Record(Outcome),
}

impl Event {
    /// Decode a frame payload into a typed event.
    ///
    /// # Errors
    ///
    /// Returns [`FrameRejected::Json`] for unparseable payloads and
    /// [`FrameRejected::Shape`] for JSON that matches neither event shape.
    pub fn parse(payload: &str) -> Result<Self, FrameRejected> {
        let value: serde_json::Value =
            serde_json::from_str(payload).map_err(FrameRejected::Json)?;
        serde_json::from_value(value).map_err(|_| FrameRejected::Shape)
    }
}
