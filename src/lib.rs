//! Streaming ingestion core for live spreadsheet-upload monitoring.
//!
//! `sheetstream` uploads a spreadsheet to a remote processing endpoint and
//! folds the endpoint's incrementally-delivered event stream into a
//! consistent, observable run state. The pipeline is strictly sequential:
//! byte chunks are reassembled into delimiter-bounded frames
//! ([`FrameReassembler`]), each frame is decoded into a typed event
//! ([`Event`]) and folded into the session's [`RunState`]
//! ([`EventAggregator`]), and every fold publishes an immutable snapshot to
//! observers. [`UploadController`] ties the pieces to an HTTP endpoint and
//! guarantees one session at a time.

pub mod aggregator;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod frame;
pub mod metrics;
pub mod session;
pub mod state;

pub use aggregator::{Applied, EventAggregator};
pub use client::{UploadClient, UploadPayload, XLSX_CONTENT_TYPE};
pub use config::{DEFAULT_ENDPOINT, UploadConfig};
pub use error::{FrameRejected, ReassemblyError, SessionError};
pub use event::{Event, Outcome};
pub use frame::{DEFAULT_MAX_FRAME_LEN, EVENT_MARKER, Frame, FrameReassembler};
pub use session::{ActiveUpload, RunReport, UploadController, UploadSession};
pub use state::{Phase, RunState};
