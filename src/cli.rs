//! Command line interface for the `sheetstream` binary.
//!
//! Kept free of crate-internal types so the build script can reuse the
//! definition for man page generation.

use std::path::PathBuf;

use clap::Parser;

/// Command line arguments for the `sheetstream` binary.
#[derive(Debug, Parser)]
#[command(
    name = "sheetstream",
    version,
    about = "Upload a spreadsheet and watch it being processed live"
)]
pub struct Cli {
    /// Spreadsheet file to upload (.xlsx).
    pub file: PathBuf,

    /// Full URL of the upload endpoint.
    #[arg(long, default_value = "http://127.0.0.1:8000/upload/")]
    pub endpoint: String,

    /// Run the remote browser worker headless.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub headless: bool,

    /// Fail the session when the stream is idle for this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub idle_timeout: Option<u64>,
}
