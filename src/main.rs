//! Terminal front end for `sheetstream`.
//!
//! Uploads the given spreadsheet and renders live progress by subscribing to
//! the session's snapshot channel: one line per processed record, then a
//! summary with the error list. Ctrl-C cancels the session.

mod cli;

use std::{process::ExitCode, time::Duration};

use clap::Parser;
use sheetstream::{
    ActiveUpload, Phase, RunReport, UploadConfig, UploadController, UploadPayload,
};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    match run(cli).await {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("sheetstream: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: cli::Cli) -> Result<RunReport, Box<dyn std::error::Error>> {
    let contents = tokio::fs::read(&cli.file).await?;
    let file_name = cli
        .file
        .file_name()
        .map_or_else(|| String::from("upload.xlsx"), |n| n.to_string_lossy().into_owned());

    let mut config = UploadConfig::new(cli.endpoint);
    if let Some(seconds) = cli.idle_timeout {
        config = config.with_idle_timeout(Duration::from_secs(seconds));
    }

    let controller = UploadController::new(config)?;
    let upload = controller.start(UploadPayload {
        file_name,
        contents,
        headless: cli.headless,
    })?;

    let printer = spawn_printer(&upload);
    cancel_on_ctrl_c(&upload);

    let report = upload.wait().await?;
    let _ = printer.await;
    Ok(report)
}

/// Render each snapshot as it arrives: new record lines plus the running
/// percentage. Ends with the terminal snapshot or when the sender goes away.
fn spawn_printer(upload: &ActiveUpload) -> tokio::task::JoinHandle<()> {
    let mut snapshots = upload.snapshots();
    tokio::spawn(async move {
        let mut seen = 0;
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            for outcome in &snapshot.processed()[seen..] {
                let verdict = if outcome.success { "ok" } else { "ERROR" };
                println!(
                    "[{:>5.1}%] #{} {}: {}",
                    snapshot.progress_percent(),
                    outcome.index,
                    outcome.name,
                    verdict
                );
            }
            seen = snapshot.processed().len();
            if snapshot.phase().is_terminal() || snapshots.changed().await.is_err() {
                break;
            }
        }
    })
}

fn cancel_on_ctrl_c(upload: &ActiveUpload) {
    let cancel = upload.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
}

fn print_summary(report: &RunReport) {
    let total = report
        .total()
        .map_or_else(|| String::from("?"), |t| t.to_string());
    println!(
        "done: {} of {total} records processed, {} errors (phase {:?})",
        report.processed_count(),
        report.error_count(),
        report.state().phase()
    );
    if report.state().phase() == Phase::Completed {
        for outcome in report.state().errors() {
            println!(
                "  {}: {}",
                outcome.name,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}
