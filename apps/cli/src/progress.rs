//! Renders session events as terminal progress.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use coldvault_upload::types::{UploadEvent, UploadMode};

/// Drains the session event channel and renders it.
///
/// Runs until the channel closes, which happens when the session reaches a
/// terminal state.
pub async fn render(mut events: mpsc::Receiver<UploadEvent>) {
    let mut bar: Option<ProgressBar> = None;

    while let Some(event) = events.recv().await {
        match event {
            UploadEvent::ChecksumComputed { checksum } => {
                println!("Archive tree hash: {checksum}");
            }
            UploadEvent::Started { mode, total_parts } => match mode {
                UploadMode::SingleShot => {
                    println!("Archive fits in one part, uploading in a single request");
                }
                UploadMode::Multipart => {
                    let pb = ProgressBar::new(u64::from(total_parts));
                    pb.set_style(
                        ProgressStyle::with_template(
                            "{bar:40.cyan/blue} {pos}/{len} parts ({percent}%)",
                        )
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                    );
                    bar = Some(pb);
                }
            },
            UploadEvent::Initiated { upload_id } => {
                let line = format!("Initiated multipart upload, id: {upload_id}");
                match &bar {
                    Some(pb) => pb.println(line),
                    None => println!("{line}"),
                }
            }
            UploadEvent::PartRetry {
                index,
                attempt,
                error,
            } => {
                let line = format!(
                    "{} part {index}, attempt {attempt}: {error}",
                    style("retrying").yellow()
                );
                match &bar {
                    Some(pb) => pb.println(line),
                    None => eprintln!("{line}"),
                }
            }
            UploadEvent::PartCompleted { .. } => {
                if let Some(pb) = &bar {
                    pb.inc(1);
                }
            }
            UploadEvent::Aborting { upload_id } => {
                if let Some(pb) = bar.take() {
                    pb.abandon();
                }
                eprintln!(
                    "{} multipart upload {upload_id}",
                    style("aborting").red()
                );
            }
            UploadEvent::Completed { archive_id } => {
                if let Some(pb) = bar.take() {
                    pb.finish();
                }
                println!("{} archive id: {archive_id}", style("Upload completed!").green());
            }
            UploadEvent::Failed { .. } => {
                // The caller reports the error with full context.
                if let Some(pb) = bar.take() {
                    pb.abandon();
                }
            }
        }
    }
}
