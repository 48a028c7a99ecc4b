//! coldvault entry point.

mod args;
mod progress;
mod sidecar;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

use coldvault_client::VaultHttpClient;
use coldvault_upload::preflight;
use coldvault_upload::session::UploadSession;
use coldvault_upload::types::{SessionConfig, UploadRequest};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging. Progress goes to stdout, tracing is for
    // diagnostics; keep the default filter quiet.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let opts = args::UploadArgs::parse().resolve()?;

    let client = VaultHttpClient::new(&opts.endpoint)
        .with_context(|| format!("cannot reach endpoint {}", opts.endpoint))?;

    println!("{}", style("The upload process will now begin.").green());
    println!("Vault:   {}", opts.vault);
    println!("Bucket:  {}", opts.bucket);
    println!("Archive: {}", opts.archive.display());

    let archive_size = preflight::verify_prerequisites(
        &client,
        &opts.archive,
        &opts.vault,
        &opts.bucket,
        opts.part_size,
    )
    .await?;

    let config = SessionConfig {
        part_size: opts.part_size,
        ..Default::default()
    };
    println!(
        "Archive size: {archive_size} bytes ({} MiB)",
        archive_size / (1024 * 1024)
    );
    println!(
        "Part size: {} bytes, {} part(s)",
        config.part_size,
        archive_size.div_ceil(config.part_size)
    );

    if !opts.assume_yes
        && !dialoguer::Confirm::new()
            .with_prompt("Upload the archive now?")
            .default(true)
            .interact()?
    {
        println!("Nothing uploaded. Bye!");
        return Ok(());
    }

    let mut session = UploadSession::new(config);
    let events = session.take_events().context("event channel already taken")?;
    let cancel = session.cancel_token();

    // Ctrl-C cancels the session; the engine aborts any remote multipart
    // upload before returning.
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\ninterrupt received, winding the upload down...");
                cancel.cancel();
            }
        }
    });

    let renderer = tokio::spawn(progress::render(events));

    let request = UploadRequest {
        archive: opts.archive.clone(),
        archive_size,
        description: opts.description.clone(),
        vault: opts.vault.clone(),
    };
    let result = session.run(&client, &request).await;
    let _ = renderer.await;

    let outcome = result?;
    println!("Location: {}", outcome.location);
    println!("Checksum: {}", outcome.checksum);

    let info_path = sidecar::write_info_file(
        Path::new("."),
        &opts.archive,
        archive_size,
        &opts.description,
        &opts.events,
        &outcome,
    )?;
    println!("Wrote info file: {}", info_path.display());

    let key = sidecar::info_file_name(&opts.archive);
    let body = tokio::fs::read(&info_path).await?;
    match client.put_object(&opts.bucket, &key, body).await {
        Ok(()) => println!("Uploaded info file to bucket '{}'", opts.bucket),
        Err(e) => {
            // The archive itself is stored; losing the sidecar only costs
            // convenience, so report and move on.
            tracing::warn!(error = %e, "info file upload failed");
            eprintln!(
                "{} could not upload info file: {e}",
                style("warning:").yellow()
            );
        }
    }

    Ok(())
}
