//! Command-line arguments and interactive prompting.

use std::path::PathBuf;

use clap::Parser;

const MIB: u64 = 1024 * 1024;

/// Upload an archive to a cold-storage vault.
#[derive(Debug, Parser)]
#[command(name = "coldvault", version, about)]
pub struct UploadArgs {
    /// Path to the archive to upload.
    #[arg(short, long)]
    pub archive: Option<PathBuf>,

    /// Name of the target vault.
    #[arg(short, long)]
    pub vault: Option<String>,

    /// Bucket that receives the sidecar info file.
    #[arg(short, long)]
    pub bucket: Option<String>,

    /// Description stored with the archive.
    #[arg(short, long)]
    pub description: Option<String>,

    /// Event covered by the archive (repeatable).
    #[arg(short, long = "event")]
    pub events: Vec<String>,

    /// Part size in MiB; must be a power of two when the archive is split.
    #[arg(short = 's', long, default_value_t = 16)]
    pub part_size_mib: u64,

    /// Storage service endpoint.
    #[arg(long, env = "COLDVAULT_ENDPOINT", default_value = "http://localhost:3900")]
    pub endpoint: String,

    /// Skip the confirmation prompt.
    #[arg(short = 'y', long)]
    pub assume_yes: bool,
}

/// Arguments with every required value filled in.
#[derive(Debug)]
pub struct ResolvedArgs {
    pub archive: PathBuf,
    pub vault: String,
    pub bucket: String,
    pub description: String,
    pub events: Vec<String>,
    /// Part size in bytes.
    pub part_size: u64,
    pub endpoint: String,
    pub assume_yes: bool,
}

impl UploadArgs {
    /// Fills missing required values by prompting on the terminal.
    pub fn resolve(self) -> anyhow::Result<ResolvedArgs> {
        let archive = match self.archive {
            Some(archive) => archive,
            None => PathBuf::from(prompt("Archive path")?),
        };
        let vault = match self.vault {
            Some(vault) => vault,
            None => prompt("Vault name")?,
        };
        let bucket = match self.bucket {
            Some(bucket) => bucket,
            None => prompt("Bucket for the info file")?,
        };
        let description = match self.description {
            Some(description) => description,
            None => prompt("Archive description")?,
        };

        Ok(ResolvedArgs {
            archive,
            vault,
            bucket,
            description,
            events: self.events,
            part_size: self.part_size_mib * MIB,
            endpoint: self.endpoint,
            assume_yes: self.assume_yes,
        })
    }
}

fn prompt(label: &str) -> anyhow::Result<String> {
    Ok(dialoguer::Input::new()
        .with_prompt(label)
        .interact_text()?)
}
