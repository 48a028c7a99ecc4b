//! Sidecar info file recording the upload receipt.
//!
//! Written next to the working directory after a successful upload and then
//! parked in the bucket, so the receipt survives even if terminal output is
//! lost.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use coldvault_upload::types::UploadOutcome;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InfoFile {
    pub archive_name: String,
    pub date_time: String,
    pub description: String,
    pub archive_size_bytes: u64,
    pub events: Vec<String>,
    pub upload: UploadDetails,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadDetails {
    pub archive_id: String,
    pub location: String,
    pub checksum: String,
}

/// `backup.tar` -> `backup_info.json`.
pub fn info_file_name(archive: &Path) -> String {
    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    format!("{stem}_info.json")
}

/// Writes the info file into `dir` and returns its path.
pub fn write_info_file(
    dir: &Path,
    archive: &Path,
    archive_size: u64,
    description: &str,
    events: &[String],
    outcome: &UploadOutcome,
) -> anyhow::Result<PathBuf> {
    let info = InfoFile {
        archive_name: archive
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive".to_string()),
        date_time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        description: description.to_string(),
        archive_size_bytes: archive_size,
        events: events.to_vec(),
        upload: UploadDetails {
            archive_id: outcome.archive_id.clone(),
            location: outcome.location.clone(),
            checksum: outcome.checksum.clone(),
        },
    };

    let path = dir.join(info_file_name(archive));
    std::fs::write(&path, serde_json::to_vec_pretty(&info)?)?;
    Ok(path)
}
