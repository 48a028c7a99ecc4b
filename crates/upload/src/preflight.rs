//! Prerequisite checks run before any upload traffic.
//!
//! Everything here fails fast and is non-retryable: a missing archive, vault,
//! or bucket, or an unusable part size, should stop the run before a single
//! byte is sent.

use std::path::Path;

use tracing::debug;

use crate::error::UploadError;
use crate::planner;
use crate::storage::StorageClient;

/// Verifies the archive, vault, bucket, and part size.
///
/// Returns the archive length in bytes on success. The part-size constraints
/// only bind when the archive will actually be split; a part size at or above
/// the archive length selects the single-shot path and is accepted as-is.
pub async fn verify_prerequisites(
    client: &dyn StorageClient,
    archive: &Path,
    vault: &str,
    bucket: &str,
    part_size: u64,
) -> Result<u64, UploadError> {
    let meta = tokio::fs::metadata(archive)
        .await
        .map_err(|_| UploadError::ArchiveMissing(archive.to_path_buf()))?;
    if !meta.is_file() {
        return Err(UploadError::ArchiveMissing(archive.to_path_buf()));
    }
    let archive_size = meta.len();
    if archive_size == 0 {
        return Err(UploadError::EmptyArchive(archive.to_path_buf()));
    }

    if part_size < archive_size {
        planner::validate_part_size(part_size)?;
    }

    let info = client
        .describe_vault(vault)
        .await
        .map_err(|source| UploadError::VaultMissing {
            vault: vault.to_string(),
            source,
        })?;
    debug!(vault = %info.vault_name, archives = info.number_of_archives, "vault available");

    client
        .head_bucket(bucket)
        .await
        .map_err(|source| UploadError::BucketMissing {
            bucket: bucket.to_string(),
            source,
        })?;

    Ok(archive_size)
}
