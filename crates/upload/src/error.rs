//! Upload error taxonomy.

use std::path::PathBuf;

use crate::storage::StorageError;

/// Errors produced by the upload engine.
///
/// Multipart failures always name the remote `upload_id` so that a failed
/// abort can be resolved by hand.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive not found: {0}")]
    ArchiveMissing(PathBuf),

    #[error("archive is empty: {0}")]
    EmptyArchive(PathBuf),

    #[error("vault '{vault}' not available: {source}")]
    VaultMissing {
        vault: String,
        #[source]
        source: StorageError,
    },

    #[error("bucket '{bucket}' not available: {source}")]
    BucketMissing {
        bucket: String,
        #[source]
        source: StorageError,
    },

    #[error("invalid part size: {0}")]
    InvalidPartSize(String),

    #[error("single-shot upload failed: {source}")]
    SingleShot {
        #[source]
        source: StorageError,
    },

    #[error("could not initiate multipart upload: {source}")]
    Initiate {
        #[source]
        source: StorageError,
    },

    #[error("part {index} failed after {attempts} attempts (upload id {upload_id}): {source}")]
    PartExhausted {
        index: u32,
        attempts: u32,
        upload_id: String,
        #[source]
        source: StorageError,
    },

    #[error("could not complete multipart upload {upload_id}: {source}")]
    Finalization {
        upload_id: String,
        #[source]
        source: StorageError,
    },

    #[error(
        "abort of multipart upload {upload_id} failed: {source}; \
         the upload must be aborted manually (original failure: {cause})"
    )]
    AbortFailed {
        upload_id: String,
        source: StorageError,
        cause: Box<UploadError>,
    },

    #[error("upload cancelled")]
    Cancelled,
}
