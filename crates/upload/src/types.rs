//! Data types for the upload flow.

use std::path::PathBuf;

use coldvault_treehash::TreeHash;

use crate::storage::StorageError;

/// Default part size: 16 MiB.
///
/// The multipart path requires a power of two; see
/// [`planner::validate_part_size`](crate::planner::validate_part_size).
pub const DEFAULT_PART_SIZE: u64 = 16 * 1024 * 1024;

/// Default per-part attempt cap.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default width of the part upload worker pool.
pub const DEFAULT_WORKERS: usize = 10;

/// Engine configuration, passed in at session construction.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Part size in bytes.
    pub part_size: u64,
    /// Attempts per part before the session is torn down.
    pub max_attempts: u32,
    /// Number of parts uploaded concurrently. 1 means sequential.
    pub workers: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            workers: DEFAULT_WORKERS,
        }
    }
}

/// One planned part: a contiguous byte range of the archive.
///
/// Parts are ordered by `index`, non-overlapping, and cover the archive
/// exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSpec {
    pub offset: u64,
    pub len: u64,
    pub index: u32,
}

/// Terminal outcome of one part upload.
#[derive(Debug)]
pub enum PartOutcome {
    Success,
    ExhaustedRetries(StorageError),
}

/// Result reported by a part upload worker.
#[derive(Debug)]
pub struct PartResult {
    pub index: u32,
    pub checksum: TreeHash,
    pub attempts: u32,
    pub outcome: PartOutcome,
}

/// Upload path chosen for the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    SingleShot,
    Multipart,
}

/// Session life cycle.
///
/// `Completed`, `Aborted`, and `Failed` are terminal. A session whose remote
/// multipart upload was torn down (exhausted part, cancellation) ends in
/// `Aborted`; every other failure ends in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Planning,
    SingleShot,
    Multipart,
    Completed,
    Aborted,
    Failed,
}

/// Progress observation emitted during an upload.
///
/// Events are diagnostics for the caller to render; a dropped receiver
/// simply discards them.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// Whole-archive tree hash is known.
    ChecksumComputed { checksum: String },
    /// Upload path chosen; `total_parts` is 1 for single-shot.
    Started { mode: UploadMode, total_parts: u32 },
    /// Multipart session opened.
    Initiated { upload_id: String },
    /// One part attempt failed and will be retried (or was the last attempt).
    PartRetry { index: u32, attempt: u32, error: String },
    /// One part finished; `fraction` counts completed parts.
    PartCompleted { index: u32, total_parts: u32, fraction: f64 },
    /// The session is tearing down the remote multipart upload.
    Aborting { upload_id: String },
    /// Terminal success.
    Completed { archive_id: String },
    /// Terminal failure.
    Failed { error: String },
}

/// What to upload and where.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub archive: PathBuf,
    pub archive_size: u64,
    pub description: String,
    pub vault: String,
}

/// Terminal result of a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub archive_id: String,
    pub location: String,
    pub checksum: String,
}

impl From<crate::storage::ArchiveReceipt> for UploadOutcome {
    fn from(receipt: crate::storage::ArchiveReceipt) -> Self {
        Self {
            archive_id: receipt.archive_id,
            location: receipt.location,
            checksum: receipt.checksum,
        }
    }
}
