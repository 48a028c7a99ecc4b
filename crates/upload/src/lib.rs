//! Chunked archive upload engine.
//!
//! This crate implements the **business logic** for pushing large immutable
//! archives to a cold-storage vault service. It is a library crate with no
//! transport dependencies — callers provide a [`StorageClient`]
//! implementation that bridges to the actual service API.
//!
//! # Pipeline
//!
//! 1. **Preflight** — archive, vault, bucket, and part-size checks
//! 2. **Checksum** — streaming whole-archive tree hash
//! 3. **Path choice** — single-shot when one part covers the archive
//! 4. **Multipart** — initiate, upload parts with bounded retry, complete
//! 5. **Abort** — any unrecoverable multipart failure tears the session down

pub mod error;
pub mod planner;
pub mod preflight;
pub mod session;
pub mod storage;
pub mod types;

mod part;

// Re-export primary types for convenience.
pub use error::UploadError;
pub use session::{UploadSession, run_upload};
pub use storage::{ArchiveReceipt, ByteRange, StorageClient, StorageError, VaultInfo};
pub use types::{
    PartOutcome, PartResult, PartSpec, SessionConfig, SessionState, UploadEvent, UploadMode,
    UploadOutcome, UploadRequest,
};
