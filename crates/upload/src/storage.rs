//! Storage service interface.
//!
//! `StorageClient` is implemented by the transport layer (HTTP client, test
//! mocks). Using a trait keeps the upload engine decoupled from the wire and
//! testable without a service.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::types::PartSpec;

/// Future type returned by [`StorageClient`] methods.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Errors surfaced by a storage client.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("service error: {0}")]
    Service(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Vault metadata returned by `describe_vault`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultInfo {
    pub vault_name: String,
    #[serde(default)]
    pub number_of_archives: u64,
    #[serde(default)]
    pub size_in_bytes: u64,
}

/// Receipt for a stored archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveReceipt {
    pub archive_id: String,
    pub location: String,
    pub checksum: String,
}

/// Inclusive byte range of one part within the archive.
///
/// Rendered in the wire form `bytes {start}-{end}/{total}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ByteRange {
    /// Range covered by `spec` in an archive of `total` bytes.
    pub fn for_part(spec: &PartSpec, total: u64) -> Self {
        Self {
            start: spec.offset,
            end: spec.offset + spec.len - 1,
            total,
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// Abstract client for the cold-storage service.
///
/// Checksums are lowercase hex renderings of the 32-byte tree-hash root.
pub trait StorageClient: Send + Sync {
    /// Looks up vault metadata; `NotFound` when the vault does not exist.
    fn describe_vault<'a>(&'a self, vault: &'a str) -> StorageFuture<'a, VaultInfo>;

    /// Checks that a bucket exists and is reachable.
    fn head_bucket<'a>(&'a self, bucket: &'a str) -> StorageFuture<'a, ()>;

    /// Uploads a whole archive in one request.
    fn upload_archive<'a>(
        &'a self,
        vault: &'a str,
        description: &'a str,
        body: &'a [u8],
        checksum: &'a str,
    ) -> StorageFuture<'a, ArchiveReceipt>;

    /// Opens a multipart session; returns the service-assigned upload id.
    ///
    /// `part_size` must match the size every non-final part will carry.
    fn initiate_multipart_upload<'a>(
        &'a self,
        vault: &'a str,
        description: &'a str,
        part_size: u64,
    ) -> StorageFuture<'a, String>;

    /// Uploads one part of a multipart session.
    fn upload_multipart_part<'a>(
        &'a self,
        vault: &'a str,
        upload_id: &'a str,
        range: ByteRange,
        body: &'a [u8],
        checksum: &'a str,
    ) -> StorageFuture<'a, ()>;

    /// Finalizes a multipart session with the whole-archive checksum.
    fn complete_multipart_upload<'a>(
        &'a self,
        vault: &'a str,
        upload_id: &'a str,
        archive_size: u64,
        checksum: &'a str,
    ) -> StorageFuture<'a, ArchiveReceipt>;

    /// Discards an in-progress multipart session.
    fn abort_multipart_upload<'a>(
        &'a self,
        vault: &'a str,
        upload_id: &'a str,
    ) -> StorageFuture<'a, ()>;
}
