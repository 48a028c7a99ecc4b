//! Single-part upload with bounded retry.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::UploadError;
use crate::storage::{ByteRange, StorageClient};
use crate::types::{PartOutcome, PartResult, PartSpec, UploadEvent};

/// Uploads parts of one multipart session.
///
/// Shared read-only by the worker pool; the orchestrator owns all session
/// state and workers only hand back [`PartResult`]s.
pub(crate) struct PartUploader<'a> {
    pub client: &'a dyn StorageClient,
    pub vault: &'a str,
    pub archive: &'a Path,
    pub archive_size: u64,
    pub upload_id: &'a str,
    pub max_attempts: u32,
    pub cancel: CancellationToken,
    pub events: mpsc::Sender<UploadEvent>,
}

impl PartUploader<'_> {
    /// Uploads one part, retrying transient failures up to the attempt cap.
    ///
    /// The slice is read and hashed once; every retry re-sends the same
    /// payload and checksum. Returns `Ok(None)` when the part was never
    /// started because the session had already decided to abort. Local read
    /// failures are terminal and propagate as errors.
    pub(crate) async fn upload(&self, spec: PartSpec) -> Result<Option<PartResult>, UploadError> {
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        let (body, checksum) = {
            let path = self.archive.to_path_buf();
            tokio::task::spawn_blocking(move || {
                let body = read_range(&path, spec.offset, spec.len)?;
                let checksum = coldvault_treehash::hash_bytes(&body);
                Ok::<_, std::io::Error>((body, checksum))
            })
            .await
            .map_err(|e| std::io::Error::other(format!("task join error: {e}")))??
        };

        let range = ByteRange::for_part(&spec, self.archive_size);
        let checksum_hex = checksum.to_hex();

        let mut attempt = 0;
        let source = loop {
            attempt += 1;
            match self
                .client
                .upload_multipart_part(self.vault, self.upload_id, range, &body, &checksum_hex)
                .await
            {
                Ok(()) => {
                    debug!(part = spec.index, attempt, "part uploaded");
                    return Ok(Some(PartResult {
                        index: spec.index,
                        checksum,
                        attempts: attempt,
                        outcome: PartOutcome::Success,
                    }));
                }
                Err(e) => {
                    warn!(part = spec.index, attempt, error = %e, "part upload attempt failed");
                    let _ = self
                        .events
                        .send(UploadEvent::PartRetry {
                            index: spec.index,
                            attempt,
                            error: e.to_string(),
                        })
                        .await;
                    if attempt >= self.max_attempts {
                        break e;
                    }
                }
            }
        };

        Ok(Some(PartResult {
            index: spec.index,
            checksum,
            attempts: attempt,
            outcome: PartOutcome::ExhaustedRetries(source),
        }))
    }
}

/// Reads exactly `len` bytes at `offset`.
fn read_range(path: &Path, offset: u64, len: u64) -> std::io::Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn read_range_reads_exact_slice() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        assert_eq!(read_range(file.path(), 0, 4).unwrap(), b"0123");
        assert_eq!(read_range(file.path(), 6, 4).unwrap(), b"6789");
    }

    #[test]
    fn read_range_past_eof_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"short").unwrap();

        assert!(read_range(file.path(), 0, 100).is_err());
        assert!(read_range(file.path(), 0, 5).is_ok());
    }
}
