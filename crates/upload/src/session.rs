//! Upload session orchestration.
//!
//! Drives one archive upload end to end: whole-archive checksum, the
//! single-shot vs multipart decision, and the multipart
//! initiate / upload-parts / complete lifecycle with abort on failure.
//!
//! Part uploads run under a bounded worker pool. Workers only report
//! [`PartResult`]s back; the orchestrator is the single writer of session
//! state and the only place abort decisions are made.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::UploadError;
use crate::part::PartUploader;
use crate::planner;
use crate::storage::StorageClient;
use crate::types::{
    PartOutcome, PartSpec, SessionConfig, SessionState, UploadEvent, UploadMode, UploadOutcome,
    UploadRequest,
};

/// Event channel capacity.
const EVENT_BUFFER: usize = 256;

/// Orchestrates one archive upload.
///
/// A session is consumed by [`run`](Self::run); terminal states are final by
/// construction.
pub struct UploadSession {
    config: SessionConfig,
    state: SessionState,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
}

impl UploadSession {
    /// Creates a new session in the `Planning` state.
    pub fn new(config: SessionConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            config,
            state: SessionState::Planning,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns a cancellation token for this upload.
    ///
    /// Cancelling stops dispatch of new parts, lets in-flight parts drain,
    /// aborts the remote multipart session if one was initiated, and makes
    /// [`run`](Self::run) return [`UploadError::Cancelled`].
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current state; terminal once `run` returns.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the upload to a terminal state.
    pub async fn run(
        mut self,
        client: &dyn StorageClient,
        request: &UploadRequest,
    ) -> Result<UploadOutcome, UploadError> {
        let result = self.drive(client, request).await;

        match &result {
            Ok(outcome) => {
                self.state = SessionState::Completed;
                info!(archive_id = %outcome.archive_id, "upload completed");
                let _ = self
                    .events_tx
                    .send(UploadEvent::Completed {
                        archive_id: outcome.archive_id.clone(),
                    })
                    .await;
            }
            Err(e) => {
                self.state = terminal_state(e);
                error!(state = ?self.state, error = %e, "upload failed");
                let _ = self
                    .events_tx
                    .send(UploadEvent::Failed {
                        error: e.to_string(),
                    })
                    .await;
            }
        }

        result
    }

    async fn drive(
        &mut self,
        client: &dyn StorageClient,
        request: &UploadRequest,
    ) -> Result<UploadOutcome, UploadError> {
        debug!(
            archive = %request.archive.display(),
            size = request.archive_size,
            part_size = self.config.part_size,
            "planning upload"
        );

        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        // Whole-archive checksum, streamed leaf by leaf. Needed up front for
        // single-shot and for the multipart complete call.
        let checksum = {
            let path = request.archive.clone();
            let size = request.archive_size;
            tokio::task::spawn_blocking(move || coldvault_treehash::hash_file_range(&path, 0, size))
                .await
                .map_err(|e| std::io::Error::other(format!("task join error: {e}")))??
        };
        info!(checksum = %checksum, "computed archive tree hash");
        let _ = self
            .events_tx
            .send(UploadEvent::ChecksumComputed {
                checksum: checksum.to_hex(),
            })
            .await;

        if self.config.part_size >= request.archive_size {
            self.state = SessionState::SingleShot;
            self.single_shot(client, request, &checksum.to_hex()).await
        } else {
            self.state = SessionState::Multipart;
            self.multipart(client, request, &checksum.to_hex()).await
        }
    }

    /// One request carrying the whole archive. Failure is terminal; there is
    /// no session-level retry and nothing remote to abort.
    async fn single_shot(
        &mut self,
        client: &dyn StorageClient,
        request: &UploadRequest,
        checksum: &str,
    ) -> Result<UploadOutcome, UploadError> {
        let _ = self
            .events_tx
            .send(UploadEvent::Started {
                mode: UploadMode::SingleShot,
                total_parts: 1,
            })
            .await;
        info!(size = request.archive_size, "uploading archive in a single request");

        let body = {
            let path = request.archive.clone();
            tokio::task::spawn_blocking(move || std::fs::read(&path))
                .await
                .map_err(|e| std::io::Error::other(format!("task join error: {e}")))??
        };

        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let receipt = client
            .upload_archive(&request.vault, &request.description, &body, checksum)
            .await
            .map_err(|source| UploadError::SingleShot { source })?;
        Ok(receipt.into())
    }

    async fn multipart(
        &mut self,
        client: &dyn StorageClient,
        request: &UploadRequest,
        checksum: &str,
    ) -> Result<UploadOutcome, UploadError> {
        // Plan first: part-size validation must fail before any traffic.
        let parts = planner::plan_parts(request.archive_size, self.config.part_size)?;
        let total_parts = parts.len() as u32;

        let _ = self
            .events_tx
            .send(UploadEvent::Started {
                mode: UploadMode::Multipart,
                total_parts,
            })
            .await;

        let upload_id = client
            .initiate_multipart_upload(&request.vault, &request.description, self.config.part_size)
            .await
            .map_err(|source| UploadError::Initiate { source })?;
        info!(upload_id = %upload_id, parts = total_parts, "initiated multipart upload");
        let _ = self
            .events_tx
            .send(UploadEvent::Initiated {
                upload_id: upload_id.clone(),
            })
            .await;

        if let Err(cause) = self.upload_parts(client, request, &upload_id, parts).await {
            let _ = self
                .events_tx
                .send(UploadEvent::Aborting {
                    upload_id: upload_id.clone(),
                })
                .await;
            return Err(self.abort(client, &request.vault, &upload_id, cause).await);
        }

        if self.cancel.is_cancelled() {
            let _ = self
                .events_tx
                .send(UploadEvent::Aborting {
                    upload_id: upload_id.clone(),
                })
                .await;
            return Err(
                self.abort(client, &request.vault, &upload_id, UploadError::Cancelled)
                    .await,
            );
        }

        match client
            .complete_multipart_upload(&request.vault, &upload_id, request.archive_size, checksum)
            .await
        {
            Ok(receipt) => Ok(receipt.into()),
            Err(source) => {
                warn!(upload_id = %upload_id, error = %source, "complete failed, attempting abort");
                let _ = self
                    .events_tx
                    .send(UploadEvent::Aborting {
                        upload_id: upload_id.clone(),
                    })
                    .await;
                let cause = UploadError::Finalization {
                    upload_id: upload_id.clone(),
                    source,
                };
                Err(self.abort(client, &request.vault, &upload_id, cause).await)
            }
        }
    }

    /// Uploads all parts through the bounded worker pool.
    ///
    /// The first exhausted part (or local read failure) cancels dispatch of
    /// parts that have not started; in-flight parts drain naturally. Returns
    /// the first failure, which the caller turns into an abort.
    async fn upload_parts(
        &self,
        client: &dyn StorageClient,
        request: &UploadRequest,
        upload_id: &str,
        parts: Vec<PartSpec>,
    ) -> Result<(), UploadError> {
        let total_parts = parts.len() as u32;
        let uploader = PartUploader {
            client,
            vault: &request.vault,
            archive: &request.archive,
            archive_size: request.archive_size,
            upload_id,
            max_attempts: self.config.max_attempts,
            cancel: self.cancel.clone(),
            events: self.events_tx.clone(),
        };

        let mut completed: u32 = 0;
        let mut failure: Option<UploadError> = None;

        let mut results = futures_util::stream::iter(parts)
            .map(|spec| uploader.upload(spec))
            .buffer_unordered(self.config.workers.max(1));

        while let Some(item) = results.next().await {
            match item {
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                    self.cancel.cancel();
                }
                Ok(None) => {
                    // Never dispatched; the abort decision was already made.
                }
                Ok(Some(result)) => match result.outcome {
                    PartOutcome::Success => {
                        completed += 1;
                        let fraction = f64::from(completed) / f64::from(total_parts);
                        debug!(part = result.index, attempts = result.attempts, "part completed");
                        let _ = self
                            .events_tx
                            .send(UploadEvent::PartCompleted {
                                index: result.index,
                                total_parts,
                                fraction,
                            })
                            .await;
                    }
                    PartOutcome::ExhaustedRetries(source) => {
                        warn!(
                            part = result.index,
                            attempts = result.attempts,
                            "part exhausted retries"
                        );
                        if failure.is_none() {
                            failure = Some(UploadError::PartExhausted {
                                index: result.index,
                                attempts: result.attempts,
                                upload_id: upload_id.to_string(),
                                source,
                            });
                        }
                        self.cancel.cancel();
                    }
                },
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Tears down the remote multipart session.
    ///
    /// A successful abort surfaces `cause` unchanged; a failed abort wraps it
    /// in [`UploadError::AbortFailed`], which names the upload id for manual
    /// cleanup.
    async fn abort(
        &self,
        client: &dyn StorageClient,
        vault: &str,
        upload_id: &str,
        cause: UploadError,
    ) -> UploadError {
        match client.abort_multipart_upload(vault, upload_id).await {
            Ok(()) => {
                warn!(upload_id = %upload_id, "multipart upload aborted");
                cause
            }
            Err(source) => {
                error!(upload_id = %upload_id, error = %source, "abort failed; manual cleanup required");
                UploadError::AbortFailed {
                    upload_id: upload_id.to_string(),
                    source,
                    cause: Box::new(cause),
                }
            }
        }
    }
}

/// Runs an upload without observing events.
pub async fn run_upload(
    client: &dyn StorageClient,
    config: SessionConfig,
    request: &UploadRequest,
) -> Result<UploadOutcome, UploadError> {
    let mut session = UploadSession::new(config);
    // Nobody will drain events; drop the receiver so sends fail fast instead
    // of filling the buffer.
    drop(session.take_events());
    session.run(client, request).await
}

fn terminal_state(error: &UploadError) -> SessionState {
    match error {
        UploadError::PartExhausted { .. } | UploadError::Cancelled => SessionState::Aborted,
        _ => SessionState::Failed,
    }
}
