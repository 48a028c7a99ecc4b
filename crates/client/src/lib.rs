//! HTTP client for the vault storage service.
//!
//! Implements [`StorageClient`] over the service's REST surface with
//! `reqwest`, plus a plain bucket object PUT used for sidecar info files.
//! All checksums travel as lowercase tree-hash hex in the `x-tree-hash`
//! header; part placement uses the standard `Content-Range` header in the
//! inclusive `bytes start-end/total` form.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::CONTENT_RANGE;
use serde::Deserialize;
use tracing::debug;

use coldvault_upload::storage::{
    ArchiveReceipt, ByteRange, StorageClient, StorageError, StorageFuture, VaultInfo,
};

const HDR_DESCRIPTION: &str = "x-archive-description";
const HDR_TREE_HASH: &str = "x-tree-hash";
const HDR_PART_SIZE: &str = "x-part-size";
const HDR_ARCHIVE_SIZE: &str = "x-archive-size";

/// Per-request timeout.
///
/// Covers a full part transfer, so it is generous; the retry loop above this
/// client handles requests that stall past it.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// `reqwest`-backed vault service client.
pub struct VaultHttpClient {
    http: reqwest::Client,
    base_url: String,
}

impl VaultHttpClient {
    /// Creates a client for the service at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request and maps the response status onto [`StorageError`].
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<reqwest::Response, StorageError> {
        let response = request
            .send()
            .await
            .map_err(|e| StorageError::Transport(format!("{what}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Service(format!("{what}: {status}: {body}")));
        }
        Ok(response)
    }

    async fn json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T, StorageError> {
        let response = self.execute(request, what).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| StorageError::Service(format!("{what}: malformed response: {e}")))
    }

    /// Stores an object in a bucket.
    ///
    /// Not part of [`StorageClient`]: the upload engine never touches
    /// buckets beyond existence checks, but the CLI parks sidecar info files
    /// there next to the archive receipt.
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), StorageError> {
        debug!(bucket, key, bytes = body.len(), "putting object");
        let request = self
            .http
            .put(self.url(&format!("/buckets/{bucket}/objects/{key}")))
            .body(body);
        self.execute(request, "put object").await.map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitiateResponse {
    upload_id: String,
}

impl StorageClient for VaultHttpClient {
    fn describe_vault<'a>(&'a self, vault: &'a str) -> StorageFuture<'a, VaultInfo> {
        Box::pin(async move {
            let request = self.http.get(self.url(&format!("/vaults/{vault}")));
            self.json(request, "describe vault").await
        })
    }

    fn head_bucket<'a>(&'a self, bucket: &'a str) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let request = self.http.head(self.url(&format!("/buckets/{bucket}")));
            self.execute(request, "head bucket").await.map(|_| ())
        })
    }

    fn upload_archive<'a>(
        &'a self,
        vault: &'a str,
        description: &'a str,
        body: &'a [u8],
        checksum: &'a str,
    ) -> StorageFuture<'a, ArchiveReceipt> {
        Box::pin(async move {
            debug!(vault, bytes = body.len(), "uploading archive");
            let request = self
                .http
                .post(self.url(&format!("/vaults/{vault}/archives")))
                .header(HDR_DESCRIPTION, description)
                .header(HDR_TREE_HASH, checksum)
                .body(body.to_vec());
            self.json(request, "upload archive").await
        })
    }

    fn initiate_multipart_upload<'a>(
        &'a self,
        vault: &'a str,
        description: &'a str,
        part_size: u64,
    ) -> StorageFuture<'a, String> {
        Box::pin(async move {
            let request = self
                .http
                .post(self.url(&format!("/vaults/{vault}/multipart-uploads")))
                .header(HDR_DESCRIPTION, description)
                .header(HDR_PART_SIZE, part_size);
            let response: InitiateResponse =
                self.json(request, "initiate multipart upload").await?;
            Ok(response.upload_id)
        })
    }

    fn upload_multipart_part<'a>(
        &'a self,
        vault: &'a str,
        upload_id: &'a str,
        range: ByteRange,
        body: &'a [u8],
        checksum: &'a str,
    ) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let request = self
                .http
                .put(self.url(&format!("/vaults/{vault}/multipart-uploads/{upload_id}")))
                .header(CONTENT_RANGE, range.to_string())
                .header(HDR_TREE_HASH, checksum)
                .body(body.to_vec());
            self.execute(request, "upload part").await.map(|_| ())
        })
    }

    fn complete_multipart_upload<'a>(
        &'a self,
        vault: &'a str,
        upload_id: &'a str,
        archive_size: u64,
        checksum: &'a str,
    ) -> StorageFuture<'a, ArchiveReceipt> {
        Box::pin(async move {
            let request = self
                .http
                .post(self.url(&format!(
                    "/vaults/{vault}/multipart-uploads/{upload_id}/complete"
                )))
                .header(HDR_ARCHIVE_SIZE, archive_size)
                .header(HDR_TREE_HASH, checksum);
            self.json(request, "complete multipart upload").await
        })
    }

    fn abort_multipart_upload<'a>(
        &'a self,
        vault: &'a str,
        upload_id: &'a str,
    ) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let request = self
                .http
                .delete(self.url(&format!("/vaults/{vault}/multipart-uploads/{upload_id}")));
            self.execute(request, "abort multipart upload")
                .await
                .map(|_| ())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Starts a one-shot HTTP server that captures the request head and
    /// responds with the given status and body.
    async fn mock_server(
        status: u16,
        body: &str,
    ) -> (String, Arc<Mutex<String>>, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");
        let body = body.to_string();
        let captured = Arc::new(Mutex::new(String::new()));
        let captured_clone = Arc::clone(&captured);

        let handle = tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 16384];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                *captured_clone.lock().unwrap() = String::from_utf8_lossy(&buf[..n]).into_owned();

                let reason = if status == 200 { "OK" } else { "ERR" };
                let resp = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (url, captured, handle)
    }

    #[tokio::test]
    async fn describe_vault_parses_camel_case() {
        let (url, _req, handle) = mock_server(
            200,
            r#"{"vaultName":"photos","numberOfArchives":7,"sizeInBytes":123}"#,
        )
        .await;

        let client = VaultHttpClient::new(&url).unwrap();
        let info = client.describe_vault("photos").await.unwrap();
        assert_eq!(info.vault_name, "photos");
        assert_eq!(info.number_of_archives, 7);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn not_found_maps_to_not_found() {
        let (url, _req, handle) = mock_server(404, "").await;

        let client = VaultHttpClient::new(&url).unwrap();
        let err = client.describe_vault("nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn server_error_maps_to_service() {
        let (url, _req, handle) = mock_server(500, "boom").await;

        let client = VaultHttpClient::new(&url).unwrap();
        let err = client.describe_vault("photos").await.unwrap_err();
        assert!(matches!(err, StorageError::Service(_)));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_server_maps_to_transport() {
        // Nothing listens on this port.
        let client = VaultHttpClient::new("http://127.0.0.1:1").unwrap();
        let err = client.head_bucket("records").await.unwrap_err();
        assert!(matches!(err, StorageError::Transport(_)));
    }

    #[tokio::test]
    async fn part_upload_sends_range_and_checksum_headers() {
        let (url, req, handle) = mock_server(200, "").await;

        let client = VaultHttpClient::new(&url).unwrap();
        let range = ByteRange {
            start: 0,
            end: 1023,
            total: 4096,
        };
        client
            .upload_multipart_part("photos", "upload-9", range, b"data", "abc123")
            .await
            .unwrap();
        handle.await.unwrap();

        let head = req.lock().unwrap().clone();
        assert!(head.starts_with("PUT /vaults/photos/multipart-uploads/upload-9 "));
        assert!(head.contains("content-range: bytes 0-1023/4096"));
        assert!(head.contains("x-tree-hash: abc123"));
    }

    #[tokio::test]
    async fn initiate_returns_upload_id() {
        let (url, req, handle) = mock_server(200, r#"{"uploadId":"upload-42"}"#).await;

        let client = VaultHttpClient::new(&url).unwrap();
        let upload_id = client
            .initiate_multipart_upload("photos", "holiday backup", 1_048_576)
            .await
            .unwrap();
        assert_eq!(upload_id, "upload-42");
        handle.await.unwrap();

        let head = req.lock().unwrap().clone();
        assert!(head.starts_with("POST /vaults/photos/multipart-uploads "));
        assert!(head.contains("x-part-size: 1048576"));
    }

    #[tokio::test]
    async fn put_object_targets_bucket_path() {
        let (url, req, handle) = mock_server(200, "").await;

        let client = VaultHttpClient::new(&url).unwrap();
        client
            .put_object("records", "backup_info.json", b"{}".to_vec())
            .await
            .unwrap();
        handle.await.unwrap();

        let head = req.lock().unwrap().clone();
        assert!(head.starts_with("PUT /buckets/records/objects/backup_info.json "));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = VaultHttpClient::new("http://example.test/").unwrap();
        assert_eq!(client.url("/vaults/v"), "http://example.test/vaults/v");
    }
}
