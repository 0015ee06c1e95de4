//! Blob storage client for post images and avatars.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, pin_mut, stream};
use reqwest::{Client, Url};
use sha2::{Digest, Sha256};

use crate::application::session::SessionHandle;
use crate::application::sources::{BlobKey, MediaSource, StoredBlob};
use crate::infra::error::RemoteError;

/// HTTP-backed blob store.
///
/// Blobs live at `{base}/{entity-type}/{entity-id}/{index}`; uploads carry a
/// sha256 checksum header so the backend can reject truncated payloads.
#[derive(Clone)]
pub struct BlobStorage {
    client: Client,
    base: Url,
    api_key: String,
    session: Arc<SessionHandle>,
}

impl BlobStorage {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        session: Arc<SessionHandle>,
    ) -> Result<Self, RemoteError> {
        let base = Url::parse(base_url)?.join("/")?;
        let client = Client::builder()
            .user_agent(concat!("bookworm-data/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base,
            api_key: api_key.into(),
            session,
        })
    }

    /// Upload a payload arriving as a stream of chunks.
    ///
    /// Chunks are accumulated and hashed incrementally; an empty payload is
    /// rejected before any request is issued.
    pub async fn store_stream<S>(
        &self,
        key: &BlobKey,
        content_type: &str,
        payload: S,
    ) -> Result<StoredBlob, RemoteError>
    where
        S: futures::Stream<Item = Result<Bytes, RemoteError>>,
    {
        let mut hasher = Sha256::new();
        let mut buffer = BytesMut::new();

        pin_mut!(payload);
        while let Some(chunk) = payload.next().await {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            hasher.update(&chunk);
            buffer.extend_from_slice(&chunk);
        }

        if buffer.is_empty() {
            return Err(RemoteError::malformed("upload payload is empty"));
        }

        let checksum = hex::encode(hasher.finalize());
        let size_bytes = buffer.len() as u64;
        let path = key.path();
        let url = self.base.join(&path)?;

        let mut req = self
            .client
            .put(url)
            .header("x-api-key", &self.api_key)
            .header("content-type", content_type)
            .header("x-content-sha256", &checksum)
            .body(buffer.freeze());
        if let Some(token) = self.session.bearer_token() {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(StoredBlob {
            path,
            checksum,
            size_bytes,
        })
    }
}

#[async_trait]
impl MediaSource for BlobStorage {
    async fn store_image(
        &self,
        key: &BlobKey,
        payload: Bytes,
        content_type: &str,
    ) -> Result<StoredBlob, RemoteError> {
        self.store_stream(key, content_type, stream::once(async { Ok(payload) }))
            .await
    }

    async fn fetch_image(&self, path: &str) -> Result<Bytes, RemoteError> {
        let url = self.base.join(path)?;
        let mut req = self.client.get(url).header("x-api-key", &self.api_key);
        if let Some(token) = self.session.bearer_token() {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status.as_u16() == 404 {
            return Err(RemoteError::NotFound);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.bytes().await?)
    }
}

/// Guess a content type from the uploaded file's name.
pub fn content_type_for(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_guessing() {
        assert_eq!(content_type_for("cover.jpg"), "image/jpeg");
        assert_eq!(content_type_for("cover.png"), "image/png");
        assert_eq!(content_type_for("mystery"), "application/octet-stream");
    }

    #[tokio::test]
    async fn empty_payload_is_rejected_before_upload() {
        let storage = BlobStorage::new(
            "http://localhost:1/",
            "key",
            Arc::new(SessionHandle::new()),
        )
        .expect("client");

        let err = storage
            .store_image(&BlobKey::avatar(uuid::Uuid::nil()), Bytes::new(), "image/png")
            .await
            .expect_err("empty payload");
        assert!(matches!(err, RemoteError::Malformed { .. }));
    }
}
