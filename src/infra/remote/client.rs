//! Shared HTTP client for the hosted backend.

use std::sync::Arc;

use reqwest::{Client, Method, Response, Url};
use serde::de::DeserializeOwned;

use crate::application::session::SessionHandle;
use crate::infra::error::RemoteError;

/// Typed wrapper over the backend's REST surface.
///
/// Attaches the project API key to every request and the viewer's bearer
/// token when a session is present. Response decoding failures are reported
/// as malformed documents, not panics.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base: Url,
    api_key: String,
    session: Arc<SessionHandle>,
}

impl BackendClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        session: Arc<SessionHandle>,
    ) -> Result<Self, RemoteError> {
        let base = Url::parse(base_url)?.join("/")?;
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self {
            client,
            base,
            api_key: api_key.into(),
            session,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("bookworm-data/", env!("CARGO_PKG_VERSION"))
    }

    pub fn url(&self, path: &str) -> Result<Url, RemoteError> {
        self.base.join(path).map_err(RemoteError::Url)
    }

    /// Issue a request and decode the JSON body.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<serde_json::Value>,
    ) -> Result<T, RemoteError> {
        let resp = self.send(method, path, query, body).await?;
        Self::decode(resp).await
    }

    /// Issue a request, discarding any response body.
    pub async fn request_unit(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<serde_json::Value>,
    ) -> Result<(), RemoteError> {
        let resp = self.send(method, path, query, body).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Self::status_error(status, resp).await);
        }
        Ok(())
    }

    /// Issue a request and return the raw bytes.
    pub async fn request_bytes(
        &self,
        method: Method,
        path: &str,
    ) -> Result<bytes::Bytes, RemoteError> {
        let resp = self.send(method, path, None, None).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Self::status_error(status, resp).await);
        }
        Ok(resp.bytes().await?)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<serde_json::Value>,
    ) -> Result<Response, RemoteError> {
        let mut url = self.url(path)?;
        if let Some(q) = query {
            url.set_query(None);
            let mut qp = url.query_pairs_mut();
            for (k, v) in q {
                qp.append_pair(k, v);
            }
        }

        let mut req = self
            .client
            .request(method, url)
            .header("x-api-key", &self.api_key);
        if let Some(token) = self.session.bearer_token() {
            req = req.bearer_auth(token);
        }
        if let Some(b) = body {
            req = req.json(&b);
        }

        Ok(req.send().await?)
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, RemoteError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(Self::status_to_error(
                status.as_u16(),
                String::from_utf8_lossy(&bytes).into_owned(),
            ));
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| RemoteError::malformed(format!("failed to parse body: {e}")))
    }

    async fn status_error(status: reqwest::StatusCode, resp: Response) -> RemoteError {
        let body = resp.text().await.unwrap_or_default();
        Self::status_to_error(status.as_u16(), body)
    }

    fn status_to_error(status: u16, body: String) -> RemoteError {
        match status {
            404 => RemoteError::NotFound,
            401 | 403 => RemoteError::Unauthenticated,
            _ => RemoteError::Status { status, body },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            BackendClient::status_to_error(404, String::new()),
            RemoteError::NotFound
        ));
        assert!(matches!(
            BackendClient::status_to_error(401, String::new()),
            RemoteError::Unauthenticated
        ));
        assert!(matches!(
            BackendClient::status_to_error(500, String::new()),
            RemoteError::Status { status: 500, .. }
        ));
    }

    #[test]
    fn user_agent_carries_version() {
        assert!(BackendClient::user_agent().starts_with("bookworm-data/"));
    }
}
