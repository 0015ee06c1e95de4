//! Auth provider client: email/password accounts and token refresh.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;

use crate::application::sources::{AuthSource, AuthTokens};
use crate::infra::error::RemoteError;

use super::types::parse_id;

#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base: Url,
    api_key: String,
}

impl AuthClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, RemoteError> {
        let base = Url::parse(base_url)?.join("/")?;
        let client = Client::builder()
            .user_agent(concat!("bookworm-data/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base,
            api_key: api_key.into(),
        })
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, RemoteError> {
        let url = self.base.join(path)?;
        let resp = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(RemoteError::Unauthenticated);
        }
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| RemoteError::malformed(format!("failed to parse auth body: {e}")))
    }

    async fn post_unit(&self, path: &str, body: serde_json::Value) -> Result<(), RemoteError> {
        let url = self.base.join(path)?;
        let resp = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TokensDto {
    user_id: String,
    id_token: String,
    refresh_token: String,
    expires_in_secs: u64,
}

impl TokensDto {
    fn into_tokens(self) -> Result<AuthTokens, RemoteError> {
        Ok(AuthTokens {
            user_id: parse_id("user_id", &self.user_id)?,
            id_token: self.id_token,
            refresh_token: self.refresh_token,
            expires_in_secs: self.expires_in_secs,
        })
    }
}

#[async_trait]
impl AuthSource for AuthClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthTokens, RemoteError> {
        let dto: TokensDto = self
            .post(
                "v1/accounts:signUp",
                json!({ "email": email, "password": password }),
            )
            .await?;
        dto.into_tokens()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthTokens, RemoteError> {
        let dto: TokensDto = self
            .post(
                "v1/accounts:signInWithPassword",
                json!({ "email": email, "password": password }),
            )
            .await?;
        dto.into_tokens()
    }

    async fn sign_out(&self, refresh_token: &str) -> Result<(), RemoteError> {
        self.post_unit(
            "v1/accounts:signOut",
            json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, RemoteError> {
        let dto: TokensDto = self
            .post("v1/token", json!({ "refresh_token": refresh_token }))
            .await?;
        dto.into_tokens()
    }
}
