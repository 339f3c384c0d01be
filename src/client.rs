//! HTTP client for the token service management API.
//!
//! Thin typed wrapper over the four REST routes:
//! - `GET /list-tokens` full snapshot
//! - `POST /add-token` mint, returns the one-time plaintext
//! - `POST /revoke-token` by ID or by plaintext value
//! - `POST /edit-token` rate limit update
//!
//! Failures are split into transport errors and non-2xx rejections here;
//! turning them into user-facing wording is the session's job.

use std::time::Duration;

use reqwest::Client;

use crate::config::Config;
use crate::errors::SessionError;
use crate::models::token::{
    AddTokenRequest, AddTokenResponse, ApiToken, EditTokenRequest, RevokeResponse, RevokeSelector,
};

pub struct TokenServiceClient {
    base_url: String,
    /// Opaque admin credential, sent verbatim as the Authorization value.
    admin_token: String,
    http: Client,
}

impl TokenServiceClient {
    /// Create a client for the service at `base_url` with default timeouts.
    pub fn new(base_url: impl Into<String>, admin_token: impl Into<String>) -> Self {
        Self::with_timeouts(base_url, admin_token, 30, 5)
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::with_timeouts(
            cfg.base_url.clone(),
            cfg.admin_token.clone(),
            cfg.timeout_secs,
            cfg.connect_timeout_secs,
        )
    }

    fn with_timeouts(
        base_url: impl Into<String>,
        admin_token: impl Into<String>,
        timeout_secs: u64,
        connect_timeout_secs: u64,
    ) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Self { base_url, admin_token: admin_token.into(), http }
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    /// Attach the credential, send, and map the response: transport errors
    /// become `Network`, non-2xx statuses become `Rejected` with the body
    /// captured for logging.
    async fn send(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SessionError> {
        let resp = req
            .header(reqwest::header::AUTHORIZATION, self.admin_token.as_str())
            .send()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SessionError::Rejected { status: status.as_u16(), body });
        }

        Ok(resp)
    }

    /// Full snapshot of the service's token collection.
    pub async fn list_tokens(&self) -> Result<Vec<ApiToken>, SessionError> {
        let resp = self.send(self.http.get(self.url("/list-tokens"))).await?;
        resp.json::<Vec<ApiToken>>()
            .await
            .map_err(|e| SessionError::Network(format!("invalid token list payload: {}", e)))
    }

    /// Mint a token under `id`. Returns the plaintext, which the service
    /// never repeats.
    pub async fn add_token(
        &self,
        id: &str,
        rate_limit: Option<u64>,
    ) -> Result<String, SessionError> {
        let body = AddTokenRequest { id: id.to_string(), rate_limit };
        let resp = self
            .send(self.http.post(self.url("/add-token")).json(&body))
            .await?;
        let parsed: AddTokenResponse = resp
            .json()
            .await
            .map_err(|e| SessionError::Network(format!("invalid add-token payload: {}", e)))?;
        Ok(parsed.token)
    }

    /// Revoke the token matching `selector`. Returns the service's message.
    pub async fn revoke_token(&self, selector: &RevokeSelector) -> Result<String, SessionError> {
        let resp = self
            .send(self.http.post(self.url("/revoke-token")).json(selector))
            .await?;
        let parsed: RevokeResponse = resp
            .json()
            .await
            .map_err(|e| SessionError::Network(format!("invalid revoke payload: {}", e)))?;
        Ok(parsed.message)
    }

    /// Update the rate limit on `id`.
    pub async fn edit_token(&self, id: &str, rate_limit: u64) -> Result<(), SessionError> {
        let body = EditTokenRequest { id: id.to_string(), rate_limit };
        self.send(self.http.post(self.url("/edit-token")).json(&body))
            .await?;
        Ok(())
    }
}
