//! `reqwest` implementation of [`AuthApi`].

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;

use crmdesk_auth::{CredentialPair, SessionPayload};

use crate::api::{AuthApi, AuthError, LoginRequest, LoginResponse};

/// Talks to the CRM backend over HTTP.
///
/// Transport failures (refused connection, DNS, timeout) map to status `0`.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, req: reqwest::RequestBuilder, credentials: &CredentialPair) -> reqwest::RequestBuilder {
        match &credentials.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, AuthError> {
        let resp = req
            .send()
            .await
            .map_err(|e| AuthError::unreachable(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(AuthError::new(status.as_u16(), error_message(status, &body)))
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, AuthError> {
        let resp = self.send(req).await?;
        let status = resp.status().as_u16();
        resp.json()
            .await
            .map_err(|e| AuthError::new(status, format!("unexpected response body: {e}")))
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        let req = self.client.post(self.url("/auth/login")).json(request);
        self.send_json(req).await
    }

    async fn get_current_user(&self, credentials: &CredentialPair) -> Result<SessionPayload, AuthError> {
        let req = self.authorized(self.client.get(self.url("/auth/me")), credentials);
        self.send_json(req).await
    }

    async fn logout(&self, credentials: &CredentialPair) -> Result<(), AuthError> {
        let req = self.authorized(self.client.post(self.url("/auth/logout")), credentials);
        self.send(req).await?;
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, AuthError> {
        let req = self
            .client
            .post(self.url("/auth/refresh"))
            .json(&json!({ "refreshToken": refresh_token }));
        self.send_json(req).await
    }
}

/// Prefer the backend's `{"message": ...}`, then the raw body, then the
/// status reason.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    status.canonical_reason().unwrap_or("request failed").to_string()
}
