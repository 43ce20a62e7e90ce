//! reqwest implementation of `AuthApi`.
//!
//! Thin HTTP wrapper; response parsing is pure (`parse_body`,
//! `error_message`) for testability.

use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::AuthApi;
use crate::config::{HttpTimeouts, SessionConfig};
use crate::error::ApiError;
use crate::types::{
    AuthGrant, AuthResponse, LoginReply, LoginRequest, RefreshGrant, TenantGrant, Validation, VerifyOtpRequest,
};

const LOGIN_PATH: &str = "/auth/login";
const VERIFY_OTP_PATH: &str = "/auth/verify-otp";
const RESEND_OTP_PATH: &str = "/auth/resend-otp";
const LOGOUT_PATH: &str = "/auth/logout";
const REFRESH_PATH: &str = "/auth/refresh";
const VALIDATE_PATH: &str = "/auth/validate";
const SWITCH_TENANT_PATH: &str = "/auth/switch-tenant";

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpAuthApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAuthApi {
    /// Build a client for `base_url` (no trailing slash).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeouts: HttpTimeouts) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request())
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { http, base_url })
    }

    /// Build a client from typed session config.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn from_config(config: &SessionConfig) -> Result<Self, ApiError> {
        Self::new(config.api_url.clone(), config.timeouts)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_json<B, T>(&self, path: &str, bearer: Option<&str>, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let mut request = self.http.post(self.url(path)).json(body);
        if let Some(token) = bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let text = send(request).await?;
        parse_body(&text)
    }

    async fn post_ack<B>(&self, path: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        send(self.http.post(self.url(path)).json(body)).await?;
        Ok(())
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<String, ApiError> {
    let response = request
        .send()
        .await
        .map_err(|e| ApiError::Request(e.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ApiError::Request(e.to_string()))?;

    if !status.is_success() {
        return Err(ApiError::Response { status: status.as_u16(), message: error_message(&text) });
    }
    Ok(text)
}

#[async_trait::async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginReply, ApiError> {
        let response: AuthResponse = self
            .post_json(LOGIN_PATH, None, &LoginRequest { email, password })
            .await?;
        response.into_login_reply()
    }

    async fn verify_otp(&self, otp_session_id: &str, code: &str) -> Result<AuthGrant, ApiError> {
        let response: AuthResponse = self
            .post_json(VERIFY_OTP_PATH, None, &VerifyOtpRequest { otp_session_id, candidate_code: code })
            .await?;
        response.into_grant()
    }

    async fn resend_otp(&self, otp_session_id: &str) -> Result<(), ApiError> {
        self.post_ack(RESEND_OTP_PATH, &serde_json::json!({ "otpSessionId": otp_session_id }))
            .await
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        self.post_ack(LOGOUT_PATH, &serde_json::json!({ "refreshToken": refresh_token }))
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant, ApiError> {
        self.post_json(REFRESH_PATH, None, &serde_json::json!({ "refreshToken": refresh_token }))
            .await
    }

    async fn validate(&self, access_token: &str) -> Result<Validation, ApiError> {
        let request = self
            .http
            .get(self.url(VALIDATE_PATH))
            .header(AUTHORIZATION, format!("Bearer {access_token}"));
        let text = send(request).await?;
        parse_body(&text)
    }

    async fn switch_tenant(&self, access_token: &str, tenant_id: &str) -> Result<TenantGrant, ApiError> {
        self.post_json(SWITCH_TENANT_PATH, Some(access_token), &serde_json::json!({ "tenantId": tenant_id }))
            .await
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    serde_json::from_str(text).map_err(|e| ApiError::Parse(e.to_string()))
}

/// Pull the human-readable message out of an error body.
///
/// Accepts `{"message": ...}` or `{"error": ...}`; anything else is returned
/// trimmed as-is.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["message", "error"] {
            if let Some(message) = value.get(field).and_then(serde_json::Value::as_str) {
                return message.to_owned();
            }
        }
    }
    body.trim().to_owned()
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
