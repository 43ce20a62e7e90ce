//! Backend endpoints consumed by the session flows.
//!
//! DESIGN
//! ======
//! `AuthApi` is the seam between coordination logic and HTTP. The flows only
//! see typed grants and `ApiError`; `HttpAuthApi` is the reqwest-backed
//! implementation, and tests swap in a scripted mock.

mod http;

pub use http::HttpAuthApi;

use crate::error::ApiError;
use crate::types::{AuthGrant, LoginReply, RefreshGrant, TenantGrant, Validation};

#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// Stage 1: submit credentials.
    async fn login(&self, email: &str, password: &str) -> Result<LoginReply, ApiError>;

    /// Stage 2: submit the one-time code for a pending OTP session.
    async fn verify_otp(&self, otp_session_id: &str, code: &str) -> Result<AuthGrant, ApiError>;

    /// Ask the backend to send a fresh code for the same OTP session.
    async fn resend_otp(&self, otp_session_id: &str) -> Result<(), ApiError>;

    /// Revoke a refresh token server-side.
    async fn logout(&self, refresh_token: &str) -> Result<(), ApiError>;

    /// Exchange a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant, ApiError>;

    /// Check whether an access token is still accepted.
    async fn validate(&self, access_token: &str) -> Result<Validation, ApiError>;

    /// Re-scope the session to another tenant.
    async fn switch_tenant(&self, access_token: &str, tenant_id: &str) -> Result<TenantGrant, ApiError>;
}
