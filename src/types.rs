//! Wire and domain types shared by the session flows.
//!
//! The backend speaks camelCase JSON. Raw response shapes are decoded into
//! loose structs first and then narrowed into enums/grants, so a response
//! that carries neither an OTP challenge nor a complete grant is rejected at
//! the edge instead of leaking half a session into the store.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// =============================================================================
// IDENTITY
// =============================================================================

/// Role assigned to an operator by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Supervisor,
    Agent,
    #[serde(other)]
    Unknown,
}

impl Role {
    /// Only super admins may act on behalf of another tenant.
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::SuperAdmin)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Supervisor => "supervisor",
            Self::Agent => "agent",
            Self::Unknown => "unknown",
        }
    }
}

/// The signed-in operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

/// Customer organization a privileged operator can act for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
}

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest<'a> {
    pub otp_session_id: &'a str,
    pub candidate_code: &'a str,
}

// =============================================================================
// GRANTS
// =============================================================================

/// A complete, server-confirmed authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub token: String,
    pub refresh_token: Option<String>,
    pub user: User,
}

/// Result of the credentials stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginReply {
    /// A one-time code was sent; `otp_session_id` is absent when the server omitted it.
    OtpRequired { otp_session_id: Option<String> },
    Authenticated(AuthGrant),
}

/// Renewed credentials from the refresh endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshGrant {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Answer of the session validation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Validation {
    pub valid: bool,
    #[serde(default)]
    pub user: Option<User>,
}

/// Token re-scoped to another tenant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantGrant {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub tenant: Tenant,
}

// =============================================================================
// RAW RESPONSES
// =============================================================================

/// Loose shape shared by the login and OTP verification endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(default)]
    pub requires_otp: bool,
    #[serde(default)]
    pub otp_session_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

impl AuthResponse {
    /// Narrow a credentials-stage response.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Parse` if the response is neither an OTP challenge
    /// nor a complete token + user pair.
    pub fn into_login_reply(self) -> Result<LoginReply, ApiError> {
        if self.requires_otp {
            let otp_session_id = self.otp_session_id.filter(|id| !id.is_empty());
            return Ok(LoginReply::OtpRequired { otp_session_id });
        }
        self.into_grant().map(LoginReply::Authenticated)
    }

    /// Narrow a response that must carry a complete grant.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Parse` if the token or user is missing.
    pub fn into_grant(self) -> Result<AuthGrant, ApiError> {
        match (self.token, self.user) {
            (Some(token), Some(user)) if !token.is_empty() => {
                Ok(AuthGrant { token, refresh_token: self.refresh_token.filter(|t| !t.is_empty()), user })
            }
            _ => Err(ApiError::Parse("auth response carried no token and user".into())),
        }
    }
}

/// Render a token for logs without exposing it.
#[must_use]
pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= 16 {
        return "***".to_owned();
    }
    let prefix: String = token.chars().take(8).collect();
    format!("{prefix}...")
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
