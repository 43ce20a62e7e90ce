//! Error taxonomy for the session subsystem.
//!
//! DESIGN
//! ======
//! Transport failures (`ApiError`) and persistence failures (`StorageError`)
//! are kept apart from flow-level failures (`AuthError`). Server rejections
//! are mapped onto a fixed `ErrorKind` by an `ErrorClassifier`; every call
//! site goes through that seam, so the substring heuristic can be swapped for
//! structured server codes without touching the flows.
//!
//! TRADE-OFFS
//! ==========
//! The default classifier matches message text. It is coupled to the copy the
//! backend happens to send (English and Portuguese), and an unknown message
//! falls back to `Unclassified` rather than guessing.

use std::fmt;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Stable, grepable code attached to an error.
pub trait ErrorCode: fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// Errors produced while talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, timeout, reset).
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("backend returned status {status}: {message}")]
    Response { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    /// True for an explicit `401 Unauthorized` answer.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Response { status: 401, .. })
    }

    /// Server-supplied message text, when the backend sent one.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Response { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}

impl ErrorCode for ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_API_REQUEST",
            Self::Response { .. } => "E_API_RESPONSE",
            Self::Parse(_) => "E_API_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Errors produced by a `KeyValueStore`.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("value for `{key}` could not be encoded or decoded: {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage file {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
}

impl ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "E_STORAGE_IO",
            Self::Serde { .. } => "E_STORAGE_SERDE",
            Self::Corrupt { .. } => "E_STORAGE_CORRUPT",
        }
    }
}

// =============================================================================
// KINDS
// =============================================================================

/// What went wrong, as far as the user is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidCredentials,
    InvalidOtp,
    SessionExpired,
    AccountInactive,
    PasswordTooShort,
    PasswordMismatch,
    LinkInvalid,
    Network,
    Unclassified,
}

impl ErrorKind {
    /// Copy shown to the user for this kind.
    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Invalid email or password.",
            Self::InvalidOtp => "The verification code is invalid or has expired.",
            Self::SessionExpired => "Your session has expired. Please sign in again.",
            Self::AccountInactive => "This account is inactive. Contact your administrator.",
            Self::PasswordTooShort => "The password is too short.",
            Self::PasswordMismatch => "The passwords do not match.",
            Self::LinkInvalid => "This link is invalid or has expired.",
            Self::Network => "Could not reach the server. Check your connection.",
            Self::Unclassified => "Something went wrong. Please try again.",
        }
    }

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::InvalidOtp => "E_INVALID_OTP",
            Self::SessionExpired => "E_SESSION_EXPIRED",
            Self::AccountInactive => "E_ACCOUNT_INACTIVE",
            Self::PasswordTooShort => "E_PASSWORD_TOO_SHORT",
            Self::PasswordMismatch => "E_PASSWORD_MISMATCH",
            Self::LinkInvalid => "E_LINK_INVALID",
            Self::Network => "E_NETWORK",
            Self::Unclassified => "E_UNCLASSIFIED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// CLASSIFIER
// =============================================================================

/// Maps a backend failure onto an `ErrorKind`.
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &ApiError) -> ErrorKind;
}

/// Substring patterns checked in order; first match wins.
const PATTERNS: &[(&str, ErrorKind)] = &[
    ("invalid credentials", ErrorKind::InvalidCredentials),
    ("credenciais inválidas", ErrorKind::InvalidCredentials),
    ("senha incorreta", ErrorKind::InvalidCredentials),
    ("incorrect password", ErrorKind::InvalidCredentials),
    ("invalid otp", ErrorKind::InvalidOtp),
    ("invalid code", ErrorKind::InvalidOtp),
    ("expired code", ErrorKind::InvalidOtp),
    ("código inválido", ErrorKind::InvalidOtp),
    ("código expirado", ErrorKind::InvalidOtp),
    ("session expired", ErrorKind::SessionExpired),
    ("sessão expirada", ErrorKind::SessionExpired),
    ("inactive", ErrorKind::AccountInactive),
    ("inativ", ErrorKind::AccountInactive),
    ("too short", ErrorKind::PasswordTooShort),
    ("pelo menos", ErrorKind::PasswordTooShort),
    ("at least", ErrorKind::PasswordTooShort),
    ("do not match", ErrorKind::PasswordMismatch),
    ("não coincidem", ErrorKind::PasswordMismatch),
    ("link", ErrorKind::LinkInvalid),
    ("token inválido", ErrorKind::LinkInvalid),
    ("invalid token", ErrorKind::LinkInvalid),
];

/// Default classifier: case-insensitive substring match on the server message.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringClassifier;

impl ErrorClassifier for SubstringClassifier {
    fn classify(&self, error: &ApiError) -> ErrorKind {
        match error {
            ApiError::Request(_) => ErrorKind::Network,
            ApiError::Response { message, .. } => classify_message(message),
            ApiError::Parse(_) | ApiError::HttpClientBuild(_) => ErrorKind::Unclassified,
        }
    }
}

#[must_use]
pub fn classify_message(message: &str) -> ErrorKind {
    let lowered = message.to_lowercase();
    PATTERNS
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map_or(ErrorKind::Unclassified, |(_, kind)| *kind)
}

// =============================================================================
// FLOW ERRORS
// =============================================================================

/// Errors surfaced by the session flows.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The backend rejected the request; `kind` is the classified reason.
    #[error("{kind}: {message}")]
    Rejected {
        kind: ErrorKind,
        message: String,
        #[source]
        source: ApiError,
    },

    #[error("persistence failed: {0}")]
    Storage(#[from] StorageError),

    #[error("no verification is pending")]
    NoOtpSession,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("role `{role}` may not switch tenants")]
    NotPrivileged { role: String },

    #[error("another sign-in step is already in progress")]
    Busy,

    #[error("session expired")]
    SessionExpired,
}

impl AuthError {
    /// Classify a backend failure through `classifier`.
    #[must_use]
    pub fn rejected(classifier: &dyn ErrorClassifier, source: ApiError) -> Self {
        let kind = classifier.classify(&source);
        let message = source
            .server_message()
            .map_or_else(|| kind.user_message().to_owned(), str::to_owned);
        Self::Rejected { kind, message, source }
    }

    /// The classified kind, for errors that map onto one.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Rejected { kind, .. } => *kind,
            Self::SessionExpired => ErrorKind::SessionExpired,
            Self::Storage(_)
            | Self::NoOtpSession
            | Self::NotAuthenticated
            | Self::NotPrivileged { .. }
            | Self::Busy => ErrorKind::Unclassified,
        }
    }

    /// Text suitable for a user-facing toast.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } => message.clone(),
            Self::NotPrivileged { .. } => "You are not allowed to switch organizations.".to_owned(),
            Self::Busy => "Please wait for the current request to finish.".to_owned(),
            Self::NoOtpSession => "Start the sign-in again to receive a new code.".to_owned(),
            other => other.kind().user_message().to_owned(),
        }
    }
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Rejected { kind, .. } => kind.code(),
            Self::Storage(e) => e.error_code(),
            Self::NoOtpSession => "E_NO_OTP_SESSION",
            Self::NotAuthenticated => "E_NOT_AUTHENTICATED",
            Self::NotPrivileged { .. } => "E_NOT_PRIVILEGED",
            Self::Busy => "E_BUSY",
            Self::SessionExpired => "E_SESSION_EXPIRED",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Rejected { source, .. } => source.retryable(),
            Self::Busy => true,
            _ => false,
        }
    }
}

// =============================================================================
// STAGE FAILURES
// =============================================================================

/// Which half of the two-stage sign-in failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    Credentials,
    Otp,
}

/// How the sign-in form should recover from a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormReset {
    /// Clear only the password field.
    Password,
    /// Clear every code digit and focus the first box.
    OtpDigits,
}

/// A failed sign-in step. The session is left exactly as it was before the
/// step started.
#[derive(Debug, thiserror::Error)]
#[error("{stage:?} step failed: {error}")]
pub struct StageFailure {
    pub stage: LoginStage,
    #[source]
    pub error: AuthError,
}

impl StageFailure {
    #[must_use]
    pub fn new(stage: LoginStage, error: AuthError) -> Self {
        Self { stage, error }
    }

    #[must_use]
    pub fn reset(&self) -> FormReset {
        match self.stage {
            LoginStage::Credentials => FormReset::Password,
            LoginStage::Otp => FormReset::OtpDigits,
        }
    }
}

impl ErrorCode for StageFailure {
    fn error_code(&self) -> &'static str {
        self.error.error_code()
    }

    fn retryable(&self) -> bool {
        self.error.retryable()
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
