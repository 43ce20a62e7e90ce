//! Authorized request wrapper.
//!
//! Reference consumer of the refresh contract: hold the request while a
//! refresh is pending, attach the current bearer token, and on a 401 join or
//! start one refresh and retry once. If that refresh fails the session is
//! force-logged-out with the "expired" hint.

use std::future::Future;

use crate::error::{ApiError, AuthError};
use crate::services::{logout, refresh};
use crate::session::SessionManager;

/// Send a request built by `send` with the session's bearer token.
///
/// `send` receives the access token and may be called twice: once with the
/// current token and, after a 401 and a successful refresh, once more with the
/// renewed one.
///
/// # Errors
///
/// Returns `NotAuthenticated` when no token is stored, `SessionExpired` when
/// the token was rejected and could not be renewed, and a classified
/// rejection for any other failure.
pub async fn send_authorized<T, F, Fut>(session: &SessionManager, mut send: F) -> Result<T, AuthError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    if session.refresh().is_refreshing() {
        tracing::debug!("holding request until refresh completes");
        session.refresh().wait_for_refresh().await;
    }
    let token = session.state().access_token().ok_or(AuthError::NotAuthenticated)?;

    match send(token).await {
        Err(e) if e.is_unauthorized() => {}
        other => return other.map_err(|e| AuthError::rejected(session.classifier(), e)),
    }

    if !refresh::refresh_token(session).await {
        logout::force_logout(session, true);
        return Err(AuthError::SessionExpired);
    }
    let token = session.state().access_token().ok_or(AuthError::SessionExpired)?;
    tracing::debug!("retrying request with renewed token");
    send(token)
        .await
        .map_err(|e| AuthError::rejected(session.classifier(), e))
}

#[cfg(test)]
#[path = "interceptor_test.rs"]
mod tests;
