//! Startup validation of a restored session.
//!
//! DESIGN
//! ======
//! `check_auth` is biased against false logouts. Only an explicit "invalid"
//! answer or a 401 leads to a refresh attempt, and only a failed refresh
//! leads to (silent) invalidation. Network errors, 5xx and timeouts keep the
//! cached session; the next real request settles it.
//!
//! The check itself has no timeout. `bootstrap` bounds how long startup waits
//! for it, and on timeout the check keeps running in the background.

use std::sync::Arc;

use crate::session::SessionManager;
use crate::state::ConfirmedWrite;
use crate::types::Validation;

use super::{logout, refresh};

/// Whether the stored session is usable.
///
/// Returns `false` without any request when no token or user is stored.
pub async fn check_auth(session: &SessionManager) -> bool {
    let state = session.state();
    let (Some(token), Some(_)) = (state.access_token(), state.current_user()) else {
        tracing::debug!("no stored session to validate");
        return false;
    };

    match session.api().validate(&token).await {
        Ok(Validation { valid: true, user }) => {
            if let Some(user) = user {
                if let Err(e) = state.commit(ConfirmedWrite::User(user)) {
                    tracing::warn!(error = %e, "could not store validated user");
                    return state.is_authenticated();
                }
            }
            true
        }
        Ok(Validation { valid: false, .. }) => renew_or_invalidate(session).await,
        Err(e) if e.is_unauthorized() => renew_or_invalidate(session).await,
        Err(e) => {
            tracing::warn!(error = %e, "validation unavailable; keeping cached session");
            true
        }
    }
}

async fn renew_or_invalidate(session: &SessionManager) -> bool {
    tracing::info!("stored token rejected; attempting refresh");
    if refresh::refresh_token(session).await {
        return true;
    }
    logout::invalidate_silently(session);
    false
}

// =============================================================================
// BOOTSTRAP
// =============================================================================

/// Outcome of startup validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    Authenticated,
    Unauthenticated,
    /// Validation did not finish in time; `cached` reports whether a session
    /// is stored and the app continues with it.
    TimedOut { cached: bool },
}

/// Run `check_auth` bounded by the configured bootstrap timeout.
pub async fn bootstrap(session: &Arc<SessionManager>) -> Bootstrap {
    let limit = session.config().bootstrap_timeout();
    let check = tokio::spawn({
        let session = Arc::clone(session);
        async move { check_auth(&session).await }
    });

    match tokio::time::timeout(limit, check).await {
        Ok(Ok(true)) => Bootstrap::Authenticated,
        Ok(Ok(false)) => Bootstrap::Unauthenticated,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "validation task failed");
            if session.state().is_authenticated() { Bootstrap::Authenticated } else { Bootstrap::Unauthenticated }
        }
        Err(_) => {
            let cached = session.state().is_authenticated();
            tracing::warn!(timeout_secs = limit.as_secs(), cached, "validation timed out; continuing with cached session");
            Bootstrap::TimedOut { cached }
        }
    }
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
