//! Session invalidation.
//!
//! Three entry points share one cleanup routine:
//! - `logout`: revokes the refresh token server-side (best-effort), then cleans up.
//! - `force_logout`: cleans up without contacting the backend.
//! - `invalidate_silently`: cleans up without a toast, for callers that report
//!   the failure themselves.
//!
//! Cleanup is idempotent and safe on an empty session.

use crate::collab::LoginRedirect;
use crate::error::ErrorKind;
use crate::session::SessionManager;

/// Sign out, telling the backend to revoke the refresh token when one is held.
/// A failed revocation is logged and ignored.
pub async fn logout(session: &SessionManager, show_message: bool, session_expired: bool) {
    if let Some(refresh) = session.state().refresh_token() {
        if let Err(e) = session.api().logout(&refresh).await {
            tracing::warn!(error = %e, "logout notification failed; clearing session anyway");
        }
    }
    cleanup(session, show_message, session_expired);
}

/// Sign out without contacting the backend, for tokens already known to be dead.
pub fn force_logout(session: &SessionManager, session_expired: bool) {
    cleanup(session, true, session_expired);
}

pub(crate) fn invalidate_silently(session: &SessionManager) {
    cleanup(session, false, true);
}

fn cleanup(session: &SessionManager, show_message: bool, session_expired: bool) {
    if let Err(e) = session.state().clear_all() {
        tracing::error!(error = %e, "could not purge persisted session");
    }

    let bridge = session.bridge();
    if bridge.is_active() {
        bridge.clear_logged_in_user();
        bridge.reset_dependent_state();
    }

    session.navigator().to_login(LoginRedirect { session_expired });

    if show_message {
        if session_expired {
            session.notifier().warning(ErrorKind::SessionExpired.user_message());
        } else {
            session.notifier().success("You have been signed out.");
        }
    }
    tracing::info!(session_expired, "session cleared");
}

#[cfg(test)]
#[path = "logout_test.rs"]
mod tests;
