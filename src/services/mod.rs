//! Session flows: sign-in stages, refresh, invalidation, tenant switch and
//! startup validation.
//!
//! Every flow is a free function over a `SessionManager`, which carries the
//! state store and collaborators.

pub mod login;
pub mod logout;
pub mod refresh;
pub mod tenant;
pub mod validate;

pub use login::{LoginOutcome, cancel_otp_verification, login, resend_otp, verify_otp};
pub use logout::{force_logout, logout};
pub use refresh::{RefreshCoordinator, RefreshSignal, refresh_token};
pub use tenant::switch_tenant;
pub use validate::{Bootstrap, bootstrap, check_auth};

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{ApiError, AuthError};
use crate::session::SessionManager;

// =============================================================================
// STAGE GATE
// =============================================================================

/// Non-blocking gate shared by the user-initiated steps (login, OTP verify and
/// resend, tenant switch). A second submission while one is pending is
/// rejected with `AuthError::Busy`.
#[derive(Debug, Default)]
pub(crate) struct StageGate {
    busy: AtomicBool,
}

impl StageGate {
    pub(crate) fn try_enter(&self) -> Result<StageTicket<'_>, AuthError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("rejecting concurrent sign-in step");
            return Err(AuthError::Busy);
        }
        Ok(StageTicket { gate: self })
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the gate on drop.
pub(crate) struct StageTicket<'a> {
    gate: &'a StageGate,
}

impl Drop for StageTicket<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Classify a backend failure and show it as an error toast.
pub(crate) fn surface(session: &SessionManager, source: ApiError) -> AuthError {
    let error = AuthError::rejected(session.classifier(), source);
    tracing::info!(code = %error.kind(), "request rejected");
    session.notifier().error(&error.user_message());
    error
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
