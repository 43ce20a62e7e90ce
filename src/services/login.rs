//! Two-stage sign-in: credentials, then a one-time code.
//!
//! ARCHITECTURE
//! ============
//! `login` either finishes directly (the backend returns a grant) or parks the
//! session in the OTP-pending stage; `verify_otp` completes it. Both success
//! paths install the session through the same confirmed write, which drops
//! the OTP id before the token and user appear.
//!
//! Failures never retry and never leave a partial transition: the state is
//! written only after a successful answer, and the loading flag is reset by a
//! guard on every exit.

use crate::error::{AuthError, LoginStage, StageFailure};
use crate::session::SessionManager;
use crate::state::ConfirmedWrite;
use crate::types::{AuthGrant, LoginReply, User};

use super::surface;

/// Result of submitting credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// A code was sent; call `verify_otp` next.
    OtpRequired { otp_session_id: String },
    /// The backend signed the user in without a second factor.
    Authenticated(User),
}

// =============================================================================
// STAGE 1
// =============================================================================

/// Submit credentials.
///
/// When the backend asks for a code but omits the OTP session id, the
/// submitted email is used as the id.
///
/// # Errors
///
/// Returns a credentials-stage failure if another step is pending, the backend
/// rejects the request, or the session cannot be persisted.
pub async fn login(session: &SessionManager, email: &str, password: &str) -> Result<LoginOutcome, StageFailure> {
    let fail = |error| StageFailure::new(LoginStage::Credentials, error);
    let _ticket = session.gate().try_enter().map_err(fail)?;
    let _loading = session.state().loading_guard();

    let reply = session
        .api()
        .login(email, password)
        .await
        .map_err(|e| fail(surface(session, e)))?;

    match reply {
        LoginReply::OtpRequired { otp_session_id } => {
            let otp_session_id = otp_session_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| email.to_owned());
            session
                .state()
                .begin_otp(&otp_session_id)
                .map_err(|e| fail(e.into()))?;
            tracing::info!("verification code requested");
            Ok(LoginOutcome::OtpRequired { otp_session_id })
        }
        LoginReply::Authenticated(grant) => install(session, grant)
            .map(LoginOutcome::Authenticated)
            .map_err(fail),
    }
}

// =============================================================================
// STAGE 2
// =============================================================================

/// Submit the one-time code for the pending OTP session.
///
/// On failure the OTP session is kept so the user can try another code.
///
/// # Errors
///
/// Returns an OTP-stage failure if no verification is pending, another step
/// is pending, the backend rejects the code, or the session cannot be
/// persisted.
pub async fn verify_otp(session: &SessionManager, code: &str) -> Result<User, StageFailure> {
    let fail = |error| StageFailure::new(LoginStage::Otp, error);
    let _ticket = session.gate().try_enter().map_err(fail)?;
    let otp_session_id = session
        .state()
        .otp_session_id()
        .ok_or_else(|| fail(AuthError::NoOtpSession))?;
    let _loading = session.state().loading_guard();

    let grant = session
        .api()
        .verify_otp(&otp_session_id, code)
        .await
        .map_err(|e| fail(surface(session, e)))?;

    install(session, grant).map_err(fail)
}

/// Ask for a new code for the pending OTP session. Client state is left as
/// is; cooldowns are up to the caller.
///
/// # Errors
///
/// Returns an error if no verification is pending, another step is pending,
/// or the backend rejects the request.
pub async fn resend_otp(session: &SessionManager) -> Result<(), AuthError> {
    let _ticket = session.gate().try_enter()?;
    let otp_session_id = session.state().otp_session_id().ok_or(AuthError::NoOtpSession)?;
    let _loading = session.state().loading_guard();

    session
        .api()
        .resend_otp(&otp_session_id)
        .await
        .map_err(|e| surface(session, e))?;

    session.notifier().info("A new verification code was sent.");
    Ok(())
}

/// Abandon the pending verification without contacting the backend.
///
/// # Errors
///
/// Returns an error if the store write fails.
pub fn cancel_otp_verification(session: &SessionManager) -> Result<(), AuthError> {
    session.state().clear_otp()?;
    tracing::info!("verification cancelled");
    Ok(())
}

fn install(session: &SessionManager, grant: AuthGrant) -> Result<User, AuthError> {
    let user = grant.user.clone();
    let write = ConfirmedWrite::try_from(grant).map_err(|e| surface(session, e))?;
    session.state().commit(write)?;
    session
        .notifier()
        .success(&format!("Welcome, {}.", user.name));
    Ok(user)
}

#[cfg(test)]
#[path = "login_test.rs"]
mod tests;
