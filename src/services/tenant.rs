//! Tenant switch for privileged operators.
//!
//! The new scope is installed only after the backend issues a token for it.
//! A rejected switch leaves token, user and selected tenant untouched; there
//! is no local-only fallback.

use crate::error::AuthError;
use crate::session::SessionManager;
use crate::state::ConfirmedWrite;
use crate::types::Tenant;

use super::surface;

/// Re-scope the session to `tenant_id`.
///
/// # Errors
///
/// Returns an error if nobody is signed in, the role is not privileged,
/// another sign-in step is pending, the backend rejects the switch, or the
/// new session cannot be persisted.
pub async fn switch_tenant(session: &SessionManager, tenant_id: &str) -> Result<Tenant, AuthError> {
    let state = session.state();
    let (Some(user), Some(token)) = (state.current_user(), state.access_token()) else {
        return Err(AuthError::NotAuthenticated);
    };
    if !user.role.is_privileged() {
        tracing::warn!(user = %user.id, role = user.role.as_str(), "tenant switch refused");
        return Err(AuthError::NotPrivileged { role: user.role.as_str().to_owned() });
    }
    let _ticket = session.gate().try_enter()?;

    let grant = session
        .api()
        .switch_tenant(&token, tenant_id)
        .await
        .map_err(|e| surface(session, e))?;

    let tenant = grant.tenant.clone();
    let write = ConfirmedWrite::try_from(grant).map_err(|e| surface(session, e))?;
    if !state.commit(write)? {
        return Err(AuthError::NotAuthenticated);
    }

    tracing::info!(user = %user.id, tenant = %tenant.id, "tenant switched");
    session
        .notifier()
        .success(&format!("Now working in {}.", tenant.name));
    Ok(tenant)
}

#[cfg(test)]
#[path = "tenant_test.rs"]
mod tests;
