//! Session state store: reactive cells mirrored into persistence.
//!
//! DESIGN
//! ======
//! Each piece of session state is a `tokio::sync::watch` cell, so any
//! subscriber immediately sees the latest value and then every change. The
//! four session keys (access token, refresh token, user, OTP session id) and
//! the selected tenant are mirrored into a `KeyValueStore`. Every mutation
//! takes one write lock, writes the store, then the cells; nothing awaits
//! while the lock is held.
//!
//! INVARIANTS
//! ==========
//! - user and access token are present together or absent together.
//! - an OTP session id is held only while no access token exists.
//! - store and cells agree after every mutation. A failed store write fails
//!   closed: the session keys are purged and the cells nulled.
//!
//! Writes that carry server-issued credentials go through `commit`, which
//! only accepts `ConfirmedWrite` values built from server grants. Building one
//! rejects an empty access token. There is no path that installs a token or
//! tenant ahead of the server's answer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::error::{ApiError, StorageError};
use crate::storage::{KeyValueStore, StorageKey};
use crate::types::{AuthGrant, RefreshGrant, Tenant, TenantGrant, User, mask_token};

// =============================================================================
// SNAPSHOT / STAGE
// =============================================================================

/// Where the login flow stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Anonymous,
    /// Credentials submitted, answer pending.
    PreloginSubmitted,
    OtpPending,
    Authenticated,
}

/// Consistent read of every cell, taken under the write lock.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub otp_session_id: Option<String>,
    pub tenant: Option<Tenant>,
    pub loading: bool,
}

impl SessionSnapshot {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.access_token.is_some()
    }

    #[must_use]
    pub fn awaiting_otp(&self) -> bool {
        self.otp_session_id.is_some() && self.access_token.is_none()
    }

    #[must_use]
    pub fn stage(&self) -> AuthStage {
        if self.is_authenticated() {
            AuthStage::Authenticated
        } else if self.awaiting_otp() {
            AuthStage::OtpPending
        } else if self.loading {
            AuthStage::PreloginSubmitted
        } else {
            AuthStage::Anonymous
        }
    }
}

// =============================================================================
// CONFIRMED WRITES
// =============================================================================

/// A state change backed by a successful server response.
#[derive(Debug, Clone)]
pub(crate) enum ConfirmedWrite {
    /// Full authentication (direct login or OTP verification).
    Session(AuthGrant),
    /// Renewed access token; ignored when no user is signed in.
    Token { token: String, refresh_token: Option<String> },
    /// Token re-scoped to another tenant; ignored when no user is signed in.
    Tenant { token: String, refresh_token: Option<String>, tenant: Tenant },
    /// Fresh copy of the signed-in user; ignored when no user is signed in.
    User(User),
}

/// Server-issued credentials: the access token must be non-empty, an empty
/// refresh token counts as absent.
fn credentials(token: String, refresh_token: Option<String>) -> Result<(String, Option<String>), ApiError> {
    if token.is_empty() {
        return Err(ApiError::Parse("server response carried an empty token".into()));
    }
    Ok((token, refresh_token.filter(|t| !t.is_empty())))
}

impl TryFrom<AuthGrant> for ConfirmedWrite {
    type Error = ApiError;

    fn try_from(grant: AuthGrant) -> Result<Self, ApiError> {
        let (token, refresh_token) = credentials(grant.token, grant.refresh_token)?;
        Ok(Self::Session(AuthGrant { token, refresh_token, user: grant.user }))
    }
}

impl TryFrom<RefreshGrant> for ConfirmedWrite {
    type Error = ApiError;

    fn try_from(grant: RefreshGrant) -> Result<Self, ApiError> {
        let (token, refresh_token) = credentials(grant.token, grant.refresh_token)?;
        Ok(Self::Token { token, refresh_token })
    }
}

impl TryFrom<TenantGrant> for ConfirmedWrite {
    type Error = ApiError;

    fn try_from(grant: TenantGrant) -> Result<Self, ApiError> {
        let (token, refresh_token) = credentials(grant.token, grant.refresh_token)?;
        Ok(Self::Tenant { token, refresh_token, tenant: grant.tenant })
    }
}

// =============================================================================
// SESSION STATE
// =============================================================================

pub struct SessionState {
    store: Arc<dyn KeyValueStore>,
    write: Mutex<()>,
    user: watch::Sender<Option<User>>,
    access_token: watch::Sender<Option<String>>,
    refresh_token: watch::Sender<Option<String>>,
    otp_session_id: watch::Sender<Option<String>>,
    tenant: watch::Sender<Option<Tenant>>,
    loading: watch::Sender<bool>,
}

fn cell<T>(value: T) -> watch::Sender<T> {
    watch::channel(value).0
}

impl SessionState {
    /// Build the state from whatever `store` holds.
    ///
    /// Best-effort: unreadable or inconsistent entries are purged from the
    /// store rather than carried into memory.
    #[must_use]
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let snapshot = restore(store.as_ref());
        Self {
            store,
            write: Mutex::new(()),
            user: cell(snapshot.user),
            access_token: cell(snapshot.access_token),
            refresh_token: cell(snapshot.refresh_token),
            otp_session_id: cell(snapshot.otp_session_id),
            tenant: cell(snapshot.tenant),
            loading: cell(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // reads
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let _guard = self.lock();
        SessionSnapshot {
            user: self.user.borrow().clone(),
            access_token: self.access_token.borrow().clone(),
            refresh_token: self.refresh_token.borrow().clone(),
            otp_session_id: self.otp_session_id.borrow().clone(),
            tenant: self.tenant.borrow().clone(),
            loading: *self.loading.borrow(),
        }
    }

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.access_token.borrow().clone()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.refresh_token.borrow().clone()
    }

    #[must_use]
    pub fn otp_session_id(&self) -> Option<String> {
        self.otp_session_id.borrow().clone()
    }

    #[must_use]
    pub fn selected_tenant(&self) -> Option<Tenant> {
        self.tenant.borrow().clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    #[must_use]
    pub fn awaiting_otp(&self) -> bool {
        self.snapshot().awaiting_otp()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.snapshot().is_authenticated()
    }

    #[must_use]
    pub fn stage(&self) -> AuthStage {
        self.snapshot().stage()
    }

    #[must_use]
    pub fn subscribe_user(&self) -> watch::Receiver<Option<User>> {
        self.user.subscribe()
    }

    #[must_use]
    pub fn subscribe_access_token(&self) -> watch::Receiver<Option<String>> {
        self.access_token.subscribe()
    }

    #[must_use]
    pub fn subscribe_otp_session(&self) -> watch::Receiver<Option<String>> {
        self.otp_session_id.subscribe()
    }

    #[must_use]
    pub fn subscribe_tenant(&self) -> watch::Receiver<Option<Tenant>> {
        self.tenant.subscribe()
    }

    #[must_use]
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    // -------------------------------------------------------------------------
    // loading flag
    // -------------------------------------------------------------------------

    /// Raise the loading flag until the returned guard drops.
    #[must_use]
    pub fn loading_guard(&self) -> LoadingGuard<'_> {
        self.loading.send_replace(true);
        LoadingGuard { loading: &self.loading }
    }

    // -------------------------------------------------------------------------
    // writes
    // -------------------------------------------------------------------------

    /// Enter the OTP-pending stage for `otp_session_id`.
    ///
    /// A leftover authenticated pair is dropped first, since a pending OTP and
    /// an access token never coexist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails; the session is then purged.
    pub fn begin_otp(&self, otp_session_id: &str) -> Result<(), StorageError> {
        let _guard = self.lock();
        let result = self.drop_auth_pair_locked().and_then(|()| {
            self.store
                .set_string(StorageKey::OtpSessionId.as_str(), otp_session_id)
        });
        self.finish_locked(result, || {
            self.otp_session_id
                .send_replace(Some(otp_session_id.to_owned()));
        })
    }

    /// Leave the OTP-pending stage without contacting the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails; the session is then purged.
    pub fn clear_otp(&self) -> Result<(), StorageError> {
        let _guard = self.lock();
        let result = self.store.remove(StorageKey::OtpSessionId.as_str());
        self.finish_locked(result, || {
            self.otp_session_id.send_replace(None);
        })
    }

    /// Apply a server-confirmed change. Returns `false` when the write was
    /// skipped because nobody is signed in any more.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails; the session is then purged.
    pub(crate) fn commit(&self, write: ConfirmedWrite) -> Result<bool, StorageError> {
        let _guard = self.lock();
        let signed_in = self.user.borrow().is_some();

        match write {
            ConfirmedWrite::Session(grant) => {
                let result = self.write_session_locked(&grant);
                self.finish_locked(result, || {
                    self.otp_session_id.send_replace(None);
                    self.user.send_replace(Some(grant.user.clone()));
                    self.access_token.send_replace(Some(grant.token.clone()));
                    self.refresh_token.send_replace(grant.refresh_token.clone());
                })?;
                tracing::info!(user = %grant.user.id, token = %mask_token(&grant.token), "session installed");
                Ok(true)
            }
            ConfirmedWrite::Token { token, refresh_token } => {
                if !signed_in {
                    tracing::debug!("dropping renewed token: session was invalidated");
                    return Ok(false);
                }
                let result = self.write_token_locked(&token, refresh_token.as_deref());
                self.finish_locked(result, || {
                    self.access_token.send_replace(Some(token.clone()));
                    if let Some(refresh) = &refresh_token {
                        self.refresh_token.send_replace(Some(refresh.clone()));
                    }
                })?;
                Ok(true)
            }
            ConfirmedWrite::Tenant { token, refresh_token, tenant } => {
                let Some(mut user) = self.user.borrow().clone() else {
                    return Ok(false);
                };
                user.tenant_id = Some(tenant.id.clone());
                let result = self
                    .write_token_locked(&token, refresh_token.as_deref())
                    .and_then(|()| self.store.set(StorageKey::User.as_str(), &user))
                    .and_then(|()| self.store.set(StorageKey::SelectedTenant.as_str(), &tenant));
                self.finish_locked(result, || {
                    self.access_token.send_replace(Some(token.clone()));
                    if let Some(refresh) = &refresh_token {
                        self.refresh_token.send_replace(Some(refresh.clone()));
                    }
                    self.user.send_replace(Some(user.clone()));
                    self.tenant.send_replace(Some(tenant.clone()));
                })?;
                Ok(true)
            }
            ConfirmedWrite::User(user) => {
                if !signed_in {
                    return Ok(false);
                }
                let result = self.store.set(StorageKey::User.as_str(), &user);
                self.finish_locked(result, || {
                    self.user.send_replace(Some(user.clone()));
                })?;
                Ok(true)
            }
        }
    }

    /// Purge every persisted key and null every cell. Safe on empty state.
    ///
    /// # Errors
    ///
    /// Returns the store error, if any; cells are nulled regardless.
    pub fn clear_all(&self) -> Result<(), StorageError> {
        let _guard = self.lock();
        let result = purge_keys(self.store.as_ref(), &StorageKey::ALL);
        self.null_cells_locked();
        result
    }

    // -------------------------------------------------------------------------
    // locked helpers (caller holds `write`)
    // -------------------------------------------------------------------------

    fn write_session_locked(&self, grant: &AuthGrant) -> Result<(), StorageError> {
        self.store.remove(StorageKey::OtpSessionId.as_str())?;
        self.store.set(StorageKey::User.as_str(), &grant.user)?;
        self.store
            .set_string(StorageKey::AccessToken.as_str(), &grant.token)?;
        match &grant.refresh_token {
            Some(refresh) => self
                .store
                .set_string(StorageKey::RefreshToken.as_str(), refresh),
            None => self.store.remove(StorageKey::RefreshToken.as_str()),
        }
    }

    fn write_token_locked(&self, token: &str, refresh_token: Option<&str>) -> Result<(), StorageError> {
        self.store
            .set_string(StorageKey::AccessToken.as_str(), token)?;
        if let Some(refresh) = refresh_token {
            self.store
                .set_string(StorageKey::RefreshToken.as_str(), refresh)?;
        }
        Ok(())
    }

    fn drop_auth_pair_locked(&self) -> Result<(), StorageError> {
        if self.access_token.borrow().is_none() && self.user.borrow().is_none() {
            return Ok(());
        }
        tracing::debug!("new login attempt replaces the stored session");
        purge_keys(self.store.as_ref(), &[StorageKey::AccessToken, StorageKey::RefreshToken, StorageKey::User])?;
        self.access_token.send_replace(None);
        self.refresh_token.send_replace(None);
        self.user.send_replace(None);
        Ok(())
    }

    /// Publish cells on success; fail closed on a store error.
    fn finish_locked(&self, result: Result<(), StorageError>, publish: impl FnOnce()) -> Result<(), StorageError> {
        match result {
            Ok(()) => {
                publish();
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "session write failed, purging session");
                if let Err(purge) = purge_keys(self.store.as_ref(), &StorageKey::ALL) {
                    tracing::error!(error = %purge, "session purge failed");
                }
                self.null_cells_locked();
                Err(e)
            }
        }
    }

    fn null_cells_locked(&self) {
        self.otp_session_id.send_replace(None);
        self.access_token.send_replace(None);
        self.refresh_token.send_replace(None);
        self.user.send_replace(None);
        self.tenant.send_replace(None);
    }
}

/// Resets the loading flag when dropped.
pub struct LoadingGuard<'a> {
    loading: &'a watch::Sender<bool>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.loading.send_replace(false);
    }
}

// =============================================================================
// RESTORE
// =============================================================================

fn purge_keys(store: &dyn KeyValueStore, keys: &[StorageKey]) -> Result<(), StorageError> {
    let mut first_err = None;
    for key in keys {
        if let Err(e) = store.remove(key.as_str()) {
            first_err.get_or_insert(e);
        }
    }
    first_err.map_or(Ok(()), Err)
}

fn read_or_purge<T>(store: &dyn KeyValueStore, key: StorageKey, read: impl FnOnce() -> Result<Option<T>, StorageError>) -> Option<T> {
    match read() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key = key.as_str(), error = %e, "purging unreadable session entry");
            if let Err(e) = store.remove(key.as_str()) {
                tracing::warn!(key = key.as_str(), error = %e, "purge failed");
            }
            None
        }
    }
}

/// Read persisted state, purging anything corrupt or inconsistent.
fn restore(store: &dyn KeyValueStore) -> SessionSnapshot {
    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

    let access_token = non_empty(read_or_purge(store, StorageKey::AccessToken, || {
        store.get_string(StorageKey::AccessToken.as_str())
    }));
    let refresh_token = non_empty(read_or_purge(store, StorageKey::RefreshToken, || {
        store.get_string(StorageKey::RefreshToken.as_str())
    }));
    let user: Option<User> = read_or_purge(store, StorageKey::User, || store.get(StorageKey::User.as_str()));
    let otp_session_id = non_empty(read_or_purge(store, StorageKey::OtpSessionId, || {
        store.get_string(StorageKey::OtpSessionId.as_str())
    }));
    let tenant: Option<Tenant> =
        read_or_purge(store, StorageKey::SelectedTenant, || store.get(StorageKey::SelectedTenant.as_str()));

    let mut snapshot = SessionSnapshot::default();

    if access_token.is_some() && user.is_some() {
        if otp_session_id.is_some() {
            tracing::warn!("purging stale OTP session alongside an authenticated session");
            let _ = purge_keys(store, &[StorageKey::OtpSessionId]);
        }
        snapshot.access_token = access_token;
        snapshot.user = user;
        snapshot.refresh_token = refresh_token;
        snapshot.tenant = tenant;
        return snapshot;
    }

    if access_token.is_some() || user.is_some() || refresh_token.is_some() || tenant.is_some() {
        tracing::warn!("purging incomplete persisted session");
        let _ = purge_keys(
            store,
            &[StorageKey::AccessToken, StorageKey::RefreshToken, StorageKey::User, StorageKey::SelectedTenant],
        );
    }
    snapshot.otp_session_id = otp_session_id;
    snapshot
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::Role;

    #[must_use]
    pub fn user(role: Role) -> User {
        User {
            id: "u1".into(),
            name: "Ana".into(),
            email: "a@b.com".into(),
            role,
            tenant_id: Some("t1".into()),
        }
    }

    #[must_use]
    pub fn grant(token: &str, refresh: Option<&str>) -> AuthGrant {
        AuthGrant { token: token.into(), refresh_token: refresh.map(Into::into), user: user(Role::Agent) }
    }

    /// Empty state over a fresh memory store.
    #[must_use]
    pub fn empty_state() -> (Arc<SessionState>, MemoryStore) {
        let store = MemoryStore::new("desk");
        let state = Arc::new(SessionState::load(Arc::new(store.clone())));
        (state, store)
    }

    /// State with an installed session for `role`.
    #[must_use]
    pub fn signed_in_state(role: Role, refresh: Option<&str>) -> (Arc<SessionState>, MemoryStore) {
        let (state, store) = empty_state();
        let grant = AuthGrant { token: "T0".into(), refresh_token: refresh.map(Into::into), user: user(role) };
        state.commit(grant.try_into().unwrap()).unwrap();
        (state, store)
    }
}
