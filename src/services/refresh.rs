//! Single-flight access token renewal.
//!
//! DESIGN
//! ======
//! At most one refresh request is in flight at a time. The in-flight flag and
//! the reset of the result container happen together under one std mutex,
//! which is never held across an await, so two callers can never both start a
//! round. Callers that arrive while a round is pending subscribe to the
//! result container (a `watch` channel, which replays its latest value) and
//! resolve from the same publication as the caller that owns the round.
//!
//! `RefreshSignal` keeps "pending", "refreshed" and "failed" apart. Waiters
//! block until the first value that is not `Pending`, and every round always
//! publishes exactly one resolved value: on success, on failure, and (via
//! `RefreshRound`'s drop guard) when the owning future is dropped mid-flight.
//!
//! A failed refresh never touches the access token and never logs out; that
//! decision belongs to the caller.

use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;

use crate::session::SessionManager;
use crate::state::ConfirmedWrite;
use crate::types::mask_token;

// =============================================================================
// SIGNAL
// =============================================================================

/// Latest state of the refresh result container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RefreshSignal {
    /// No refresh has run since startup.
    #[default]
    Idle,
    /// A round is in flight.
    Pending,
    /// The last round installed this access token.
    Refreshed(String),
    /// The last round failed.
    Failed,
}

impl RefreshSignal {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Refreshed(_))
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

pub struct RefreshCoordinator {
    in_flight: Mutex<bool>,
    result: watch::Sender<RefreshSignal>,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self { in_flight: Mutex::new(false), result: watch::channel(RefreshSignal::Idle).0 }
    }
}

/// What a caller gets when it asks to refresh.
enum Entry<'a> {
    /// This caller owns the new round.
    Owner(RefreshRound<'a>),
    /// A round is already pending; wait on this receiver.
    Waiter(watch::Receiver<RefreshSignal>),
}

impl RefreshCoordinator {
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replay-latest view of the refresh result.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RefreshSignal> {
        self.result.subscribe()
    }

    /// Wait until no round is pending and return the latest resolved signal.
    /// Returns immediately when nothing is in flight.
    pub async fn wait_for_refresh(&self) -> RefreshSignal {
        let rx = {
            let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            let rx = self.result.subscribe();
            if !*in_flight {
                return rx.borrow().clone();
            }
            rx
        };
        resolve(rx).await
    }

    fn enter(&self) -> Entry<'_> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if *in_flight {
            return Entry::Waiter(self.result.subscribe());
        }
        *in_flight = true;
        self.result.send_replace(RefreshSignal::Pending);
        Entry::Owner(RefreshRound { coordinator: self, published: false })
    }
}

async fn resolve(mut rx: watch::Receiver<RefreshSignal>) -> RefreshSignal {
    match rx.wait_for(RefreshSignal::is_resolved).await {
        Ok(signal) => signal.clone(),
        Err(_) => RefreshSignal::Failed,
    }
}

/// Ownership of one in-flight round. Publishing (or dropping) ends it.
struct RefreshRound<'a> {
    coordinator: &'a RefreshCoordinator,
    published: bool,
}

impl RefreshRound<'_> {
    fn publish(mut self, signal: RefreshSignal) {
        self.end(signal);
    }

    fn end(&mut self, signal: RefreshSignal) {
        if self.published {
            return;
        }
        self.published = true;
        self.coordinator.result.send_replace(signal);
        *self
            .coordinator
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = false;
    }
}

impl Drop for RefreshRound<'_> {
    fn drop(&mut self) {
        if !self.published {
            tracing::warn!("refresh round dropped before completion");
            self.end(RefreshSignal::Failed);
        }
    }
}

// =============================================================================
// FLOW
// =============================================================================

/// Renew the access token. Returns whether a new token is installed.
///
/// Concurrent callers share one network request and observe the same
/// outcome. Without a stored refresh token this returns `false` at once.
pub async fn refresh_token(session: &SessionManager) -> bool {
    let Some(refresh) = session.state().refresh_token() else {
        tracing::debug!("no refresh token stored; skipping refresh");
        return false;
    };

    let round = match session.refresh().enter() {
        Entry::Owner(round) => round,
        Entry::Waiter(rx) => {
            tracing::debug!("joining in-flight refresh");
            return resolve(rx).await.succeeded();
        }
    };

    tracing::debug!(refresh = %mask_token(&refresh), "refresh round started");
    let signal = match session.api().refresh(&refresh).await {
        Ok(grant) => {
            let token = grant.token.clone();
            match ConfirmedWrite::try_from(grant) {
                Ok(write) => match session.state().commit(write) {
                    Ok(true) => {
                        tracing::info!(token = %mask_token(&token), "access token refreshed");
                        RefreshSignal::Refreshed(token)
                    }
                    Ok(false) => {
                        tracing::info!("session ended during refresh; discarding new token");
                        RefreshSignal::Failed
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "could not persist refreshed token");
                        RefreshSignal::Failed
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "refresh response rejected");
                    RefreshSignal::Failed
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "token refresh failed");
            RefreshSignal::Failed
        }
    };

    let refreshed = signal.succeeded();
    round.publish(signal);
    refreshed
}

#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;
