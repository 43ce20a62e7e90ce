//! Application context for the session subsystem.
//!
//! DESIGN
//! ======
//! `SessionManager` is built once at process start and passed by reference to
//! every flow in `services`. It owns the state store, the refresh coordinator
//! and the stage gate, and holds the collaborators behind trait objects so
//! hosts (browser shell, CLI, tests) plug in their own.

use std::sync::Arc;

use crate::api::{AuthApi, HttpAuthApi};
use crate::collab::{AutomationBridge, LogNavigator, Navigator, NoBridge, Notifier, TracingNotifier};
use crate::config::SessionConfig;
use crate::error::{ApiError, ErrorClassifier, SubstringClassifier};
use crate::services::{RefreshCoordinator, StageGate};
use crate::state::SessionState;
use crate::storage::{FileStore, KeyValueStore};

pub struct SessionManager {
    config: SessionConfig,
    state: SessionState,
    api: Arc<dyn AuthApi>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    bridge: Arc<dyn AutomationBridge>,
    classifier: Arc<dyn ErrorClassifier>,
    refresh: RefreshCoordinator,
    gate: StageGate,
}

impl SessionManager {
    /// Restore state from `store` and wire the default collaborators
    /// (tracing toasts, logged navigation, no automation bridge, substring
    /// classifier).
    #[must_use]
    pub fn new(config: SessionConfig, store: Arc<dyn KeyValueStore>, api: Arc<dyn AuthApi>) -> Self {
        let state = SessionState::load(store);
        tracing::debug!(
            authenticated = state.is_authenticated(),
            awaiting_otp = state.awaiting_otp(),
            "session restored"
        );
        Self {
            config,
            state,
            api,
            notifier: Arc::new(TracingNotifier),
            navigator: Arc::new(LogNavigator),
            bridge: Arc::new(NoBridge),
            classifier: Arc::new(SubstringClassifier),
            refresh: RefreshCoordinator::default(),
            gate: StageGate::default(),
        }
    }

    /// File-backed store plus the reqwest client, both taken from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: SessionConfig) -> Result<Self, ApiError> {
        let api = HttpAuthApi::from_config(&config)?;
        let store = FileStore::new(config.storage_path.clone(), config.namespace.clone());
        Ok(Self::new(config, Arc::new(store), Arc::new(api)))
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    #[must_use]
    pub fn with_bridge(mut self, bridge: Arc<dyn AutomationBridge>) -> Self {
        self.bridge = bridge;
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Refresh indicator and result container for request interceptors.
    #[must_use]
    pub fn refresh(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    /// Startup validation bounded by `bootstrap_timeout`; see `services::bootstrap`.
    pub async fn bootstrap(self: &Arc<Self>) -> crate::services::Bootstrap {
        crate::services::bootstrap(self).await
    }

    /// True while a login, OTP or tenant-switch step is pending.
    #[must_use]
    pub fn step_in_progress(&self) -> bool {
        self.gate.is_busy()
    }

    pub(crate) fn api(&self) -> &dyn AuthApi {
        self.api.as_ref()
    }

    pub(crate) fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub(crate) fn navigator(&self) -> &dyn Navigator {
        self.navigator.as_ref()
    }

    pub(crate) fn bridge(&self) -> &dyn AutomationBridge {
        self.bridge.as_ref()
    }

    pub(crate) fn classifier(&self) -> &dyn ErrorClassifier {
        self.classifier.as_ref()
    }

    pub(crate) fn gate(&self) -> &StageGate {
        &self.gate
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
