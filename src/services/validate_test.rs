use tokio::sync::Notify;

use super::*;
use crate::collab::LoginRedirect;
use crate::config::SessionConfig;
use crate::error::ApiError;
use crate::session::test_helpers::{MockAuthApi, harness, push};
use crate::state::test_helpers::{empty_state, signed_in_state, user};
use crate::types::{RefreshGrant, Role};

fn unauthorized() -> ApiError {
    ApiError::Response { status: 401, message: "Unauthorized".into() }
}

// =============================================================================
// check_auth
// =============================================================================

#[tokio::test]
async fn no_stored_token_skips_network() {
    let (_, store) = empty_state();
    let h = harness(store, MockAuthApi::new());

    assert!(!check_auth(&h.session).await);
    assert_eq!(h.api.total_calls(), 0);
}

#[tokio::test]
async fn valid_token_syncs_returned_user() {
    let mut renamed = user(Role::Agent);
    renamed.name = "Ana Maria".into();
    let api = MockAuthApi::new();
    push(&api.validate, Ok(Validation { valid: true, user: Some(renamed.clone()) }));
    let (_, store) = signed_in_state(Role::Agent, Some("R0"));
    let h = harness(store, api);

    assert!(check_auth(&h.session).await);
    assert_eq!(h.api.last_arg("validate").as_deref(), Some("T0"));
    assert_eq!(h.session.state().current_user(), Some(renamed));
    assert_eq!(h.session.state().access_token().as_deref(), Some("T0"));
}

#[tokio::test]
async fn invalid_token_is_refreshed_once() {
    let api = MockAuthApi::new();
    push(&api.validate, Ok(Validation { valid: false, user: None }));
    push(&api.refresh, Ok(RefreshGrant { token: "T1".into(), refresh_token: None }));
    let (_, store) = signed_in_state(Role::Agent, Some("R0"));
    let h = harness(store, api);

    assert!(check_auth(&h.session).await);
    assert_eq!(h.api.calls("refresh"), 1);
    assert_eq!(h.session.state().access_token().as_deref(), Some("T1"));
}

#[tokio::test]
async fn unauthorized_with_failed_refresh_invalidates_silently() {
    let api = MockAuthApi::new();
    push(&api.validate, Err(unauthorized()));
    push(&api.refresh, Err(unauthorized()));
    let (_, store) = signed_in_state(Role::Agent, Some("R0"));
    let h = harness(store, api);

    assert!(!check_auth(&h.session).await);

    assert_eq!(h.api.calls("refresh"), 1);
    assert!(!h.session.state().is_authenticated());
    assert!(h.store.is_empty());
    assert!(h.notifier.levels().is_empty());
    assert_eq!(*h.navigator.redirects.lock().unwrap(), vec![LoginRedirect { session_expired: true }]);
}

#[tokio::test]
async fn unauthorized_without_refresh_token_invalidates() {
    let api = MockAuthApi::new();
    push(&api.validate, Err(unauthorized()));
    let (_, store) = signed_in_state(Role::Agent, None);
    let h = harness(store, api);

    assert!(!check_auth(&h.session).await);
    assert_eq!(h.api.calls("refresh"), 0);
    assert!(!h.session.state().is_authenticated());
}

#[tokio::test]
async fn server_error_keeps_session() {
    let api = MockAuthApi::new();
    push(&api.validate, Err(ApiError::Response { status: 503, message: "upstream".into() }));
    let (_, store) = signed_in_state(Role::Agent, Some("R0"));
    let h = harness(store, api);
    let before = h.session.state().snapshot();

    assert!(check_auth(&h.session).await);

    assert_eq!(h.session.state().snapshot(), before);
    assert_eq!(h.api.calls("refresh"), 0);
    assert!(h.navigator.redirects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn network_error_keeps_session() {
    let api = MockAuthApi::new();
    push(&api.validate, Err(ApiError::Request("connection reset".into())));
    let (_, store) = signed_in_state(Role::Agent, Some("R0"));
    let h = harness(store, api);

    assert!(check_auth(&h.session).await);
    assert!(h.session.state().is_authenticated());
}

// =============================================================================
// bootstrap
// =============================================================================

fn shared(store: crate::storage::MemoryStore, api: MockAuthApi, timeout_secs: u64) -> Arc<SessionManager> {
    let config = SessionConfig { bootstrap_timeout_secs: timeout_secs, ..SessionConfig::default() };
    Arc::new(SessionManager::new(config, Arc::new(store), Arc::new(api)))
}

#[tokio::test]
async fn bootstrap_reports_validation_result() {
    let api = MockAuthApi::new();
    push(&api.validate, Ok(Validation { valid: true, user: None }));
    let (_, store) = signed_in_state(Role::Agent, Some("R0"));
    let session = shared(store, api, 8);

    assert_eq!(bootstrap(&session).await, Bootstrap::Authenticated);
}

#[tokio::test]
async fn bootstrap_without_session_is_unauthenticated() {
    let (_, store) = empty_state();
    let session = shared(store, MockAuthApi::new(), 8);

    assert_eq!(bootstrap(&session).await, Bootstrap::Unauthenticated);
}

#[tokio::test(start_paused = true)]
async fn bootstrap_timeout_continues_with_cache() {
    let gate = Arc::new(Notify::new());
    let api = MockAuthApi::new().with_validate_gate(gate);
    let (_, store) = signed_in_state(Role::Agent, Some("R0"));
    let session = shared(store, api, 2);

    assert_eq!(bootstrap(&session).await, Bootstrap::TimedOut { cached: true });
    assert!(session.state().is_authenticated());
}
