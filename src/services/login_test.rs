use std::sync::Arc;

use tokio::sync::Notify;

use super::*;
use crate::collab::Level;
use crate::error::{ApiError, ErrorKind, FormReset};
use crate::session::test_helpers::{MockAuthApi, harness, push};
use crate::state::AuthStage;
use crate::state::test_helpers::{empty_state, grant, signed_in_state};
use crate::types::Role;

fn rejected(status: u16, message: &str) -> ApiError {
    ApiError::Response { status, message: message.into() }
}

// =============================================================================
// two-stage login
// =============================================================================

#[tokio::test]
async fn two_stage_login_installs_session() {
    let api = MockAuthApi::new();
    push(&api.login, Ok(LoginReply::OtpRequired { otp_session_id: Some("s1".into()) }));
    push(&api.verify_otp, Ok(grant("T1", None)));
    let (_, store) = empty_state();
    let h = harness(store, api);

    let outcome = login(&h.session, "a@b.com", "secret").await.unwrap();
    assert_eq!(outcome, LoginOutcome::OtpRequired { otp_session_id: "s1".into() });
    assert!(h.session.state().awaiting_otp());
    assert_eq!(h.store.raw("desk:otp_session_id").as_deref(), Some("s1"));

    let user = verify_otp(&h.session, "482913").await.unwrap();
    assert_eq!(user.email, "a@b.com");
    assert_eq!(h.api.last_arg("verify_otp").as_deref(), Some("s1:482913"));
    assert_eq!(h.store.raw("desk:otp_session_id"), None);
    assert_eq!(h.session.state().access_token().as_deref(), Some("T1"));
    assert!(h.session.state().current_user().is_some());
    assert_eq!(h.session.state().stage(), AuthStage::Authenticated);
    assert!(!h.session.state().is_loading());
}

#[tokio::test]
async fn missing_otp_id_falls_back_to_email() {
    let api = MockAuthApi::new();
    push(&api.login, Ok(LoginReply::OtpRequired { otp_session_id: None }));
    let (_, store) = empty_state();
    let h = harness(store, api);

    let outcome = login(&h.session, "a@b.com", "secret").await.unwrap();
    assert_eq!(outcome, LoginOutcome::OtpRequired { otp_session_id: "a@b.com".into() });
    assert_eq!(h.session.state().otp_session_id().as_deref(), Some("a@b.com"));
}

#[tokio::test]
async fn direct_login_skips_otp() {
    let api = MockAuthApi::new();
    push(&api.login, Ok(LoginReply::Authenticated(grant("T1", Some("R1")))));
    let (_, store) = empty_state();
    let h = harness(store, api);

    let outcome = login(&h.session, "a@b.com", "secret").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::Authenticated(_)));
    assert_eq!(h.session.state().refresh_token().as_deref(), Some("R1"));
    assert!(!h.session.state().awaiting_otp());
    assert_eq!(h.notifier.levels(), vec![Level::Success]);
}

// =============================================================================
// failures
// =============================================================================

#[tokio::test]
async fn bad_credentials_reset_password_and_keep_state() {
    let api = MockAuthApi::new();
    push(&api.login, Err(rejected(401, "Invalid credentials")));
    let (_, store) = empty_state();
    let h = harness(store, api);

    let failure = login(&h.session, "a@b.com", "nope").await.unwrap_err();
    assert_eq!(failure.reset(), FormReset::Password);
    assert_eq!(failure.error.kind(), ErrorKind::InvalidCredentials);
    assert_eq!(h.session.state().stage(), AuthStage::Anonymous);
    assert!(h.store.is_empty());
    assert_eq!(h.api.calls("login"), 1);
    assert_eq!(h.notifier.levels(), vec![Level::Error]);
}

#[tokio::test]
async fn bad_code_resets_digits_and_keeps_otp_session() {
    let api = MockAuthApi::new();
    push(&api.login, Ok(LoginReply::OtpRequired { otp_session_id: Some("s1".into()) }));
    push(&api.verify_otp, Err(rejected(400, "Invalid code")));
    let (_, store) = empty_state();
    let h = harness(store, api);

    login(&h.session, "a@b.com", "secret").await.unwrap();
    let failure = verify_otp(&h.session, "000000").await.unwrap_err();

    assert_eq!(failure.reset(), FormReset::OtpDigits);
    assert_eq!(failure.error.kind(), ErrorKind::InvalidOtp);
    assert!(h.session.state().awaiting_otp());
    assert_eq!(h.session.state().access_token(), None);
    assert!(!h.session.state().is_loading());
}

#[tokio::test]
async fn verify_without_pending_otp_is_local_error() {
    let (_, store) = empty_state();
    let h = harness(store, MockAuthApi::new());

    let failure = verify_otp(&h.session, "482913").await.unwrap_err();
    assert!(matches!(failure.error, AuthError::NoOtpSession));
    assert_eq!(h.api.total_calls(), 0);
}

#[tokio::test]
async fn new_login_replaces_existing_session_only_on_success() {
    let api = MockAuthApi::new();
    push(&api.login, Err(ApiError::Request("timeout".into())));
    push(&api.login, Ok(LoginReply::OtpRequired { otp_session_id: Some("s2".into()) }));
    let (_, store) = signed_in_state(Role::Agent, Some("R0"));
    let h = harness(store, api);

    let failure = login(&h.session, "a@b.com", "secret").await.unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::Network);
    assert!(h.session.state().is_authenticated());

    login(&h.session, "a@b.com", "secret").await.unwrap();
    assert!(!h.session.state().is_authenticated());
    assert_eq!(h.session.state().stage(), AuthStage::OtpPending);
}

// =============================================================================
// stage gate
// =============================================================================

#[tokio::test]
async fn concurrent_submission_is_busy() {
    let api = MockAuthApi::new();
    push(&api.login, Ok(LoginReply::OtpRequired { otp_session_id: Some("s1".into()) }));
    let (_, store) = empty_state();
    let h = harness(store, api);

    let _ticket = h.session.gate().try_enter().unwrap();
    let failure = login(&h.session, "a@b.com", "secret").await.unwrap_err();

    assert!(matches!(failure.error, AuthError::Busy));
    assert_eq!(h.api.calls("login"), 0);
}

// =============================================================================
// resend / cancel
// =============================================================================

#[tokio::test]
async fn resend_reuses_session_and_keeps_state() {
    let api = MockAuthApi::new();
    push(&api.resend_otp, Ok(()));
    let (state, store) = empty_state();
    state.begin_otp("s1").unwrap();
    let h = harness(store, api);

    resend_otp(&h.session).await.unwrap();

    assert_eq!(h.api.last_arg("resend_otp").as_deref(), Some("s1"));
    assert_eq!(h.session.state().otp_session_id().as_deref(), Some("s1"));
    assert_eq!(h.notifier.levels(), vec![Level::Info]);
}

#[tokio::test]
async fn resend_raises_loading_while_pending() {
    let gate = Arc::new(Notify::new());
    let api = MockAuthApi::new().with_resend_gate(gate.clone());
    push(&api.resend_otp, Ok(()));
    let (state, store) = empty_state();
    state.begin_otp("s1").unwrap();
    let h = harness(store, api);
    let mut loading = h.session.state().subscribe_loading();

    let observe = async {
        tokio::task::yield_now().await;
        let seen = *loading.borrow_and_update();
        gate.notify_one();
        seen
    };
    let (result, seen_while_pending) = tokio::join!(resend_otp(&h.session), observe);

    result.unwrap();
    assert!(seen_while_pending);
    assert!(loading.has_changed().unwrap());
    assert!(!*loading.borrow_and_update());
}

#[tokio::test]
async fn resend_without_pending_otp_fails() {
    let (_, store) = empty_state();
    let h = harness(store, MockAuthApi::new());
    assert!(matches!(resend_otp(&h.session).await, Err(AuthError::NoOtpSession)));
}

#[tokio::test]
async fn cancel_clears_otp_without_network() {
    let (state, store) = empty_state();
    state.begin_otp("s1").unwrap();
    let h = harness(store, MockAuthApi::new());

    cancel_otp_verification(&h.session).unwrap();

    assert_eq!(h.session.state().stage(), AuthStage::Anonymous);
    assert_eq!(h.store.raw("desk:otp_session_id"), None);
    assert_eq!(h.api.total_calls(), 0);
}
