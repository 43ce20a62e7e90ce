use super::*;
use crate::collab::Level;
use crate::error::{ApiError, ErrorKind};
use crate::session::test_helpers::{MockAuthApi, harness, push};
use crate::state::test_helpers::{empty_state, signed_in_state};
use crate::types::{Role, TenantGrant};

fn acme() -> Tenant {
    Tenant { id: "t2".into(), name: "Acme".into() }
}

#[tokio::test]
async fn privileged_switch_installs_confirmed_scope() {
    let api = MockAuthApi::new();
    push(&api.switch_tenant, Ok(TenantGrant { token: "T3".into(), refresh_token: Some("R3".into()), tenant: acme() }));
    let (_, store) = signed_in_state(Role::SuperAdmin, Some("R0"));
    let h = harness(store, api);

    let tenant = switch_tenant(&h.session, "t2").await.unwrap();

    assert_eq!(tenant, acme());
    assert_eq!(h.api.last_arg("switch_tenant").as_deref(), Some("T0:t2"));
    let snap = h.session.state().snapshot();
    assert_eq!(snap.access_token.as_deref(), Some("T3"));
    assert_eq!(snap.refresh_token.as_deref(), Some("R3"));
    assert_eq!(snap.tenant, Some(acme()));
    assert_eq!(snap.user.unwrap().tenant_id.as_deref(), Some("t2"));
    assert!(h.store.raw("desk:selected_tenant").is_some());
    assert_eq!(h.notifier.levels(), vec![Level::Success]);
}

#[tokio::test]
async fn rejected_switch_leaves_state_untouched() {
    let api = MockAuthApi::new();
    push(&api.switch_tenant, Err(ApiError::Response { status: 403, message: "Tenant inactive".into() }));
    let (_, store) = signed_in_state(Role::SuperAdmin, Some("R0"));
    let h = harness(store, api);
    let before = h.session.state().snapshot();

    let err = switch_tenant(&h.session, "t2").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AccountInactive);
    assert_eq!(h.session.state().snapshot(), before);
    assert_eq!(h.store.raw("desk:selected_tenant"), None);
    assert_eq!(h.notifier.levels(), vec![Level::Error]);
}

#[tokio::test]
async fn unprivileged_role_is_refused_locally() {
    let (_, store) = signed_in_state(Role::Admin, Some("R0"));
    let h = harness(store, MockAuthApi::new());

    let err = switch_tenant(&h.session, "t2").await.unwrap_err();

    assert!(matches!(err, AuthError::NotPrivileged { ref role } if role == "admin"));
    assert_eq!(h.api.total_calls(), 0);
}

#[tokio::test]
async fn signed_out_switch_is_refused() {
    let (_, store) = empty_state();
    let h = harness(store, MockAuthApi::new());
    assert!(matches!(switch_tenant(&h.session, "t2").await, Err(AuthError::NotAuthenticated)));
}

#[tokio::test]
async fn empty_token_in_grant_is_rejected_and_state_kept() {
    let api = MockAuthApi::new();
    push(&api.switch_tenant, Ok(TenantGrant { token: String::new(), refresh_token: Some(String::new()), tenant: acme() }));
    let (_, store) = signed_in_state(Role::SuperAdmin, Some("R0"));
    let h = harness(store, api);
    let before = h.session.state().snapshot();

    let err = switch_tenant(&h.session, "t2").await.unwrap_err();

    assert!(matches!(err, AuthError::Rejected { source: ApiError::Parse(_), .. }));
    assert_eq!(h.session.state().snapshot(), before);
    assert_eq!(h.store.raw("desk:access_token").as_deref(), Some("T0"));
    assert_eq!(h.store.raw("desk:selected_tenant"), None);
    assert_eq!(h.notifier.levels(), vec![Level::Error]);
}
