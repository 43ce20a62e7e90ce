use super::*;

/// # Safety
/// Env-mutating tests share one process; each test clears what it sets.
unsafe fn clear_session_env() {
    unsafe {
        std::env::remove_var("CHATDESK_API_URL");
        std::env::remove_var("CHATDESK_STORAGE_NAMESPACE");
        std::env::remove_var("CHATDESK_STORAGE_PATH");
        std::env::remove_var("CHATDESK_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("CHATDESK_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("CHATDESK_BOOTSTRAP_TIMEOUT_SECS");
    }
}

// =============================================================================
// parse helpers (pure, no env)
// =============================================================================

#[test]
fn api_url_defaults_when_absent() {
    assert_eq!(parse_api_url(None).unwrap(), DEFAULT_API_URL);
}

#[test]
fn api_url_trims_trailing_slash() {
    assert_eq!(parse_api_url(Some("https://desk.example.test/api/")).unwrap(), "https://desk.example.test/api");
}

#[test]
fn api_url_rejects_non_http() {
    let err = parse_api_url(Some("ftp://nope")).unwrap_err().to_string();
    assert!(err.contains("CHATDESK_API_URL"));
}

#[test]
fn namespace_rejects_blank() {
    assert!(parse_namespace(Some("   ")).is_err());
    assert_eq!(parse_namespace(Some(" desk ")).unwrap(), "desk");
}

#[test]
fn env_parse_invalid_returns_default() {
    unsafe { std::env::set_var("__CHATDESK_TEST_EP_INVALID__", "soon") };
    let val: u64 = env_parse("__CHATDESK_TEST_EP_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__CHATDESK_TEST_EP_INVALID__") };
}

#[test]
fn default_config_matches_constants() {
    let cfg = SessionConfig::default();
    assert_eq!(cfg.api_url, DEFAULT_API_URL);
    assert_eq!(cfg.namespace, DEFAULT_STORAGE_NAMESPACE);
    assert_eq!(cfg.bootstrap_timeout(), Duration::from_secs(DEFAULT_BOOTSTRAP_TIMEOUT_SECS));
    assert_eq!(cfg.timeouts.request(), Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
}

// =============================================================================
// from_env
// =============================================================================

#[test]
fn from_env_reads_overrides() {
    unsafe {
        clear_session_env();
        std::env::set_var("CHATDESK_API_URL", "https://crm.example.test/api/");
        std::env::set_var("CHATDESK_STORAGE_NAMESPACE", "tenant-a");
        std::env::set_var("CHATDESK_STORAGE_PATH", "/tmp/desk.json");
        std::env::set_var("CHATDESK_REQUEST_TIMEOUT_SECS", "5");
        std::env::set_var("CHATDESK_CONNECT_TIMEOUT_SECS", "2");
        std::env::set_var("CHATDESK_BOOTSTRAP_TIMEOUT_SECS", "3");
    }

    let cfg = SessionConfig::from_env().unwrap();
    assert_eq!(cfg.api_url, "https://crm.example.test/api");
    assert_eq!(cfg.namespace, "tenant-a");
    assert_eq!(cfg.storage_path, PathBuf::from("/tmp/desk.json"));
    assert_eq!(cfg.timeouts, HttpTimeouts { request_secs: 5, connect_secs: 2 });
    assert_eq!(cfg.bootstrap_timeout_secs, 3);

    unsafe { clear_session_env() };
}
