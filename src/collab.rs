//! Collaborators the session subsystem calls out to.
//!
//! SYSTEM CONTEXT
//! ==============
//! Toasts, routing and the desktop automation bridge live outside this crate.
//! The session flows only need the narrow contracts below; the defaults here
//! turn them into log events so the crate runs headless (CLI, tests).

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Warning,
    Error,
}

/// User-facing toast sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: Level, message: &str);

    fn success(&self, message: &str) {
        self.notify(Level::Success, message);
    }

    fn info(&self, message: &str) {
        self.notify(Level::Info, message);
    }

    fn warning(&self, message: &str) {
        self.notify(Level::Warning, message);
    }

    fn error(&self, message: &str) {
        self.notify(Level::Error, message);
    }
}

/// Where invalidation sends the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoginRedirect {
    /// Attach the "session expired" hint to the login entry point.
    pub session_expired: bool,
}

impl LoginRedirect {
    /// Route for the login entry point.
    #[must_use]
    pub fn path(self) -> &'static str {
        if self.session_expired { "/login?expired=1" } else { "/login" }
    }
}

/// Router hook used by invalidation.
pub trait Navigator: Send + Sync {
    fn to_login(&self, redirect: LoginRedirect);
}

/// Companion desktop/automation bridge (bulk sender, CRM sync).
pub trait AutomationBridge: Send + Sync {
    fn is_active(&self) -> bool;

    /// Forget the operator the bridge was acting for.
    fn clear_logged_in_user(&self);

    /// Drop CRM state derived from the previous operator.
    fn reset_dependent_state(&self);
}

// =============================================================================
// DEFAULTS
// =============================================================================

/// Notifier that renders toasts as tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: Level, message: &str) {
        match level {
            Level::Success | Level::Info => tracing::info!(toast = ?level, "{message}"),
            Level::Warning => tracing::warn!(toast = ?level, "{message}"),
            Level::Error => tracing::error!(toast = ?level, "{message}"),
        }
    }
}

/// Navigator that only records the intent in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn to_login(&self, redirect: LoginRedirect) {
        tracing::info!(path = redirect.path(), "navigate to login");
    }
}

/// Bridge for hosts without a desktop companion.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBridge;

impl AutomationBridge for NoBridge {
    fn is_active(&self) -> bool {
        false
    }

    fn clear_logged_in_user(&self) {}

    fn reset_dependent_state(&self) {}
}
