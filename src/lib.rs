//! Session and token lifecycle for the chatdesk client.
//!
//! ARCHITECTURE
//! ============
//! - `state`: reactive session cells mirrored into a `KeyValueStore`.
//! - `services`: the flows (two-stage login, single-flight refresh,
//!   invalidation, tenant switch, startup validation).
//! - `session`: `SessionManager`, the context every flow runs against.
//! - `interceptor`: how a request layer consumes the refresh contract.
//!
//! The backend is reached through the `AuthApi` trait; `HttpAuthApi` is the
//! reqwest implementation.

pub mod api;
pub mod collab;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod services;
pub mod session;
pub mod state;
pub mod storage;
pub mod types;

pub use api::{AuthApi, HttpAuthApi};
pub use config::SessionConfig;
pub use error::{ApiError, AuthError, ErrorKind, FormReset, LoginStage, StageFailure};
pub use services::{Bootstrap, LoginOutcome, RefreshSignal};
pub use session::SessionManager;
pub use state::{AuthStage, SessionSnapshot, SessionState};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use types::{Role, Tenant, User};
