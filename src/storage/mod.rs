//! Key-value persistence for the session.
//!
//! DESIGN
//! ======
//! Stores are synchronous: they stand in for browser local storage or a small
//! JSON file, never for a network service, so a write completes inside the
//! same critical section that updates the in-memory cells. Every key is
//! namespaced by the store (`<namespace>:<key>`), and `clear` only touches
//! keys under that namespace.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StorageError;

// =============================================================================
// KEYS
// =============================================================================

/// Logical keys persisted by the session subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    AccessToken,
    RefreshToken,
    User,
    OtpSessionId,
    SelectedTenant,
}

impl StorageKey {
    /// Every key invalidation must purge.
    pub const ALL: [StorageKey; 5] =
        [Self::AccessToken, Self::RefreshToken, Self::User, Self::OtpSessionId, Self::SelectedTenant];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::User => "user",
            Self::OtpSessionId => "otp_session_id",
            Self::SelectedTenant => "selected_tenant",
        }
    }
}

pub(crate) fn namespaced(namespace: &str, key: &str) -> String {
    format!("{namespace}:{key}")
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Raw string persistence scoped to one namespace.
pub trait KeyValueStore: Send + Sync {
    fn namespace(&self) -> &str;

    /// Read a raw value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read.
    fn get_string(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a raw value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be written.
    fn set_string(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Delete every key under this store's namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be written.
    fn clear(&self) -> Result<(), StorageError>;
}

impl dyn KeyValueStore + '_ {
    /// Read and deserialize a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serde` if the stored text is not valid for `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.get_string(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Serde { key: key.to_owned(), source })
    }

    /// Serialize and write a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw =
            serde_json::to_string(value).map_err(|source| StorageError::Serde { key: key.to_owned(), source })?;
        self.set_string(key, &raw)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
