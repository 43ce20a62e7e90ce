//! In-process store, shareable across namespaces.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{KeyValueStore, namespaced};
use crate::error::StorageError;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    namespace: String,
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), entries: Arc::default() }
    }

    /// A view over the same backing map under another namespace.
    #[must_use]
    pub fn scoped(&self, namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), entries: Arc::clone(&self.entries) }
    }

    /// Raw access to a fully-qualified key, bypassing the namespace.
    #[must_use]
    pub fn raw(&self, qualified_key: &str) -> Option<String> {
        self.lock().get(qualified_key).cloned()
    }

    /// Write a fully-qualified key directly (used to simulate foreign or corrupt data).
    pub fn insert_raw(&self, qualified_key: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(qualified_key.into(), value.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(&namespaced(&self.namespace, key)).cloned())
    }

    fn set_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock()
            .insert(namespaced(&self.namespace, key), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(&namespaced(&self.namespace, key));
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let prefix = namespaced(&self.namespace, "");
        self.lock().retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }
}
