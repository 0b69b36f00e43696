//! Client-storage abstraction for session persistence.
//!
//! Modeled after web local storage: an infallible string key/value store.
//! The session persists under exactly two keys — a bare bearer token and a
//! JSON blob of the full state — and both are cleared together on logout.

use std::collections::HashMap;
use std::sync::RwLock;

/// Storage slot holding the bare bearer token.
pub const TOKEN_KEY: &str = "gestor.token";

/// Storage slot holding the serialized [`crate::store::SessionState`] blob.
pub const STATE_KEY: &str = "gestor.session";

/// Key/value storage the session writes through to.
///
/// Implementations must be cheap to call on every mutation; the store
/// serializes synchronously after each state change.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-process storage backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        match self.entries.read() {
            Ok(entries) => entries.get(key).cloned(),
            Err(_) => None,
        }
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }
}
