//! Durable key-value string storage, supplied by the host platform.
use std::collections::HashMap;
use std::sync::RwLock;

/// Durable key-value string storage.
///
/// The host integration supplies an implementation backed by whatever the platform offers
/// (shared preferences, a file, a database table). Values are opaque strings; the core layers
/// its own JSON on top where needed.
pub trait DataStore: Send + Sync {
    /// Fetch the value stored under `key`, or `None` if absent.
    fn fetch(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn store(&self, key: &str, value: &str);

    /// Remove the value stored under `key`, if any.
    fn clear(&self, key: &str);
}

/// [`DataStore`] held entirely in memory. Useful for tests and for hosts that manage
/// persistence elsewhere.
#[derive(Debug, Default)]
pub struct InMemoryDataStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryDataStore {
    /// Create a new empty store.
    pub fn new() -> InMemoryDataStore {
        InMemoryDataStore::default()
    }
}

impl DataStore for InMemoryDataStore {
    fn fetch(&self, key: &str) -> Option<String> {
        let values = self
            .values
            .read()
            .expect("thread holding data store lock should not panic");

        values.get(key).cloned()
    }

    fn store(&self, key: &str, value: &str) {
        let mut values = self
            .values
            .write()
            .expect("thread holding data store lock should not panic");

        values.insert(key.to_owned(), value.to_owned());
    }

    fn clear(&self, key: &str) {
        let mut values = self
            .values
            .write()
            .expect("thread holding data store lock should not panic");

        values.remove(key);
    }
}
