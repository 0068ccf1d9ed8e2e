//! Persisted, lazily hydrated state cells.
use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::data_store::DataStore;
use crate::model::{ProfileKey, PropertyValue};

/// A persisted string value, hydrated from the data store on first access and cached
/// thereafter (the store is read at most once per process unless the cell is reset).
pub(crate) struct PersistentString {
    key: &'static str,
    fallback: Option<fn() -> String>,
    // Outer `None`: not hydrated yet. Inner `None`: hydrated, no value.
    cell: Mutex<Option<Option<String>>>,
}

impl PersistentString {
    pub fn new(key: &'static str) -> PersistentString {
        PersistentString {
            key,
            fallback: None,
            cell: Mutex::new(None),
        }
    }

    /// A cell that synthesizes and persists a value when storage is empty.
    pub fn with_fallback(key: &'static str, fallback: fn() -> String) -> PersistentString {
        PersistentString {
            key,
            fallback: Some(fallback),
            cell: Mutex::new(None),
        }
    }

    pub fn get(&self, store: &dyn DataStore) -> Option<String> {
        let mut cell = self.lock();
        if let Some(cached) = &*cell {
            return cached.clone();
        }

        let stored = store.fetch(self.key).filter(|value| !value.is_empty());
        let value = match (stored, self.fallback) {
            (Some(value), _) => Some(value),
            (None, Some(fallback)) => {
                let value = fallback();
                store.store(self.key, &value);
                Some(value)
            }
            (None, None) => None,
        };

        *cell = Some(value.clone());
        value
    }

    /// Apply an update, returning the previous value when the change took effect.
    ///
    /// Empty strings and no-op updates are ignored (`None`); values are trimmed first.
    pub fn set(&self, store: &dyn DataStore, value: &str) -> Option<Option<String>> {
        let trimmed = value.trim();
        if trimmed != value {
            log::debug!(target: "beacon", "trimmed whitespace from {}", self.key);
        }
        if trimmed.is_empty() {
            log::warn!(target: "beacon", "empty value for {} will be ignored", self.key);
            return None;
        }

        let old = self.get(store);
        if old.as_deref() == Some(trimmed) {
            log::info!(target: "beacon", "ignored update for {}, value is unchanged", self.key);
            return None;
        }

        *self.lock() = Some(Some(trimmed.to_owned()));
        store.store(self.key, trimmed);
        Some(old)
    }

    /// Clear the cell in memory and storage, bypassing validation. A fallback-backed cell
    /// will synthesize a fresh value on its next read.
    pub fn reset(&self, store: &dyn DataStore) {
        *self.lock() = None;
        store.clear(self.key);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Option<String>>> {
        self.cell
            .lock()
            .expect("thread holding state lock should not panic")
    }
}

/// The profile attribute bucket, persisted as a single JSON blob.
pub(crate) struct PersistentAttributes {
    key: &'static str,
    cell: Mutex<Option<HashMap<ProfileKey, PropertyValue>>>,
}

impl PersistentAttributes {
    pub fn new(key: &'static str) -> PersistentAttributes {
        PersistentAttributes {
            key,
            cell: Mutex::new(None),
        }
    }

    pub fn get(&self, store: &dyn DataStore) -> HashMap<ProfileKey, PropertyValue> {
        let mut cell = self.lock();
        if let Some(cached) = &*cell {
            return cached.clone();
        }

        let attributes = store
            .fetch(self.key)
            .filter(|stored| !stored.is_empty())
            .map(|stored| Self::deserialize(self.key, &stored))
            .unwrap_or_default();

        *cell = Some(attributes.clone());
        attributes
    }

    pub fn set(&self, store: &dyn DataStore, attributes: &HashMap<ProfileKey, PropertyValue>) {
        if attributes.is_empty() {
            store.clear(self.key);
        } else {
            let serialized: serde_json::Map<String, Value> = attributes
                .iter()
                .map(|(key, value)| (key.name().to_owned(), value.to_json()))
                .collect();
            store.store(self.key, &Value::Object(serialized).to_string());
        }

        *self.lock() = Some(attributes.clone());
    }

    pub fn reset(&self, store: &dyn DataStore) {
        *self.lock() = None;
        store.clear(self.key);
    }

    /// Malformed stored JSON yields an empty bucket rather than an error: persisted
    /// attributes are a cache of pending sync data, never worth crashing over.
    fn deserialize(key: &str, stored: &str) -> HashMap<ProfileKey, PropertyValue> {
        let parsed: Value = match serde_json::from_str(stored) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::warn!(target: "beacon", "invalid stored JSON for {key}: {err}");
                return HashMap::new();
            }
        };

        let Value::Object(entries) = parsed else {
            log::warn!(target: "beacon", "stored JSON for {key} is not an object");
            return HashMap::new();
        };

        entries
            .iter()
            .map(|(name, value)| (ProfileKey::from_name(name), PropertyValue::from_json(value)))
            .collect()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, Option<HashMap<ProfileKey, PropertyValue>>> {
        self.cell
            .lock()
            .expect("thread holding state lock should not panic")
    }
}
