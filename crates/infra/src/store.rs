use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use classorder_core::ExpectedVersion;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency failure: the document moved since it was read.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),
    /// Anything else the backend reports (poisoned lock, IO, corrupt data).
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// A stored document together with its version.
///
/// Versions start at 1 and strictly increase with each write to the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<V> {
    pub value: V,
    pub version: u64,
}

impl<V> Versioned<V> {
    pub fn new(value: V, version: u64) -> Self {
        Self { value, version }
    }
}

/// Versioned key/value document storage.
///
/// Every write names the version it expects to replace; the store rejects it
/// with [`StoreError::Concurrency`] when the stored version differs.
pub trait DocumentStore<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Result<Option<Versioned<V>>, StoreError>;

    /// Write `doc` over the current document. `doc.version` must be greater
    /// than the version being replaced.
    fn put(&self, key: K, doc: Versioned<V>, expected: ExpectedVersion) -> Result<(), StoreError>;

    /// Returns `true` if a document was removed.
    fn delete(&self, key: &K, expected: ExpectedVersion) -> Result<bool, StoreError>;

    fn list(&self) -> Result<Vec<(K, Versioned<V>)>, StoreError>;
}

impl<K, V, S> DocumentStore<K, V> for Arc<S>
where
    S: DocumentStore<K, V> + ?Sized,
{
    fn get(&self, key: &K) -> Result<Option<Versioned<V>>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: K, doc: Versioned<V>, expected: ExpectedVersion) -> Result<(), StoreError> {
        (**self).put(key, doc, expected)
    }

    fn delete(&self, key: &K, expected: ExpectedVersion) -> Result<bool, StoreError> {
        (**self).delete(key, expected)
    }

    fn list(&self) -> Result<Vec<(K, Versioned<V>)>, StoreError> {
        (**self).list()
    }
}

/// In-memory document store for tests/dev.
#[derive(Debug)]
pub struct InMemoryDocumentStore<K, V> {
    inner: RwLock<HashMap<K, Versioned<V>>>,
}

impl<K, V> InMemoryDocumentStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryDocumentStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

fn check_expected(expected: ExpectedVersion, current: Option<u64>) -> Result<(), StoreError> {
    if expected.matches(current) {
        Ok(())
    } else {
        Err(StoreError::Concurrency(format!(
            "expected {expected:?}, found {current:?}"
        )))
    }
}

impl<K, V> DocumentStore<K, V> for InMemoryDocumentStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Result<Option<Versioned<V>>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: K, doc: Versioned<V>, expected: ExpectedVersion) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;

        let current = map.get(&key).map(|d| d.version);
        check_expected(expected, current)?;

        if let Some(current) = current {
            if doc.version <= current {
                return Err(StoreError::Backend(format!(
                    "version must increase (current {current}, attempted {})",
                    doc.version
                )));
            }
        }

        map.insert(key, doc);
        Ok(())
    }

    fn delete(&self, key: &K, expected: ExpectedVersion) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;

        let current = map.get(key).map(|d| d.version);
        check_expected(expected, current)?;

        Ok(map.remove(key).is_some())
    }

    fn list(&self) -> Result<Vec<(K, Versioned<V>)>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}
