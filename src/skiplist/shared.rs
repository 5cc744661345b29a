//! Lock-guarded skip list for general-purpose shared use.

use super::{Lookup, SkipList};
use bytes::Bytes;
use parking_lot::RwLock;

/// A [`SkipList`] behind a single reader-writer lock.
///
/// Every method takes the lock for its full duration: shared for reads,
/// exclusive for writes. The unlocked list is only reachable through the
/// guard, so no helper can take the lock a second time.
///
/// # Example
///
/// ```rust
/// use lsmkv::skiplist::SharedSkipList;
/// use std::sync::Arc;
/// use std::thread;
///
/// let list = Arc::new(SharedSkipList::new());
/// let writer = {
///     let list = Arc::clone(&list);
///     thread::spawn(move || list.insert("key", "value"))
/// };
/// writer.join().unwrap();
/// assert_eq!(list.get("key"), Some("value".into()));
/// ```
#[derive(Debug, Default)]
pub struct SharedSkipList {
    inner: RwLock<SkipList>,
}

impl SharedSkipList {
    /// Creates an empty shared list.
    pub fn new() -> Self {
        Self { inner: RwLock::new(SkipList::new()) }
    }

    /// Creates an empty shared list with deterministic tower heights.
    pub fn with_seed(seed: u64) -> Self {
        Self { inner: RwLock::new(SkipList::with_seed(seed)) }
    }

    /// Returns the current state of `key`, or `None` if it was never written.
    pub fn search(&self, key: &str) -> Option<Lookup> {
        self.inner.read().search(key)
    }

    /// Returns the live value of `key`, treating tombstones as absent.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.search(key).and_then(Lookup::into_value)
    }

    /// Inserts or overwrites `key`. Returns `true` if the key became live.
    pub fn insert(&self, key: &str, value: impl Into<Bytes>) -> bool {
        self.inner.write().insert(key, value)
    }

    /// Same as [`SharedSkipList::insert`].
    pub fn update(&self, key: &str, value: impl Into<Bytes>) -> bool {
        self.insert(key, value)
    }

    /// Tombstones `key`. Returns `true` if a live value was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.inner.write().delete(key)
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns `true` if the list holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Returns the key + value bytes of all live entries.
    pub fn byte_size(&self) -> usize {
        self.inner.read().byte_size()
    }

    /// Copies every node, tombstones included, in ascending key order.
    pub fn snapshot(&self) -> Vec<(String, Option<Bytes>)> {
        let list = self.inner.read();
        list.iter().map(|(key, value)| (key.to_owned(), value.cloned())).collect()
    }
}
