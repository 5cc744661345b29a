//! In-memory page store.

use super::check_page_len;
use crate::btree::{PageId, PageStore};
use crate::error::{Error, Result};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Page store backed by a `HashMap`.
///
/// Ids start at 1 and are never reused.
#[derive(Debug)]
pub struct MemoryPageStore {
    pages: RwLock<HashMap<PageId, Bytes>>,
    next_id: AtomicU64,
}

impl MemoryPageStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self { pages: RwLock::new(HashMap::new()), next_id: AtomicU64::new(1) }
    }

    /// Returns the number of live pages.
    pub fn len(&self) -> usize {
        self.pages.read().len()
    }

    /// Returns `true` if the store holds no pages.
    pub fn is_empty(&self) -> bool {
        self.pages.read().is_empty()
    }
}

impl Default for MemoryPageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PageStore for MemoryPageStore {
    fn get(&self, id: PageId) -> Result<Bytes> {
        self.pages.read().get(&id).cloned().ok_or(Error::PageNotFound(id))
    }

    fn new_page(&self, page: Bytes) -> Result<PageId> {
        check_page_len(page.len())?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.pages.write().insert(id, page);
        Ok(id)
    }

    fn del(&self, id: PageId) -> Result<()> {
        self.pages.write().remove(&id).map(|_| ()).ok_or(Error::PageNotFound(id))
    }
}
