//! Flush of frozen memtable generations into leaf pages.
//!
//! The driver walks the oldest frozen generation in key order, packs live
//! pairs into leaf pages with [`LeafBuilder`], hands every finished page to the
//! tree's page store, and finally discards the generation from the memtable.
//!
//! Leaf pages have no tombstone encoding, so tombstones are not written.
//! Pages from earlier flushes may still hold a value for a deleted key; the
//! skipped keys are returned in [`FlushSummary::deleted_keys`] so the owner of
//! those pages can drop them.

use crate::btree::{BTree, LeafBuilder, PageId, PageStore};
use crate::error::Result;
use crate::memtable::{FlushIterator, Memtable};

/// Outcome of one successful flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushSummary {
    /// Id of the generation that was flushed and discarded.
    pub generation_id: u64,
    /// Leaf pages written, in key order.
    pub pages: Vec<PageId>,
    /// Live pairs written.
    pub entries: usize,
    /// Keys whose newest record in the generation was a tombstone, ascending.
    pub deleted_keys: Vec<String>,
}

impl FlushSummary {
    /// Returns the number of tombstones that were not written.
    pub fn tombstones(&self) -> usize {
        self.deleted_keys.len()
    }
}

/// Flushes the oldest frozen generation of `memtable` into leaf pages.
///
/// Returns `Ok(None)` when there is nothing to flush (fewer than two
/// generations). On error every page written so far is released again and
/// the generation stays in the memtable.
///
/// # Errors
///
/// - `PageOverflow` if a single pair does not fit in an empty leaf
/// - any error of the page store
/// - `InvalidState` if the generation was discarded by someone else meanwhile
pub fn flush_oldest<S: PageStore>(memtable: &Memtable, tree: &BTree<S>) -> Result<Option<FlushSummary>> {
    let Some(iter) = memtable.oldest_iterator() else {
        log::debug!("No frozen generation to flush");
        return Ok(None);
    };

    let generation_id = iter.generation_id();
    log::info!("Starting flush of generation {}", generation_id);

    let mut pages = Vec::new();
    let mut deleted_keys = Vec::new();
    let written = write_leaves(iter, tree, memtable.options().leaf_fill_limit, &mut pages, &mut deleted_keys)
        .and_then(|entries| memtable.discard_generation(generation_id).map(|()| entries));

    match written {
        Ok(entries) => {
            log::info!(
                "Flush completed: generation {}, {} entries in {} pages, {} tombstones skipped",
                generation_id,
                entries,
                pages.len(),
                deleted_keys.len()
            );
            Ok(Some(FlushSummary { generation_id, pages, entries, deleted_keys }))
        }
        Err(e) => {
            log::warn!("Flush of generation {} failed: {}", generation_id, e);
            for id in pages {
                if let Err(free_err) = tree.free(id) {
                    log::warn!("Failed to release page {} after failed flush: {}", id, free_err);
                }
            }
            Err(e)
        }
    }
}

/// Returns the number of pairs written.
fn write_leaves<S: PageStore>(
    iter: FlushIterator,
    tree: &BTree<S>,
    fill_limit: usize,
    pages: &mut Vec<PageId>,
    deleted_keys: &mut Vec<String>,
) -> Result<usize> {
    let mut builder = LeafBuilder::with_limit(fill_limit);
    let mut entries = 0;

    for entry in iter {
        let (key, value) = entry.into_parts();
        let Some(value) = value else {
            deleted_keys.push(key);
            continue;
        };

        if !builder.is_empty() && !builder.fits(key.as_bytes(), &value) {
            let full = std::mem::replace(&mut builder, LeafBuilder::with_limit(fill_limit));
            pages.push(tree.write(full.finish()?)?);
        }
        builder.add(key.as_bytes(), &value)?;
        entries += 1;
    }

    if !builder.is_empty() {
        pages.push(tree.write(builder.finish()?)?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::error::Error;
    use crate::store::MemoryPageStore;

    #[test]
    fn test_flush_nothing_to_do() {
        let memtable = Memtable::default();
        let tree = BTree::new(MemoryPageStore::new());
        assert_eq!(flush_oldest(&memtable, &tree).unwrap(), None);

        memtable.update("a", "1");
        assert_eq!(flush_oldest(&memtable, &tree).unwrap(), None);
    }

    #[test]
    fn test_flush_splits_into_pages() {
        let options = Options::default().tower_seed(3).leaf_fill_limit(128);
        let memtable = Memtable::new(options).unwrap();
        for i in 0..40 {
            memtable.update(&format!("key{:03}", i), format!("value{:03}", i));
        }
        memtable.delete("key005");
        memtable.freeze();

        let tree = BTree::new(MemoryPageStore::new());
        let summary = flush_oldest(&memtable, &tree).unwrap().unwrap();
        assert_eq!(summary.entries, 39);
        assert_eq!(summary.deleted_keys, vec!["key005".to_string()]);
        assert!(summary.pages.len() > 1);
        assert_eq!(memtable.generation_count(), 1);

        let mut keys = Vec::new();
        for id in &summary.pages {
            let page = tree.load(*id).unwrap();
            assert!(page.size() as usize <= 128);
            for kv in page.kvs() {
                let (key, value) = kv.unwrap();
                assert_eq!(&key[3..], &value[5..]);
                keys.push(String::from_utf8(key.to_vec()).unwrap());
            }
        }
        assert_eq!(keys.len(), 39);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert!(!keys.contains(&"key005".to_string()));
    }

    #[test]
    fn test_flush_failure_keeps_generation_and_releases_pages() {
        let options = Options::default().leaf_fill_limit(64);
        let memtable = Memtable::new(options).unwrap();
        memtable.update("a", "small");
        memtable.update("b", "x".repeat(100));
        memtable.freeze();

        let store = MemoryPageStore::new();
        let tree = BTree::new(&store);
        let result = flush_oldest(&memtable, &tree);
        assert!(matches!(result, Err(Error::PageOverflow { .. })));
        assert_eq!(memtable.generation_count(), 2);
        assert!(store.is_empty());
        assert_eq!(memtable.get("a").unwrap(), "small");
    }
}
