//! Flush iterator over a frozen memtable generation.

use super::Generation;
use crate::skiplist::SkipList;
use bytes::Bytes;
use std::sync::Arc;

/// Iterator over the oldest frozen generation in ascending key order.
///
/// The iterator keeps the generation alive on its own, so the memtable lock is
/// not held while a flush consumer walks it. Tombstones are emitted with a
/// `None` value so the consumer can decide whether they must be persisted.
/// To restart, ask the memtable for a new iterator.
pub struct FlushIterator {
    generation: Arc<Generation>,
    cursor: usize,
}

impl FlushIterator {
    pub(super) fn new(generation: Arc<Generation>) -> Self {
        Self { generation, cursor: SkipList::start() }
    }

    /// Returns the id of the generation being iterated.
    pub fn generation_id(&self) -> u64 {
        self.generation.id()
    }
}

impl Iterator for FlushIterator {
    type Item = FlushEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let (idx, key, value) = self.generation.list().entry_after(self.cursor)?;
        self.cursor = idx;
        Some(FlushEntry { key: key.to_owned(), value: value.cloned() })
    }
}

/// A single record of a frozen generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushEntry {
    key: String,
    value: Option<Bytes>,
}

impl FlushEntry {
    /// Returns the key of this entry.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the value, or `None` for a tombstone.
    pub fn value(&self) -> Option<&Bytes> {
        self.value.as_ref()
    }

    /// Returns `true` if this entry records a deletion.
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// Splits the entry into key and value.
    pub fn into_parts(self) -> (String, Option<Bytes>) {
        (self.key, self.value)
    }
}
