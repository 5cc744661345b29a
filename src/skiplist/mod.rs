//! # SkipList - Probabilistic Ordered Index
//!
//! An ordered map from string keys to byte values with tombstone support.
//!
//! ## Design
//!
//! - Nodes live in an arena (`Vec<Node>`); forward links are arena indices
//! - Slot 0 is the head sentinel (-inf), slot 1 the tail sentinel (+inf),
//!   both with full-height towers
//! - Tower heights are sampled by fair coin flips, capped at [`MAX_HEIGHT`]
//! - Deletion overwrites the value with a tombstone; nodes are never unlinked
//!
//! ## Thread Safety
//!
//! `SkipList` itself carries no lock. Mutation needs `&mut SkipList`, so the
//! owner decides how it is synchronized: [`SharedSkipList`] wraps one list in a
//! `RwLock`, and the memtable guards all of its generations with a single lock.

mod shared;

pub use shared::SharedSkipList;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Maximum tower height of a node.
pub const MAX_HEIGHT: usize = 16;

const HEAD: usize = 0;
const TAIL: usize = 1;

/// Outcome of a successful key lookup.
///
/// A key that was never written yields `None` from [`SkipList::search`]; a key
/// that was written and later deleted yields `Some(Lookup::Tombstone)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The key holds a live value.
    Value(Bytes),
    /// The key was deleted.
    Tombstone,
}

impl Lookup {
    /// Returns the live value, or `None` for a tombstone.
    pub fn into_value(self) -> Option<Bytes> {
        match self {
            Lookup::Value(value) => Some(value),
            Lookup::Tombstone => None,
        }
    }

    /// Returns `true` if the key was deleted.
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Lookup::Tombstone)
    }
}

#[derive(Debug)]
struct Node {
    key: String,
    // None marks a tombstone
    value: Option<Bytes>,
    tower: Box<[usize]>,
}

impl Node {
    fn sentinel(link: usize) -> Self {
        Self { key: String::new(), value: None, tower: vec![link; MAX_HEIGHT].into_boxed_slice() }
    }
}

/// Left and right neighbours of a key at every level.
struct Bounds {
    left: [usize; MAX_HEIGHT],
    right: [usize; MAX_HEIGHT],
}

/// Arena-backed skip list keyed by `String`.
///
/// # Example
///
/// ```rust
/// use lsmkv::skiplist::{Lookup, SkipList};
///
/// let mut list = SkipList::new();
/// list.insert("a", "1");
/// list.insert("b", "2");
/// assert_eq!(list.search("a"), Some(Lookup::Value("1".into())));
///
/// list.delete("a");
/// assert_eq!(list.search("a"), Some(Lookup::Tombstone));
/// assert_eq!(list.len(), 1);
/// ```
#[derive(Debug)]
pub struct SkipList {
    nodes: Vec<Node>,
    /// Live entries, tombstones excluded
    len: usize,
    /// Key + value bytes of live entries
    byte_size: usize,
    /// `byte_size` plus key bytes of tombstoned nodes
    footprint: usize,
    rng: StdRng,
}

impl SkipList {
    /// Creates an empty list whose tower heights are seeded from OS entropy.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Creates an empty list with deterministic tower heights.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let nodes = vec![Node::sentinel(TAIL), Node::sentinel(TAIL)];
        Self { nodes, len: 0, byte_size: 0, footprint: 0, rng }
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the list holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the key + value bytes of all live entries.
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Returns the bytes held by all nodes: key + value bytes of live entries
    /// plus key bytes of tombstones.
    pub fn footprint(&self) -> usize {
        self.footprint
    }

    /// Returns what [`SkipList::footprint`] would be after writing `key`.
    ///
    /// `value_len` is `None` for a tombstone. An existing node for `key` is
    /// replaced, so only the difference is charged.
    pub fn projected_footprint(&self, key: &str, value_len: Option<usize>) -> usize {
        let incoming = key.len() + value_len.unwrap_or(0);
        match self.find(key) {
            Some(idx) => {
                let existing = key.len() + self.nodes[idx].value.as_ref().map_or(0, Bytes::len);
                self.footprint - existing + incoming
            }
            None => self.footprint + incoming,
        }
    }

    /// Returns the number of nodes, tombstoned ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 2
    }

    /// Returns the current state of `key`, or `None` if it was never written.
    pub fn search(&self, key: &str) -> Option<Lookup> {
        self.find(key).map(|idx| match &self.nodes[idx].value {
            Some(value) => Lookup::Value(value.clone()),
            None => Lookup::Tombstone,
        })
    }

    /// Inserts or overwrites `key`.
    ///
    /// Returns `true` if the key became live: it was absent or tombstoned.
    pub fn insert(&mut self, key: &str, value: impl Into<Bytes>) -> bool {
        let value = value.into();
        let value_len = value.len();
        let bounds = self.find_bounds(key);

        if let Some(idx) = self.match_at(key, &bounds) {
            let node = &mut self.nodes[idx];
            let revived = match node.value.replace(value) {
                Some(old) => {
                    self.byte_size = self.byte_size - old.len() + value_len;
                    self.footprint = self.footprint - old.len() + value_len;
                    false
                }
                None => {
                    self.len += 1;
                    self.byte_size += key.len() + value_len;
                    // the key bytes were already charged to the tombstone
                    self.footprint += value_len;
                    true
                }
            };
            return revived;
        }

        self.byte_size += key.len() + value_len;
        self.footprint += key.len() + value_len;
        self.len += 1;
        self.splice(key, Some(value), &bounds);
        true
    }

    /// Same as [`SkipList::insert`].
    pub fn update(&mut self, key: &str, value: impl Into<Bytes>) -> bool {
        self.insert(key, value)
    }

    /// Tombstones `key` if it holds a live value.
    ///
    /// Returns `true` if a live value was removed. Absent keys are left absent.
    pub fn delete(&mut self, key: &str) -> bool {
        match self.find(key) {
            Some(idx) => self.tombstone(idx),
            None => false,
        }
    }

    /// Tombstones `key`, inserting a tombstone node if the key was never written.
    ///
    /// Used where a tombstone must shadow older data held elsewhere.
    /// Returns `true` if a live value was removed.
    pub fn mark_deleted(&mut self, key: &str) -> bool {
        let bounds = self.find_bounds(key);
        match self.match_at(key, &bounds) {
            Some(idx) => self.tombstone(idx),
            None => {
                self.footprint += key.len();
                self.splice(key, None, &bounds);
                false
            }
        }
    }

    /// Returns an iterator over all nodes in ascending key order.
    ///
    /// Tombstoned keys are yielded with a `None` value.
    pub fn iter(&self) -> Iter<'_> {
        Iter { list: self, cursor: HEAD }
    }

    /// Returns the node following `idx` on level 0, or `None` at the tail.
    pub(crate) fn entry_after(&self, idx: usize) -> Option<(usize, &str, Option<&Bytes>)> {
        let next = self.nodes[idx].tower[0];
        if next == TAIL {
            return None;
        }
        let node = &self.nodes[next];
        Some((next, node.key.as_str(), node.value.as_ref()))
    }

    /// Arena index to start an `entry_after` walk from.
    pub(crate) fn start() -> usize {
        HEAD
    }

    fn tombstone(&mut self, idx: usize) -> bool {
        let node = &mut self.nodes[idx];
        match node.value.take() {
            Some(old) => {
                self.len -= 1;
                self.byte_size -= node.key.len() + old.len();
                self.footprint -= old.len();
                true
            }
            None => false,
        }
    }

    /// Samples a tower height in `1..=MAX_HEIGHT`; `P(h) = 2^-h` below the cap.
    fn random_height(&mut self) -> usize {
        let mut height = 1;
        while height < MAX_HEIGHT && self.rng.random_bool(0.5) {
            height += 1;
        }
        height
    }

    fn find(&self, key: &str) -> Option<usize> {
        let mut cur = HEAD;
        for level in (0..MAX_HEIGHT).rev() {
            let mut next = self.nodes[cur].tower[level];
            while next != TAIL && self.nodes[next].key.as_str() < key {
                cur = next;
                next = self.nodes[cur].tower[level];
            }
        }
        let candidate = self.nodes[cur].tower[0];
        (candidate != TAIL && self.nodes[candidate].key == key).then_some(candidate)
    }

    /// Narrows `[left, right]` level by level from the top. Each level starts
    /// from the bracket inherited from the level above, so no node is scanned
    /// twice on the same level.
    fn find_bounds(&self, key: &str) -> Bounds {
        let mut bounds = Bounds { left: [HEAD; MAX_HEIGHT], right: [TAIL; MAX_HEIGHT] };
        let mut cur = HEAD;
        for level in (0..MAX_HEIGHT).rev() {
            let mut next = self.nodes[cur].tower[level];
            while next != TAIL && self.nodes[next].key.as_str() < key {
                cur = next;
                next = self.nodes[cur].tower[level];
            }
            bounds.left[level] = cur;
            bounds.right[level] = next;
        }
        bounds
    }

    fn match_at(&self, key: &str, bounds: &Bounds) -> Option<usize> {
        let candidate = bounds.right[0];
        (candidate != TAIL && self.nodes[candidate].key == key).then_some(candidate)
    }

    fn splice(&mut self, key: &str, value: Option<Bytes>, bounds: &Bounds) {
        let height = self.random_height();
        let idx = self.nodes.len();
        let tower: Box<[usize]> = bounds.right[..height].into();
        self.nodes.push(Node { key: key.to_owned(), value, tower });
        for level in 0..height {
            self.nodes[bounds.left[level]].tower[level] = idx;
        }
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a [`SkipList`] in ascending key order.
pub struct Iter<'a> {
    list: &'a SkipList,
    cursor: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, Option<&'a Bytes>);

    fn next(&mut self) -> Option<Self::Item> {
        let (idx, key, value) = self.list.entry_after(self.cursor)?;
        self.cursor = idx;
        Some((key, value))
    }
}
