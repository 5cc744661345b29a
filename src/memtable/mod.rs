//! # Memtable - Generational Write Buffer
//!
//! The Memtable presents one logical ordered map backed by a list of skip list
//! generations, newest first.
//!
//! ## Design
//!
//! - Only the newest (active) generation accepts writes
//! - Before each write the active generation's footprint (live key + value
//!   bytes plus tombstone key bytes) is checked against
//!   [`Options::memtable_size_threshold`]; if it is full, or the write would
//!   grow it past the threshold, it is frozen and a new empty generation takes
//!   its place
//! - Reads scan generations newest to oldest and stop at the first generation
//!   that knows the key, so a tombstone shadows older values
//! - The oldest frozen generation can be drained with [`Memtable::oldest_iterator`]
//!   and then dropped with [`Memtable::discard_oldest`]
//!
//! ## Thread Safety
//!
//! One `RwLock` guards the generation list and the rotation decision. The skip
//! lists inside carry no lock of their own.

mod iterator;

pub use iterator::{FlushEntry, FlushIterator};

use crate::config::Options;
use crate::error::{Error, Result};
use crate::skiplist::{Lookup, SkipList};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

/// One skip list held by the memtable.
#[derive(Debug)]
pub(crate) struct Generation {
    id: u64,
    list: SkipList,
}

impl Generation {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn list(&self) -> &SkipList {
        &self.list
    }
}

#[derive(Debug, Default)]
struct Generations {
    /// Index 0: the only mutable generation. `None` until the first write.
    active: Option<Generation>,
    /// Frozen generations, newest at the front.
    frozen: VecDeque<Arc<Generation>>,
    next_id: u64,
}

impl Generations {
    fn count(&self) -> usize {
        usize::from(self.active.is_some()) + self.frozen.len()
    }

    fn new_generation(&mut self, options: &Options) -> Generation {
        let id = self.next_id;
        self.next_id += 1;
        let list = match options.tower_seed {
            Some(seed) => SkipList::with_seed(seed.wrapping_add(id)),
            None => SkipList::new(),
        };
        Generation { id, list }
    }

    /// `value_len` is `None` for a tombstone.
    fn is_full(generation: &Generation, key: &str, value_len: Option<usize>, threshold: usize) -> bool {
        let size = generation.list.footprint();
        size >= threshold || (size > 0 && generation.list.projected_footprint(key, value_len) > threshold)
    }

    fn freeze_generation(&mut self, old: Generation) {
        log::info!(
            "Generation {} frozen at {} bytes, {} frozen generations waiting for flush",
            old.id,
            old.list.footprint(),
            self.frozen.len() + 1
        );
        self.frozen.push_front(Arc::new(old));
    }

    /// Freezes the active generation (if any) and starts a new one.
    fn rotate(&mut self, options: &Options) {
        let fresh = self.new_generation(options);
        if let Some(old) = self.active.replace(fresh) {
            self.freeze_generation(old);
        }
    }

    /// Returns the active generation, rotating first if this write would not fit.
    fn writable(&mut self, key: &str, value_len: Option<usize>, options: &Options) -> &mut SkipList {
        let threshold = options.memtable_size_threshold;
        let generation = match self.active.take() {
            Some(current) if !Self::is_full(&current, key, value_len, threshold) => current,
            previous => {
                if let Some(old) = previous {
                    self.freeze_generation(old);
                }
                self.new_generation(options)
            }
        };
        &mut self.active.insert(generation).list
    }

    fn lookup(&self, key: &str) -> Option<Lookup> {
        let active = self.active.iter().map(|generation| &generation.list);
        let frozen = self.frozen.iter().map(|generation| &generation.list);
        active.chain(frozen).find_map(|list| list.search(key))
    }
}

/// Generational in-memory write buffer.
///
/// # Example
///
/// ```rust
/// use lsmkv::{Memtable, Options};
///
/// # fn main() -> Result<(), lsmkv::Error> {
/// let memtable = Memtable::new(Options::default().memtable_size_threshold(10))?;
/// memtable.update("k1", "value1");
/// memtable.update("k2", "value2xx");
///
/// assert_eq!(memtable.generation_count(), 2);
/// assert_eq!(memtable.get("k1"), Some("value1".into()));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Memtable {
    options: Options,
    state: RwLock<Generations>,
}

impl Memtable {
    /// Creates an empty memtable. No generation exists until the first write.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the options do not validate.
    pub fn new(options: Options) -> Result<Self> {
        options.validate()?;
        Ok(Self::with_validated(options))
    }

    fn with_validated(options: Options) -> Self {
        Self { options, state: RwLock::new(Generations::default()) }
    }

    /// Returns the options this memtable was created with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the live value of `key`.
    ///
    /// `None` covers both a key that was never written and one whose newest
    /// record is a tombstone.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.lookup(key).and_then(Lookup::into_value)
    }

    /// Returns the newest record of `key` across all generations.
    ///
    /// The scan stops at the first generation containing the key, tombstoned
    /// or not.
    pub fn lookup(&self, key: &str) -> Option<Lookup> {
        self.state.read().lookup(key)
    }

    /// Writes `key` into the active generation, rotating first if needed.
    pub fn update(&self, key: &str, value: impl Into<Bytes>) {
        let value = value.into();
        let mut state = self.state.write();
        state.writable(key, Some(value.len()), &self.options).insert(key, value);
    }

    /// Writes a tombstone for `key` into the active generation.
    ///
    /// The tombstone is written even if the key only exists in an older
    /// generation, so that it shadows the older value.
    pub fn delete(&self, key: &str) {
        let mut state = self.state.write();
        state.writable(key, None, &self.options).mark_deleted(key);
    }

    /// Freezes the active generation now, regardless of its size.
    ///
    /// Returns `false` if there is no active generation or it holds no nodes.
    pub fn freeze(&self) -> bool {
        let mut state = self.state.write();
        let has_nodes = state.active.as_ref().is_some_and(|g| g.list.node_count() > 0);
        if has_nodes {
            state.rotate(&self.options);
        }
        has_nodes
    }

    /// Returns the number of generations, active one included.
    pub fn generation_count(&self) -> usize {
        self.state.read().count()
    }

    /// Returns the key + value bytes of live entries in the active generation.
    pub fn active_size(&self) -> usize {
        self.state.read().active.as_ref().map_or(0, |generation| generation.list.byte_size())
    }

    /// Returns the footprint of the active generation, the measure rotation
    /// compares against the threshold. Tombstone keys are included.
    pub fn active_footprint(&self) -> usize {
        self.state.read().active.as_ref().map_or(0, |generation| generation.list.footprint())
    }

    /// Returns the sum of live entries over all generations.
    ///
    /// A key live in several generations is counted once per generation.
    pub fn len(&self) -> usize {
        let state = self.state.read();
        let active = state.active.as_ref().map_or(0, |generation| generation.list.len());
        active + state.frozen.iter().map(|generation| generation.list.len()).sum::<usize>()
    }

    /// Returns `true` if no generation holds a live entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over the oldest generation.
    ///
    /// Only available while at least two generations exist; the active
    /// generation is never handed out for flushing.
    pub fn oldest_iterator(&self) -> Option<FlushIterator> {
        let state = self.state.read();
        if state.count() < 2 {
            return None;
        }
        state.frozen.back().cloned().map(FlushIterator::new)
    }

    /// Drops the oldest frozen generation and returns its id.
    ///
    /// Returns `None` if no frozen generation exists.
    pub fn discard_oldest(&self) -> Option<u64> {
        let mut state = self.state.write();
        let generation = state.frozen.pop_back()?;
        log::info!(
            "Generation {} discarded, {} frozen generations remain",
            generation.id,
            state.frozen.len()
        );
        Some(generation.id)
    }

    /// Drops the oldest frozen generation if its id is `id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the oldest frozen generation has a different
    /// id, e.g. because another consumer already discarded it.
    pub fn discard_generation(&self, id: u64) -> Result<()> {
        let mut state = self.state.write();
        match state.frozen.back() {
            Some(generation) if generation.id == id => {
                state.frozen.pop_back();
                log::info!(
                    "Generation {} discarded, {} frozen generations remain",
                    id,
                    state.frozen.len()
                );
                Ok(())
            }
            Some(generation) => Err(Error::invalid_state(format!(
                "oldest frozen generation is {}, not {}",
                generation.id, id
            ))),
            None => Err(Error::invalid_state(format!("no frozen generation to discard ({})", id))),
        }
    }
}

impl Default for Memtable {
    /// Creates a memtable with [`Options::default`], which always validates.
    fn default() -> Self {
        Self::with_validated(Options::default())
    }
}
