//! # lsmkv - Write Path of an LSM Key-Value Engine
//!
//! lsmkv contains the in-memory write buffer of an LSM-style key-value store and
//! the on-disk page format its data is flushed into.
//!
//! ## Architecture
//!
//! - **SkipList**: Ordered string-keyed map with tombstones and randomized towers
//! - **Memtable**: Generational write buffer; full generations are frozen and
//!   drained oldest first
//! - **NodePage**: Fixed 4096-byte B+tree node codec (internal and leaf nodes)
//! - **BTree**: Tree handle over a pluggable [`PageStore`]
//! - **Flush**: Drains the oldest frozen generation into leaf pages
//!
//! ## Example Usage
//!
//! ```rust
//! use lsmkv::{flush_oldest, BTree, MemoryPageStore, Memtable, Options};
//!
//! # fn main() -> Result<(), lsmkv::Error> {
//! let memtable = Memtable::new(Options::default())?;
//! memtable.update("key1", "value1");
//! memtable.update("key2", "value2");
//! memtable.delete("key1");
//!
//! assert_eq!(memtable.get("key1"), None);
//! assert_eq!(memtable.get("key2"), Some("value2".into()));
//!
//! // Freeze the active generation and write it out as leaf pages
//! memtable.freeze();
//! let tree = BTree::new(MemoryPageStore::new());
//! let summary = flush_oldest(&memtable, &tree)?.expect("one frozen generation");
//! assert_eq!(summary.entries, 1);
//! assert_eq!(summary.deleted_keys, vec!["key1".to_string()]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod btree;
pub mod config;
pub mod error;
pub mod flush;
pub mod memtable;
pub mod skiplist;
pub mod store;

// Re-exports
pub use btree::{BTree, LeafBuilder, NodePage, NodeType, PageId, PageStore};
pub use config::Options;
pub use error::{Error, Result};
pub use flush::{flush_oldest, FlushSummary};
pub use memtable::{FlushEntry, FlushIterator, Memtable};
pub use skiplist::{Lookup, SharedSkipList, SkipList};
pub use store::{FilePageStore, MemoryPageStore};
