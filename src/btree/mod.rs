//! B+tree node format and page-store contract.
//!
//! Nodes are stored as fixed 4096-byte pages (see [`page`]). The tree reaches
//! persistence only through the [`PageStore`] trait, so the same codec works
//! over an in-memory map, a page file, or any other allocator.
//!
//! Only the node codec lives here. Insert, split and merge of tree structure
//! are not implemented; [`BTree`] is the extension point they would hang off.

pub mod builder;
pub mod page;

pub use builder::LeafBuilder;
pub use page::{KvIter, NodePage, NodeType, HEADER_LEN, PAGE_SIZE};

use crate::error::Result;
use bytes::{Bytes, BytesMut};
use std::sync::Arc;

/// Opaque identifier of a persisted page.
pub type PageId = u64;

/// Persistence collaborator of the tree.
///
/// Implementations must hand back exactly the bytes they were given, and must
/// not reuse an id until it was released with [`PageStore::del`].
pub trait PageStore {
    /// Returns the page contents for `id`.
    fn get(&self, id: PageId) -> Result<Bytes>;

    /// Persists a new page and returns its identifier.
    fn new_page(&self, page: Bytes) -> Result<PageId>;

    /// Releases the page `id`.
    fn del(&self, id: PageId) -> Result<()>;
}

impl<S: PageStore + ?Sized> PageStore for Arc<S> {
    fn get(&self, id: PageId) -> Result<Bytes> {
        (**self).get(id)
    }

    fn new_page(&self, page: Bytes) -> Result<PageId> {
        (**self).new_page(page)
    }

    fn del(&self, id: PageId) -> Result<()> {
        (**self).del(id)
    }
}

impl<S: PageStore + ?Sized> PageStore for &S {
    fn get(&self, id: PageId) -> Result<Bytes> {
        (**self).get(id)
    }

    fn new_page(&self, page: Bytes) -> Result<PageId> {
        (**self).new_page(page)
    }

    fn del(&self, id: PageId) -> Result<()> {
        (**self).del(id)
    }
}

/// A B+tree handle: the root page id plus the page store holding its nodes.
pub struct BTree<S> {
    root: Option<PageId>,
    store: S,
}

impl<S: PageStore> BTree<S> {
    /// Creates an empty tree over `store`.
    pub fn new(store: S) -> Self {
        Self { root: None, store }
    }

    /// Opens a tree whose root page already lives in `store`.
    pub fn with_root(store: S, root: PageId) -> Self {
        Self { root: Some(root), store }
    }

    /// Returns the root page id, or `None` for an empty tree.
    pub fn root(&self) -> Option<PageId> {
        self.root
    }

    /// Replaces the root page id.
    pub fn set_root(&mut self, root: Option<PageId>) {
        self.root = root;
    }

    /// Returns the underlying page store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetches a page and checks its header.
    pub fn load(&self, id: PageId) -> Result<NodePage<Bytes>> {
        let page = NodePage::from_bytes(self.store.get(id)?)?;
        page.validate()?;
        Ok(page)
    }

    /// Fetches the root page, if the tree has one.
    pub fn load_root(&self) -> Result<Option<NodePage<Bytes>>> {
        self.root.map(|id| self.load(id)).transpose()
    }

    /// Checks and persists a page, returning its new id.
    pub fn write(&self, page: NodePage<BytesMut>) -> Result<PageId> {
        page.validate()?;
        self.store.new_page(page.into_inner().freeze())
    }

    /// Releases a page.
    pub fn free(&self, id: PageId) -> Result<()> {
        self.store.del(id)
    }
}
