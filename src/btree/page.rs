//! Fixed-size page codec for B+tree nodes.
//!
//! Every node is one 4096-byte page. All integers are little-endian.
//!
//! Internal node:
//! ```text
//! |             header            |          data           |
//! | type | count | size | padding | child_pointers | unused |
//! |  2B  |  2B   |  2B  |   2B    |   count * 8B   |  ...   |
//! ```
//!
//! Leaf node:
//! ```text
//! |             header            |               data             |
//! | type | count | size | padding | kv_offsets  | kv_data | unused |
//! |  2B  |  2B   |  2B  |   2B    | count * 2B  |   ...   |  ...   |
//! ```
//!
//! Each kv_offset is relative to the start of kv_data. A KV pair is
//! `key_len(2B) | val_len(2B) | key | val`.

use super::PageId;
use crate::error::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::ops::Range;

/// Capacity of every page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Length of the page header.
pub const HEADER_LEN: usize = 8;

const TYPE_OFFSET: usize = 0;
const COUNT_OFFSET: usize = 2;
const SIZE_OFFSET: usize = 4;
const DATA_OFFSET: usize = HEADER_LEN;

pub(crate) const CHILD_PTR_LEN: usize = 8;
pub(crate) const KV_OFFSET_LEN: usize = 2;
pub(crate) const KV_HEADER_LEN: usize = 4;

/// The kind of B+tree node stored in a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum NodeType {
    /// Holds child page pointers.
    Internal = 0,
    /// Holds key-value pairs.
    Leaf = 1,
}

impl NodeType {
    /// Converts the on-page tag to a NodeType.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(NodeType::Internal),
            1 => Some(NodeType::Leaf),
            _ => None,
        }
    }

    /// Converts the NodeType to its on-page tag.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Bytes one entry occupies in the slot area directly after the header.
    fn slot_len(self) -> usize {
        match self {
            NodeType::Internal => CHILD_PTR_LEN,
            NodeType::Leaf => KV_OFFSET_LEN,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Internal => f.write_str("INTERNAL"),
            NodeType::Leaf => f.write_str("LEAF"),
        }
    }
}

/// Byte ranges of one KV pair inside the page buffer.
struct KvSlot {
    key: Range<usize>,
    value: Range<usize>,
}

/// A typed view over one raw page buffer.
///
/// Read accessors work on any `B: AsRef<[u8]>`, such as `Bytes` handed back by
/// a page store; mutating accessors also need `B: AsMut<[u8]>`. Nothing is
/// copied: keys and values are returned as slices of the buffer.
///
/// Every indexed accessor validates the node type, the index and the byte
/// range it touches before reading or writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePage<B> {
    buf: B,
}

impl NodePage<BytesMut> {
    /// Creates an empty internal page.
    pub fn new_internal() -> Self {
        Self::empty(NodeType::Internal)
    }

    /// Creates an empty leaf page.
    pub fn new_leaf() -> Self {
        Self::empty(NodeType::Leaf)
    }

    fn empty(node_type: NodeType) -> Self {
        let mut page = Self { buf: BytesMut::zeroed(PAGE_SIZE) };
        page.set_node_type(node_type);
        page.write_u16(SIZE_OFFSET, HEADER_LEN as u16);
        page
    }

    /// Converts the page into an immutable one.
    pub fn freeze(self) -> NodePage<Bytes> {
        NodePage { buf: self.buf.freeze() }
    }
}

impl<B: AsRef<[u8]>> NodePage<B> {
    /// Wraps an existing buffer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the buffer is not exactly [`PAGE_SIZE`] bytes.
    pub fn from_bytes(buf: B) -> Result<Self> {
        let len = buf.as_ref().len();
        if len != PAGE_SIZE {
            return Err(Error::invalid_argument(format!(
                "page buffer must be {} bytes, got {}",
                PAGE_SIZE, len
            )));
        }
        Ok(Self { buf })
    }

    /// Returns the raw page bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_ref()
    }

    /// Returns the underlying buffer.
    pub fn into_inner(self) -> B {
        self.buf
    }

    fn read_u16(&self, offset: usize) -> u16 {
        (&self.as_bytes()[offset..offset + 2]).get_u16_le()
    }

    /// Returns the raw type tag from the header.
    pub fn raw_type(&self) -> u16 {
        self.read_u16(TYPE_OFFSET)
    }

    /// Returns the node type.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if the type tag is neither 0 nor 1.
    pub fn node_type(&self) -> Result<NodeType> {
        let raw = self.raw_type();
        NodeType::from_u16(raw).ok_or_else(|| Error::corruption(format!("unknown node type {}", raw)))
    }

    /// Returns the number of children (internal) or KV pairs (leaf).
    pub fn count(&self) -> u16 {
        self.read_u16(COUNT_OFFSET)
    }

    /// Returns the number of used bytes, header included.
    pub fn size(&self) -> u16 {
        self.read_u16(SIZE_OFFSET)
    }

    /// Returns the bytes still available before the page is full.
    pub fn free_space(&self) -> usize {
        PAGE_SIZE.saturating_sub(self.size() as usize)
    }

    /// Checks the header: known type tag and `size` within `[HEADER_LEN, PAGE_SIZE]`.
    pub fn validate(&self) -> Result<()> {
        self.node_type()?;
        self.used_end()?;
        Ok(())
    }

    fn used_end(&self) -> Result<usize> {
        let size = self.size() as usize;
        if size < HEADER_LEN || size > self.as_bytes().len() {
            return Err(Error::corruption(format!(
                "page size {} outside [{}, {}]",
                size,
                HEADER_LEN,
                self.as_bytes().len()
            )));
        }
        Ok(size)
    }

    /// Returns the data region `[HEADER_LEN, size)`.
    pub fn data(&self) -> Result<&[u8]> {
        let end = self.used_end()?;
        Ok(&self.as_bytes()[DATA_OFFSET..end])
    }

    fn check_type(&self, expected: NodeType) -> Result<()> {
        let actual = self.node_type()?;
        if actual != expected {
            return Err(Error::TypeMismatch { expected, actual });
        }
        Ok(())
    }

    fn check_idx(&self, idx: u16) -> Result<()> {
        let count = self.count();
        if idx >= count {
            return Err(Error::IndexOutOfBound { idx, bound: count });
        }
        Ok(())
    }

    fn child_slot(&self, idx: u16) -> Result<Range<usize>> {
        self.check_type(NodeType::Internal)?;
        self.check_idx(idx)?;
        let end = self.used_end()?;
        let start = DATA_OFFSET + idx as usize * CHILD_PTR_LEN;
        if start + CHILD_PTR_LEN > end {
            return Err(Error::corruption(format!(
                "child pointer {} at offset {} lies past page size {}",
                idx, start, end
            )));
        }
        Ok(start..start + CHILD_PTR_LEN)
    }

    fn kv_slot(&self, idx: u16) -> Result<KvSlot> {
        self.check_type(NodeType::Leaf)?;
        self.check_idx(idx)?;
        let end = self.used_end()?;

        let count = self.count() as usize;
        let pairs_start = DATA_OFFSET + count * KV_OFFSET_LEN;
        if pairs_start > end {
            return Err(Error::corruption(format!(
                "offset table of {} entries lies past page size {}",
                count, end
            )));
        }

        let offset_at = |i: usize| self.read_u16(DATA_OFFSET + i * KV_OFFSET_LEN) as usize;
        let offset = offset_at(idx as usize);
        if idx > 0 && offset < offset_at(idx as usize - 1) {
            return Err(Error::corruption(format!("kv offset {} decreases at index {}", offset, idx)));
        }

        let pair_start = pairs_start + offset;
        if pair_start + KV_HEADER_LEN > end {
            return Err(Error::corruption(format!(
                "kv pair {} at offset {} lies past page size {}",
                idx, pair_start, end
            )));
        }
        let key_len = self.read_u16(pair_start) as usize;
        let val_len = self.read_u16(pair_start + 2) as usize;
        let key_start = pair_start + KV_HEADER_LEN;
        let val_start = key_start + key_len;
        let val_end = val_start + val_len;
        if val_end > end {
            return Err(Error::corruption(format!(
                "kv pair {} ends at {} past page size {}",
                idx, val_end, end
            )));
        }

        Ok(KvSlot { key: key_start..val_start, value: val_start..val_end })
    }

    /// Returns the child page id at `idx`.
    ///
    /// # Errors
    ///
    /// - `TypeMismatch` on a leaf
    /// - `IndexOutOfBound` if `idx >= count`
    /// - `Corruption` if the pointer lies past `size`
    pub fn child_ptr(&self, idx: u16) -> Result<PageId> {
        let slot = self.child_slot(idx)?;
        Ok((&self.as_bytes()[slot]).get_u64_le())
    }

    /// Returns all child page ids in order.
    pub fn children(&self) -> Result<Vec<PageId>> {
        (0..self.count()).map(|idx| self.child_ptr(idx)).collect()
    }

    /// Returns the key and value at `idx` as slices of the page.
    ///
    /// # Errors
    ///
    /// - `TypeMismatch` on an internal node
    /// - `IndexOutOfBound` if `idx >= count`
    /// - `Corruption` if the offset table or the pair lies past `size`
    pub fn kv(&self, idx: u16) -> Result<(&[u8], &[u8])> {
        let slot = self.kv_slot(idx)?;
        let bytes = self.as_bytes();
        Ok((&bytes[slot.key], &bytes[slot.value]))
    }

    /// Returns an iterator over all KV pairs of a leaf.
    pub fn kvs(&self) -> KvIter<'_, B> {
        KvIter { page: self, idx: 0 }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> NodePage<B> {
    fn write_u16(&mut self, offset: usize, value: u16) {
        (&mut self.buf.as_mut()[offset..offset + 2]).put_u16_le(value);
    }

    /// Sets the node type.
    pub fn set_node_type(&mut self, node_type: NodeType) {
        self.write_u16(TYPE_OFFSET, node_type.as_u16());
    }

    /// Sets the entry count.
    ///
    /// # Errors
    ///
    /// Returns `PageOverflow` if `count` slots of this node type cannot fit in a page.
    pub fn set_count(&mut self, count: u16) -> Result<()> {
        let required = HEADER_LEN + count as usize * self.node_type()?.slot_len();
        if required > PAGE_SIZE {
            return Err(Error::PageOverflow { required, capacity: PAGE_SIZE });
        }
        self.write_u16(COUNT_OFFSET, count);
        Ok(())
    }

    /// Sets the number of used bytes.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `size` is smaller than the header
    /// - `PageOverflow` if `size` exceeds [`PAGE_SIZE`]
    pub fn set_size(&mut self, size: u16) -> Result<()> {
        let size_usize = size as usize;
        if size_usize < HEADER_LEN {
            return Err(Error::invalid_argument(format!(
                "page size {} is smaller than the header",
                size
            )));
        }
        if size_usize > PAGE_SIZE {
            return Err(Error::PageOverflow { required: size_usize, capacity: PAGE_SIZE });
        }
        self.write_u16(SIZE_OFFSET, size);
        Ok(())
    }

    /// Overwrites the child page id at `idx`.
    ///
    /// Fails under the same conditions as [`NodePage::child_ptr`].
    pub fn set_child_ptr(&mut self, idx: u16, ptr: PageId) -> Result<()> {
        let slot = self.child_slot(idx)?;
        (&mut self.buf.as_mut()[slot]).put_u64_le(ptr);
        Ok(())
    }

    /// Appends a child page id, growing `count` and `size`.
    ///
    /// # Errors
    ///
    /// - `TypeMismatch` on a leaf
    /// - `PageOverflow` if the page is full
    pub fn push_child(&mut self, ptr: PageId) -> Result<()> {
        self.check_type(NodeType::Internal)?;
        let count = self.count() as usize;
        let start = DATA_OFFSET + count * CHILD_PTR_LEN;
        let required = start + CHILD_PTR_LEN;
        if required > PAGE_SIZE {
            return Err(Error::PageOverflow { required, capacity: PAGE_SIZE });
        }
        (&mut self.buf.as_mut()[start..required]).put_u64_le(ptr);
        self.write_u16(COUNT_OFFSET, (count + 1) as u16);
        if required > self.size() as usize {
            self.write_u16(SIZE_OFFSET, required as u16);
        }
        Ok(())
    }

    /// Returns the data region for in-place edits.
    pub fn data_mut(&mut self) -> Result<&mut [u8]> {
        let end = self.used_end()?;
        Ok(&mut self.buf.as_mut()[DATA_OFFSET..end])
    }
}

/// Iterator over the KV pairs of a leaf page.
pub struct KvIter<'a, B> {
    page: &'a NodePage<B>,
    idx: u16,
}

impl<'a, B: AsRef<[u8]>> Iterator for KvIter<'a, B> {
    type Item = Result<(&'a [u8], &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.page.count() {
            return None;
        }
        let item = self.page.kv(self.idx);
        // stop after the first error
        self.idx = if item.is_ok() { self.idx + 1 } else { u16::MAX };
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_page() -> BytesMut {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(17);
        let mut buf = BytesMut::zeroed(PAGE_SIZE);
        rng.fill(&mut buf[..]);
        buf
    }

    fn page(node_type: NodeType, count: u16, size: u16) -> NodePage<BytesMut> {
        let mut page = NodePage::from_bytes(random_page()).unwrap();
        page.set_node_type(node_type);
        page.set_size(size).unwrap();
        page.set_count(count).unwrap();
        page
    }

    #[test]
    fn test_type_display() {
        assert_eq!(NodeType::Internal.to_string(), "INTERNAL");
        assert_eq!(NodeType::Leaf.to_string(), "LEAF");
        assert_eq!(NodeType::from_u16(2), None);
    }

    #[test]
    fn test_header_accessors() {
        let mut node = page(NodeType::Leaf, 10, 10);
        assert_eq!(node.node_type().unwrap(), NodeType::Leaf);
        assert_eq!(node.count(), 10);
        assert_eq!(node.size(), 10);

        node.set_node_type(NodeType::Internal);
        assert_eq!(node.node_type().unwrap(), NodeType::Internal);
        assert_eq!(&node.as_bytes()[..2], &[0, 0]);
    }

    #[test]
    fn test_new_pages_are_empty() {
        let leaf = NodePage::new_leaf();
        assert_eq!(leaf.node_type().unwrap(), NodeType::Leaf);
        assert_eq!(leaf.count(), 0);
        assert_eq!(leaf.size() as usize, HEADER_LEN);
        assert!(leaf.data().unwrap().is_empty());
        assert_eq!(leaf.free_space(), PAGE_SIZE - HEADER_LEN);
        assert!(leaf.validate().is_ok());
    }

    #[test]
    fn test_from_bytes_rejects_wrong_length() {
        let result = NodePage::from_bytes(vec![0u8; 100]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_unknown_type_is_corruption() {
        let mut buf = vec![0u8; PAGE_SIZE];
        buf[0] = 7;
        let node = NodePage::from_bytes(buf).unwrap();
        assert!(matches!(node.node_type(), Err(Error::Corruption(_))));
        assert!(node.validate().is_err());
    }

    #[test]
    fn test_get_data() {
        let node = page(NodeType::Internal, 0, 20);
        assert_eq!(node.data().unwrap(), &node.as_bytes()[8..20]);
    }

    #[test]
    fn test_data_rejects_bad_size() {
        let mut buf = vec![0u8; PAGE_SIZE];
        buf[4..6].copy_from_slice(&5000u16.to_le_bytes());
        let node = NodePage::from_bytes(buf).unwrap();
        assert!(matches!(node.data(), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_child_ptr() {
        let mut node = page(NodeType::Internal, 2, 100);
        node.set_child_ptr(0, 0xDEAD_BEEF).unwrap();
        node.set_child_ptr(1, u64::MAX).unwrap();
        assert_eq!(node.child_ptr(0).unwrap(), 0xDEAD_BEEF);
        assert_eq!(node.child_ptr(1).unwrap(), u64::MAX);

        assert!(matches!(node.child_ptr(5), Err(Error::IndexOutOfBound { idx: 5, bound: 2 })));
        assert!(matches!(
            node.set_child_ptr(2, 1),
            Err(Error::IndexOutOfBound { idx: 2, bound: 2 })
        ));
    }

    #[test]
    fn test_child_ptr_past_size_is_rejected() {
        let mut node = page(NodeType::Internal, 2, 16);
        assert!(node.set_child_ptr(0, 1).is_ok());
        assert!(matches!(node.set_child_ptr(1, 1), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_type_mismatch() {
        let leaf = page(NodeType::Leaf, 1, 20);
        assert!(matches!(
            leaf.child_ptr(0),
            Err(Error::TypeMismatch { expected: NodeType::Internal, actual: NodeType::Leaf })
        ));

        let internal = page(NodeType::Internal, 1, 20);
        assert!(matches!(
            internal.kv(0),
            Err(Error::TypeMismatch { expected: NodeType::Leaf, actual: NodeType::Internal })
        ));
    }

    #[test]
    fn test_push_child_until_full() {
        let mut node = NodePage::new_internal();
        let max = (PAGE_SIZE - HEADER_LEN) / CHILD_PTR_LEN;
        for id in 0..max as u64 {
            node.push_child(id + 100).unwrap();
        }
        assert_eq!(node.count() as usize, max);
        assert_eq!(node.size() as usize, PAGE_SIZE);
        assert_eq!(node.child_ptr(3).unwrap(), 103);

        assert!(matches!(node.push_child(1), Err(Error::PageOverflow { .. })));
        assert_eq!(node.count() as usize, max);
    }

    #[test]
    fn test_set_size_and_count_capacity_checks() {
        let mut node = NodePage::new_internal();
        assert!(matches!(node.set_size(4097), Err(Error::PageOverflow { .. })));
        assert!(matches!(node.set_size(4), Err(Error::InvalidArgument(_))));
        assert!(node.set_size(4096).is_ok());

        assert!(node.set_count(511).is_ok());
        assert!(matches!(node.set_count(512), Err(Error::PageOverflow { .. })));

        let mut leaf = NodePage::new_leaf();
        assert!(leaf.set_count(2044).is_ok());
        assert!(matches!(leaf.set_count(2045), Err(Error::PageOverflow { .. })));
    }

    #[test]
    fn test_get_kv_hand_encoded() {
        let pairs: [(&[u8], &[u8]); 3] = [(b"k1", b"v-one"), (b"key2", b""), (b"", b"v3")];
        let mut buf = BytesMut::with_capacity(PAGE_SIZE);
        buf.put_u16_le(NodeType::Leaf.as_u16());
        buf.put_u16_le(pairs.len() as u16);
        buf.put_u16_le(0); // size, patched below
        buf.put_u16_le(0);

        let mut offset = 0u16;
        for (key, value) in &pairs {
            buf.put_u16_le(offset);
            offset += (KV_HEADER_LEN + key.len() + value.len()) as u16;
        }
        for (key, value) in &pairs {
            buf.put_u16_le(key.len() as u16);
            buf.put_u16_le(value.len() as u16);
            buf.put_slice(key);
            buf.put_slice(value);
        }
        let size = buf.len() as u16;
        buf.resize(PAGE_SIZE, 0xAB);

        let mut node = NodePage::from_bytes(buf).unwrap();
        node.set_size(size).unwrap();
        for (idx, (key, value)) in pairs.iter().enumerate() {
            assert_eq!(node.kv(idx as u16).unwrap(), (*key, *value));
        }
        assert!(matches!(node.kv(3), Err(Error::IndexOutOfBound { idx: 3, bound: 3 })));

        let collected: Vec<_> = node.kvs().collect::<Result<_>>().unwrap();
        assert_eq!(collected.len(), 3);
    }

    #[test]
    fn test_kv_past_size_is_corruption() {
        let mut node = NodePage::new_leaf();
        node.set_count(1).unwrap();
        node.set_size(14).unwrap();
        let data = node.data_mut().unwrap();
        data[0..2].copy_from_slice(&0u16.to_le_bytes());
        // key_len 9, val_len 0, but no key bytes before `size`
        data[2..4].copy_from_slice(&9u16.to_le_bytes());
        data[4..6].copy_from_slice(&0u16.to_le_bytes());

        assert!(matches!(node.kv(0), Err(Error::Corruption(_))));
        let mut iter = node.kvs();
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }
}
