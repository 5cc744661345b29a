//! Leaf page builder.

use super::page::{NodePage, HEADER_LEN, KV_HEADER_LEN, KV_OFFSET_LEN, PAGE_SIZE};
use crate::error::{Error, Result};
use bytes::{BufMut, BytesMut};

/// LeafBuilder packs sorted key-value pairs into one leaf page.
///
/// Keys must be added in strictly ascending order. An `add` that would push the
/// page past its fill limit fails with `PageOverflow` and leaves the builder
/// untouched, so the caller can finish this page and start another one.
///
/// # Example
///
/// ```rust
/// use lsmkv::btree::LeafBuilder;
///
/// # fn main() -> Result<(), lsmkv::Error> {
/// let mut builder = LeafBuilder::new();
/// builder.add(b"alpha", b"1")?;
/// builder.add(b"beta", b"22")?;
///
/// let page = builder.finish()?;
/// assert_eq!(page.count(), 2);
/// assert_eq!(page.size(), 32);
/// assert_eq!(page.kv(1)?, (&b"beta"[..], &b"22"[..]));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LeafBuilder {
    offsets: Vec<u16>,
    pairs: BytesMut,
    last_key: Option<Vec<u8>>,
    limit: usize,
}

impl LeafBuilder {
    /// Creates a builder that may fill a whole page.
    pub fn new() -> Self {
        Self::with_limit(PAGE_SIZE)
    }

    /// Creates a builder whose page `size` stays at or below `limit`.
    ///
    /// Limits above [`PAGE_SIZE`] are clamped.
    pub fn with_limit(limit: usize) -> Self {
        Self { offsets: Vec::new(), pairs: BytesMut::new(), last_key: None, limit: limit.min(PAGE_SIZE) }
    }

    /// Returns the `size` the page would have if finished now.
    pub fn estimated_size(&self) -> usize {
        HEADER_LEN + self.offsets.len() * KV_OFFSET_LEN + self.pairs.len()
    }

    /// Returns `true` if the pair can be added without exceeding the limit.
    pub fn fits(&self, key: &[u8], value: &[u8]) -> bool {
        key.len() <= u16::MAX as usize
            && value.len() <= u16::MAX as usize
            && self.size_with(key, value) <= self.limit
    }

    fn size_with(&self, key: &[u8], value: &[u8]) -> usize {
        self.estimated_size() + KV_OFFSET_LEN + KV_HEADER_LEN + key.len() + value.len()
    }

    /// Appends a key-value pair.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if key or value is longer than `u16::MAX`, or the key
    ///   is not greater than the previous one
    /// - `PageOverflow` if the pair does not fit
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.len() > u16::MAX as usize || value.len() > u16::MAX as usize {
            return Err(Error::invalid_argument(format!(
                "key ({} bytes) or value ({} bytes) longer than {}",
                key.len(),
                value.len(),
                u16::MAX
            )));
        }
        if let Some(last) = &self.last_key {
            if key <= last.as_slice() {
                return Err(Error::invalid_argument("Keys must be added in sorted order"));
            }
        }
        let required = self.size_with(key, value);
        if required > self.limit {
            return Err(Error::PageOverflow { required, capacity: self.limit });
        }

        // pairs stay below PAGE_SIZE, so the offset fits in u16
        self.offsets.push(self.pairs.len() as u16);
        self.pairs.put_u16_le(key.len() as u16);
        self.pairs.put_u16_le(value.len() as u16);
        self.pairs.put_slice(key);
        self.pairs.put_slice(value);
        self.last_key = Some(key.to_vec());
        Ok(())
    }

    /// Returns the number of pairs added so far.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns `true` if no pair was added.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Writes the offset table and pairs into a fresh leaf page.
    pub fn finish(self) -> Result<NodePage<BytesMut>> {
        let mut page = NodePage::new_leaf();
        let size = self.estimated_size();
        page.set_count(self.offsets.len() as u16)?;
        page.set_size(size as u16)?;

        let mut data = page.data_mut()?;
        for offset in &self.offsets {
            data.put_u16_le(*offset);
        }
        data.put_slice(&self.pairs);
        Ok(page)
    }
}

impl Default for LeafBuilder {
    fn default() -> Self {
        Self::new()
    }
}
