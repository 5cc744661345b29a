//! File-backed page store.
//!
//! The file is a sequence of fixed-size slots:
//!
//! ```text
//! [page: 4096 bytes][crc32: u32][flags: u32]
//! ```
//!
//! The page bytes are stored exactly as handed in; the trailer carries a
//! checksum of the page and a live flag. Page id `n` lives in slot `n - 1`.

use super::check_page_len;
use crate::btree::{PageId, PageStore, PAGE_SIZE};
use crate::error::{Error, Result};
use bytes::{Buf, BufMut, Bytes};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const TRAILER_LEN: usize = 8;
const SLOT_LEN: u64 = (PAGE_SIZE + TRAILER_LEN) as u64;
const FLAG_LIVE: u32 = 1;

struct SlotFile {
    file: File,
    slots: u64,
    /// Released ids, reused before the file grows
    free: Vec<PageId>,
}

impl SlotFile {
    fn slot_offset(id: PageId) -> u64 {
        (id - 1) * SLOT_LEN
    }

    fn check_id(&self, id: PageId) -> Result<()> {
        if id == 0 || id > self.slots {
            return Err(Error::PageNotFound(id));
        }
        Ok(())
    }

    fn read_trailer(&mut self, id: PageId) -> Result<(u32, u32)> {
        let mut trailer = [0u8; TRAILER_LEN];
        self.file.seek(SeekFrom::Start(Self::slot_offset(id) + PAGE_SIZE as u64))?;
        self.file.read_exact(&mut trailer)?;
        let mut buf = &trailer[..];
        Ok((buf.get_u32_le(), buf.get_u32_le()))
    }

    fn write_slot(&mut self, id: PageId, page: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(Self::slot_offset(id)))?;
        self.file.write_all(page)?;
        self.write_trailer(id, crc32fast::hash(page), FLAG_LIVE)
    }

    fn write_trailer(&mut self, id: PageId, crc: u32, flags: u32) -> Result<()> {
        let mut trailer = Vec::with_capacity(TRAILER_LEN);
        trailer.put_u32_le(crc);
        trailer.put_u32_le(flags);
        self.file.seek(SeekFrom::Start(Self::slot_offset(id) + PAGE_SIZE as u64))?;
        self.file.write_all(&trailer)?;
        Ok(())
    }
}

/// Page store keeping every page in one file.
///
/// Released ids go on a free list and are handed out again by later
/// allocations. The free list is rebuilt from the live flags on open.
pub struct FilePageStore {
    path: PathBuf,
    inner: Mutex<SlotFile>,
}

impl FilePageStore {
    /// Opens or creates a page file.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if the file length is not a whole number of slots.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(&path)?;

        let len = file.metadata()?.len();
        if len % SLOT_LEN != 0 {
            return Err(Error::corruption(format!(
                "page file {:?} has length {}, not a multiple of {}",
                path, len, SLOT_LEN
            )));
        }

        let mut slots = SlotFile { file, slots: len / SLOT_LEN, free: Vec::new() };
        for id in 1..=slots.slots {
            let (_, flags) = slots.read_trailer(id)?;
            if flags & FLAG_LIVE == 0 {
                slots.free.push(id);
            }
        }
        // hand out low ids first
        slots.free.reverse();

        log::info!(
            "Opened page file {:?}: {} slots, {} free",
            path,
            slots.slots,
            slots.free.len()
        );

        Ok(Self { path, inner: Mutex::new(slots) })
    }

    /// Returns the path of the page file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of slots in the file, free ones included.
    pub fn slot_count(&self) -> u64 {
        self.inner.lock().slots
    }

    /// Flushes written pages to disk.
    pub fn sync(&self) -> Result<()> {
        let inner = self.inner.lock();
        inner.file.sync_data()?;
        Ok(())
    }
}

impl PageStore for FilePageStore {
    fn get(&self, id: PageId) -> Result<Bytes> {
        let mut inner = self.inner.lock();
        inner.check_id(id)?;

        let (stored, flags) = inner.read_trailer(id)?;
        if flags & FLAG_LIVE == 0 {
            return Err(Error::PageNotFound(id));
        }

        let mut page = vec![0u8; PAGE_SIZE];
        inner.file.seek(SeekFrom::Start(SlotFile::slot_offset(id)))?;
        inner.file.read_exact(&mut page)?;

        let computed = crc32fast::hash(&page);
        if computed != stored {
            return Err(Error::ChecksumMismatch { expected: stored, actual: computed });
        }
        Ok(Bytes::from(page))
    }

    fn new_page(&self, page: Bytes) -> Result<PageId> {
        check_page_len(page.len())?;
        let mut inner = self.inner.lock();

        let (id, reused) = match inner.free.pop() {
            Some(id) => (id, true),
            None => (inner.slots + 1, false),
        };

        match inner.write_slot(id, &page) {
            Ok(()) => {
                if !reused {
                    inner.slots += 1;
                }
                Ok(id)
            }
            Err(e) => {
                log::warn!("Failed to write page {} to {:?}: {}", id, self.path, e);
                if reused {
                    inner.free.push(id);
                }
                Err(e)
            }
        }
    }

    fn del(&self, id: PageId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.check_id(id)?;

        let (crc, flags) = inner.read_trailer(id)?;
        if flags & FLAG_LIVE == 0 {
            return Err(Error::PageNotFound(id));
        }
        inner.write_trailer(id, crc, flags & !FLAG_LIVE)?;
        inner.free.push(id);
        Ok(())
    }
}
