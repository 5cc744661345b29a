//! Page store implementations.
//!
//! - [`MemoryPageStore`]: pages in a hash map, for tests and ephemeral trees
//! - [`FilePageStore`]: pages in fixed slots of a single file, checksummed

pub mod file;
pub mod memory;

pub use file::FilePageStore;
pub use memory::MemoryPageStore;

use crate::btree::PAGE_SIZE;
use crate::error::{Error, Result};

fn check_page_len(len: usize) -> Result<()> {
    if len != PAGE_SIZE {
        return Err(Error::invalid_argument(format!(
            "page must be {} bytes, got {}",
            PAGE_SIZE, len
        )));
    }
    Ok(())
}
