//! Error types for the lsmkv storage core.

use crate::btree::{NodeType, PageId};
use std::io;
use thiserror::Error;

/// The result type used throughout lsmkv.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for lsmkv operations.
///
/// Everything except [`Error::Io`] is a contract violation raised at the point
/// of misuse. None of them are retried inside the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A node accessor was invoked against the wrong node type.
    #[error("expected {expected} but got {actual}")]
    TypeMismatch {
        /// The node type the accessor requires.
        expected: NodeType,
        /// The node type stored in the page header.
        actual: NodeType,
    },

    /// An indexed accessor was given an index at or past the declared count.
    #[error("index {idx} out of bound {bound}")]
    IndexOutOfBound {
        /// The index that was requested.
        idx: u16,
        /// The current count of the node.
        bound: u16,
    },

    /// A write would exceed the fixed page capacity.
    #[error("page overflow: {required} bytes required, capacity is {capacity}")]
    PageOverflow {
        /// Bytes the page would occupy after the write.
        required: usize,
        /// Maximum bytes the page may occupy.
        capacity: usize,
    },

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Page bytes could not be decoded.
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// A stored page failed its checksum.
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// The checksum stored alongside the page.
        expected: u32,
        /// The checksum computed over the page bytes.
        actual: u32,
    },

    /// The page store has no page with this identifier.
    #[error("Page not found: {0}")]
    PageNotFound(PageId),

    /// The component is in a state that does not allow the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A configuration file could not be parsed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error from a file-backed page store.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
