//! Error types for the storage engine.

use thiserror::Error;

use super::PageId;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong in the block file, the buffer pool or the tree.
///
/// Capacity errors ([`Error::NodeFull`]) are resolved inside the tree by
/// splitting and only reach callers of the low-level node API.
#[derive(Debug, Error)]
pub enum Error {
    /// Seek, read, write or sync failure on the tree file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a whole number of blocks.
    #[error("file size {len} is not a multiple of the {page_size}-byte block size")]
    InvalidFileSize { len: u64, page_size: usize },

    /// Requested block lies beyond the end of the file.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// A write was attempted on a file opened read-only.
    #[error("tree file is opened read-only")]
    ReadOnly,

    /// Every frame in the pool is pinned.
    #[error("no unpinned frame available in buffer pool")]
    NoFreeFrames,

    /// Unpin requested for a page that holds no pin.
    #[error("{0} is not pinned")]
    PageNotPinned(PageId),

    /// The page is already borrowed by a guard that conflicts with this one.
    #[error("{0} is already latched by another guard")]
    PageLatched(PageId),

    /// Key longer than a node entry can store.
    #[error("key of {len} bytes exceeds the {max}-byte limit")]
    KeyTooLong { len: usize, max: usize },

    /// Entry does not fit in the node's free space or key limit.
    #[error("node has no room for the entry")]
    NodeFull,

    /// A node could not be divided around a median entry.
    #[error("cannot split a node holding {entries} entries")]
    SplitFailed { entries: usize },

    /// Bulk-load input was not strictly ascending.
    #[error("bulk-load input is not strictly ascending at record {index}")]
    UnsortedInput { index: u64 },

    /// On-disk structures disagree with each other.
    #[error("corruption detected: {0}")]
    Corruption(String),

    /// Options the engine cannot run with.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(PageId::new(42));
        assert_eq!(err.to_string(), "Page(42) not found");

        let err = Error::KeyTooLong { len: 300, max: 254 };
        assert_eq!(err.to_string(), "key of 300 bytes exceeds the 254-byte limit");

        let err = Error::NoFreeFrames;
        assert_eq!(err.to_string(), "no unpinned frame available in buffer pool");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        assert!(matches!(err, Error::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
