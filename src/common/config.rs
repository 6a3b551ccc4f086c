//! Engine constants and tree options.

use super::error::{Error, Result};

/// Size of a block in bytes. Every node, and the header, is one block.
pub const PAGE_SIZE: usize = 8192;

/// Number of frames a tree's buffer pool gets unless told otherwise.
pub const DEFAULT_POOL_SIZE: usize = 25;

/// Smallest pool able to hold a split: header, left, right and parent.
pub const MIN_POOL_SIZE: usize = 4;

/// Longest key a node entry can hold.
pub const MAX_KEY_SIZE: usize = 254;

/// `flags: u16, free_space: u16, key_count: u16, low_child: u32`.
pub const NODE_HEADER_SIZE: usize = 10;

/// Bytes available for packed entries in one node.
pub const MAX_KEY_SPACE: usize = PAGE_SIZE - NODE_HEADER_SIZE;

/// Prologue plus one suffix byte.
pub const MIN_ENTRY_SIZE: usize = 5;

/// Upper bound on entries per node, whatever their size.
pub const MAX_KEY_COUNT: usize = MAX_KEY_SPACE / MIN_ENTRY_SIZE;

/// Smallest per-node key limit a split can work with.
pub const MIN_KEY_COUNT: usize = 4;

/// Tunables for opening or building a tree.
///
/// # Example
/// ```
/// use yase_btree::BTreeOptions;
///
/// let options = BTreeOptions::default().with_pool_size(8).with_max_key_count(16);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeOptions {
    /// Frames in the buffer pool.
    pub pool_size: usize,
    /// Per-node entry limit. Lower values force splits long before a page
    /// runs out of bytes, which deepens the tree.
    pub max_key_count: usize,
}

impl BTreeOptions {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_max_key_count(mut self, max_key_count: usize) -> Self {
        self.max_key_count = max_key_count;
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size < MIN_POOL_SIZE {
            return Err(Error::InvalidConfig(format!(
                "pool_size {} is below the minimum of {}",
                self.pool_size, MIN_POOL_SIZE
            )));
        }
        if !(MIN_KEY_COUNT..=MAX_KEY_COUNT).contains(&self.max_key_count) {
            return Err(Error::InvalidConfig(format!(
                "max_key_count {} must be within {}..={}",
                self.max_key_count, MIN_KEY_COUNT, MAX_KEY_COUNT
            )));
        }
        Ok(())
    }
}

impl Default for BTreeOptions {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            max_key_count: MAX_KEY_COUNT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_constants() {
        assert_eq!(MAX_KEY_SPACE, 8182);
        assert_eq!(MAX_KEY_COUNT, 1636);
        assert!(PAGE_SIZE.is_power_of_two());
    }

    #[test]
    fn test_default_options_are_valid() {
        let options = BTreeOptions::default();
        assert_eq!(options.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(options.max_key_count, MAX_KEY_COUNT);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_rejects_tiny_pool() {
        let options = BTreeOptions::default().with_pool_size(2);
        assert!(matches!(options.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_key_limit_out_of_range() {
        let low = BTreeOptions::default().with_max_key_count(3);
        assert!(low.validate().is_err());

        let high = BTreeOptions::default().with_max_key_count(MAX_KEY_COUNT + 1);
        assert!(high.validate().is_err());

        let edge = BTreeOptions::default().with_max_key_count(MIN_KEY_COUNT);
        assert!(edge.validate().is_ok());
    }
}
