//! Node header and node kind.
//!
//! Every B-tree node page starts with a [`NodeHeader`]:
//! - status flags (leaf bit)
//! - free space left in the key space
//! - number of packed entries
//! - the low-child pointer

use crate::common::config::{MAX_KEY_SPACE, NODE_HEADER_SIZE};
use crate::common::PageId;

/// Whether a node holds leaf entries or child pointers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    #[default]
    Branch,
    Leaf,
}

/// Metadata stored at the beginning of every node page.
///
/// # Layout (10 bytes, little-endian)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       2     flags (bit 0 = leaf)
/// 2       2     free_space (bytes left in the key space)
/// 4       2     key_count
/// 6       4     low_child (subtree for keys below entry 0)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHeader {
    pub flags: u16,
    pub free_space: u16,
    pub key_count: u16,
    pub low_child: PageId,
}

impl NodeHeader {
    pub const SIZE: usize = NODE_HEADER_SIZE;

    pub const OFFSET_FLAGS: usize = 0;
    pub const OFFSET_FREE_SPACE: usize = 2;
    pub const OFFSET_KEY_COUNT: usize = 4;
    pub const OFFSET_LOW_CHILD: usize = 6;

    pub const FLAG_LEAF: u16 = 1;

    /// Header of an empty node: the whole key space is free.
    pub fn new(kind: NodeKind) -> Self {
        let flags = match kind {
            NodeKind::Leaf => Self::FLAG_LEAF,
            NodeKind::Branch => 0,
        };
        Self {
            flags,
            free_space: MAX_KEY_SPACE as u16,
            key_count: 0,
            low_child: PageId::INVALID,
        }
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        if self.flags & Self::FLAG_LEAF != 0 {
            NodeKind::Leaf
        } else {
            NodeKind::Branch
        }
    }

    /// # Panics
    /// Panics if `data.len() < NodeHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for NodeHeader");

        let u16_at = |at: usize| u16::from_le_bytes([data[at], data[at + 1]]);
        let low_child = u32::from_le_bytes([
            data[Self::OFFSET_LOW_CHILD],
            data[Self::OFFSET_LOW_CHILD + 1],
            data[Self::OFFSET_LOW_CHILD + 2],
            data[Self::OFFSET_LOW_CHILD + 3],
        ]);

        Self {
            flags: u16_at(Self::OFFSET_FLAGS),
            free_space: u16_at(Self::OFFSET_FREE_SPACE),
            key_count: u16_at(Self::OFFSET_KEY_COUNT),
            low_child: PageId::new(low_child),
        }
    }

    /// # Panics
    /// Panics if `data.len() < NodeHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for NodeHeader");

        data[Self::OFFSET_FLAGS..Self::OFFSET_FLAGS + 2].copy_from_slice(&self.flags.to_le_bytes());
        data[Self::OFFSET_FREE_SPACE..Self::OFFSET_FREE_SPACE + 2]
            .copy_from_slice(&self.free_space.to_le_bytes());
        data[Self::OFFSET_KEY_COUNT..Self::OFFSET_KEY_COUNT + 2]
            .copy_from_slice(&self.key_count.to_le_bytes());
        data[Self::OFFSET_LOW_CHILD..Self::OFFSET_LOW_CHILD + 4]
            .copy_from_slice(&self.low_child.0.to_le_bytes());
    }
}
