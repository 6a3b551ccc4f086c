//! Tree metadata kept on the header page.
//!
//! # Layout (page 1, little-endian)
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       10    unused (node header area, zero)
//! 10      4     root page
//! 14      4     last allocated page
//! 18      4     CRC32 of bytes 10..18
//! ```

use crate::common::config::NODE_HEADER_SIZE;
use crate::common::{Error, PageId, Result};

/// The page holding [`TreeMeta`]. Node pages start at 2.
pub const HEADER_PAGE: PageId = PageId(1);

const ROOT_OFFSET: usize = NODE_HEADER_SIZE;
const LAST_BLOCK_OFFSET: usize = ROOT_OFFSET + 4;
const CHECKSUM_OFFSET: usize = LAST_BLOCK_OFFSET + 4;
const META_END: usize = CHECKSUM_OFFSET + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeMeta {
    pub root: PageId,
    /// Highest page number in use; equals the file's block count.
    pub last_block: PageId,
}

impl TreeMeta {
    /// Parse and checksum-verify the metadata on a header page.
    pub fn read_from(page: &[u8]) -> Result<Self> {
        if page.len() < META_END {
            return Err(Error::Corruption("header page truncated".to_string()));
        }
        let fields = &page[ROOT_OFFSET..CHECKSUM_OFFSET];
        let stored = u32_at(page, CHECKSUM_OFFSET);
        let computed = crc32fast::hash(fields);
        if stored != computed {
            return Err(Error::Corruption(format!(
                "header checksum mismatch: stored {stored:#010x}, computed {computed:#010x}"
            )));
        }

        Ok(Self {
            root: PageId::new(u32_at(page, ROOT_OFFSET)),
            last_block: PageId::new(u32_at(page, LAST_BLOCK_OFFSET)),
        })
    }

    pub fn write_to(&self, page: &mut [u8]) {
        page[ROOT_OFFSET..ROOT_OFFSET + 4].copy_from_slice(&self.root.0.to_le_bytes());
        page[LAST_BLOCK_OFFSET..LAST_BLOCK_OFFSET + 4]
            .copy_from_slice(&self.last_block.0.to_le_bytes());
        let checksum = crc32fast::hash(&page[ROOT_OFFSET..CHECKSUM_OFFSET]);
        page[CHECKSUM_OFFSET..META_END].copy_from_slice(&checksum.to_le_bytes());
    }

    /// Check the metadata against a file of `page_count` blocks.
    pub fn validate(&self, page_count: u32) -> Result<()> {
        if self.last_block.0 != page_count {
            return Err(Error::Corruption(format!(
                "header records {} pages but the file holds {}",
                self.last_block.0, page_count
            )));
        }
        if self.root.0 <= HEADER_PAGE.0 || self.root > self.last_block {
            return Err(Error::Corruption(format!(
                "root {} outside pages 2..={}",
                self.root, self.last_block.0
            )));
        }
        Ok(())
    }
}

fn u32_at(page: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([page[at], page[at + 1], page[at + 2], page[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::PAGE_SIZE;

    #[test]
    fn test_meta_roundtrip() {
        let meta = TreeMeta {
            root: PageId::new(7),
            last_block: PageId::new(12),
        };
        let mut page = vec![0u8; PAGE_SIZE];
        meta.write_to(&mut page);

        assert_eq!(&page[10..14], &7u32.to_le_bytes());
        assert_eq!(&page[14..18], &12u32.to_le_bytes());
        assert_eq!(TreeMeta::read_from(&page).unwrap(), meta);
    }

    #[test]
    fn test_checksum_detects_damage() {
        let meta = TreeMeta {
            root: PageId::new(2),
            last_block: PageId::new(2),
        };
        let mut page = vec![0u8; PAGE_SIZE];
        meta.write_to(&mut page);
        page[14] ^= 0x01;

        assert!(matches!(TreeMeta::read_from(&page), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_zeroed_header_is_rejected() {
        let page = vec![0u8; PAGE_SIZE];
        assert!(TreeMeta::read_from(&page).is_err());
    }

    #[test]
    fn test_validate_against_file() {
        let meta = TreeMeta {
            root: PageId::new(3),
            last_block: PageId::new(5),
        };
        assert!(meta.validate(5).is_ok());
        assert!(meta.validate(6).is_err());

        let bad_root = TreeMeta {
            root: HEADER_PAGE,
            last_block: PageId::new(5),
        };
        assert!(bad_root.validate(5).is_err());
    }
}
