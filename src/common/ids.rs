//! Page and frame identifiers.

use std::fmt;

use super::config::PAGE_SIZE;

/// Identifies a block in the tree file.
///
/// Page numbers are 1-based: page 1 is the tree header and `PageId(0)`
/// doubles as "no page" (an empty child pointer, an unassigned frame).
/// The on-disk child pointers are `u32`, so a tree file tops out at
/// `u32::MAX` blocks of [`PAGE_SIZE`] bytes.
///
/// # Example
/// ```
/// use yase_btree::PageId;
///
/// let page_id = PageId::new(3);
/// assert!(page_id.is_valid());
/// assert_eq!(page_id.file_offset(), 2 * 8192);
/// assert!(!PageId::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// The "no page" sentinel.
    pub const INVALID: PageId = PageId(0);

    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Whether this names a real block (page numbers start at 1).
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }

    /// Byte offset of this block within the tree file.
    ///
    /// # Panics
    /// Panics when called on [`PageId::INVALID`].
    #[inline]
    pub fn file_offset(&self) -> u64 {
        assert!(self.is_valid(), "no file offset for an invalid page id");
        u64::from(self.0 - 1) * PAGE_SIZE as u64
    }

    /// The page allocated right after this one.
    #[inline]
    pub fn next(&self) -> PageId {
        PageId(self.0 + 1)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Page({})", self.0)
        } else {
            write!(f, "Page(none)")
        }
    }
}

/// Index of a frame in the buffer pool's frame arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_is_one_based() {
        assert!(!PageId::new(0).is_valid());
        assert!(PageId::new(1).is_valid());
        assert_eq!(PageId::INVALID, PageId::new(0));
    }

    #[test]
    fn test_page_id_file_offset() {
        assert_eq!(PageId::new(1).file_offset(), 0);
        assert_eq!(PageId::new(2).file_offset(), PAGE_SIZE as u64);
        assert_eq!(PageId::new(10).file_offset(), 9 * PAGE_SIZE as u64);
    }

    #[test]
    #[should_panic(expected = "invalid page id")]
    fn test_invalid_page_has_no_offset() {
        PageId::INVALID.file_offset();
    }

    #[test]
    fn test_page_id_next_and_ordering() {
        assert_eq!(PageId::new(4).next(), PageId::new(5));
        assert!(PageId::new(1) < PageId::new(2));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", PageId::new(42)), "Page(42)");
        assert_eq!(format!("{}", PageId::INVALID), "Page(none)");
        assert_eq!(format!("{}", FrameId::new(7)), "Frame(7)");
    }
}
