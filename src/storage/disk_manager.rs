//! Disk Manager - block-granular file I/O for the tree file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// How a tree file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, reads only. Writes fail with [`Error::ReadOnly`].
    ReadOnly,
    /// Existing file, reads and writes.
    ReadWrite,
    /// Create the file, truncating anything already there.
    Create,
}

/// Owns the tree file handle.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┐
/// │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (8KB)   │ (8KB)   │         │ (8KB)   │
/// └─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      8192     ...   (N-1)×8192
/// ```
///
/// Page numbers are 1-based, so the last allocated page number always
/// equals the number of blocks in the file.
///
/// Writes are not synced individually; [`DiskManager::sync`] is called
/// when the buffer pool closes.
pub struct DiskManager {
    file: File,
    page_count: u32,
    mode: OpenMode,
}

impl DiskManager {
    /// Create (or truncate) a tree file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;

        debug!(path = %path.as_ref().display(), "disk.create");

        Ok(Self {
            file,
            page_count: 0,
            mode: OpenMode::Create,
        })
    }

    /// Open a tree file in the given mode.
    ///
    /// # Errors
    /// `Error::InvalidFileSize` if the file is not a whole number of blocks.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        if mode == OpenMode::Create {
            return Self::create(path);
        }

        let file = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(path.as_ref())?;

        let len = file.metadata()?.len();
        if len % PAGE_SIZE as u64 != 0 {
            return Err(Error::InvalidFileSize {
                len,
                page_size: PAGE_SIZE,
            });
        }
        let page_count = u32::try_from(len / PAGE_SIZE as u64).map_err(|_| Error::InvalidFileSize {
            len,
            page_size: PAGE_SIZE,
        })?;

        debug!(path = %path.as_ref().display(), pages = page_count, ?mode, "disk.open");

        Ok(Self {
            file,
            page_count,
            mode,
        })
    }

    /// Read a block into `page`.
    ///
    /// # Errors
    /// `Error::PageNotFound` if the block lies beyond the end of the file.
    pub fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        self.check_exists(page_id)?;

        self.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        self.file.read_exact(page.as_mut_slice())?;
        Ok(())
    }

    /// Overwrite an existing block.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.check_writable()?;
        self.check_exists(page_id)?;

        self.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        self.file.write_all(page.as_slice())?;
        Ok(())
    }

    /// Append a zeroed block and return its page number (`last + 1`).
    pub fn allocate_page(&mut self) -> Result<PageId> {
        self.check_writable()?;

        let page_id = PageId::new(self.page_count + 1);
        self.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        self.file.write_all(&[0u8; PAGE_SIZE])?;

        self.page_count += 1;
        Ok(page_id)
    }

    /// Flush file contents to stable storage. A no-op for read-only files.
    pub fn sync(&mut self) -> Result<()> {
        if self.mode != OpenMode::ReadOnly {
            self.file.sync_all()?;
        }
        Ok(())
    }

    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    #[inline]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    fn check_exists(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() || page_id.0 > self.page_count {
            return Err(Error::PageNotFound(page_id));
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.mode == OpenMode::ReadOnly {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }
}
