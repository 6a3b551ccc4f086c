//! Buffer Pool Manager - the page cache between the tree and the file.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching with LRU eviction
//! - Pin-based reference counting, through guards or explicit pins
//! - Write-back of dirty pages on eviction, flush and close

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, trace, warn};

use crate::buffer::replacer::LruReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::{DiskManager, OpenMode};

/// Manages a fixed pool of frames caching blocks of one tree file.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │ page_table   │  │        frames: Vec<Frame>         │   │
/// │  │PageId → Fid  │─▶│  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
/// │  │  free_list   │  │   replacer   │  │disk_manager  │      │
/// │  │ Vec<FrameId> │  │ LruReplacer  │  │   Mutex      │      │
/// │  └──────────────┘  └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// A page number maps to at most one frame, and a pinned frame is never
/// chosen for eviction. Fetching a page that is already latched by a
/// conflicting guard fails with [`Error::PageLatched`].
///
/// # Usage
/// ```no_run
/// use yase_btree::{BufferPoolManager, DiskManager, PageId};
///
/// let dm = DiskManager::create("pool.btree")?;
/// let mut bpm = BufferPoolManager::new(8, dm);
///
/// let page_id = {
///     let mut guard = bpm.new_page()?;
///     guard.as_mut_slice()[0] = 0xAB;
///     guard.page_id()
/// };
///
/// let guard = bpm.fetch_page_read(page_id)?;
/// assert_eq!(guard.as_slice()[0], 0xAB);
/// drop(guard);
///
/// bpm.close()?;
/// # Ok::<(), yase_btree::Error>(())
/// ```
pub struct BufferPoolManager {
    frames: Vec<Frame>,
    page_table: RwLock<HashMap<PageId, FrameId>>,
    /// Popped from the back, so frame 0 is handed out first.
    free_list: Mutex<Vec<FrameId>>,
    replacer: Mutex<LruReplacer>,
    disk_manager: Mutex<DiskManager>,
    stats: BufferPoolStats,
    pool_size: usize,
    closed: bool,
}

impl BufferPoolManager {
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        debug!(pool_size, pages = disk_manager.page_count(), "buffer_pool.new");

        Self {
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(LruReplacer::new()),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
            pool_size,
            closed: false,
        }
    }

    // ========================================================================
    // Fetch and allocate
    // ========================================================================

    /// Pin a page and borrow it for reading.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page is beyond the end of the file
    /// - `Error::NoFreeFrames` if every frame is pinned
    /// - `Error::PageLatched` if a write guard holds the page
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        match self.frames[frame_id.0].try_page() {
            Some(lock) => Ok(PageReadGuard::new(self, frame_id, page_id, lock)),
            None => {
                self.unpin_page_internal(frame_id, false);
                Err(Error::PageLatched(page_id))
            }
        }
    }

    /// Pin a page and borrow it exclusively.
    ///
    /// # Errors
    /// As [`BufferPoolManager::fetch_page_read`], with `Error::PageLatched`
    /// also raised while any other guard holds the page.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        match self.frames[frame_id.0].try_page_mut() {
            Some(lock) => Ok(PageWriteGuard::new(self, frame_id, page_id, lock)),
            None => {
                self.unpin_page_internal(frame_id, false);
                Err(Error::PageLatched(page_id))
            }
        }
    }

    /// Append a zeroed block to the file and return it pinned for writing.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if every frame is pinned
    /// - `Error::ReadOnly` or I/O errors from the file
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.get_free_frame()?;

        let allocated = self.disk_manager.lock().allocate_page();
        let page_id = match allocated {
            Ok(page_id) => page_id,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };
        BufferPoolStats::bump(&self.stats.pages_allocated);

        let frame = &self.frames[frame_id.0];
        frame.page_mut().reset();
        frame.clear_dirty();
        frame.set_page_id(Some(page_id));
        frame.pin();

        self.page_table.write().insert(page_id, frame_id);
        self.touch(frame_id);

        let lock = frame.page_mut();
        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    // ========================================================================
    // Explicit pins
    // ========================================================================

    /// Pin a page without borrowing it, keeping it resident until
    /// [`BufferPoolManager::unpin_page`] is called.
    pub fn pin_page(&self, page_id: PageId) -> Result<()> {
        self.fetch_page_internal(page_id).map(|_| ())
    }

    /// Release one pin taken with [`BufferPoolManager::pin_page`].
    ///
    /// # Errors
    /// `Error::PageNotPinned` if the page is not resident or holds no pin.
    pub fn unpin_page(&self, page_id: PageId) -> Result<()> {
        let frame_id = self
            .page_table
            .read()
            .get(&page_id)
            .copied()
            .ok_or(Error::PageNotPinned(page_id))?;

        if !self.frames[frame_id.0].is_pinned() {
            return Err(Error::PageNotPinned(page_id));
        }
        self.unpin_page_internal(frame_id, false);
        Ok(())
    }

    /// Pin count of a resident page, `None` if the page is not cached.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let frame_id = self.page_table.read().get(&page_id).copied()?;
        Some(self.frames[frame_id.0].pin_count())
    }

    // ========================================================================
    // Flush and close
    // ========================================================================

    /// Write every dirty resident page back.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<(PageId, FrameId)> = self
            .page_table
            .read()
            .iter()
            .map(|(&pid, &fid)| (pid, fid))
            .collect();

        for (page_id, frame_id) in pages {
            self.flush_frame(frame_id, page_id)?;
        }
        Ok(())
    }

    /// Flush all dirty pages, pinned or not, then sync the file.
    ///
    /// Pages still pinned at this point are a caller bug; they are written
    /// anyway and reported with a warning. Calling `close` twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut pinned = 0usize;
        for (idx, frame) in self.frames.iter().enumerate() {
            let Some(page_id) = frame.page_id() else {
                continue;
            };
            if frame.is_pinned() {
                pinned += 1;
            }
            self.flush_frame(FrameId::new(idx), page_id)?;
        }
        if pinned > 0 {
            warn!(pinned, "buffer_pool.close.pages_still_pinned");
        }

        self.disk_manager.lock().sync()?;

        debug!(stats = %self.stats.snapshot(), "buffer_pool.close");
        Ok(())
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ========================================================================
    // Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Number of pages currently resident.
    pub fn page_count(&self) -> usize {
        self.page_table.read().len()
    }

    /// Number of blocks in the underlying file.
    pub fn disk_page_count(&self) -> u32 {
        self.disk_manager.lock().page_count()
    }

    pub fn is_read_only(&self) -> bool {
        self.disk_manager.lock().mode() == OpenMode::ReadOnly
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// Called by the page guards on drop.
    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.0];
        if is_dirty {
            frame.mark_dirty();
        }
        if frame.unpin() == 0 {
            self.replacer.lock().set_evictable(frame_id, true);
        }
    }

    /// Make a page resident and pin it, returning its frame.
    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        let cached = self.page_table.read().get(&page_id).copied();
        if let Some(frame_id) = cached {
            self.frames[frame_id.0].pin();
            self.touch(frame_id);
            BufferPoolStats::bump(&self.stats.cache_hits);
            return Ok(frame_id);
        }

        self.handle_cache_miss(page_id)
    }

    fn handle_cache_miss(&self, page_id: PageId) -> Result<FrameId> {
        BufferPoolStats::bump(&self.stats.cache_misses);

        let frame_id = self.get_free_frame()?;
        let frame = &self.frames[frame_id.0];

        let read = {
            let mut page = frame.page_mut();
            self.disk_manager.lock().read_page(page_id, &mut page)
        };
        if let Err(e) = read {
            self.free_list.lock().push(frame_id);
            return Err(e);
        }
        BufferPoolStats::bump(&self.stats.pages_read);

        frame.clear_dirty();
        frame.set_page_id(Some(page_id));
        frame.pin();

        self.page_table.write().insert(page_id, frame_id);
        self.touch(frame_id);

        Ok(frame_id)
    }

    /// Record a use of a freshly pinned frame.
    fn touch(&self, frame_id: FrameId) {
        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id);
        replacer.set_evictable(frame_id, false);
    }

    fn get_free_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }
        self.evict_page()
    }

    /// Reclaim the least recently used unpinned frame.
    fn evict_page(&self) -> Result<FrameId> {
        let frame_id = self.replacer.lock().evict().ok_or(Error::NoFreeFrames)?;
        let frame = &self.frames[frame_id.0];
        let old_page_id = frame.page_id();

        if let Some(pid) = old_page_id {
            trace!(frame = %frame_id, page = %pid, dirty = frame.is_dirty(), "buffer_pool.evict");
            if let Err(e) = self.flush_frame(frame_id, pid) {
                // Keep the page resident and evictable rather than lose it.
                let mut replacer = self.replacer.lock();
                replacer.record_access(frame_id);
                replacer.set_evictable(frame_id, true);
                return Err(e);
            }
            self.page_table.write().remove(&pid);
        }
        BufferPoolStats::bump(&self.stats.evictions);

        frame.clear_dirty();
        frame.set_page_id(None);

        Ok(frame_id)
    }

    fn flush_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];
        if !frame.is_dirty() {
            return Ok(());
        }

        let page = frame.try_page().ok_or(Error::PageLatched(page_id))?;
        self.disk_manager.lock().write_page(page_id, &page)?;
        drop(page);

        frame.clear_dirty();
        BufferPoolStats::bump(&self.stats.pages_written);
        Ok(())
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(error = %e, "buffer_pool.drop.close_failed");
        }
    }
}
