//! Buffer pool: a fixed set of in-memory frames caching tree file blocks.
//!
//! - [`BufferPoolManager`] - the page cache
//! - [`Frame`] - a slot holding a page plus pin and dirty state
//! - [`PageReadGuard`] / [`PageWriteGuard`] - RAII access to pinned pages
//! - [`BufferPoolStats`] - hit, miss and I/O counters
//! - [`replacer`] - the LRU eviction policy

mod buffer_pool_manager;
mod frame;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool_manager::BufferPoolManager;
pub use frame::Frame;
pub use page_guard::{PageReadGuard, PageWriteGuard};
pub use stats::{BufferPoolStats, StatsSnapshot};
