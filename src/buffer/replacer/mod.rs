//! Eviction policy for the buffer pool.
//!
//! - [`LruReplacer`] - least recently used unpinned frame goes first

mod lru;

pub use lru::LruReplacer;
