//! Storage layer - block file I/O and page formats.
//!
//! - [`DiskManager`] - reads, writes and appends fixed-size blocks
//! - [`page`] - page buffer and node header layout

mod disk_manager;
pub mod page;

pub use disk_manager::{DiskManager, OpenMode};
