//! yase-btree - the paged B-tree behind the YASE search index.
//!
//! Maps terms (byte strings up to 254 bytes) to a posting-file offset and a
//! document count, stored in a single file of 8 KB pages.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Index Layer (index/btree)                │   │
//! │  │   BTree: get | iter | insert + split | bulk build        │   │
//! │  │   Node: front-coded entries, minimal-width integers      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Buffer Pool (buffer/)                     │   │
//! │  │   BufferPoolManager + Frame + LRU replacer + Statistics  │   │
//! │  │   RAII read/write guards pin pages while in use          │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Storage Layer (storage/)                  │   │
//! │  │         DiskManager + Page + NodeHeader                  │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Error, config)
//! - [`buffer`] - Buffer pool management and LRU eviction
//! - [`storage`] - Disk I/O and page formats
//! - [`index`] - The B-tree
//!
//! # Quick Start
//! ```no_run
//! use yase_btree::{BTree, BTreeOptions, Entry, OpenMode};
//!
//! let records = (0..1000u64).map(|i| Entry::new(format!("term{i:04}"), i * 64, 1));
//! let tree = BTree::build_from_sorted("terms.btree", records, BTreeOptions::default())?;
//! tree.close()?;
//!
//! let mut tree = BTree::open("terms.btree", OpenMode::ReadWrite, BTreeOptions::default())?;
//! tree.insert(b"term0500a", 99_999, 3)?;
//! for entry in tree.iter_from(b"term0500").take(2) {
//!     println!("{}", entry?);
//! }
//! # Ok::<(), yase_btree::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{BTreeOptions, PAGE_SIZE};
pub use common::{Error, FrameId, PageId, Result};

pub use buffer::{BufferPoolManager, BufferPoolStats, Frame, StatsSnapshot};
pub use index::btree::{BTree, Entry, IntegrityReport, TreeIter, TreeStats};
pub use storage::page::{NodeHeader, NodeKind, Page};
pub use storage::{DiskManager, OpenMode};
