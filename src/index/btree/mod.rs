//! Paged B-tree mapping terms to posting offsets.
//!
//! Every node occupies one 8 KB page. Keys are stored once, in whichever
//! node (leaf or branch) they land in, and each entry is front-coded
//! against its predecessor with integers packed to their minimal width.
//!
//! # Modules
//! - [`width`] - minimal-width little-endian integers and nibble packing
//! - `entry` - the on-page entry format
//! - `node` - decoding, searching and editing a single node page
//! - `meta` - root and last-page bookkeeping on the header page
//! - `tree` - the [`BTree`] handle: open, lookup, integrity checks
//! - `insert` - insertion with splits
//! - `iter` - ordered iteration
//! - `bulk` - bottom-up building from sorted records
//!
//! # File Layout
//! ```text
//! page 1     header: root u32 | last_block u32 | crc32
//! page 2..n  nodes:  NodeHeader (10B) | front-coded entries
//! ```

mod bulk;
mod entry;
mod insert;
mod iter;
mod meta;
mod node;
mod tree;
pub mod width;

pub use entry::Entry;
pub use iter::TreeIter;
pub use meta::{TreeMeta, HEADER_PAGE};
pub use node::{Node, Search};
pub use tree::{BTree, IntegrityReport, TreeStats};
