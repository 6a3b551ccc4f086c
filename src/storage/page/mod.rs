//! Page types and layout.
//!
//! - [`Page`] - the raw 8KB block buffer
//! - [`NodeHeader`] - metadata at the start of every node page
//! - [`NodeKind`] - leaf or branch

#[allow(clippy::module_inception)]
mod page;
mod page_header;

pub use page::Page;
pub use page_header::{NodeHeader, NodeKind};
