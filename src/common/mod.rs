//! Common types shared across the engine.
//!
//! - Configuration constants and [`BTreeOptions`](config::BTreeOptions)
//! - The crate-wide [`Error`] type
//! - Identifiers ([`PageId`], [`FrameId`])

pub mod config;
pub mod error;
mod ids;

pub use error::{Error, Result};
pub use ids::{FrameId, PageId};
