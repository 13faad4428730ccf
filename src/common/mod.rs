//! Common types shared by the storage, buffer, and index layers.
//!
//! - Configuration constants and [`config::BufferPoolConfig`]
//! - Error types
//! - Identifiers (PageId, FrameId, Rid)

pub mod config;
pub mod error;
mod frame_id;
mod page_id;
mod rid;

pub use error::{Error, Result};
pub use frame_id::FrameId;
pub use page_id::PageId;
pub use rid::Rid;
