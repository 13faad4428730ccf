//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache layer between the hash index
//! and disk. It manages a fixed pool of frames, each holding one page.
//!
//! # Components
//! - [`BufferPoolManager`] - One page cache instance
//! - [`ParallelBufferPoolManager`] - Page caches sharded by page id
//! - [`BufferPool`] - The surface both of them expose to indexes
//! - [`Frame`] - A slot in the buffer pool holding a page + metadata
//! - [`PinnedPage`] - RAII pin, with [`PageReadGuard`] / [`PageWriteGuard`] latches
//! - [`PoolStats`] - Performance counters
//! - [`replacer`] - Eviction policy implementations

mod buffer_pool;
mod buffer_pool_manager;
mod frame;
mod page_guard;
mod parallel_buffer_pool_manager;
pub mod replacer;
mod stats;

pub use buffer_pool::BufferPool;
pub use buffer_pool_manager::BufferPoolManager;
pub use frame::Frame;
pub use page_guard::{PageReadGuard, PageWriteGuard, PinnedPage};
pub use parallel_buffer_pool_manager::ParallelBufferPoolManager;
pub use stats::{PoolStats, StatsSnapshot};
