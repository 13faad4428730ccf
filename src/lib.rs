//! ExtendibleDB - a buffer pool and a disk-resident extendible hash index.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          ExtendibleDB                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Index Layer (index/)                     │   │
//! │  │   ExtendibleHashTable: table latch + page latches        │   │
//! │  │   directory page ──▶ bucket pages (split / merge)        │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Buffer Pool (buffer/)                     │   │
//! │  │   BufferPoolManager | ParallelBufferPoolManager          │   │
//! │  │   Frame + PinnedPage + LruReplacer + PoolStats           │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Storage Layer (storage/)                  │   │
//! │  │   DiskManager + Page + PageHeader + hash page layouts    │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Rid, Error, config)
//! - [`buffer`] - Buffer pool management and eviction
//! - [`storage`] - Disk I/O and page formats
//! - [`index`] - Extendible hash index
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use extendibledb::{BufferPoolManager, DiskManager, ExtendibleHashTable};
//! use extendibledb::index::hash::{DefaultKeyHasher, OrdComparator};
//!
//! let dm = DiskManager::open_or_create("my_database.db").unwrap();
//! let bpm = Arc::new(BufferPoolManager::new(64, dm));
//!
//! let index: ExtendibleHashTable<i64, u64> =
//!     ExtendibleHashTable::new("users_pk", bpm, OrdComparator, DefaultKeyHasher).unwrap();
//! index.insert(&7, &700).unwrap();
//! assert_eq!(index.get_value(&7).unwrap(), vec![700]);
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

pub use common::config::PAGE_SIZE;
pub use common::{Error, FrameId, PageId, Result, Rid};

pub use buffer::{BufferPool, BufferPoolManager, ParallelBufferPoolManager, PinnedPage};
pub use index::hash::ExtendibleHashTable;
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::DiskManager;
