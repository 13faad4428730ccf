//! Index structures built on the buffer pool.
//!
//! - [`hash`] - Disk-resident extendible hashing

pub mod hash;
