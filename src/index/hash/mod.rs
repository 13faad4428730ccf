//! Extendible hash index.
//!
//! - [`ExtendibleHashTable`] - point lookups, insert with split, remove with merge
//! - [`KeyHasher`] / [`DefaultKeyHasher`] - key hashing
//! - [`KeyComparator`] / [`OrdComparator`] - key equality inside buckets

mod extendible_hash_table;
mod key_hasher;

pub use extendible_hash_table::ExtendibleHashTable;
pub use key_hasher::{DefaultKeyHasher, KeyHasher};
pub use crate::storage::page::hash::{KeyComparator, OrdComparator};
