//! Page layouts for the extendible hash index.
//!
//! - [`HashDirectoryPage`] - maps hash prefixes to bucket pages
//! - [`HashBucketPage`] - fixed-capacity slot array of (key, value) pairs
//! - [`Storable`] - fixed-width encoding for keys and values

mod bucket;
mod directory;
mod key;

pub use bucket::{bucket_capacity, HashBucketPage};
pub use directory::{HashDirectoryPage, DIRECTORY_PAGE_BYTES};
pub use key::{GenericKey, KeyComparator, OrdComparator, Storable};
