//! Disk-resident extendible hash table.

use std::marker::PhantomData;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::RwLock;

use crate::buffer::{BufferPool, PinnedPage};
use crate::common::config::DIRECTORY_MAX_DEPTH;
use crate::common::{Error, PageId, Result};
use crate::storage::page::hash::{
    HashBucketPage, HashDirectoryPage, KeyComparator, OrdComparator, Storable,
};
use crate::storage::page::{Page, PageType};

use super::key_hasher::{DefaultKeyHasher, KeyHasher};

/// Result of an insert attempt under the shared table latch.
enum InsertOutcome {
    Inserted,
    Duplicate,
    BucketFull,
}

/// A hash index whose directory and buckets live in buffer pool pages.
///
/// # Structure
/// ```text
///              directory page (global_depth = 2)
///   slot  ld  bucket
///   00    1   ──────┐
///   01    2   ────┐ │        bucket pages
///   10    1   ────┼─┴──────▶ [ k: hash ≡ 0 (mod 2) ]
///   11    2   ──┐ └────────▶ [ k: hash ≡ 1 (mod 4) ]
///               └──────────▶ [ k: hash ≡ 3 (mod 4) ]
/// ```
/// A key lives in the bucket of slot `hash(key) & (2^global_depth - 1)`.
///
/// # Concurrency
/// A table-wide reader/writer latch sits above the page latches:
/// - lookups, and inserts/removes that do not change structure, hold it
///   shared and latch only the pages they touch
/// - splits and merges hold it exclusive, so no reader ever sees a
///   half-updated directory
///
/// An insert that finds its bucket full releases everything and retries
/// under the exclusive latch rather than upgrading. Page latches are always
/// taken directory first, then bucket.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use extendibledb::buffer::BufferPoolManager;
/// use extendibledb::index::hash::{DefaultKeyHasher, ExtendibleHashTable};
/// use extendibledb::storage::page::hash::OrdComparator;
/// use extendibledb::storage::DiskManager;
///
/// let dir = tempfile::tempdir().unwrap();
/// let dm = DiskManager::create(dir.path().join("index.db")).unwrap();
/// let bpm = Arc::new(BufferPoolManager::new(16, dm));
///
/// let table: ExtendibleHashTable<i32, i32> =
///     ExtendibleHashTable::new("orders_pk", bpm, OrdComparator, DefaultKeyHasher).unwrap();
/// assert!(table.insert(&1, &100).unwrap());
/// assert_eq!(table.get_value(&1).unwrap(), vec![100]);
/// ```
pub struct ExtendibleHashTable<K, V, C = OrdComparator, H = DefaultKeyHasher> {
    name: String,
    bpm: Arc<dyn BufferPool>,
    directory_page_id: PageId,
    comparator: C,
    hasher: H,
    table_latch: RwLock<()>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, C, H> ExtendibleHashTable<K, V, C, H>
where
    K: Storable,
    V: Storable + PartialEq,
    C: KeyComparator<K>,
    H: KeyHasher<K>,
{
    /// Create an empty index: a directory of global depth 1 over two
    /// empty buckets.
    ///
    /// # Errors
    /// `Error::NoFreeFrames` if the pool cannot hold the directory and a
    /// bucket at the same time.
    pub fn new(
        name: impl Into<String>,
        bpm: Arc<dyn BufferPool>,
        comparator: C,
        hasher: H,
    ) -> Result<Self> {
        let name = name.into();

        let directory_page_id = {
            let mut dir_page = bpm.new_page()?;
            let directory_page_id = dir_page.page_id();

            let mut bucket_page_ids = [PageId::INVALID; 2];
            for slot in &mut bucket_page_ids {
                let mut bucket_page = bpm.new_page()?;
                let mut guard = bucket_page.write();
                Self::bucket_mut(&mut guard).init();
                guard.stamp_checksum();
                *slot = guard.page_id();
            }

            let mut guard = dir_page.write();
            let mut dir = Self::directory_mut(&mut guard);
            dir.init(directory_page_id);
            dir.incr_global_depth();
            for (idx, bucket_page_id) in bucket_page_ids.into_iter().enumerate() {
                dir.set_bucket_page_id(idx, bucket_page_id);
                dir.set_local_depth(idx, 1);
            }
            guard.stamp_checksum();
            directory_page_id
        };

        info!("created hash index {} with directory {}", name, directory_page_id);
        Ok(Self::from_parts(name, bpm, directory_page_id, comparator, hasher))
    }

    /// Attach to an index whose directory already lives at
    /// `directory_page_id`.
    ///
    /// The directory and every bucket it references are checked against
    /// their stored CRC32 before the index is handed out.
    ///
    /// # Errors
    /// - `Error::InvalidPageType` if a page does not carry the expected layout
    /// - `Error::ChecksumMismatch` if a page's contents fail verification
    pub fn open(
        name: impl Into<String>,
        bpm: Arc<dyn BufferPool>,
        directory_page_id: PageId,
        comparator: C,
        hasher: H,
    ) -> Result<Self> {
        let name = name.into();

        {
            let dir_page = bpm.fetch_page(directory_page_id)?;
            let guard = dir_page.read();
            Self::check_page(&guard, directory_page_id, PageType::HashDirectory)?;

            let dir = Self::directory(&guard);
            let mut bucket_page_ids: Vec<PageId> =
                (0..dir.size()).map(|idx| dir.bucket_page_id(idx)).collect();
            bucket_page_ids.sort_unstable();
            bucket_page_ids.dedup();
            for bucket_page_id in bucket_page_ids {
                let bucket_page = bpm.fetch_page(bucket_page_id)?;
                Self::check_page(&bucket_page.read(), bucket_page_id, PageType::HashBucket)?;
            }
        }

        info!("opened hash index {} at directory {}", name, directory_page_id);
        Ok(Self::from_parts(name, bpm, directory_page_id, comparator, hasher))
    }

    fn from_parts(
        name: String,
        bpm: Arc<dyn BufferPool>,
        directory_page_id: PageId,
        comparator: C,
        hasher: H,
    ) -> Self {
        Self {
            name,
            bpm,
            directory_page_id,
            comparator,
            hasher,
            table_latch: RwLock::new(()),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Page holding the directory; pass it to [`open`](Self::open) later.
    #[inline]
    pub fn directory_page_id(&self) -> PageId {
        self.directory_page_id
    }

    // ========================================================================
    // Page views
    // ========================================================================

    /// Every mutation re-stamps the page CRC before its write latch is
    /// released, so a page read back from disk must verify.
    fn check_page(page: &Page, page_id: PageId, expected: PageType) -> Result<()> {
        let found = page.page_type();
        if found != expected {
            return Err(Error::InvalidPageType {
                page_id,
                expected: expected as u8,
                found: found as u8,
            });
        }
        if !page.verify_checksum() {
            warn!("{} failed checksum verification", page_id);
            return Err(Error::ChecksumMismatch(page_id));
        }
        Ok(())
    }

    fn directory(page: &Page) -> HashDirectoryPage<&[u8]> {
        HashDirectoryPage::new(page.as_slice())
    }

    fn directory_mut(page: &mut Page) -> HashDirectoryPage<&mut [u8]> {
        HashDirectoryPage::new(page.as_mut_slice())
    }

    fn bucket(page: &Page) -> HashBucketPage<&[u8], K, V> {
        HashBucketPage::new(page.as_slice())
    }

    fn bucket_mut(page: &mut Page) -> HashBucketPage<&mut [u8], K, V> {
        HashBucketPage::new(page.as_mut_slice())
    }

    /// Low 32 bits of the key's hash.
    #[inline]
    fn hash(&self, key: &K) -> u32 {
        self.hasher.hash(key) as u32
    }

    fn bucket_page_id_for(&self, dir_page: &PinnedPage<'_>, key: &K) -> PageId {
        let guard = dir_page.read();
        let dir = Self::directory(&guard);
        dir.bucket_page_id(dir.hash_to_index(self.hash(key)))
    }

    // ========================================================================
    // Public API
    // ========================================================================

    /// Every value stored under `key`.
    pub fn get_value(&self, key: &K) -> Result<Vec<V>> {
        let _table = self.table_latch.read();

        let dir_page = self.bpm.fetch_page(self.directory_page_id)?;
        let bucket_page = self.bpm.fetch_page(self.bucket_page_id_for(&dir_page, key))?;
        let guard = bucket_page.read();
        let values = Self::bucket(&guard).get_value(key, &self.comparator);
        Ok(values)
    }

    /// Insert `(key, value)`, splitting buckets as needed.
    ///
    /// Returns false if the exact pair is already present, or if the
    /// target bucket is full and the directory is at its maximum depth.
    pub fn insert(&self, key: &K, value: &V) -> Result<bool> {
        match self.try_insert(key, value)? {
            InsertOutcome::Inserted => Ok(true),
            InsertOutcome::Duplicate => Ok(false),
            InsertOutcome::BucketFull => self.split_insert(key, value),
        }
    }

    /// Remove exactly `(key, value)`. Returns false if it was not present.
    ///
    /// Emptying a bucket triggers a merge pass.
    pub fn remove(&self, key: &K, value: &V) -> Result<bool> {
        let (removed, emptied) = {
            let _table = self.table_latch.read();

            let dir_page = self.bpm.fetch_page(self.directory_page_id)?;
            let mut bucket_page = self.bpm.fetch_page(self.bucket_page_id_for(&dir_page, key))?;
            let mut guard = bucket_page.write();
            let mut bucket = Self::bucket_mut(&mut guard);
            let removed = bucket.remove(key, value, &self.comparator);
            let emptied = removed && bucket.is_empty();
            if removed {
                guard.stamp_checksum();
            }
            (removed, emptied)
        };

        if emptied {
            self.merge()?;
        }
        Ok(removed)
    }

    pub fn global_depth(&self) -> Result<u32> {
        let _table = self.table_latch.read();

        let dir_page = self.bpm.fetch_page(self.directory_page_id)?;
        let guard = dir_page.read();
        let global_depth = Self::directory(&guard).global_depth();
        Ok(global_depth)
    }

    /// Number of distinct bucket pages the directory references.
    pub fn num_buckets(&self) -> Result<usize> {
        let _table = self.table_latch.read();

        let dir_page = self.bpm.fetch_page(self.directory_page_id)?;
        let guard = dir_page.read();
        let dir = Self::directory(&guard);
        let mut bucket_page_ids: Vec<PageId> =
            (0..dir.size()).map(|idx| dir.bucket_page_id(idx)).collect();
        bucket_page_ids.sort_unstable();
        bucket_page_ids.dedup();
        Ok(bucket_page_ids.len())
    }

    /// Check the directory invariants, that every page passes its checksum,
    /// and that every live entry sits in the bucket its hash maps to.
    ///
    /// # Panics
    /// Panics on any violation. Intended for tests and debugging.
    pub fn verify_integrity(&self) -> Result<()> {
        let _table = self.table_latch.read();

        let dir_page = self.bpm.fetch_page(self.directory_page_id)?;
        let guard = dir_page.read();
        assert!(guard.verify_checksum(), "directory {} fails its checksum", guard.page_id());
        let dir = Self::directory(&guard);
        dir.verify_integrity();

        for idx in 0..dir.size() {
            let local_mask = dir.local_depth_mask(idx);
            // Check each bucket once, from the lowest slot that references it.
            if (idx as u32) & !local_mask != 0 {
                continue;
            }
            let bucket_page = self.bpm.fetch_page(dir.bucket_page_id(idx))?;
            let bucket_guard = bucket_page.read();
            assert!(
                bucket_guard.verify_checksum(),
                "bucket {} fails its checksum",
                bucket_page.page_id()
            );
            for (key, _) in Self::bucket(&bucket_guard).entries() {
                let hash = self.hash(&key);
                if hash & local_mask != idx as u32 {
                    warn!("{}: misplaced entry in slot {}", self.name, idx);
                    dir.log_directory();
                    panic!(
                        "entry with hash {:#x} stored in {} (slot {}, local depth {})",
                        hash,
                        bucket_page.page_id(),
                        idx,
                        dir.local_depth(idx)
                    );
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Insert paths
    // ========================================================================

    fn try_insert(&self, key: &K, value: &V) -> Result<InsertOutcome> {
        let _table = self.table_latch.read();

        let dir_page = self.bpm.fetch_page(self.directory_page_id)?;
        let mut bucket_page = self.bpm.fetch_page(self.bucket_page_id_for(&dir_page, key))?;
        let mut guard = bucket_page.write();
        let mut bucket = Self::bucket_mut(&mut guard);

        if bucket.is_full() {
            if bucket.contains(key, value, &self.comparator) {
                return Ok(InsertOutcome::Duplicate);
            }
            return Ok(InsertOutcome::BucketFull);
        }
        if bucket.insert(key, value, &self.comparator) {
            guard.stamp_checksum();
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::Duplicate)
        }
    }

    /// Insert under the exclusive table latch, splitting the target bucket
    /// until it has room.
    fn split_insert(&self, key: &K, value: &V) -> Result<bool> {
        let _table = self.table_latch.write();

        let mut dir_page = self.bpm.fetch_page(self.directory_page_id)?;
        let hash = self.hash(key);

        loop {
            let bucket_idx = {
                let guard = dir_page.read();
                Self::directory(&guard).hash_to_index(hash)
            };
            let mut bucket_page = self.bpm.fetch_page(self.bucket_page_id_for(&dir_page, key))?;

            {
                let mut guard = bucket_page.write();
                let mut bucket = Self::bucket_mut(&mut guard);
                if bucket.contains(key, value, &self.comparator) {
                    return Ok(false);
                }
                if !bucket.is_full() {
                    let inserted = bucket.insert(key, value, &self.comparator);
                    if inserted {
                        guard.stamp_checksum();
                    }
                    return Ok(inserted);
                }
            }

            if !self.split_bucket(&mut dir_page, bucket_idx, &mut bucket_page)? {
                return Ok(false);
            }
        }
    }

    /// Split the full bucket referenced by `bucket_idx` on its next hash
    /// bit, doubling the directory first if the bucket already uses every
    /// directory bit.
    ///
    /// Returns false if the directory is at its maximum depth.
    fn split_bucket(
        &self,
        dir_page: &mut PinnedPage<'_>,
        bucket_idx: usize,
        bucket_page: &mut PinnedPage<'_>,
    ) -> Result<bool> {
        let (local_depth, global_depth) = {
            let guard = dir_page.read();
            let dir = Self::directory(&guard);
            (dir.local_depth(bucket_idx), dir.global_depth())
        };
        if local_depth == global_depth && global_depth >= DIRECTORY_MAX_DEPTH {
            warn!(
                "{}: {} is full and the directory is at maximum depth {}",
                self.name,
                bucket_page.page_id(),
                DIRECTORY_MAX_DEPTH
            );
            return Ok(false);
        }

        // Allocate before touching the directory, so a full pool leaves the
        // index unchanged.
        let mut image_page = self.bpm.new_page()?;
        let image_page_id = image_page.page_id();
        let old_page_id = bucket_page.page_id();
        let high_bit = 1u32 << local_depth;

        let mut dir_guard = dir_page.write();
        let mut dir = Self::directory_mut(&mut dir_guard);

        if local_depth == dir.global_depth() {
            let size = dir.size();
            dir.incr_global_depth();
            for idx in 0..size {
                let (page_id, depth) = (dir.bucket_page_id(idx), dir.local_depth(idx));
                dir.set_bucket_page_id(idx + size, page_id);
                dir.set_local_depth(idx + size, depth);
            }
            debug!("{}: directory grew to global depth {}", self.name, dir.global_depth());
        }

        for idx in 0..dir.size() {
            if dir.bucket_page_id(idx) == old_page_id {
                dir.set_local_depth(idx, local_depth + 1);
                if (idx as u32) & high_bit != 0 {
                    dir.set_bucket_page_id(idx, image_page_id);
                }
            }
        }
        dir_guard.stamp_checksum();

        let mut old_guard = bucket_page.write();
        let mut old_bucket = Self::bucket_mut(&mut old_guard);
        let (stay, moved): (Vec<_>, Vec<_>) = old_bucket
            .entries()
            .into_iter()
            .partition(|(key, _)| self.hash(key) & high_bit == 0);
        old_bucket.rewrite(&stay);
        old_guard.stamp_checksum();

        let mut image_guard = image_page.write();
        let mut image_bucket = Self::bucket_mut(&mut image_guard);
        image_bucket.init();
        image_bucket.rewrite(&moved);
        image_guard.stamp_checksum();

        debug!(
            "{}: split {} into {} at local depth {} ({} stay, {} moved)",
            self.name,
            old_page_id,
            image_page_id,
            local_depth + 1,
            stay.len(),
            moved.len()
        );
        Ok(true)
    }

    // ========================================================================
    // Merge
    // ========================================================================

    fn bucket_is_empty(&self, bucket_page_id: PageId) -> Result<bool> {
        let bucket_page = self.bpm.fetch_page(bucket_page_id)?;
        let guard = bucket_page.read();
        let is_empty = Self::bucket(&guard).is_empty();
        Ok(is_empty)
    }

    /// Fold every empty bucket into its split image where both have the
    /// same local depth (above 1), then shrink the directory as far as it
    /// goes. Abandoned bucket pages are dropped from the pool.
    fn merge(&self) -> Result<()> {
        let _table = self.table_latch.write();

        let mut dir_page = self.bpm.fetch_page(self.directory_page_id)?;
        let mut abandoned = Vec::new();
        {
            let mut dir_guard = dir_page.write();
            let mut dir = Self::directory_mut(&mut dir_guard);

            let mut idx = 0;
            while idx < dir.size() {
                let local_depth = dir.local_depth(idx);
                if local_depth <= 1 {
                    idx += 1;
                    continue;
                }
                let image_idx = dir.split_image_index(idx);
                let bucket_page_id = dir.bucket_page_id(idx);
                let image_page_id = dir.bucket_page_id(image_idx);
                if dir.local_depth(image_idx) != local_depth
                    || bucket_page_id == image_page_id
                    || !self.bucket_is_empty(bucket_page_id)?
                {
                    idx += 1;
                    continue;
                }

                for slot in 0..dir.size() {
                    let page_id = dir.bucket_page_id(slot);
                    if page_id == bucket_page_id || page_id == image_page_id {
                        dir.set_bucket_page_id(slot, image_page_id);
                        dir.set_local_depth(slot, local_depth - 1);
                    }
                }
                while dir.can_shrink() {
                    dir.decr_global_depth();
                }
                debug!(
                    "{}: merged {} into {}, global depth {}",
                    self.name,
                    bucket_page_id,
                    image_page_id,
                    dir.global_depth()
                );
                abandoned.push(bucket_page_id);

                // The merged bucket may now pair with its own image.
                idx = 0;
            }
            if !abandoned.is_empty() {
                dir_guard.stamp_checksum();
            }
        }
        drop(dir_page);

        for page_id in abandoned {
            if !self.bpm.delete_page(page_id)? {
                warn!("{}: abandoned bucket {} still pinned", self.name, page_id);
            }
        }
        Ok(())
    }
}
