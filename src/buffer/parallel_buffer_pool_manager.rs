//! Sharded buffer pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::buffer::{BufferPool, BufferPoolManager, PinnedPage, StatsSnapshot};
use crate::common::config::BufferPoolConfig;
use crate::common::{Error, PageId, Result};
use crate::storage::DiskManager;

/// Several independent [`BufferPoolManager`] instances over one file.
///
/// Page `p` lives in instance `p % num_instances`, and instance `i`
/// allocates ids `i, i + n, i + 2n, ...`, so routing needs no table. Each
/// instance has its own mutex, which spreads bookkeeping contention.
///
/// `new_page` starts at a rotating instance and moves on to the next one
/// whenever an instance is fully pinned.
pub struct ParallelBufferPoolManager {
    instances: Vec<BufferPoolManager>,
    /// Instance the next `new_page` tries first.
    next_instance: AtomicUsize,
}

impl ParallelBufferPoolManager {
    /// Create `num_instances` pools of `pool_size` frames each.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if either count is zero.
    pub fn new(num_instances: u32, pool_size: usize, disk_manager: DiskManager) -> Result<Self> {
        if num_instances == 0 {
            return Err(Error::InvalidConfig("num_instances must be > 0".into()));
        }

        let disk_manager = Arc::new(Mutex::new(disk_manager));
        let instances = (0..num_instances)
            .map(|index| {
                let config = BufferPoolConfig::new(pool_size).with_sharding(num_instances, index);
                BufferPoolManager::with_config(config, Arc::clone(&disk_manager))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            instances,
            next_instance: AtomicUsize::new(0),
        })
    }

    #[inline]
    pub fn num_instances(&self) -> usize {
        self.instances.len()
    }

    /// The instance responsible for `page_id`.
    #[inline]
    pub fn instance_for(&self, page_id: PageId) -> &BufferPoolManager {
        &self.instances[page_id.shard(self.instances.len() as u32)]
    }

    /// Counters summed over every instance.
    pub fn stats(&self) -> StatsSnapshot {
        self.instances.iter().map(|bpm| bpm.stats().snapshot()).sum()
    }

    pub fn fetch_page(&self, page_id: PageId) -> Result<PinnedPage<'_>> {
        self.instance_for(page_id).fetch_page(page_id)
    }

    /// Allocate a page on the first instance, starting from a rotating
    /// cursor, that has a frame to give.
    ///
    /// # Errors
    /// `Error::NoFreeFrames` only if every instance is fully pinned.
    pub fn new_page(&self) -> Result<PinnedPage<'_>> {
        let num_instances = self.instances.len();
        let start = self.next_instance.fetch_add(1, Ordering::Relaxed) % num_instances;

        for offset in 0..num_instances {
            let index = (start + offset) % num_instances;
            match self.instances[index].new_page() {
                Ok(page) => return Ok(page),
                Err(Error::NoFreeFrames) => {
                    debug!("instance {} exhausted, trying next", index);
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::NoFreeFrames)
    }

    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<bool> {
        self.instance_for(page_id).unpin_page(page_id, is_dirty)
    }

    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        self.instance_for(page_id).flush_page(page_id)
    }

    pub fn flush_all_pages(&self) -> Result<()> {
        for bpm in &self.instances {
            bpm.flush_all_pages()?;
        }
        Ok(())
    }

    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        self.instance_for(page_id).delete_page(page_id)
    }

    /// Total number of frames across instances.
    pub fn pool_size(&self) -> usize {
        self.instances.iter().map(BufferPoolManager::pool_size).sum()
    }
}

impl BufferPool for ParallelBufferPoolManager {
    fn fetch_page(&self, page_id: PageId) -> Result<PinnedPage<'_>> {
        ParallelBufferPoolManager::fetch_page(self, page_id)
    }

    fn new_page(&self) -> Result<PinnedPage<'_>> {
        ParallelBufferPoolManager::new_page(self)
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<bool> {
        ParallelBufferPoolManager::unpin_page(self, page_id, is_dirty)
    }

    fn flush_page(&self, page_id: PageId) -> Result<bool> {
        ParallelBufferPoolManager::flush_page(self, page_id)
    }

    fn flush_all_pages(&self) -> Result<()> {
        ParallelBufferPoolManager::flush_all_pages(self)
    }

    fn delete_page(&self, page_id: PageId) -> Result<bool> {
        ParallelBufferPoolManager::delete_page(self, page_id)
    }

    fn pool_size(&self) -> usize {
        ParallelBufferPoolManager::pool_size(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_pool(
        num_instances: u32,
        pool_size: usize,
    ) -> (ParallelBufferPoolManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("test.db")).unwrap();
        (
            ParallelBufferPoolManager::new(num_instances, pool_size, dm).unwrap(),
            dir,
        )
    }

    #[test]
    fn test_round_robin_allocation() {
        let (pool, _dir) = create_test_pool(3, 2);

        let ids: Vec<PageId> = (0..6).map(|_| pool.new_page().unwrap().page_id()).collect();
        assert_eq!(
            ids,
            [0, 1, 2, 3, 4, 5].map(PageId::new).to_vec()
        );
        assert_eq!(pool.pool_size(), 6);
    }

    #[test]
    fn test_routing_by_page_id() {
        let (pool, _dir) = create_test_pool(4, 2);

        let page_id = pool.new_page().unwrap().into_page_id();
        assert!(pool.instance_for(page_id).contains_page(page_id));
        assert_eq!(pool.instance_for(page_id).get_pin_count(page_id), Some(1));
        assert!(pool.unpin_page(page_id, false).unwrap());
    }

    #[test]
    fn test_exhausted_instance_is_skipped() {
        let (pool, _dir) = create_test_pool(2, 1);

        // Instance 0 gets page 0 and stays pinned.
        let held = pool.new_page().unwrap();
        assert_eq!(held.page_id(), PageId::new(0));

        // Cursor now points at instance 1, then back at the full instance 0.
        let second = pool.new_page().unwrap();
        assert_eq!(second.page_id(), PageId::new(1));
        drop(second);
        let third = pool.new_page().unwrap();
        assert_eq!(third.page_id(), PageId::new(3));

        assert!(matches!(pool.new_page(), Err(Error::NoFreeFrames)));
    }

    #[test]
    fn test_zero_instances_rejected() {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("test.db")).unwrap();
        assert!(matches!(
            ParallelBufferPoolManager::new(0, 4, dm),
            Err(Error::InvalidConfig(_))
        ));
    }
}
