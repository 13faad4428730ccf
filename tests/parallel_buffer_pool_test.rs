//! Integration tests for the sharded buffer pool.

use std::sync::Arc;
use std::thread;

use extendibledb::buffer::{BufferPool, ParallelBufferPoolManager};
use extendibledb::storage::DiskManager;
use extendibledb::{Error, PageHeader, PageId};
use tempfile::tempdir;

const PAYLOAD: usize = PageHeader::RESERVED;

fn create_pool(num_instances: u32, pool_size: usize) -> (ParallelBufferPoolManager, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let dm = DiskManager::create(dir.path().join("test.db")).unwrap();
    (ParallelBufferPoolManager::new(num_instances, pool_size, dm).unwrap(), dir)
}

#[test]
fn test_pages_live_on_their_instance() {
    let (pool, _dir) = create_pool(3, 2);

    for _ in 0..6 {
        let page = pool.new_page().unwrap();
        let pid = page.page_id();
        let owner = pool.instance_for(pid);
        assert!(owner.contains_page(pid));
        assert_eq!(owner.config().instance_index as usize, pid.shard(3));
    }
    assert_eq!(pool.pool_size(), 6);
    assert_eq!(pool.num_instances(), 3);
}

#[test]
fn test_data_survives_eviction_on_every_instance() {
    let (pool, _dir) = create_pool(2, 2);

    let page_ids: Vec<PageId> = (0..12u8)
        .map(|i| {
            let mut page = pool.new_page().unwrap();
            page.write().as_mut_slice()[PAYLOAD] = i;
            page.page_id()
        })
        .collect();

    for (i, pid) in page_ids.iter().enumerate() {
        let page = pool.fetch_page(*pid).unwrap();
        assert_eq!(page.read().as_slice()[PAYLOAD], i as u8);
    }
    assert!(pool.stats().evictions > 0);
}

#[test]
fn test_exhaustion_requires_every_instance_full() {
    let (pool, _dir) = create_pool(2, 2);

    let held: Vec<_> = (0..4).map(|_| pool.new_page().unwrap()).collect();
    assert!(matches!(pool.new_page(), Err(Error::NoFreeFrames)));

    let freed = held[0].page_id();
    drop(held);
    let page = pool.new_page().unwrap();
    assert_ne!(page.page_id(), freed);
}

#[test]
fn test_unpin_flush_delete_route() {
    let (pool, _dir) = create_pool(4, 2);

    let pid = pool.new_page().unwrap().into_page_id();
    assert!(!pool.delete_page(pid).unwrap());
    assert!(pool.unpin_page(pid, true).unwrap());
    assert!(!pool.unpin_page(pid, false).unwrap());

    assert!(pool.flush_page(pid).unwrap());
    pool.flush_all_pages().unwrap();

    assert!(pool.delete_page(pid).unwrap());
    assert!(!pool.instance_for(pid).contains_page(pid));
    // The refused delete of the pinned page still released its id.
    assert_eq!(pool.stats().pages_deallocated, 2);
}

#[test]
fn test_through_trait_object() {
    let (pool, _dir) = create_pool(2, 4);
    let pool: Arc<dyn BufferPool> = Arc::new(pool);

    let pid = {
        let mut page = pool.new_page().unwrap();
        page.write().as_mut_slice()[PAYLOAD] = 0xAB;
        page.page_id()
    };
    let page = pool.fetch_page(pid).unwrap();
    assert_eq!(page.read().as_slice()[PAYLOAD], 0xAB);
    assert_eq!(pool.pool_size(), 8);
}

#[test]
fn test_concurrent_allocation() {
    let (pool, _dir) = create_pool(4, 8);
    let pool = Arc::new(pool);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                (0..50)
                    .map(|i| {
                        let mut page = pool.new_page().unwrap();
                        page.write().as_mut_slice()[PAYLOAD] = (t * 50 + i) as u8;
                        (page.page_id(), (t * 50 + i) as u8)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut written: Vec<(PageId, u8)> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    written.sort_unstable();
    let ids: Vec<PageId> = written.iter().map(|(pid, _)| *pid).collect();
    let mut unique = ids.clone();
    unique.dedup();
    assert_eq!(unique.len(), 200, "page ids handed out twice");

    for (pid, byte) in written {
        let page = pool.fetch_page(pid).unwrap();
        assert_eq!(page.read().as_slice()[PAYLOAD], byte);
    }
}
