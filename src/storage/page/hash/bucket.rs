//! Extendible hash bucket page.

use std::cmp::Ordering;
use std::marker::PhantomData;

use log::debug;

use crate::common::config::PAGE_SIZE;
use crate::storage::page::{PageHeader, PageType};

use super::key::{KeyComparator, Storable};

const OFFSET_BITMAPS: usize = PageHeader::RESERVED;

/// Number of `entry_size`-byte slots that fit in a bucket page alongside
/// the two occupancy bitmaps.
pub const fn bucket_capacity(entry_size: usize) -> usize {
    let available = PAGE_SIZE - PageHeader::RESERVED;
    let mut capacity = 4 * available / (4 * entry_size + 1);
    while capacity * entry_size + 2 * ((capacity + 7) / 8) > available {
        capacity -= 1;
    }
    capacity
}

/// Typed view of a hash bucket stored in a page.
///
/// # Layout
/// ```text
/// Offset          Size            Field
/// ------          ----            -----
/// 0               16              PageHeader (PageType::HashBucket)
/// 16              ceil(cap/8)     occupied bitmap
/// 16+ceil(cap/8)  ceil(cap/8)     readable bitmap
/// 16+2*ceil(..)   cap*(|K|+|V|)   slot array of (key, value)
/// ```
///
/// A slot is *occupied* once it has ever held an entry and *readable* while
/// it holds a live one. Removal clears only the readable bit, leaving a
/// tombstone. Scans stop at the first never-occupied slot, so entries are
/// always placed in the first non-readable slot.
///
/// Duplicate keys are allowed; an exact duplicate (key, value) pair is not.
pub struct HashBucketPage<B, K, V> {
    data: B,
    _marker: PhantomData<(K, V)>,
}

impl<B, K: Storable, V: Storable> HashBucketPage<B, K, V> {
    /// Number of slots per bucket.
    pub const CAPACITY: usize = bucket_capacity(K::SIZE + V::SIZE);

    const BITMAP_LEN: usize = (Self::CAPACITY + 7) / 8;
    const OFFSET_READABLE: usize = OFFSET_BITMAPS + Self::BITMAP_LEN;
    const OFFSET_ARRAY: usize = Self::OFFSET_READABLE + Self::BITMAP_LEN;
    const ENTRY_SIZE: usize = K::SIZE + V::SIZE;

    #[inline]
    fn slot_offset(bucket_idx: usize) -> usize {
        Self::OFFSET_ARRAY + bucket_idx * Self::ENTRY_SIZE
    }
}

impl<B, K, V> HashBucketPage<B, K, V>
where
    B: AsRef<[u8]>,
    K: Storable,
    V: Storable + PartialEq,
{
    pub fn new(data: B) -> Self {
        debug_assert!(data.as_ref().len() >= PAGE_SIZE);
        Self {
            data,
            _marker: PhantomData,
        }
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    #[inline]
    fn test_bit(&self, bitmap_offset: usize, bucket_idx: usize) -> bool {
        self.bytes()[bitmap_offset + bucket_idx / 8] & (1 << (bucket_idx % 8)) != 0
    }

    /// Whether the underlying page was initialized as a bucket.
    pub fn is_bucket(&self) -> bool {
        PageHeader::page_type_of(self.bytes()) == PageType::HashBucket
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        Self::CAPACITY
    }

    #[inline]
    pub fn is_occupied(&self, bucket_idx: usize) -> bool {
        self.test_bit(OFFSET_BITMAPS, bucket_idx)
    }

    #[inline]
    pub fn is_readable(&self, bucket_idx: usize) -> bool {
        self.test_bit(Self::OFFSET_READABLE, bucket_idx)
    }

    pub fn key_at(&self, bucket_idx: usize) -> K {
        let offset = Self::slot_offset(bucket_idx);
        K::read_from(&self.bytes()[offset..offset + K::SIZE])
    }

    pub fn value_at(&self, bucket_idx: usize) -> V {
        let offset = Self::slot_offset(bucket_idx) + K::SIZE;
        V::read_from(&self.bytes()[offset..offset + V::SIZE])
    }

    /// Every value stored under `key`, in slot order.
    pub fn get_value<C: KeyComparator<K>>(&self, key: &K, cmp: &C) -> Vec<V> {
        let mut result = Vec::new();
        for idx in 0..Self::CAPACITY {
            if !self.is_occupied(idx) {
                break;
            }
            if self.is_readable(idx) && cmp.compare(&self.key_at(idx), key) == Ordering::Equal {
                result.push(self.value_at(idx));
            }
        }
        result
    }

    /// Slot holding exactly `(key, value)`, if any.
    fn find_pair<C: KeyComparator<K>>(&self, key: &K, value: &V, cmp: &C) -> Option<usize> {
        for idx in 0..Self::CAPACITY {
            if !self.is_occupied(idx) {
                break;
            }
            if self.is_readable(idx)
                && cmp.compare(&self.key_at(idx), key) == Ordering::Equal
                && self.value_at(idx) == *value
            {
                return Some(idx);
            }
        }
        None
    }

    pub fn contains<C: KeyComparator<K>>(&self, key: &K, value: &V, cmp: &C) -> bool {
        self.find_pair(key, value, cmp).is_some()
    }

    pub fn num_readable(&self) -> usize {
        self.bytes()[Self::OFFSET_READABLE..Self::OFFSET_ARRAY]
            .iter()
            .map(|byte| byte.count_ones() as usize)
            .sum()
    }

    pub fn is_full(&self) -> bool {
        self.num_readable() == Self::CAPACITY
    }

    pub fn is_empty(&self) -> bool {
        self.bytes()[Self::OFFSET_READABLE..Self::OFFSET_ARRAY]
            .iter()
            .all(|&byte| byte == 0)
    }

    /// Live entries in slot order.
    pub fn entries(&self) -> Vec<(K, V)> {
        (0..Self::CAPACITY)
            .take_while(|&idx| self.is_occupied(idx))
            .filter(|&idx| self.is_readable(idx))
            .map(|idx| (self.key_at(idx), self.value_at(idx)))
            .collect()
    }

    /// Log occupancy at debug level.
    pub fn log_bucket(&self) {
        let occupied = (0..Self::CAPACITY)
            .take_while(|&idx| self.is_occupied(idx))
            .count();
        let readable = self.num_readable();
        debug!(
            "bucket capacity {}, occupied {}, readable {}, tombstones {}",
            Self::CAPACITY,
            occupied,
            readable,
            occupied - readable
        );
    }
}

impl<B, K, V> HashBucketPage<B, K, V>
where
    B: AsRef<[u8]> + AsMut<[u8]>,
    K: Storable,
    V: Storable + PartialEq,
{
    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    #[inline]
    fn set_bit(&mut self, bitmap_offset: usize, bucket_idx: usize, on: bool) {
        let byte = &mut self.bytes_mut()[bitmap_offset + bucket_idx / 8];
        let mask = 1u8 << (bucket_idx % 8);
        if on {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    /// Format the page as an empty bucket.
    pub fn init(&mut self) {
        PageHeader::new(PageType::HashBucket).write_to(self.bytes_mut());
        self.clear();
    }

    /// Drop every entry and tombstone.
    pub fn clear(&mut self) {
        self.bytes_mut()[OFFSET_BITMAPS..Self::OFFSET_ARRAY].fill(0);
    }

    pub fn set_occupied(&mut self, bucket_idx: usize) {
        self.set_bit(OFFSET_BITMAPS, bucket_idx, true);
    }

    pub fn set_readable(&mut self, bucket_idx: usize) {
        self.set_bit(Self::OFFSET_READABLE, bucket_idx, true);
    }

    fn write_entry(&mut self, bucket_idx: usize, key: &K, value: &V) {
        let offset = Self::slot_offset(bucket_idx);
        let slot = &mut self.bytes_mut()[offset..offset + Self::ENTRY_SIZE];
        key.write_to(&mut slot[..K::SIZE]);
        value.write_to(&mut slot[K::SIZE..]);
    }

    /// Insert `(key, value)` into the first non-readable slot.
    ///
    /// Returns false if the exact pair is already present or the bucket is
    /// full.
    pub fn insert<C: KeyComparator<K>>(&mut self, key: &K, value: &V, cmp: &C) -> bool {
        let mut free_slot = None;
        for idx in 0..Self::CAPACITY {
            if !self.is_occupied(idx) {
                free_slot.get_or_insert(idx);
                break;
            }
            if self.is_readable(idx) {
                if cmp.compare(&self.key_at(idx), key) == Ordering::Equal
                    && self.value_at(idx) == *value
                {
                    return false;
                }
            } else if free_slot.is_none() {
                free_slot = Some(idx);
            }
        }

        match free_slot {
            Some(idx) => {
                self.write_entry(idx, key, value);
                self.set_occupied(idx);
                self.set_readable(idx);
                true
            }
            None => false,
        }
    }

    /// Remove exactly `(key, value)`, leaving a tombstone.
    pub fn remove<C: KeyComparator<K>>(&mut self, key: &K, value: &V, cmp: &C) -> bool {
        match self.find_pair(key, value, cmp) {
            Some(idx) => {
                self.remove_at(idx);
                true
            }
            None => false,
        }
    }

    /// Clear the readable bit of one slot.
    pub fn remove_at(&mut self, bucket_idx: usize) {
        self.set_bit(Self::OFFSET_READABLE, bucket_idx, false);
    }

    /// Replace the contents with `entries`, packed from slot 0 with no
    /// tombstones.
    pub fn rewrite(&mut self, entries: &[(K, V)]) {
        debug_assert!(entries.len() <= Self::CAPACITY);
        self.clear();
        for (idx, (key, value)) in entries.iter().enumerate() {
            self.write_entry(idx, key, value);
            self.set_occupied(idx);
            self.set_readable(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::hash::key::{GenericKey, OrdComparator};
    use crate::common::{PageId, Rid};

    type IntBucket<'a> = HashBucketPage<&'a mut [u8], i32, i32>;

    fn empty_bucket(buf: &mut [u8]) -> IntBucket<'_> {
        let mut bucket = HashBucketPage::new(buf);
        bucket.init();
        bucket
    }

    #[test]
    fn test_capacity() {
        assert_eq!(HashBucketPage::<&[u8], i32, i32>::CAPACITY, 494);
        assert_eq!(HashBucketPage::<&[u8], i64, Rid>::CAPACITY, 251);

        for entry_size in [8usize, 16, 24, 72, 136] {
            let cap = bucket_capacity(entry_size);
            assert!(cap * entry_size + 2 * cap.div_ceil(8) <= PAGE_SIZE - PageHeader::RESERVED);
        }
    }

    #[test]
    fn test_insert_and_get_value() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut bucket = empty_bucket(&mut buf);

        assert!(bucket.is_bucket());
        assert!(bucket.is_empty());
        assert!(bucket.insert(&1, &10, &OrdComparator));
        assert!(bucket.insert(&1, &11, &OrdComparator));
        assert!(bucket.insert(&2, &20, &OrdComparator));

        assert_eq!(bucket.get_value(&1, &OrdComparator), vec![10, 11]);
        assert_eq!(bucket.get_value(&2, &OrdComparator), vec![20]);
        assert!(bucket.get_value(&3, &OrdComparator).is_empty());
        assert_eq!(bucket.num_readable(), 3);
        assert!(bucket.contains(&1, &11, &OrdComparator));
    }

    #[test]
    fn test_duplicate_pair_rejected() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut bucket = empty_bucket(&mut buf);

        assert!(bucket.insert(&5, &50, &OrdComparator));
        assert!(!bucket.insert(&5, &50, &OrdComparator));
        assert_eq!(bucket.num_readable(), 1);
    }

    #[test]
    fn test_remove_leaves_tombstone_and_reuses_slot() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut bucket = empty_bucket(&mut buf);

        for i in 0..3 {
            assert!(bucket.insert(&i, &i, &OrdComparator));
        }
        assert!(bucket.remove(&1, &1, &OrdComparator));
        assert!(!bucket.remove(&1, &1, &OrdComparator));

        assert!(bucket.is_occupied(1));
        assert!(!bucket.is_readable(1));
        // Entries after the tombstone are still visible.
        assert_eq!(bucket.get_value(&2, &OrdComparator), vec![2]);

        assert!(bucket.insert(&7, &70, &OrdComparator));
        assert!(bucket.is_readable(1));
        assert_eq!(bucket.key_at(1), 7);
        assert_eq!(bucket.value_at(1), 70);
    }

    #[test]
    fn test_full_bucket() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut bucket = empty_bucket(&mut buf);
        let capacity = bucket.capacity() as i32;

        for i in 0..capacity {
            assert!(bucket.insert(&i, &i, &OrdComparator));
        }
        assert!(bucket.is_full());
        assert!(!bucket.insert(&capacity, &capacity, &OrdComparator));

        bucket.remove_at(0);
        assert!(!bucket.is_full());
        assert!(bucket.insert(&capacity, &capacity, &OrdComparator));
        assert_eq!(bucket.key_at(0), capacity);
    }

    #[test]
    fn test_rewrite_compacts() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut bucket = empty_bucket(&mut buf);

        for i in 0..10 {
            bucket.insert(&i, &i, &OrdComparator);
        }
        for i in (0..10).step_by(2) {
            bucket.remove(&i, &i, &OrdComparator);
        }

        let live = bucket.entries();
        assert_eq!(live.len(), 5);
        bucket.rewrite(&live);

        assert_eq!(bucket.num_readable(), 5);
        assert!(bucket.is_occupied(4));
        assert!(!bucket.is_occupied(5));
        assert_eq!(bucket.entries(), vec![(1, 1), (3, 3), (5, 5), (7, 7), (9, 9)]);
    }

    #[test]
    fn test_generic_key_bucket() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut bucket: HashBucketPage<&mut [u8], GenericKey<16>, Rid> =
            HashBucketPage::new(&mut buf[..]);
        bucket.init();

        let key = GenericKey::<16>::from_integer(42);
        let rid = Rid::new(PageId::new(3), 4);
        assert!(bucket.insert(&key, &rid, &OrdComparator));
        assert_eq!(bucket.get_value(&key, &OrdComparator), vec![rid]);
    }
}
