//! Extendible hash directory page.

use std::collections::HashMap;

use log::{debug, warn};

use crate::common::config::{DIRECTORY_ARRAY_SIZE, DIRECTORY_MAX_DEPTH};
use crate::common::PageId;
use crate::storage::page::{PageHeader, PageType};

const OFFSET_PAGE_ID: usize = PageHeader::RESERVED;
const OFFSET_GLOBAL_DEPTH: usize = OFFSET_PAGE_ID + 4;
const OFFSET_LOCAL_DEPTHS: usize = OFFSET_GLOBAL_DEPTH + 4;
const OFFSET_BUCKET_IDS: usize = OFFSET_LOCAL_DEPTHS + DIRECTORY_ARRAY_SIZE;

/// Bytes of a page occupied by the directory layout.
pub const DIRECTORY_PAGE_BYTES: usize = OFFSET_BUCKET_IDS + DIRECTORY_ARRAY_SIZE * PageId::SIZE;

/// Typed view of a hash directory stored in a page.
///
/// # Layout
/// ```text
/// Offset  Size        Field
/// ------  ----------  -----
/// 0       16          PageHeader (PageType::HashDirectory)
/// 16      4           page_id
/// 20      4           global_depth
/// 24      512         local_depths[DIRECTORY_ARRAY_SIZE]  (u8 each)
/// 536     2048        bucket_page_ids[DIRECTORY_ARRAY_SIZE]  (u32 each)
/// ```
///
/// The slot arrays are sized for [`DIRECTORY_MAX_DEPTH`]; only the first
/// `2^global_depth` slots are meaningful. Slot `i` serves every hash whose
/// low `global_depth` bits equal `i`.
///
/// `B` is the borrowed page buffer: `&[u8]` for read-only access under a
/// shared latch, `&mut [u8]` for mutation under an exclusive latch.
pub struct HashDirectoryPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> HashDirectoryPage<B> {
    pub fn new(data: B) -> Self {
        debug_assert!(data.as_ref().len() >= DIRECTORY_PAGE_BYTES);
        Self { data }
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    #[inline]
    fn read_u32(&self, offset: usize) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.bytes()[offset..offset + 4]);
        u32::from_le_bytes(raw)
    }

    /// Whether the underlying page was initialized as a directory.
    pub fn is_directory(&self) -> bool {
        PageHeader::page_type_of(self.bytes()) == PageType::HashDirectory
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(self.read_u32(OFFSET_PAGE_ID))
    }

    pub fn global_depth(&self) -> u32 {
        self.read_u32(OFFSET_GLOBAL_DEPTH)
    }

    /// Mask selecting the low `global_depth` bits of a hash.
    pub fn global_depth_mask(&self) -> u32 {
        (1u32 << self.global_depth()) - 1
    }

    /// Number of live directory slots, `2^global_depth`.
    pub fn size(&self) -> usize {
        1usize << self.global_depth()
    }

    /// Directory slot serving `hash`.
    #[inline]
    pub fn hash_to_index(&self, hash: u32) -> usize {
        (hash & self.global_depth_mask()) as usize
    }

    pub fn local_depth(&self, bucket_idx: usize) -> u32 {
        self.bytes()[OFFSET_LOCAL_DEPTHS + bucket_idx] as u32
    }

    /// Mask selecting the low `local_depth` bits of a hash.
    pub fn local_depth_mask(&self, bucket_idx: usize) -> u32 {
        (1u32 << self.local_depth(bucket_idx)) - 1
    }

    /// The hash bit that the next split of this slot's bucket will use.
    pub fn local_high_bit(&self, bucket_idx: usize) -> u32 {
        1u32 << self.local_depth(bucket_idx)
    }

    pub fn bucket_page_id(&self, bucket_idx: usize) -> PageId {
        PageId::new(self.read_u32(OFFSET_BUCKET_IDS + bucket_idx * PageId::SIZE))
    }

    /// True iff no slot's local depth equals the global depth, i.e. halving
    /// the directory would not orphan any bucket's address range.
    pub fn can_shrink(&self) -> bool {
        let global_depth = self.global_depth();
        (0..self.size()).all(|idx| self.local_depth(idx) != global_depth)
    }

    /// The slot that shared a bucket with `bucket_idx` before that bucket's
    /// last split: `bucket_idx` with bit `local_depth - 1` flipped.
    ///
    /// # Panics
    /// Panics if the slot has local depth 0 (it has no split image).
    pub fn split_image_index(&self, bucket_idx: usize) -> usize {
        let local_depth = self.local_depth(bucket_idx);
        assert!(local_depth > 0, "slot {} has no split image", bucket_idx);
        bucket_idx ^ (1usize << (local_depth - 1))
    }

    /// Returns a description of the first violated directory invariant:
    /// 1. every local depth is at most the global depth
    /// 2. slots sharing a bucket agree on its local depth
    /// 3. a bucket of local depth `ld` is referenced by `2^(gd - ld)` slots
    pub fn find_violation(&self) -> Option<String> {
        let global_depth = self.global_depth();
        let mut counts: HashMap<PageId, u32> = HashMap::new();
        let mut depths: HashMap<PageId, u32> = HashMap::new();

        for idx in 0..self.size() {
            let page_id = self.bucket_page_id(idx);
            let local_depth = self.local_depth(idx);

            if local_depth > global_depth {
                return Some(format!(
                    "slot {} has local depth {} > global depth {}",
                    idx, local_depth, global_depth
                ));
            }

            *counts.entry(page_id).or_insert(0) += 1;
            let expected = *depths.entry(page_id).or_insert(local_depth);
            if expected != local_depth {
                return Some(format!(
                    "{} seen with local depths {} and {}",
                    page_id, expected, local_depth
                ));
            }
        }

        for (page_id, count) in counts {
            let required = 1u32 << (global_depth - depths[&page_id]);
            if count != required {
                return Some(format!(
                    "{} referenced by {} slots, expected {}",
                    page_id, count, required
                ));
            }
        }
        None
    }

    /// Assert every directory invariant, dumping the directory on failure.
    ///
    /// # Panics
    /// Panics on any violation; a corrupted directory is not recoverable.
    pub fn verify_integrity(&self) {
        if let Some(violation) = self.find_violation() {
            warn!("directory integrity violation: {}", violation);
            self.log_directory();
            panic!("directory integrity violation: {}", violation);
        }
    }

    /// Dump every live slot at debug level.
    pub fn log_directory(&self) {
        debug!(
            "==== directory {} (global_depth {}) ====",
            self.page_id(),
            self.global_depth()
        );
        for idx in 0..self.size() {
            debug!(
                "| slot {:>3} | {} | local_depth {} |",
                idx,
                self.bucket_page_id(idx),
                self.local_depth(idx)
            );
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> HashDirectoryPage<B> {
    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    #[inline]
    fn write_u32(&mut self, offset: usize, value: u32) {
        self.bytes_mut()[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Format the page as an empty directory of global depth 0.
    pub fn init(&mut self, page_id: PageId) {
        PageHeader::new(PageType::HashDirectory).write_to(self.bytes_mut());
        self.set_page_id(page_id);
        self.write_u32(OFFSET_GLOBAL_DEPTH, 0);
        self.bytes_mut()[OFFSET_LOCAL_DEPTHS..OFFSET_BUCKET_IDS].fill(0);
        for idx in 0..DIRECTORY_ARRAY_SIZE {
            self.set_bucket_page_id(idx, PageId::INVALID);
        }
    }

    pub fn set_page_id(&mut self, page_id: PageId) {
        self.write_u32(OFFSET_PAGE_ID, page_id.0);
    }

    pub fn set_bucket_page_id(&mut self, bucket_idx: usize, bucket_page_id: PageId) {
        self.write_u32(OFFSET_BUCKET_IDS + bucket_idx * PageId::SIZE, bucket_page_id.0);
    }

    pub fn set_local_depth(&mut self, bucket_idx: usize, local_depth: u32) {
        debug_assert!(local_depth <= DIRECTORY_MAX_DEPTH);
        self.bytes_mut()[OFFSET_LOCAL_DEPTHS + bucket_idx] = local_depth as u8;
    }

    pub fn incr_local_depth(&mut self, bucket_idx: usize) {
        let local_depth = self.local_depth(bucket_idx);
        self.set_local_depth(bucket_idx, local_depth + 1);
    }

    pub fn decr_local_depth(&mut self, bucket_idx: usize) {
        let local_depth = self.local_depth(bucket_idx);
        self.set_local_depth(bucket_idx, local_depth - 1);
    }

    /// Double the logical directory. Only the exponent changes; the caller
    /// fills the new upper half.
    ///
    /// # Panics
    /// Panics if the directory is already at [`DIRECTORY_MAX_DEPTH`].
    pub fn incr_global_depth(&mut self) {
        let global_depth = self.global_depth();
        assert!(
            global_depth < DIRECTORY_MAX_DEPTH,
            "global depth cannot exceed {}",
            DIRECTORY_MAX_DEPTH
        );
        self.write_u32(OFFSET_GLOBAL_DEPTH, global_depth + 1);
    }

    /// Halve the logical directory.
    pub fn decr_global_depth(&mut self) {
        let global_depth = self.global_depth();
        assert!(global_depth > 0, "global depth underflow");
        self.write_u32(OFFSET_GLOBAL_DEPTH, global_depth - 1);
    }
}
