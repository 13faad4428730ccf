//! Page identifier type.

use std::fmt;

/// Identifies a page in the backing file.
///
/// Page `N` lives at byte offset `N * PAGE_SIZE`. Hash directory and bucket
/// pages store page ids as 4-byte little-endian integers, with
/// [`PageId::INVALID`] encoded as `u32::MAX`.
///
/// # Example
/// ```
/// use extendibledb::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert_eq!(PageId::from_le_bytes(page_id.to_le_bytes()), page_id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Sentinel for "no page".
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Encoded width inside a page.
    pub const SIZE: usize = 4;

    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Buffer pool shard responsible for this page.
    #[inline]
    pub fn shard(&self, num_instances: u32) -> usize {
        (self.0 % num_instances) as usize
    }

    /// Byte offset of this page in the backing file.
    #[inline]
    pub fn file_offset(&self, page_size: usize) -> u64 {
        self.0 as u64 * page_size as u64
    }

    #[inline]
    pub fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        PageId(u32::from_le_bytes(bytes))
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_invalid() {
        assert!(!PageId::INVALID.is_valid());
        assert_eq!(PageId::INVALID.to_le_bytes(), [0xFF; 4]);
    }

    #[test]
    fn test_page_id_shard() {
        assert_eq!(PageId::new(7).shard(4), 3);
        assert_eq!(PageId::new(8).shard(4), 0);
        assert_eq!(PageId::new(8).shard(1), 0);
    }

    #[test]
    fn test_page_id_file_offset() {
        assert_eq!(PageId::new(3).file_offset(4096), 12288);
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(format!("{}", PageId::new(42)), "Page(42)");
        assert_eq!(format!("{}", PageId::INVALID), "Page(INVALID)");
    }
}
