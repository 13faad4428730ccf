//! Record identifier type.

use std::fmt;

use super::PageId;

/// Physical location of a tuple: the heap page holding it plus the slot
/// inside that page. This is what a hash index usually maps keys to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub page_id: PageId,
    pub slot: u32,
}

impl Rid {
    pub fn new(page_id: PageId, slot: u32) -> Self {
        Self { page_id, slot }
    }
}

impl Default for Rid {
    fn default() -> Self {
        Self {
            page_id: PageId::INVALID,
            slot: 0,
        }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({}, {})", self.page_id.0, self.slot)
    }
}
