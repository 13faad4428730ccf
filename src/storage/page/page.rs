//! Page - the fixed-size byte arena held by every buffer frame.
//!
//! A [`Page`] carries no typed structure of its own. Hash directory and
//! bucket layouts are views constructed over its bytes on demand (see
//! [`crate::storage::page::hash`]).

use crate::common::config::PAGE_SIZE;

use super::page_header::{PageHeader, PageType};

/// A page of data (4KB, 4KB-aligned).
///
/// `Page` is not `Clone` outside tests: copying 4KB should always be an
/// explicit [`Page::copy_from`].
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Overwrite this page with the bytes of `other`.
    pub fn copy_from(&mut self, other: &Page) {
        self.data.copy_from_slice(&other.data);
    }

    #[inline]
    pub fn page_type(&self) -> PageType {
        PageHeader::page_type_of(&self.data)
    }

    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    pub fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data);
    }

    /// Stamp the CRC32 of the current contents into the header.
    ///
    /// Untyped pages are left alone so raw payloads are never clobbered.
    pub fn stamp_checksum(&mut self) {
        if !self.page_type().is_typed() {
            return;
        }
        let checksum = PageHeader::compute_checksum(&self.data);
        self.data[PageHeader::OFFSET_CHECKSUM..PageHeader::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&checksum.to_le_bytes());
    }

    /// Whether the page passes verification. Untyped pages always pass.
    pub fn verify_checksum(&self) -> bool {
        !self.page_type().is_typed() || self.header().verify_checksum(&self.data)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.copy_from(self);
        new_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_and_alignment() {
        assert_eq!(std::mem::size_of::<Page>(), PAGE_SIZE);
        assert_eq!(std::mem::align_of::<Page>(), 4096);
    }

    #[test]
    fn test_page_reset() {
        let mut page = Page::new();
        page.as_mut_slice()[0] = 0xFF;
        page.as_mut_slice()[4095] = 0xAB;

        page.reset();

        assert!(page.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_untyped_page_is_not_stamped() {
        let mut page = Page::new();
        page.as_mut_slice()[..5].copy_from_slice(b"Hello");

        page.stamp_checksum();

        assert_eq!(&page.as_slice()[..5], b"Hello");
        assert!(page.verify_checksum());
    }

    #[test]
    fn test_typed_page_checksum() {
        let mut page = Page::new();
        page.set_header(&PageHeader::new(PageType::HashBucket));
        page.as_mut_slice()[200] = 7;
        page.stamp_checksum();
        assert!(page.verify_checksum());

        let mut corrupted = page.clone();
        corrupted.as_mut_slice()[200] = 8;
        assert!(!corrupted.verify_checksum());
    }
}
