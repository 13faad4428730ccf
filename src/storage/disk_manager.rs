//! Disk Manager - fixed-size page transfer to and from one backing file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// Persists pages by page id.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// ```
///
/// Writing page `N` extends the file when needed, so sharded buffer pools
/// with strided page ids can write in any order. Holes read back as zeros.
///
/// Pages are transferred byte for byte. Whatever integrity checking a page
/// format wants (the hash index stamps a CRC32 into its page header) is the
/// format's business, not the disk manager's.
///
/// # Thread Safety
/// `DiskManager` is single-threaded. Buffer pools wrap it in a mutex.
pub struct DiskManager {
    file: File,
    /// Number of page slots the file currently spans.
    page_count: u32,
    /// Number of page writes issued since open.
    num_writes: u64,
}

impl DiskManager {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self::from_file(file, 0))
    }

    /// Open an existing database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let page_count = (file.metadata()?.len() / PAGE_SIZE as u64) as u32;

        Ok(Self::from_file(file, page_count))
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    fn from_file(file: File, page_count: u32) -> Self {
        Self {
            file,
            page_count,
            num_writes: 0,
        }
    }

    /// Read a page into `page`.
    ///
    /// # Errors
    /// `Error::PageNotFound` if the page lies beyond the end of the file.
    pub fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        if !page_id.is_valid() || page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id));
        }

        self.file
            .seek(SeekFrom::Start(page_id.file_offset(PAGE_SIZE)))?;
        self.file.read_exact(page.as_mut_slice())?;
        Ok(())
    }

    /// Write a page, extending the file if `page_id` lies past its end.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        if !page_id.is_valid() {
            return Err(Error::PageNotFound(page_id));
        }

        self.file
            .seek(SeekFrom::Start(page_id.file_offset(PAGE_SIZE)))?;
        self.file.write_all(page.as_slice())?;

        if page_id.0 >= self.page_count {
            debug!("disk file extended to {} pages", page_id.0 + 1);
            self.page_count = page_id.0 + 1;
        }
        self.num_writes += 1;
        Ok(())
    }

    /// Force written pages to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    #[inline]
    pub fn num_writes(&self) -> u64 {
        self.num_writes
    }

    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }
}
