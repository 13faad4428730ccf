//! Error types for the storage core.

use thiserror::Error;

use super::PageId;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the buffer pool, disk manager, and index can report.
///
/// Outcomes that are part of a normal contract (duplicate insert, unpin of an
/// untracked page, full bucket) are NOT errors; they come back as `bool`s.
/// This enum covers I/O, capacity exhaustion, and on-disk corruption.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page was never written to the backing file.
    #[error("{0} not found on disk")]
    PageNotFound(PageId),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// A hash index page does not match the CRC32 stamped in its header.
    #[error("Checksum mismatch on {0}")]
    ChecksumMismatch(PageId),

    /// A page does not carry the layout the caller expected.
    #[error("{page_id} has page type {found}, expected {expected}")]
    InvalidPageType {
        page_id: PageId,
        expected: u8,
        found: u8,
    },

    /// Rejected buffer pool configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(PageId::new(42));
        assert_eq!(format!("{}", err), "Page(42) not found on disk");

        let err = Error::NoFreeFrames;
        assert_eq!(format!("{}", err), "No free frames available in buffer pool");

        let err = Error::InvalidPageType {
            page_id: PageId::new(3),
            expected: 1,
            found: 2,
        };
        assert_eq!(format!("{}", err), "Page(3) has page type 2, expected 1");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
    }
}
