//! Page types and layout.
//!
//! This module contains:
//! - [`Page`] - The raw 4KB data container
//! - [`PageHeader`] - Metadata at the start of every typed page
//! - [`PageType`] - Discriminator for different page formats
//! - [`hash`] - Directory and bucket layouts of the hash index

pub mod hash;
#[allow(clippy::module_inception)]
mod page;
mod page_header;

pub use page::Page;
pub use page_header::{PageHeader, PageType};
