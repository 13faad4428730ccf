//! Configuration constants and buffer pool settings.

use super::{Error, Result};

/// Size of a page in bytes (4KB).
///
/// Every frame, every disk transfer, and every hash directory/bucket page
/// is exactly this size.
pub const PAGE_SIZE: usize = 4096;

/// Frames per buffer pool instance when the caller does not choose.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Largest global depth a hash directory can reach.
pub const DIRECTORY_MAX_DEPTH: u32 = 9;

/// Number of slots statically reserved in a hash directory page.
pub const DIRECTORY_ARRAY_SIZE: usize = 1 << DIRECTORY_MAX_DEPTH;

/// Settings for one buffer pool instance.
///
/// `num_instances` and `instance_index` form the page-id allocation stride:
/// instance `i` of `n` hands out ids `i, i + n, i + 2n, ...`, so sharded
/// instances sharing one file never collide.
///
/// # Example
/// ```
/// use extendibledb::common::config::BufferPoolConfig;
///
/// let config = BufferPoolConfig::new(16).with_sharding(4, 2);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.first_page_id(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of frames in this instance.
    pub pool_size: usize,
    /// Total number of instances sharing the page-id space.
    pub num_instances: u32,
    /// Position of this instance among its siblings.
    pub instance_index: u32,
}

impl BufferPoolConfig {
    /// A standalone (non-sharded) pool with `pool_size` frames.
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            num_instances: 1,
            instance_index: 0,
        }
    }

    /// Place this instance at `instance_index` of `num_instances` shards.
    pub fn with_sharding(mut self, num_instances: u32, instance_index: u32) -> Self {
        self.num_instances = num_instances;
        self.instance_index = instance_index;
        self
    }

    /// Check that the settings describe a usable pool.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::InvalidConfig("pool_size must be > 0".into()));
        }
        if self.num_instances == 0 {
            return Err(Error::InvalidConfig("num_instances must be > 0".into()));
        }
        if self.instance_index >= self.num_instances {
            return Err(Error::InvalidConfig(format!(
                "instance_index {} out of range for {} instances",
                self.instance_index, self.num_instances
            )));
        }
        Ok(())
    }

    /// First page id this instance allocates.
    #[inline]
    pub fn first_page_id(&self) -> u32 {
        self.instance_index
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_directory_array_matches_depth() {
        assert_eq!(DIRECTORY_ARRAY_SIZE, 512);
    }

    #[test]
    fn test_config_validate() {
        assert!(BufferPoolConfig::new(10).validate().is_ok());
        assert!(BufferPoolConfig::new(0).validate().is_err());
        assert!(BufferPoolConfig::new(10).with_sharding(0, 0).validate().is_err());
        assert!(BufferPoolConfig::new(10).with_sharding(3, 3).validate().is_err());
        assert!(BufferPoolConfig::new(10).with_sharding(3, 2).validate().is_ok());
    }

    #[test]
    fn test_config_default() {
        let config = BufferPoolConfig::default();
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.num_instances, 1);
        assert_eq!(config.first_page_id(), 0);
    }
}
