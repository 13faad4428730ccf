//! Hash functions for index keys.

use std::hash::Hasher;

use twox_hash::XxHash64;

use crate::storage::page::hash::Storable;

/// Maps a key to a 64-bit hash. The index keeps the low 32 bits.
///
/// Closures `Fn(&K) -> u64` implement this directly, which is how tests
/// pin keys to specific buckets.
pub trait KeyHasher<K>: Send + Sync {
    fn hash(&self, key: &K) -> u64;
}

impl<K, F> KeyHasher<K> for F
where
    F: Fn(&K) -> u64 + Send + Sync,
{
    #[inline]
    fn hash(&self, key: &K) -> u64 {
        self(key)
    }
}

/// Seed for [`DefaultKeyHasher`]. Changing it moves every stored key.
const DEFAULT_HASH_SEED: u64 = 0;

/// XXH64 over the key's [`Storable`] encoding.
///
/// Bucket placement is part of the on-disk format, so the hash must not
/// depend on the toolchain or the process. The little-endian key encoding
/// and a fixed seed keep it stable across both.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultKeyHasher;

impl<K: Storable> KeyHasher<K> for DefaultKeyHasher {
    fn hash(&self, key: &K) -> u64 {
        let mut buf = vec![0u8; K::SIZE];
        key.write_to(&mut buf);

        let mut hasher = XxHash64::with_seed(DEFAULT_HASH_SEED);
        hasher.write(&buf);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hasher_is_deterministic() {
        let hasher = DefaultKeyHasher;
        assert_eq!(hasher.hash(&42i32), hasher.hash(&42i32));
        assert_ne!(hasher.hash(&1i32), hasher.hash(&2i32));
    }

    #[test]
    fn test_default_hasher_is_xxh64_of_encoding() {
        let hasher = DefaultKeyHasher;
        assert_eq!(KeyHasher::<i32>::hash(&hasher, &0), 0x3aef_a6fd_5cf2_deb4);
        assert_eq!(KeyHasher::<i32>::hash(&hasher, &42), 0xd756_d7b6_2fc5_0bf1);
    }

    #[test]
    fn test_closure_hasher() {
        let identity = |key: &i32| *key as u64;
        assert_eq!(identity.hash(&7), 7);
    }
}
