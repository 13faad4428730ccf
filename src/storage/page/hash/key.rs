//! Fixed-width key/value encoding and key comparison for hash pages.

use std::cmp::Ordering;
use std::fmt;

use crate::common::{PageId, Rid};

/// A type with a fixed-width little-endian encoding inside a page.
pub trait Storable: Sized + Clone {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Encode into `buf[..Self::SIZE]`.
    fn write_to(&self, buf: &mut [u8]);

    /// Decode from `buf[..Self::SIZE]`.
    fn read_from(buf: &[u8]) -> Self;
}

macro_rules! impl_storable_int {
    ($($ty:ty),*) => {
        $(
            impl Storable for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn write_to(&self, buf: &mut [u8]) {
                    buf[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn read_from(buf: &[u8]) -> Self {
                    let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                    bytes.copy_from_slice(&buf[..Self::SIZE]);
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_storable_int!(i32, u32, i64, u64);

impl Storable for Rid {
    const SIZE: usize = 8;

    fn write_to(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.page_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.slot.to_le_bytes());
    }

    fn read_from(buf: &[u8]) -> Self {
        let mut page_id = [0u8; 4];
        page_id.copy_from_slice(&buf[..4]);
        let mut slot = [0u8; 4];
        slot.copy_from_slice(&buf[4..8]);
        Rid::new(PageId::from_le_bytes(page_id), u32::from_le_bytes(slot))
    }
}

/// An opaque N-byte key, compared bytewise.
///
/// Index keys built from tuple columns are serialized into one of these.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenericKey<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> GenericKey<N> {
    /// Build a key from `bytes`, truncating or zero-padding to `N`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut data = [0u8; N];
        let len = bytes.len().min(N);
        data[..len].copy_from_slice(&bytes[..len]);
        Self { data }
    }

    /// Build a key holding an integer in its leading bytes.
    pub fn from_integer(value: i64) -> Self {
        Self::from_bytes(&value.to_le_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl<const N: usize> Default for GenericKey<N> {
    fn default() -> Self {
        Self { data: [0u8; N] }
    }
}

impl<const N: usize> fmt::Debug for GenericKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GenericKey<{}>(", N)?;
        for byte in &self.data {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

impl<const N: usize> Storable for GenericKey<N> {
    const SIZE: usize = N;

    fn write_to(&self, buf: &mut [u8]) {
        buf[..N].copy_from_slice(&self.data);
    }

    fn read_from(buf: &[u8]) -> Self {
        Self::from_bytes(&buf[..N])
    }
}

/// Three-way key comparison used by bucket scans.
///
/// Closures `Fn(&K, &K) -> Ordering` implement this directly.
pub trait KeyComparator<K>: Send + Sync {
    fn compare(&self, lhs: &K, rhs: &K) -> Ordering;
}

impl<K, F> KeyComparator<K> for F
where
    F: Fn(&K, &K) -> Ordering + Send + Sync,
{
    #[inline]
    fn compare(&self, lhs: &K, rhs: &K) -> Ordering {
        self(lhs, rhs)
    }
}

/// Compares keys by their `Ord` implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrdComparator;

impl<K: Ord> KeyComparator<K> for OrdComparator {
    #[inline]
    fn compare(&self, lhs: &K, rhs: &K) -> Ordering {
        lhs.cmp(rhs)
    }
}
