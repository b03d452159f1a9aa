//! Record digests
//!
//! Every record is identified by a 20-byte RIPEMD-160 digest of its set name
//! and user key. The digest also decides which partition owns the record.

use std::fmt;

use ripemd::{Digest as _, Ripemd160};

/// Width of a digest in bytes
pub const DIGEST_SIZE: usize = 20;

/// Number of partitions in the keyspace
pub const N_PARTITIONS: u16 = 4096;

const PARTITION_MASK: u16 = N_PARTITIONS - 1;

/// Content-derived record key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Digest(pub [u8; DIGEST_SIZE]);

impl Digest {
    /// Compute the digest of a (set, key) pair.
    ///
    /// The set is hashed first, then the key, as one stream. An absent set is
    /// hashed as the empty string.
    pub fn compute(set: &[u8], key: &[u8]) -> Self {
        let mut hasher = Ripemd160::new();
        hasher.update(set);
        hasher.update(key);
        let out = hasher.finalize();

        let mut bytes = [0u8; DIGEST_SIZE];
        bytes.copy_from_slice(&out);
        Self(bytes)
    }

    /// Copy a digest from a wire field; `None` unless exactly [`DIGEST_SIZE`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; DIGEST_SIZE] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// The partition that owns this digest
    pub fn partition_id(&self) -> PartitionId {
        PartitionId(u16::from_le_bytes([self.0[0], self.0[1]]) & PARTITION_MASK)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest(")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

/// Index of a partition, always below [`N_PARTITIONS`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId(pub u16);
