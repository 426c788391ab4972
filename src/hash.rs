//! Process-wide hash seed and the seeded hashers built from it.
//!
//! The seed is set at most once, before any table hashes a key. Reading it first fills it
//! with random bytes, after which [`set_hash_seed`] fails. Keeping the seed secret makes it
//! hard for a client to choose keys that collide into a single chain.

use crate::error::DictError;
use core::fmt;
use core::hash::{BuildHasher, Hasher};
use std::sync::OnceLock;

static HASH_SEED: OnceLock<[u8; 16]> = OnceLock::new();
static SEEDED: OnceLock<SeedState> = OnceLock::new();

/// Install the process hash seed. Fails once the seed has been read or set.
pub fn set_hash_seed(seed: [u8; 16]) -> Result<(), DictError> {
    HASH_SEED.set(seed).map_err(|_| DictError::SeedAlreadySet)
}

/// The process hash seed, initialized from entropy on first use if never set.
pub fn hash_seed() -> [u8; 16] {
    *HASH_SEED.get_or_init(rand::random)
}

/// Build-hasher keyed by a 16 byte seed (by default the process seed).
#[derive(Clone)]
pub struct SeedState {
    inner: ahash::RandomState,
}

impl SeedState {
    /// Keyed by the process seed.
    pub fn new() -> Self {
        Self::with_seed(hash_seed())
    }

    pub fn with_seed(seed: [u8; 16]) -> Self {
        let mut lo = [0u8; 8];
        let mut hi = [0u8; 8];
        lo.copy_from_slice(&seed[..8]);
        hi.copy_from_slice(&seed[8..]);
        let k0 = u64::from_le_bytes(lo);
        let k1 = u64::from_le_bytes(hi);
        // ahash takes four keys; derive the second pair from the first.
        let k2 = k0.rotate_left(32) ^ 0x243f_6a88_85a3_08d3;
        let k3 = k1.rotate_left(32) ^ 0x1319_8a2e_0370_7344;
        Self {
            inner: ahash::RandomState::with_seeds(k0, k1, k2, k3),
        }
    }
}

impl Default for SeedState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedState").finish_non_exhaustive()
    }
}

impl BuildHasher for SeedState {
    type Hasher = ahash::AHasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        self.inner.build_hasher()
    }
}

fn seeded() -> &'static SeedState {
    SEEDED.get_or_init(SeedState::new)
}

/// Seeded hash of a byte string.
pub fn gen_hash(bytes: &[u8]) -> u64 {
    let mut h = seeded().build_hasher();
    h.write(bytes);
    h.finish()
}

/// Seeded hash of a byte string, ignoring ASCII case.
pub fn gen_case_hash(bytes: &[u8]) -> u64 {
    let mut h = seeded().build_hasher();
    for chunk in bytes.chunks(64) {
        let mut buf = [0u8; 64];
        for (dst, src) in buf.iter_mut().zip(chunk) {
            *dst = src.to_ascii_lowercase();
        }
        h.write(&buf[..chunk.len()]);
    }
    h.finish()
}
