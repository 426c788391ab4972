//! Capability trait supplied at dict creation, and the tagged value stored in entries.

use crate::hash::SeedState;
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;

/// An entry's value. The dict never interprets it; the caller picks the representation.
///
/// A freshly created entry (see `Dict::add_raw`) holds `Unsigned(0)`, the all-zero payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Value<V> {
    Val(V),
    Unsigned(u64),
    Signed(i64),
    Double(f64),
}

impl<V> Default for Value<V> {
    fn default() -> Self {
        Value::Unsigned(0)
    }
}

impl<V> Value<V> {
    pub fn as_val(&self) -> Option<&V> {
        match self {
            Value::Val(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_val_mut(&mut self) -> Option<&mut V> {
        match self {
            Value::Val(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_val(self) -> Option<V> {
        match self {
            Value::Val(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_unsigned(&self) -> Option<u64> {
        match *self {
            Value::Unsigned(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_signed(&self) -> Option<i64> {
        match *self {
            Value::Signed(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match *self {
            Value::Double(d) => Some(d),
            _ => None,
        }
    }
}

/// Per-dict behavior: hashing, key comparison, duplication and destruction hooks, the
/// expansion veto and the size of each entry's metadata block.
///
/// Duplication runs when a key or pointer-like value enters the dict; destruction runs when
/// it leaves through `delete`, `replace`, `clear`, `free_unlinked_entry` or dict drop. The
/// defaults keep the value as given and simply drop it.
pub trait DictType {
    type Key;
    type Val;

    fn hash(&self, key: &Self::Key) -> u64;

    fn key_eq(&self, a: &Self::Key, b: &Self::Key) -> bool;

    fn dup_key(&self, key: Self::Key) -> Self::Key {
        key
    }

    fn dup_val(&self, val: Self::Val) -> Self::Val {
        val
    }

    fn destroy_key(&self, key: Self::Key) {
        drop(key);
    }

    fn destroy_val(&self, val: Value<Self::Val>) {
        drop(val);
    }

    /// Whether growing is acceptable right now. `more_mem` is the size in bytes of the bucket
    /// array that would be allocated, `used_ratio` the current load of the main table.
    fn expand_allowed(&self, more_mem: usize, used_ratio: f64) -> bool {
        let _ = (more_mem, used_ratio);
        true
    }

    /// Bytes of zero-initialized metadata carried by every entry.
    fn metadata_bytes(&self) -> usize {
        0
    }
}

/// `DictType` for any `Hash + Eq` key, hashed with a `BuildHasher` (the process-seeded
/// [`SeedState`] by default).
pub struct DefaultType<K, V, S = SeedState> {
    hasher: S,
    _pd: PhantomData<fn(K, V)>,
}

impl<K, V> DefaultType<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(SeedState::new())
    }
}

impl<K, V, S> DefaultType<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            _pd: PhantomData,
        }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }
}

impl<K, V, S: Default> Default for DefaultType<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S: Clone> Clone for DefaultType<K, V, S> {
    fn clone(&self) -> Self {
        Self::with_hasher(self.hasher.clone())
    }
}

impl<K, V, S> core::fmt::Debug for DefaultType<K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("DefaultType")
    }
}

impl<K, V, S> DictType for DefaultType<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Key = K;
    type Val = V;

    #[inline]
    fn hash(&self, key: &K) -> u64 {
        self.hasher.hash_one(key)
    }

    #[inline]
    fn key_eq(&self, a: &K, b: &K) -> bool {
        a == b
    }
}
