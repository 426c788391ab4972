//! Entries and the stable handles that name them.

use crate::dict_type::Value;
use slotmap::DefaultKey;

/// Stable handle to an entry. Survives rehashing; never resolves again once the entry is
/// removed, even if its slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct EntryId(DefaultKey);

impl EntryId {
    pub(crate) fn new(k: DefaultKey) -> Self {
        EntryId(k)
    }

    pub(crate) fn raw(&self) -> DefaultKey {
        self.0
    }
}

/// A key/value pair linked into a bucket chain.
#[derive(Debug)]
pub struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: Value<V>,
    /// Hash computed once at insertion; rehashing and scanning place the entry by it.
    pub(crate) hash: u64,
    pub(crate) next: Option<DefaultKey>,
    pub(crate) metadata: Box<[u8]>,
}

impl<K, V> Entry<K, V> {
    pub(crate) fn new(key: K, value: Value<V>, hash: u64, metadata_bytes: usize) -> Self {
        Self {
            key,
            value,
            hash,
            next: None,
            metadata: vec![0u8; metadata_bytes].into_boxed_slice(),
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &Value<V> {
        &self.value
    }

    /// In-place access to the value. Overwriting through this bypasses the value hooks.
    pub fn value_mut(&mut self) -> &mut Value<V> {
        &mut self.value
    }

    pub fn val(&self) -> Option<&V> {
        self.value.as_val()
    }

    pub fn set_unsigned(&mut self, u: u64) {
        self.value = Value::Unsigned(u);
    }

    pub fn set_signed(&mut self, s: i64) {
        self.value = Value::Signed(s);
    }

    pub fn set_double(&mut self, d: f64) {
        self.value = Value::Double(d);
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut [u8] {
        &mut self.metadata
    }

    pub(crate) fn into_unlinked(self) -> UnlinkedEntry<K, V> {
        UnlinkedEntry {
            key: self.key,
            value: self.value,
            hash: self.hash,
            metadata: self.metadata,
        }
    }
}

/// An entry removed from the dict by `unlink` but not yet destroyed.
///
/// Hand it back to `Dict::free_unlinked_entry` to run the configured destructors; dropping
/// it directly drops key and value without them.
#[derive(Debug)]
pub struct UnlinkedEntry<K, V> {
    key: K,
    value: Value<V>,
    hash: u64,
    metadata: Box<[u8]>,
}

impl<K, V> UnlinkedEntry<K, V> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &Value<V> {
        &self.value
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    pub fn into_parts(self) -> (K, Value<V>) {
        (self.key, self.value)
    }
}
