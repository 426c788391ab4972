//! Dict: chained hash table over two bucket arrays with incremental rehashing.
//!
//! Every lookup and mutation first migrates at most one bucket of an in-progress rehash,
//! then works against the main table and, while rehashing, the target table. New entries
//! always land in the target table during a rehash so the main table only drains.

use crate::config::{DictConfig, ResizePolicy};
use crate::dict_type::{DefaultType, DictType, Value};
use crate::entry::{Entry, EntryId, UnlinkedEntry};
use crate::error::DictError;
use crate::pause::RehashPause;
use crate::table::{Arena, Table};
use core::fmt;
use core::hash::Hash;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use slotmap::{DefaultKey, SlotMap};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DICT_ID: AtomicU64 = AtomicU64::new(1);

/// Entry type stored by a `Dict<T>`.
pub type DictEntry<T> = Entry<<T as DictType>::Key, <T as DictType>::Val>;

/// Outcome of [`Dict::replace`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Replace {
    Inserted,
    Updated,
}

pub struct Dict<T: DictType> {
    pub(crate) ty: T,
    pub(crate) config: DictConfig,
    pub(crate) arena: Arena<T::Key, T::Val>,
    /// `tables[0]` is the main table; `tables[1]` is allocated only while rehashing.
    pub(crate) tables: [Table; 2],
    /// Next main-table bucket to migrate; `None` when no rehash is in progress.
    pub(crate) rehash_idx: Option<usize>,
    pub(crate) pause: RehashPause,
    pub(crate) rng: SmallRng,
    /// Identity checked when detached iterators come back.
    pub(crate) id: u64,
}

impl<K, V> Dict<DefaultType<K, V>>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_type(DefaultType::new())
    }
}

impl<T> Default for Dict<T>
where
    T: DictType + Default,
{
    fn default() -> Self {
        Self::with_type(T::default())
    }
}

impl<T: DictType> Dict<T> {
    pub fn with_type(ty: T) -> Self {
        Self::with_config(ty, DictConfig::default())
    }

    pub fn with_config(ty: T, config: DictConfig) -> Self {
        Self {
            ty,
            config,
            arena: SlotMap::new(),
            tables: [Table::empty(), Table::empty()],
            rehash_idx: None,
            pause: RehashPause::new(),
            rng: SmallRng::from_entropy(),
            id: NEXT_DICT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Reseed the sampling RNG, for reproducible random-key selection.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// Number of live entries across both tables.
    pub fn len(&self) -> usize {
        self.tables[0].used + self.tables[1].used
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bucket count across both tables.
    pub fn slots(&self) -> usize {
        self.tables[0].size() + self.tables[1].size()
    }

    /// Bucket counts of the main and the rehash target table.
    pub fn table_sizes(&self) -> (usize, usize) {
        (self.tables[0].size(), self.tables[1].size())
    }

    /// Occupancy of the main and the rehash target table.
    pub fn table_used(&self) -> (usize, usize) {
        (self.tables[0].used, self.tables[1].used)
    }

    pub fn config(&self) -> &DictConfig {
        &self.config
    }

    pub fn dict_type(&self) -> &T {
        &self.ty
    }

    pub fn resize_policy(&self) -> ResizePolicy {
        self.config.resize_policy
    }

    pub fn set_resize_policy(&mut self, policy: ResizePolicy) {
        self.config.resize_policy = policy;
    }

    /// The configured hash of `key`.
    pub fn hash_of(&self, key: &T::Key) -> u64 {
        self.ty.hash(key)
    }

    pub fn get(&self, id: EntryId) -> Option<&DictEntry<T>> {
        self.arena.get(id.raw())
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut DictEntry<T>> {
        self.arena.get_mut(id.raw())
    }

    /// Find `key`, advancing an in-progress rehash by one step first.
    pub fn find(&mut self, key: &T::Key) -> Option<EntryId> {
        if self.is_empty() {
            return None;
        }
        if self.is_rehashing() {
            self.rehash_step();
        }
        let hash = self.ty.hash(key);
        self.lookup(key, hash).map(EntryId::new)
    }

    /// Find `key` without touching rehash progress.
    pub fn peek(&self, key: &T::Key) -> Option<EntryId> {
        if self.is_empty() {
            return None;
        }
        self.lookup(key, self.ty.hash(key)).map(EntryId::new)
    }

    pub fn contains_key(&mut self, key: &T::Key) -> bool {
        self.find(key).is_some()
    }

    pub fn fetch_value(&mut self, key: &T::Key) -> Option<&Value<T::Val>> {
        let id = self.find(key)?;
        self.arena.get(id.raw()).map(|e| &e.value)
    }

    /// Insert `key -> val`. Fails with `DuplicateKey` if the key exists, leaving the dict
    /// unchanged.
    pub fn add(&mut self, key: T::Key, val: T::Val) -> Result<EntryId, DictError> {
        self.add_value(key, Value::Val(val))
    }

    /// Like [`add`](Self::add) for any value representation.
    pub fn add_value(&mut self, key: T::Key, value: Value<T::Val>) -> Result<EntryId, DictError> {
        let hash = self
            .prepare_insert(&key)
            .map_err(|_| DictError::DuplicateKey)?;
        let value = self.dup_value(value);
        Ok(self.link_new(key, value, hash))
    }

    /// Insert `key` with a zeroed value for the caller to fill in.
    pub fn add_raw(&mut self, key: T::Key) -> Result<EntryId, DictError> {
        let hash = self
            .prepare_insert(&key)
            .map_err(|_| DictError::DuplicateKey)?;
        Ok(self.link_new(key, Value::default(), hash))
    }

    /// The entry for `key`, inserting one with a zeroed value if absent.
    pub fn add_or_find(&mut self, key: T::Key) -> EntryId {
        match self.prepare_insert(&key) {
            Ok(hash) => self.link_new(key, Value::default(), hash),
            Err(existing) => EntryId::new(existing),
        }
    }

    /// Insert `key -> val`, or overwrite the value of an existing key, destroying the old one.
    pub fn replace(&mut self, key: T::Key, val: T::Val) -> Replace {
        self.replace_value(key, Value::Val(val))
    }

    pub fn replace_value(&mut self, key: T::Key, value: Value<T::Val>) -> Replace {
        match self.prepare_insert(&key) {
            Ok(hash) => {
                let value = self.dup_value(value);
                self.link_new(key, value, hash);
                Replace::Inserted
            }
            Err(existing) => {
                // Install the new value before destroying the old; both may share state.
                let value = self.dup_value(value);
                let old = core::mem::replace(&mut self.arena[existing].value, value);
                self.ty.destroy_val(old);
                Replace::Updated
            }
        }
    }

    /// Overwrite the value behind a handle, destroying the previous one.
    pub fn set_val(&mut self, id: EntryId, val: T::Val) -> Result<(), DictError> {
        if !self.arena.contains_key(id.raw()) {
            return Err(DictError::KeyNotFound);
        }
        let value = Value::Val(self.ty.dup_val(val));
        let old = core::mem::replace(&mut self.arena[id.raw()].value, value);
        self.ty.destroy_val(old);
        Ok(())
    }

    /// Remove `key` and destroy its key and value.
    pub fn delete(&mut self, key: &T::Key) -> Result<(), DictError> {
        let entry = self.unlink_inner(key).ok_or(DictError::KeyNotFound)?;
        self.destroy_entry(entry);
        Ok(())
    }

    /// Remove `key` without destroying it.
    /// Pair with [`free_unlinked_entry`](Self::free_unlinked_entry).
    pub fn unlink(&mut self, key: &T::Key) -> Option<UnlinkedEntry<T::Key, T::Val>> {
        self.unlink_inner(key).map(Entry::into_unlinked)
    }

    /// Remove the entry behind a handle without destroying it.
    pub fn remove_entry(&mut self, id: EntryId) -> Option<UnlinkedEntry<T::Key, T::Val>> {
        self.detach(id.raw()).map(Entry::into_unlinked)
    }

    /// Run the configured destructors on an entry returned by `unlink`.
    pub fn free_unlinked_entry(&self, entry: UnlinkedEntry<T::Key, T::Val>) {
        let (key, value) = entry.into_parts();
        self.ty.destroy_key(key);
        self.ty.destroy_val(value);
    }

    /// Destroy every entry and return to the freshly created state.
    pub fn clear(&mut self) {
        self.clear_with(|| {});
    }

    /// Like [`clear`](Self::clear), calling `callback` every 65536 buckets released.
    pub fn clear_with(&mut self, mut callback: impl FnMut()) {
        let ty = &self.ty;
        for table in self.tables.iter_mut() {
            table.release(
                &mut self.arena,
                |e| {
                    ty.destroy_key(e.key);
                    ty.destroy_val(e.value);
                },
                &mut callback,
            );
        }
        debug_assert!(self.arena.is_empty());
        self.rehash_idx = None;
    }

    // [private]

    /// Search both tables (the second only while rehashing) for `key`.
    pub(crate) fn lookup(&self, key: &T::Key, hash: u64) -> Option<DefaultKey> {
        for table in &self.tables {
            if table.size() > 0 {
                let idx = table.bucket_of(hash);
                let hit = table
                    .chain(&self.arena, idx)
                    .find(|(_, e)| e.hash == hash && self.ty.key_eq(&e.key, key));
                if let Some((k, _)) = hit {
                    return Some(k);
                }
            }
            if !self.is_rehashing() {
                break;
            }
        }
        None
    }

    /// Step the rehash, check for an existing key and grow if needed. Returns the key's hash,
    /// or the existing entry.
    fn prepare_insert(&mut self, key: &T::Key) -> Result<u64, DefaultKey> {
        if self.is_rehashing() {
            self.rehash_step();
        }
        let hash = self.ty.hash(key);
        if let Some(existing) = self.lookup(key, hash) {
            return Err(existing);
        }
        self.expand_if_needed();
        Ok(hash)
    }

    fn link_new(&mut self, key: T::Key, value: Value<T::Val>, hash: u64) -> EntryId {
        let key = self.ty.dup_key(key);
        let entry = Entry::new(key, value, hash, self.ty.metadata_bytes());
        let k = self.arena.insert(entry);
        let t = usize::from(self.is_rehashing());
        self.tables[t].push_front(&mut self.arena, k);
        EntryId::new(k)
    }

    fn dup_value(&self, value: Value<T::Val>) -> Value<T::Val> {
        match value {
            Value::Val(v) => Value::Val(self.ty.dup_val(v)),
            other => other,
        }
    }

    fn unlink_inner(&mut self, key: &T::Key) -> Option<DictEntry<T>> {
        if self.is_empty() {
            return None;
        }
        if self.is_rehashing() {
            self.rehash_step();
        }
        let hash = self.ty.hash(key);
        let k = self.lookup(key, hash)?;
        self.detach(k)
    }

    /// Unlink `k` from whichever table holds it and take it out of the arena.
    fn detach(&mut self, k: DefaultKey) -> Option<DictEntry<T>> {
        let hash = self.arena.get(k)?.hash;
        for table in self.tables.iter_mut() {
            if table.size() == 0 {
                continue;
            }
            let idx = table.bucket_of(hash);
            if table.unlink(&mut self.arena, idx, k) {
                return self.arena.remove(k);
            }
        }
        None
    }

    fn destroy_entry(&self, entry: DictEntry<T>) {
        self.ty.destroy_key(entry.key);
        self.ty.destroy_val(entry.value);
    }
}

impl<T: DictType> Drop for Dict<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: DictType> fmt::Debug for Dict<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dict")
            .field("len", &self.len())
            .field("table_sizes", &self.table_sizes())
            .field("table_used", &self.table_used())
            .field("rehash_idx", &self.rehash_idx)
            .field("pause", &self.pause.depth())
            .finish()
    }
}
