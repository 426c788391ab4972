//! Iteration over both tables: a borrowing [`Iter`] and detached [`DictIterator`]s.
//!
//! All iterators visit the main table's buckets in order, each chain head to tail, then the
//! target table the same way if a rehash is in progress.
//!
//! A detached iterator holds no borrow, so the dict stays usable between calls to
//! [`Dict::next_entry`]:
//! - safe: pauses rehashing from creation until [`Dict::release_iterator`]. Adds, finds and
//!   deletes are allowed meanwhile. Deleting the entry just returned does not lose the
//!   iterator's place; deleting the prefetched successor makes the iterator re-walk the
//!   current bucket, skipping the entries it already returned from it.
//! - unsafe: pauses nothing and records a fingerprint of the table layout. Only reads are
//!   allowed until release; release panics if the layout changed.

use crate::dict::{Dict, DictEntry};
use crate::dict_type::DictType;
use crate::entry::{Entry, EntryId};
use crate::table::{Arena, Table};
use slotmap::DefaultKey;

/// Borrowing iterator over every entry.
pub struct Iter<'a, K, V> {
    arena: &'a Arena<K, V>,
    tables: &'a [Table; 2],
    rehashing: bool,
    table: usize,
    bucket: usize,
    cur: Option<DefaultKey>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (EntryId, &'a Entry<K, V>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(k) = self.cur {
                let e = &self.arena[k];
                self.cur = e.next;
                return Some((EntryId::new(k), e));
            }
            let table = &self.tables[self.table];
            if self.bucket < table.size() {
                self.cur = table.head(self.bucket);
                self.bucket += 1;
                continue;
            }
            if self.table == 0 && self.rehashing {
                self.table = 1;
                self.bucket = 0;
                continue;
            }
            return None;
        }
    }
}

/// Detached iterator; see the module docs for the safe/unsafe contract.
///
/// Must be returned through [`Dict::release_iterator`]. Dropping a safe iterator without
/// releasing it leaves rehashing paused and panics.
#[must_use = "detached iterators must be released with Dict::release_iterator"]
#[derive(Debug)]
pub struct DictIterator {
    owner: u64,
    table: usize,
    /// Current bucket; `None` before the first advance.
    index: Option<usize>,
    entry: Option<DefaultKey>,
    next_entry: Option<DefaultKey>,
    /// Entries returned from the current bucket; safe iterators only.
    bucket_seen: Vec<DefaultKey>,
    safe: bool,
    fingerprint: u64,
    released: bool,
}

impl DictIterator {
    pub fn is_safe(&self) -> bool {
        self.safe
    }
}

impl Drop for DictIterator {
    fn drop(&mut self) {
        if self.safe && !self.released && !std::thread::panicking() {
            panic!("safe DictIterator dropped without Dict::release_iterator");
        }
    }
}

/// Thomas Wang's 64 bit integer mix, folded over the inputs.
fn mix_fingerprint(integers: [u64; 6]) -> u64 {
    let mut hash: u64 = 0;
    for i in integers {
        hash = hash.wrapping_add(i);
        hash = (!hash).wrapping_add(hash << 21);
        hash ^= hash >> 24;
        hash = hash.wrapping_add(hash << 3).wrapping_add(hash << 8);
        hash ^= hash >> 14;
        hash = hash.wrapping_add(hash << 2).wrapping_add(hash << 4);
        hash ^= hash >> 28;
        hash = hash.wrapping_add(hash << 31);
    }
    hash
}

impl<T: DictType> Dict<T> {
    pub fn iter(&self) -> Iter<'_, T::Key, T::Val> {
        Iter {
            arena: &self.arena,
            tables: &self.tables,
            rehashing: self.is_rehashing(),
            table: 0,
            bucket: 0,
            cur: None,
        }
    }

    /// Summary of the structural state: both bucket arrays' addresses, sizes and occupancy.
    /// Any insert, delete, rehash step or resize changes it.
    pub fn fingerprint(&self) -> u64 {
        let [t0, t1] = &self.tables;
        mix_fingerprint([
            t0.addr() as u64,
            t0.size() as u64,
            t0.used as u64,
            t1.addr() as u64,
            t1.size() as u64,
            t1.used as u64,
        ])
    }

    /// Unsafe iterator: no pausing, layout checked at release.
    pub fn iterator(&self) -> DictIterator {
        DictIterator {
            owner: self.id,
            table: 0,
            index: None,
            entry: None,
            next_entry: None,
            bucket_seen: Vec::new(),
            safe: false,
            fingerprint: self.fingerprint(),
            released: false,
        }
    }

    /// Safe iterator: rehashing stays paused until release.
    pub fn safe_iterator(&self) -> DictIterator {
        self.pause.pause();
        DictIterator {
            owner: self.id,
            table: 0,
            index: None,
            entry: None,
            next_entry: None,
            bucket_seen: Vec::new(),
            safe: true,
            fingerprint: 0,
            released: false,
        }
    }

    /// Advance `it`, returning `None` once both tables are exhausted.
    pub fn next_entry(&self, it: &mut DictIterator) -> Option<EntryId> {
        assert_eq!(it.owner, self.id, "DictIterator used with a different dict");
        loop {
            if it.entry.is_none() {
                let mut idx = it.index.map_or(0, |i| i + 1);
                if idx >= self.tables[it.table].size() {
                    if it.table == 0 && self.is_rehashing() {
                        it.table = 1;
                        idx = 0;
                    } else {
                        it.index = Some(idx.saturating_sub(1));
                        return None;
                    }
                }
                it.index = Some(idx);
                it.bucket_seen.clear();
                it.entry = self.tables[it.table].head(idx);
            } else {
                it.entry = match it.next_entry {
                    Some(k) if !self.arena.contains_key(k) => self.first_unseen(it),
                    next => next,
                };
                if it.entry.is_none() {
                    continue;
                }
            }
            match it.entry.and_then(|k| self.arena.get(k).map(|e| (k, e))) {
                Some((k, e)) => {
                    it.next_entry = e.next;
                    if it.safe {
                        it.bucket_seen.push(k);
                    }
                    return Some(EntryId::new(k));
                }
                None => it.entry = None,
            }
        }
    }

    /// The successor was deleted: restart the current bucket and resume at the first entry
    /// not yet returned. Rehashing is paused, so the bucket still holds the rest of the chain.
    fn first_unseen(&self, it: &DictIterator) -> Option<DefaultKey> {
        if !it.safe {
            return None;
        }
        let idx = it.index?;
        self.tables[it.table]
            .chain(&self.arena, idx)
            .map(|(k, _)| k)
            .find(|k| !it.bucket_seen.contains(k))
    }

    /// Advance `it` and borrow the entry.
    pub fn next_entry_ref(&self, it: &mut DictIterator) -> Option<(EntryId, &DictEntry<T>)> {
        let id = self.next_entry(it)?;
        self.arena.get(id.raw()).map(|e| (id, e))
    }

    /// Return an iterator. Resumes rehashing for a safe iterator; for an unsafe one, panics
    /// if the dict was structurally modified since the iterator was created.
    pub fn release_iterator(&self, mut it: DictIterator) {
        it.released = true;
        assert_eq!(it.owner, self.id, "DictIterator released to a different dict");
        if it.safe {
            self.pause.resume();
        } else {
            assert_eq!(
                it.fingerprint,
                self.fingerprint(),
                "dict modified during unsafe iteration"
            );
        }
    }
}
