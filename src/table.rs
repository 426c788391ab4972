//! One bucket array of chain heads, sized as a power of two.
//!
//! Entries live in the dict's arena; a table only holds chain heads and its occupancy.
//! Chain links are arena keys stored in each entry.

use crate::entry::Entry;
use slotmap::{DefaultKey, SlotMap};
use std::collections::TryReserveError;

pub(crate) type Arena<K, V> = SlotMap<DefaultKey, Entry<K, V>>;

/// Bucket array. A table of size 0 holds no allocation.
#[derive(Debug, Default)]
pub(crate) struct Table {
    buckets: Vec<Option<DefaultKey>>,
    pub(crate) used: usize,
}

impl Table {
    pub(crate) const fn empty() -> Self {
        Self {
            buckets: Vec::new(),
            used: 0,
        }
    }

    /// Allocate `1 << exp` empty buckets; aborts on OOM like `Vec`.
    pub(crate) fn with_exp(exp: u32) -> Self {
        Self {
            buckets: vec![None; 1usize << exp],
            used: 0,
        }
    }

    /// Allocate `1 << exp` empty buckets, reporting allocation failure.
    pub(crate) fn try_with_exp(exp: u32) -> Result<Self, TryReserveError> {
        let size = 1usize << exp;
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(size)?;
        buckets.resize(size, None);
        Ok(Self { buckets, used: 0 })
    }

    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.buckets.len()
    }

    /// `log2(size)`, or `None` for an unallocated table.
    pub(crate) fn exp(&self) -> Option<u32> {
        (!self.buckets.is_empty()).then(|| self.buckets.len().trailing_zeros())
    }

    #[inline]
    pub(crate) fn mask(&self) -> usize {
        self.buckets.len().saturating_sub(1)
    }

    #[inline]
    pub(crate) fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & self.mask()
    }

    /// Address of the bucket array; part of the dict fingerprint.
    pub(crate) fn addr(&self) -> usize {
        self.buckets.as_ptr() as usize
    }

    #[inline]
    pub(crate) fn head(&self, idx: usize) -> Option<DefaultKey> {
        self.buckets[idx]
    }

    /// Detach a whole chain, leaving the bucket empty. Occupancy is the caller's business.
    pub(crate) fn take_chain(&mut self, idx: usize) -> Option<DefaultKey> {
        self.buckets[idx].take()
    }

    /// Link `key` at the head of its bucket and count it.
    pub(crate) fn push_front<K, V>(&mut self, arena: &mut Arena<K, V>, key: DefaultKey) {
        let idx = self.bucket_of(arena[key].hash);
        arena[key].next = self.buckets[idx];
        self.buckets[idx] = Some(key);
        self.used += 1;
    }

    /// Unlink `key` from the chain at `idx`. Returns false if it is not in that chain.
    pub(crate) fn unlink<K, V>(
        &mut self,
        arena: &mut Arena<K, V>,
        idx: usize,
        key: DefaultKey,
    ) -> bool {
        let mut prev: Option<DefaultKey> = None;
        let mut cur = self.buckets[idx];
        while let Some(k) = cur {
            let next = arena[k].next;
            if k == key {
                match prev {
                    Some(p) => arena[p].next = next,
                    None => self.buckets[idx] = next,
                }
                arena[k].next = None;
                self.used -= 1;
                return true;
            }
            prev = cur;
            cur = next;
        }
        false
    }

    /// Walk the chain at `idx`.
    pub(crate) fn chain<'a, K, V>(&self, arena: &'a Arena<K, V>, idx: usize) -> Chain<'a, K, V> {
        Chain {
            arena,
            cur: self.buckets[idx],
        }
    }

    pub(crate) fn chain_len<K, V>(&self, arena: &Arena<K, V>, idx: usize) -> usize {
        self.chain(arena, idx).count()
    }

    /// Remove every entry from the arena, handing each to `on_entry`. `on_progress` runs
    /// every 65536 buckets so long releases can yield to other work.
    pub(crate) fn release<K, V>(
        &mut self,
        arena: &mut Arena<K, V>,
        mut on_entry: impl FnMut(Entry<K, V>),
        mut on_progress: impl FnMut(),
    ) {
        for i in 0..self.buckets.len() {
            if self.used == 0 {
                break;
            }
            if i & 0xffff == 0 {
                on_progress();
            }
            let mut cur = self.buckets[i].take();
            while let Some(k) = cur {
                let Some(e) = arena.remove(k) else { break };
                cur = e.next;
                self.used -= 1;
                on_entry(e);
            }
        }
        *self = Table::empty();
    }
}

/// Iterator over one bucket chain.
pub(crate) struct Chain<'a, K, V> {
    arena: &'a Arena<K, V>,
    cur: Option<DefaultKey>,
}

impl<'a, K, V> Iterator for Chain<'a, K, V> {
    type Item = (DefaultKey, &'a Entry<K, V>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let k = self.cur?;
        let e = self.arena.get(k)?;
        self.cur = e.next;
        Some((k, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict_type::Value;

    fn entry(hash: u64) -> Entry<u64, ()> {
        Entry::new(hash, Value::default(), hash, 0)
    }

    /// Invariant: a new table has all buckets empty and a mask of size-1.
    #[test]
    fn sizes_and_masks() {
        let t = Table::with_exp(3);
        assert_eq!(t.size(), 8);
        assert_eq!(t.mask(), 7);
        assert_eq!(t.exp(), Some(3));
        assert!((0..8).all(|i| t.head(i).is_none()));
        assert_eq!(t.bucket_of(13), 5);

        let e = Table::empty();
        assert_eq!(e.size(), 0);
        assert_eq!(e.exp(), None);
        assert_eq!(e.mask(), 0);

        let f = Table::try_with_exp(2).expect("small allocation");
        assert_eq!(f.size(), 4);
    }

    /// Invariant: push_front links at the head; unlink repairs the chain around any position.
    #[test]
    fn push_and_unlink_mid_chain() {
        let mut arena: Arena<u64, ()> = SlotMap::new();
        let mut t = Table::with_exp(2);
        let a = arena.insert(entry(1));
        let b = arena.insert(entry(5));
        let c = arena.insert(entry(9));
        for k in [a, b, c] {
            t.push_front(&mut arena, k);
        }
        assert_eq!(t.used, 3);
        let order: Vec<_> = t.chain(&arena, 1).map(|(k, _)| k).collect();
        assert_eq!(order, vec![c, b, a]);

        assert!(t.unlink(&mut arena, 1, b));
        let order: Vec<_> = t.chain(&arena, 1).map(|(k, _)| k).collect();
        assert_eq!(order, vec![c, a]);
        assert_eq!(t.used, 2);

        assert!(!t.unlink(&mut arena, 1, b), "already unlinked");
        assert!(t.unlink(&mut arena, 1, c));
        assert_eq!(t.head(1), Some(a));
        assert_eq!(t.chain_len(&arena, 1), 1);
    }

    /// Invariant: release drains every entry out of the arena and leaves the table unallocated.
    #[test]
    fn release_drains_arena() {
        let mut arena: Arena<u64, ()> = SlotMap::new();
        let mut t = Table::with_exp(2);
        for h in 0..10 {
            let k = arena.insert(entry(h));
            t.push_front(&mut arena, k);
        }
        let mut seen = Vec::new();
        let mut progress = 0;
        t.release(&mut arena, |e| seen.push(e.key), || progress += 1);
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert!(arena.is_empty());
        assert_eq!(t.size(), 0);
        assert_eq!(progress, 1);
    }
}
