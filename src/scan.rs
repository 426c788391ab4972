//! Stateless cursor traversal.
//!
//! The cursor is a bucket index advanced by incrementing its bit-reversed form, so the high
//! bits of the index change fastest. When the table grows, each already-visited bucket `b`
//! of the small table maps to buckets of the large table whose low bits equal `b`; those have
//! cursor values below the current one, so they are not revisited. When the table shrinks,
//! buckets of the large table fold onto small-table buckets that were not yet visited or are
//! visited again. Net effect: every entry present for the whole traversal is returned at
//! least once, and some may be returned more than once.
//!
//! While rehashing, a call visits the bucket `v & m0` of the smaller table, then every
//! bucket of the larger table that expands it, before advancing the cursor.

use crate::dict::{Dict, DictEntry};
use crate::dict_type::DictType;
use crate::entry::EntryId;

/// Bucket visited by [`Dict::scan_buckets`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Bucket {
    /// 0 for the main table, 1 for the rehash target.
    pub table: usize,
    pub index: usize,
}

#[inline]
fn next_cursor(v: usize, mask: usize) -> usize {
    let v = (v | !mask).reverse_bits().wrapping_add(1);
    v.reverse_bits()
}

impl<T: DictType> Dict<T> {
    /// Visit the entries of the bucket(s) at `cursor` and return the next cursor. Start at 0;
    /// the traversal is complete when 0 comes back. Returns 0 at once on an empty dict.
    pub fn scan(&self, cursor: usize, mut f: impl FnMut(EntryId, &DictEntry<T>)) -> usize {
        self.scan_buckets(cursor, &mut f, |_| {})
    }

    /// Like [`scan`](Self::scan), also reporting each bucket before its entries.
    pub fn scan_buckets(
        &self,
        cursor: usize,
        mut f: impl FnMut(EntryId, &DictEntry<T>),
        mut bucket_fn: impl FnMut(Bucket),
    ) -> usize {
        if self.is_empty() {
            return 0;
        }
        let _paused = self.pause.hold();
        let mut v = cursor;

        let mut visit = |table: usize, index: usize| {
            bucket_fn(Bucket { table, index });
            for (k, e) in self.tables[table].chain(&self.arena, index) {
                f(EntryId::new(k), e);
            }
        };

        if !self.is_rehashing() {
            let m0 = self.tables[0].mask();
            visit(0, v & m0);
            return next_cursor(v, m0);
        }

        let (small, large) = if self.tables[0].size() > self.tables[1].size() {
            (1, 0)
        } else {
            (0, 1)
        };
        let m0 = self.tables[small].mask();
        let m1 = self.tables[large].mask();

        visit(small, v & m0);
        loop {
            visit(large, v & m1);
            v = next_cursor(v, m1);
            if v & (m0 ^ m1) == 0 {
                break;
            }
        }
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict_type::DefaultType;
    use std::collections::HashMap;

    /// Invariant: cursors over a table of 8 follow reverse-binary order and wrap to 0.
    #[test]
    fn cursor_order_is_reverse_binary() {
        let mut v = 0;
        let mut seen = Vec::new();
        loop {
            seen.push(v);
            v = next_cursor(v, 7);
            if v == 0 {
                break;
            }
        }
        assert_eq!(seen, vec![0, 4, 2, 6, 1, 5, 3, 7]);
    }

    /// Invariant: an empty dict finishes immediately without calling back.
    #[test]
    fn empty_scan_returns_zero() {
        let d: Dict<DefaultType<u64, u64>> = Dict::new();
        let mut calls = 0;
        assert_eq!(d.scan(0, |_, _| calls += 1), 0);
        assert_eq!(d.scan(12345, |_, _| calls += 1), 0);
        assert_eq!(calls, 0);
    }

    /// Invariant: without resizes between calls, a full cycle returns every entry exactly once.
    #[test]
    fn stable_cycle_visits_each_once() {
        let mut d = Dict::new();
        for k in 0..300u64 {
            d.add(k, k * 2).unwrap();
        }
        let mut counts: HashMap<u64, usize> = HashMap::new();
        let mut cursor = 0;
        loop {
            cursor = d.scan(cursor, |_, e| *counts.entry(*e.key()).or_default() += 1);
            if cursor == 0 {
                break;
            }
        }
        assert_eq!(counts.len(), 300);
        assert!(counts.values().all(|&c| c == 1));
    }

    /// Invariant: mid-rehash calls report the small-table bucket and then its expansions.
    #[test]
    fn rehashing_visits_small_then_large() {
        let mut d = Dict::new();
        for k in 0..5u64 {
            d.add(k, k).unwrap();
        }
        assert_eq!(d.table_sizes(), (4, 8));
        let mut buckets = Vec::new();
        let next = d.scan_buckets(0, |_, _| {}, |b| buckets.push(b));
        assert_eq!(
            buckets,
            vec![
                Bucket { table: 0, index: 0 },
                Bucket { table: 1, index: 0 },
                Bucket { table: 1, index: 4 },
            ]
        );
        assert_eq!(next, 2);
        assert!(!d.is_rehash_paused());
    }
}
