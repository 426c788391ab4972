//! Random entry selection.
//!
//! [`Dict::random_key`] picks a random non-empty bucket, then a random position in its
//! chain, so entries in long chains are individually less likely. [`Dict::fair_random_key`]
//! reduces that bias by sampling a batch of entries first and choosing uniformly among them.
//! [`Dict::sample_entries`] is the bulk sampler both build on.

use crate::dict::Dict;
use crate::dict_type::DictType;
use crate::entry::EntryId;
use rand::Rng;
use slotmap::DefaultKey;

/// Random bucket probes before `random_key` falls back to a forward walk.
const RANDOM_PROBES: usize = 1024;

/// Consecutive empty buckets after which `sample_entries` jumps to a new random position.
const SAMPLE_EMPTY_RUN: usize = 5;

impl<T: DictType> Dict<T> {
    /// A random entry, or `None` when empty. Performs one rehash step.
    pub fn random_key(&mut self) -> Option<EntryId> {
        if self.is_empty() {
            return None;
        }
        if self.is_rehashing() {
            self.rehash_step();
        }
        // Main-table buckets below the rehash index are empty; skip them.
        let start = self.rehash_idx.unwrap_or(0);
        let span = self.slots() - start;
        let mut head = None;
        for _ in 0..RANDOM_PROBES {
            let h = start + self.rng.gen_range(0..span);
            head = self.combined_head(h);
            if head.is_some() {
                break;
            }
        }
        if head.is_none() {
            // Very sparse table: walk forward from a random bucket.
            let from = self.rng.gen_range(0..span);
            head = (0..span).find_map(|off| self.combined_head(start + (from + off) % span));
        }
        let head = head?;

        let mut len = 0;
        let mut cur = Some(head);
        while let Some(k) = cur {
            len += 1;
            cur = self.arena[k].next;
        }
        let mut pick = self.rng.gen_range(0..len);
        let mut cur = head;
        while pick > 0 {
            cur = self.arena[cur].next?;
            pick -= 1;
        }
        Some(EntryId::new(cur))
    }

    /// A random entry chosen uniformly from a sample of `fair_sample_size` entries.
    /// Falls back to [`random_key`](Self::random_key) if the sample comes back empty.
    pub fn fair_random_key(&mut self) -> Option<EntryId> {
        let sample = self.sample_entries(self.config.fair_sample_size);
        if sample.is_empty() {
            return self.random_key();
        }
        let idx = self.rng.gen_range(0..sample.len());
        Some(sample[idx])
    }

    /// Up to `count` entries taken from consecutive buckets starting at a random position.
    ///
    /// Fast but not uniformly distributed: entries come in runs of neighboring buckets, and a
    /// long run of empty buckets triggers a jump, so the same entry may appear more than once.
    /// Returns fewer than `count` when the dict is smaller or the step budget of `10 * count`
    /// bucket visits runs out. Performs up to `count` rehash steps first.
    pub fn sample_entries(&mut self, count: usize) -> Vec<EntryId> {
        let count = count.min(self.len());
        let mut out = Vec::with_capacity(count);
        if count == 0 {
            return out;
        }
        for _ in 0..count {
            if !self.is_rehashing() {
                break;
            }
            self.rehash_step();
        }

        let tables = if self.is_rehashing() { 2 } else { 1 };
        let mut max_mask = self.tables[0].mask();
        if tables > 1 {
            max_mask = max_mask.max(self.tables[1].mask());
        }
        let mut i = self.rng.gen::<usize>() & max_mask;
        let mut empty_len = 0;
        let mut steps = count.saturating_mul(10);

        while out.len() < count && steps > 0 {
            steps -= 1;
            for j in 0..tables {
                if tables == 2 && j == 0 {
                    if let Some(ridx) = self.rehash_idx {
                        if i < ridx {
                            // Already migrated. When the target table is smaller it has no
                            // bucket `i` either, so resume from the rehash index.
                            if i >= self.tables[1].size() {
                                i = ridx;
                            } else {
                                continue;
                            }
                        }
                    }
                }
                if i >= self.tables[j].size() {
                    continue;
                }
                match self.tables[j].head(i) {
                    None => {
                        empty_len += 1;
                        if empty_len >= SAMPLE_EMPTY_RUN && empty_len > count {
                            i = self.rng.gen::<usize>() & max_mask;
                            empty_len = 0;
                        }
                    }
                    Some(head) => {
                        empty_len = 0;
                        let mut cur = Some(head);
                        while let Some(k) = cur {
                            out.push(EntryId::new(k));
                            if out.len() == count {
                                return out;
                            }
                            cur = self.arena[k].next;
                        }
                    }
                }
            }
            i = (i + 1) & max_mask;
        }
        out
    }

    /// Chain head at position `h` of the concatenated main and target bucket arrays.
    fn combined_head(&self, h: usize) -> Option<DefaultKey> {
        let s0 = self.tables[0].size();
        if h < s0 {
            self.tables[0].head(h)
        } else {
            self.tables[1].head(h - s0)
        }
    }
}
