//! Rehash engine: sizing, expansion, and bucket-by-bucket migration between the two tables.
//!
//! Idle: `rehash_idx == None` and `tables[1]` is unallocated. Active: `rehash_idx` is in
//! `[0, tables[0].size())`, every main-table bucket below it is empty, and new entries go to
//! `tables[1]`. A step migrates whole buckets; once the main table is empty the target table
//! takes its place and the engine returns to idle.

use crate::config::ResizePolicy;
use crate::dict::Dict;
use crate::dict_type::DictType;
use crate::error::DictError;
use crate::table::Table;
use log::{debug, trace, warn};
use slotmap::DefaultKey;
use std::time::{Duration, Instant};

/// Buckets migrated per batch by [`Dict::rehash_for`].
const REHASH_BATCH: usize = 100;

impl<T: DictType> Dict<T> {
    pub fn is_rehashing(&self) -> bool {
        self.rehash_idx.is_some()
    }

    /// Next main-table bucket to migrate, if rehashing.
    pub fn rehash_index(&self) -> Option<usize> {
        self.rehash_idx
    }

    /// Suspend rehash steps until a matching [`resume_rehashing`](Self::resume_rehashing).
    pub fn pause_rehashing(&self) {
        self.pause.pause();
    }

    /// Panics if called more often than `pause_rehashing`.
    pub fn resume_rehashing(&self) {
        self.pause.resume();
    }

    pub fn is_rehash_paused(&self) -> bool {
        self.pause.is_paused()
    }

    /// Grow or shrink so that at least `size` buckets exist, aborting on allocation failure.
    ///
    /// Starts a rehash unless the dict has no table yet, in which case the new table is
    /// installed directly. Ignores the resize policy; see [`resize_to`](Self::resize_to).
    pub fn expand(&mut self, size: usize) -> Result<(), DictError> {
        self.expand_inner(size, false)
    }

    /// Like [`expand`](Self::expand), but reports allocation failure instead of aborting.
    /// On failure the dict is untouched.
    pub fn try_expand(&mut self, size: usize) -> Result<(), DictError> {
        self.expand_inner(size, true)
    }

    /// Administrative resize to `capacity`, honoring the resize policy and, when growing,
    /// the type's expansion veto.
    pub fn resize_to(&mut self, capacity: usize) -> Result<(), DictError> {
        if self.config.resize_policy != ResizePolicy::Enable {
            return Err(DictError::ResizeForbidden);
        }
        if self.is_rehashing() {
            return Err(DictError::Rehashing);
        }
        let capacity = capacity.max(self.config.initial_size());
        if capacity > self.tables[0].size() && self.tables[0].size() > 0 {
            let exp = self.next_exp(capacity)?;
            if !self.expand_allowed_for(1usize << exp) {
                return Err(DictError::ResizeForbidden);
            }
        }
        self.expand_inner(capacity, false)
    }

    /// Shrink (or grow) to the smallest table holding every entry at load factor <= 1.
    pub fn resize(&mut self) -> Result<(), DictError> {
        let minimal = self.tables[0].used;
        self.resize_to(minimal)
    }

    /// Whether occupancy has fallen below `min_fill_percent` of a table larger than the
    /// initial size.
    pub fn needs_shrink(&self) -> bool {
        let size = self.tables[0].size();
        let used = self.tables[0].used;
        size > self.config.initial_size()
            && used.saturating_mul(100) / size < self.config.min_fill_percent
    }

    /// Migrate up to `n` non-empty buckets. Returns true while work remains that a further
    /// call can perform.
    ///
    /// Visits at most `n * empty_visits_per_bucket` empty buckets so a sparse table cannot
    /// stall the caller. Returns false without doing anything while paused or when the resize
    /// policy holds rehashing back; [`is_rehashing`](Self::is_rehashing) still reports the
    /// unfinished rehash.
    pub fn rehash(&mut self, n: usize) -> bool {
        let Some(mut idx) = self.rehash_idx else {
            return false;
        };
        if self.pause.is_paused() || !self.rehash_allowed_by_policy() {
            return false;
        }
        let mut empty_visits = n.saturating_mul(self.config.empty_visits_per_bucket);
        let mut n = n;
        while n > 0 && self.tables[0].used != 0 {
            n -= 1;
            debug_assert!(idx < self.tables[0].size(), "rehash index past main table");
            while self.tables[0].head(idx).is_none() {
                idx += 1;
                empty_visits = empty_visits.saturating_sub(1);
                if empty_visits == 0 {
                    self.rehash_idx = Some(idx);
                    return true;
                }
            }
            self.migrate_bucket(idx);
            idx += 1;
        }
        self.rehash_idx = Some(idx);
        trace!(
            "rehash progress {}/{} (used {:?})",
            idx,
            self.tables[0].size(),
            self.table_used()
        );
        if self.tables[0].used == 0 {
            self.finish_rehash();
            return false;
        }
        true
    }

    /// Rehash in batches until done, blocked, or `budget` elapses. Returns the number of
    /// buckets requested by batches that left work behind, a multiple of the batch size; 0
    /// when paused or held back by the resize policy.
    pub fn rehash_for(&mut self, budget: Duration) -> usize {
        let start = Instant::now();
        let mut rehashes = 0;
        while self.rehash(REHASH_BATCH) {
            rehashes += REHASH_BATCH;
            if start.elapsed() >= budget {
                break;
            }
        }
        rehashes
    }

    // [private]

    /// One bounded step, issued by lookups and mutations.
    pub(crate) fn rehash_step(&mut self) {
        if !self.pause.is_paused() {
            self.rehash(1);
        }
    }

    /// Start growth when the load crosses `grow_ratio`, subject to policy and veto.
    pub(crate) fn expand_if_needed(&mut self) {
        if self.is_rehashing() {
            return;
        }
        let size = self.tables[0].size();
        if size == 0 {
            let initial = self.config.initial_size();
            if let Err(e) = self.expand_inner(initial, false) {
                warn!("initial table allocation failed: {e}");
            }
            return;
        }
        let used = self.tables[0].used;
        let ratio = used / size;
        if ratio < self.config.grow_ratio {
            return;
        }
        let forced = ratio > self.config.force_resize_ratio;
        let permitted = match self.config.resize_policy {
            ResizePolicy::Enable => true,
            ResizePolicy::Avoid => forced,
            ResizePolicy::Forbid => false,
        };
        if !permitted {
            trace!(
                "growth deferred by policy {:?} (used {used}, size {size})",
                self.config.resize_policy
            );
            return;
        }
        let target = used.saturating_add(1);
        let Ok(exp) = self.next_exp(target) else {
            return;
        };
        if !self.expand_allowed_for(1usize << exp) {
            trace!("growth vetoed by dict type (used {used}, size {size})");
            return;
        }
        if let Err(e) = self.expand_inner(target, false) {
            trace!("growth skipped: {e}");
        }
    }

    fn expand_allowed_for(&self, buckets: usize) -> bool {
        let size = self.tables[0].size();
        let used_ratio = if size == 0 {
            0.0
        } else {
            self.tables[0].used as f64 / size as f64
        };
        let more_mem = buckets.saturating_mul(core::mem::size_of::<Option<DefaultKey>>());
        self.ty.expand_allowed(more_mem, used_ratio)
    }

    /// Exponent of the smallest power of two >= `size`, never below `initial_exp`.
    pub(crate) fn next_exp(&self, size: usize) -> Result<u32, DictError> {
        let size = size.max(self.config.initial_size());
        let pow = size
            .checked_next_power_of_two()
            .ok_or(DictError::CapacityOverflow { requested: size })?;
        if core::alloc::Layout::array::<Option<DefaultKey>>(pow).is_err() {
            return Err(DictError::CapacityOverflow { requested: size });
        }
        Ok(pow.trailing_zeros())
    }

    fn expand_inner(&mut self, size: usize, fallible: bool) -> Result<(), DictError> {
        if self.is_rehashing() {
            return Err(DictError::Rehashing);
        }
        let used = self.tables[0].used;
        if used > size {
            return Err(DictError::ResizeRejected {
                requested: size,
                used,
            });
        }
        let exp = self.next_exp(size)?;
        if self.tables[0].exp() == Some(exp) {
            return Err(DictError::ResizeRejected {
                requested: size,
                used,
            });
        }
        let table = if fallible {
            Table::try_with_exp(exp).map_err(|e| {
                warn!("bucket array allocation of 2^{exp} failed: {e}");
                DictError::AllocationFailed { buckets: 1usize << exp }
            })?
        } else {
            Table::with_exp(exp)
        };

        if self.tables[0].size() == 0 {
            self.tables[0] = table;
            return Ok(());
        }
        debug!(
            "rehash started: {} -> {} buckets, {} entries",
            self.tables[0].size(),
            table.size(),
            used
        );
        self.tables[1] = table;
        self.rehash_idx = Some(0);
        Ok(())
    }

    /// Under `Avoid`, only advance when the tables differ in size by `force_resize_ratio`.
    fn rehash_allowed_by_policy(&self) -> bool {
        match self.config.resize_policy {
            ResizePolicy::Enable => true,
            ResizePolicy::Forbid => false,
            ResizePolicy::Avoid => {
                let s0 = self.tables[0].size();
                let s1 = self.tables[1].size();
                let force = self.config.force_resize_ratio;
                (s1 > s0 && s1 / s0 >= force) || (s1 < s0 && s0 / s1 >= force)
            }
        }
    }

    /// Move every entry of main-table bucket `idx` into the target table.
    fn migrate_bucket(&mut self, idx: usize) {
        let [main, target] = &mut self.tables;
        let mut cur = main.take_chain(idx);
        while let Some(k) = cur {
            cur = self.arena[k].next;
            main.used -= 1;
            target.push_front(&mut self.arena, k);
        }
    }

    fn finish_rehash(&mut self) {
        self.tables[0] = core::mem::take(&mut self.tables[1]);
        self.rehash_idx = None;
        debug!(
            "rehash finished: {} buckets, {} entries",
            self.tables[0].size(),
            self.tables[0].used
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{DictConfig, ResizePolicy};
    use crate::dict::Dict;
    use crate::dict_type::DictType;
    use crate::error::DictError;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Identity hash, with a switchable expansion veto.
    #[derive(Default)]
    struct Ident {
        veto: Rc<Cell<bool>>,
        asked: Rc<Cell<usize>>,
    }

    impl DictType for Ident {
        type Key = u64;
        type Val = u64;

        fn hash(&self, key: &u64) -> u64 {
            *key
        }

        fn key_eq(&self, a: &u64, b: &u64) -> bool {
            a == b
        }

        fn expand_allowed(&self, _more_mem: usize, _used_ratio: f64) -> bool {
            self.asked.set(self.asked.get() + 1);
            !self.veto.get()
        }
    }

    fn filled(n: u64) -> Dict<Ident> {
        let mut d = Dict::with_type(Ident::default());
        for k in 0..n {
            d.add(k, k).unwrap();
        }
        d
    }

    /// Invariant: the fifth insert into a four-bucket table starts a rehash into eight buckets.
    #[test]
    fn fifth_insert_starts_rehash() {
        let mut d = filled(4);
        assert_eq!(d.table_sizes(), (4, 0));
        assert!(!d.is_rehashing());
        d.add(4, 4).unwrap();
        assert!(d.is_rehashing());
        assert_eq!(d.table_sizes(), (4, 8));
        assert_eq!(d.len(), 5);

        while d.rehash(1) {}
        assert!(!d.is_rehashing());
        assert_eq!(d.table_sizes(), (8, 0));
        assert_eq!(d.table_used(), (5, 0));
        assert_eq!(d.rehash_index(), None);
    }

    /// Invariant: every step migrates one whole non-empty bucket and leaves lower buckets empty.
    #[test]
    fn step_migrates_whole_buckets() {
        let mut d = filled(4);
        d.add(4, 4).unwrap(); // starts rehash, lands in the target table
        assert_eq!(d.table_used(), (4, 1));
        assert!(d.rehash(1));
        let idx = d.rehash_index().unwrap();
        assert_eq!(idx, 1);
        assert!((0..idx).all(|i| d.tables[0].head(i).is_none()));
        assert_eq!(d.table_used(), (3, 2));
        assert_eq!(d.len(), 5);
    }

    /// Invariant: a paused rehash does not advance, whether stepped automatically or explicitly.
    #[test]
    fn paused_rehash_does_not_advance() {
        let mut d = filled(5);
        let before = d.rehash_index();
        d.pause_rehashing();
        assert!(!d.rehash(10), "no progress is possible while paused");
        assert!(d.is_rehashing());
        for k in 0..5 {
            assert!(d.find(&k).is_some());
        }
        assert_eq!(d.rehash_index(), before);
        assert_eq!(d.rehash_for(std::time::Duration::from_millis(5)), 0);
        d.resume_rehashing();
        while d.rehash(10) {}
        assert!(!d.is_rehashing());
    }

    /// Invariant: the per-step empty-bucket budget bounds the work done on sparse tables.
    #[test]
    fn empty_visits_bound_a_step() {
        let cfg = DictConfig::default().with_empty_visits_per_bucket(2);
        let mut d = Dict::with_config(Ident::default(), cfg);
        d.expand(64).unwrap();
        d.add(63, 0).unwrap();
        d.expand(128).unwrap();
        assert!(d.is_rehashing());
        assert!(d.rehash(1));
        assert_eq!(d.rehash_index(), Some(2));
        while d.rehash(1) {}
        assert_eq!(d.table_sizes(), (128, 0));
        assert!(d.peek(&63).is_some());
    }

    /// Invariant: Forbid defers growth and freezes an active rehash; Avoid grows only past the
    /// force ratio.
    #[test]
    fn resize_policy_modes() {
        let mut d = filled(4);
        d.set_resize_policy(ResizePolicy::Forbid);
        for k in 4..30 {
            d.add(k, k).unwrap();
        }
        assert!(!d.is_rehashing());
        assert_eq!(d.table_sizes(), (4, 0));
        assert_eq!(d.resize(), Err(DictError::ResizeForbidden));

        d.set_resize_policy(ResizePolicy::Avoid);
        d.add(30, 30).unwrap(); // 30 / 4 = 7 > 5
        assert!(d.is_rehashing());
        let (s0, s1) = d.table_sizes();
        assert!(s1 / s0 >= 5, "large jump is allowed to progress");
        d.set_resize_policy(ResizePolicy::Forbid);
        let idx = d.rehash_index();
        assert!(!d.rehash(100));
        while d.rehash(100) {}
        assert_eq!(d.rehash_index(), idx);

        d.set_resize_policy(ResizePolicy::Avoid);
        while d.rehash(100) {}
        assert_eq!(d.len(), 31);
    }

    /// Invariant: a vetoed growth is deferred, and retried on the next natural trigger.
    #[test]
    fn veto_defers_growth() {
        let ty = Ident::default();
        let veto = ty.veto.clone();
        let asked = ty.asked.clone();
        let mut d = Dict::with_type(ty);
        veto.set(true);
        for k in 0..8 {
            d.add(k, k).unwrap();
        }
        assert!(!d.is_rehashing());
        assert!(asked.get() > 0);
        veto.set(false);
        d.add(8, 8).unwrap();
        assert!(d.is_rehashing());
    }

    /// Invariant: shrinking picks the smallest power of two holding every entry.
    #[test]
    fn resize_shrinks_to_fit() {
        let mut d = filled(100);
        while d.rehash(100) {}
        for k in 0..97 {
            d.delete(&k).unwrap();
        }
        while d.rehash(100) {}
        assert!(d.needs_shrink());
        d.resize().unwrap();
        assert!(d.is_rehashing());
        assert_eq!(d.table_sizes().1, 4);
        assert_eq!(d.resize(), Err(DictError::Rehashing));
        while d.rehash(100) {}
        assert_eq!(d.table_sizes(), (4, 0));
        assert!(!d.needs_shrink());
        for k in 97..100 {
            assert!(d.find(&k).is_some());
        }
    }

    /// Invariant: expansion below occupancy or to the current size is rejected without effect.
    #[test]
    fn expand_rejections() {
        let mut d = filled(3);
        assert_eq!(
            d.expand(2),
            Err(DictError::ResizeRejected {
                requested: 2,
                used: 3
            })
        );
        assert!(matches!(d.expand(4), Err(DictError::ResizeRejected { .. })));
        assert!(matches!(
            d.expand(usize::MAX),
            Err(DictError::CapacityOverflow { .. })
        ));
        assert!(!d.is_rehashing());
        d.try_expand(16).unwrap();
        assert_eq!(d.table_sizes(), (4, 16));
    }

    /// Invariant: the time-boxed driver completes a rehash when given enough budget.
    #[test]
    fn rehash_for_completes() {
        let mut d = filled(1000);
        while d.rehash(100) {}
        d.expand(1 << 14).unwrap();
        let n = d.rehash_for(std::time::Duration::from_secs(5));
        assert!(n >= 100);
        assert!(!d.is_rehashing());
        assert_eq!(d.table_sizes(), (1 << 14, 0));
        assert_eq!(d.len(), 1000);
    }

    /// Invariant: a rehash held back by policy makes the drivers return at once, reporting no work.
    #[test]
    fn blocked_rehash_drivers_return_immediately() {
        use std::time::{Duration, Instant};

        let mut d = filled(5);
        assert!(d.is_rehashing());
        let idx = d.rehash_index();
        d.set_resize_policy(ResizePolicy::Forbid);

        let start = Instant::now();
        assert_eq!(d.rehash_for(Duration::from_secs(5)), 0);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!d.rehash(100));
        while d.rehash(100) {}
        assert_eq!(d.rehash_index(), idx);

        // 4 -> 8 is below the force ratio, so Avoid holds it back too.
        d.set_resize_policy(ResizePolicy::Avoid);
        assert_eq!(d.rehash_for(Duration::from_secs(5)), 0);
        assert!(!d.rehash(100));
        assert_eq!(d.rehash_index(), idx);

        d.set_resize_policy(ResizePolicy::Enable);
        while d.rehash(100) {}
        assert!(!d.is_rehashing());
        assert_eq!(d.table_sizes(), (8, 0));
    }

    /// Invariant: the grow ratio sets the load at which growth fires.
    #[test]
    fn grow_ratio_is_configurable() {
        let cfg = DictConfig::default().with_grow_ratio(2);
        let mut d = Dict::with_config(Ident::default(), cfg);
        for k in 0..8 {
            d.add(k, k).unwrap();
        }
        assert!(!d.is_rehashing(), "load 2 is only reached by the ninth insert");
        d.add(8, 8).unwrap();
        assert!(d.is_rehashing());
        assert_eq!(d.table_sizes(), (4, 16));
    }
}
