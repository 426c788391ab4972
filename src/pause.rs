//! Rehash pause counter.
//!
//! While the counter is above zero no rehash step runs, so bucket indices stay stable for
//! safe iterators and scans. The counter lives in a `Cell` so traversals holding only a
//! shared borrow of the dict can pause it. Resuming more often than pausing is a caller bug
//! and panics.

use core::cell::Cell;

#[derive(Debug, Default)]
pub(crate) struct RehashPause {
    depth: Cell<u16>,
}

impl RehashPause {
    pub(crate) const fn new() -> Self {
        Self {
            depth: Cell::new(0),
        }
    }

    #[inline]
    pub(crate) fn pause(&self) {
        let d = self.depth.get();
        let n = d.checked_add(1).expect("rehash pause counter overflow");
        self.depth.set(n);
    }

    #[inline]
    pub(crate) fn resume(&self) {
        let d = self.depth.get();
        assert!(d > 0, "rehash resumed more times than it was paused");
        self.depth.set(d - 1);
    }

    #[inline]
    pub(crate) fn is_paused(&self) -> bool {
        self.depth.get() > 0
    }

    pub(crate) fn depth(&self) -> u16 {
        self.depth.get()
    }

    /// Pause until the returned guard drops.
    #[inline]
    pub(crate) fn hold(&self) -> PauseGuard<'_> {
        self.pause();
        PauseGuard { owner: self }
    }
}

/// RAII guard returned by `RehashPause::hold`.
pub(crate) struct PauseGuard<'a> {
    owner: &'a RehashPause,
}

impl<'a> Drop for PauseGuard<'a> {
    fn drop(&mut self) {
        self.owner.resume();
    }
}
