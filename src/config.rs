//! Tunables for growth, shrinking and rehash pacing.

/// Whether the dict may allocate a new bucket array.
///
/// Callers switch to `Avoid` or `Forbid` while extra memory copying is expensive, e.g. while
/// a fork-based snapshot shares pages with the parent.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum ResizePolicy {
    /// Grow and shrink freely.
    #[default]
    Enable,
    /// Only grow when the load ratio exceeds `force_resize_ratio`; rehash steps are skipped
    /// unless the two tables differ in size by at least that ratio.
    Avoid,
    /// Never start a resize and never advance one already in progress.
    Forbid,
}

/// Largest accepted `initial_exp`: a bucket array of `1 << MAX_INITIAL_EXP` slots still fits
/// in `isize::MAX` bytes.
pub const MAX_INITIAL_EXP: u8 = (usize::BITS - 5) as u8;

/// Per-dict configuration. Immutable after creation except for `resize_policy`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DictConfig {
    /// The first bucket array holds `1 << initial_exp` buckets, capped at
    /// [`MAX_INITIAL_EXP`].
    pub initial_exp: u8,
    /// Growth fires when `used / size >= grow_ratio`.
    pub grow_ratio: usize,
    /// Load ratio above which growth proceeds even under [`ResizePolicy::Avoid`].
    pub force_resize_ratio: usize,
    /// Empty buckets a rehash step may skip, per bucket of requested work.
    pub empty_visits_per_bucket: usize,
    /// `needs_shrink` reports true below this fill percentage.
    pub min_fill_percent: usize,
    /// Entries gathered by `fair_random_key` before picking one.
    pub fair_sample_size: usize,
    pub resize_policy: ResizePolicy,
}

impl Default for DictConfig {
    fn default() -> Self {
        Self {
            initial_exp: 2,
            grow_ratio: 1,
            force_resize_ratio: 5,
            empty_visits_per_bucket: 10,
            min_fill_percent: 10,
            fair_sample_size: 15,
            resize_policy: ResizePolicy::Enable,
        }
    }
}

impl DictConfig {
    pub fn with_initial_exp(mut self, exp: u8) -> Self {
        self.initial_exp = exp.min(MAX_INITIAL_EXP);
        self
    }

    pub fn with_grow_ratio(mut self, ratio: usize) -> Self {
        self.grow_ratio = ratio.max(1);
        self
    }

    pub fn with_force_resize_ratio(mut self, ratio: usize) -> Self {
        self.force_resize_ratio = ratio.max(1);
        self
    }

    pub fn with_empty_visits_per_bucket(mut self, visits: usize) -> Self {
        self.empty_visits_per_bucket = visits.max(1);
        self
    }

    pub fn with_min_fill_percent(mut self, percent: usize) -> Self {
        self.min_fill_percent = percent;
        self
    }

    pub fn with_fair_sample_size(mut self, n: usize) -> Self {
        self.fair_sample_size = n.max(1);
        self
    }

    pub fn with_resize_policy(mut self, policy: ResizePolicy) -> Self {
        self.resize_policy = policy;
        self
    }

    /// Bucket count of the first allocation.
    pub fn initial_size(&self) -> usize {
        1usize << self.initial_exp.min(MAX_INITIAL_EXP)
    }
}
