//! incdict: a chained hash table that resizes incrementally.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a general-purpose map whose resizes never stall a single operation. Growth
//!   allocates a second bucket array and migrates entries a bucket at a time, piggybacked on
//!   lookups and mutations or driven explicitly through `rehash`/`rehash_for`.
//! - Layers:
//!   - `Table`: one power-of-two bucket array of chain heads plus its occupancy.
//!   - `Dict<T: DictType>`: two tables, the rehash cursor, and the entry arena. The
//!     `DictType` supplies hashing, key equality, dup/destroy hooks, the growth veto and
//!     per-entry metadata size.
//!   - Traversal: borrowing `Iter`, detached safe/unsafe `DictIterator`s, the stateless
//!     `scan` cursor and the random samplers, all aware of both tables.
//!
//! Storage
//! - Entries live in one `slotmap` arena; buckets and chain links hold arena keys. An
//!   `EntryId` therefore stays valid across rehashing and becomes stale (never dangling)
//!   once its entry is removed.
//! - Each entry caches its hash; rehash steps and lookups compare cached hashes first and
//!   never call `DictType::hash` for stored keys.
//!
//! Rehash state
//! - Idle: `tables[1]` is unallocated and `rehash_idx` is `None`.
//! - Rehashing: main-table buckets below `rehash_idx` are empty, inserts go to the target,
//!   lookups probe both. When the main table drains the target replaces it.
//! - A pause counter (`Cell`, so `&self` traversals may hold it) blocks steps while safe
//!   iterators or scans are active.
//!
//! Growth policy
//! - Grow to the next power of two above `used + 1` once `used / size` reaches `grow_ratio`.
//!   `ResizePolicy::Avoid` defers growth until the ratio exceeds `force_resize_ratio`;
//!   `Forbid` never grows or steps. The dict type can veto growth via `expand_allowed`.
//! - Shrinking is administrative only (`resize`), driven by `needs_shrink`.
//!
//! Notes and non-goals
//! - Single-threaded: a dict is `!Sync` because of the pause counter.
//! - Iteration order is bucket order, unspecified to callers.
//! - Hashing uses `ahash` seeded once per process (`set_hash_seed`/`hash_seed`).

pub mod config;
pub mod dict;
mod dict_proptest;
pub mod dict_type;
pub mod entry;
pub mod error;
pub mod hash;
pub mod iter;
mod pause;
mod rehash;
mod sample;
pub mod scan;
pub mod stats;
mod table;

// Public surface
pub use config::{DictConfig, ResizePolicy, MAX_INITIAL_EXP};
pub use dict::{Dict, DictEntry, Replace};
pub use dict_type::{DefaultType, DictType, Value};
pub use entry::{Entry, EntryId, UnlinkedEntry};
pub use error::DictError;
pub use hash::{gen_case_hash, gen_hash, hash_seed, set_hash_seed, SeedState};
pub use iter::{DictIterator, Iter};
pub use scan::Bucket;
pub use stats::{DictStats, TableStats};
