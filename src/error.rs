//! Error type shared by the dict operations.

use thiserror::Error;

/// Failure results of dict operations.
///
/// `DuplicateKey` and `KeyNotFound` are ordinary outcomes; the resize variants leave the
/// table exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DictError {
    #[error("key already present in dict")]
    DuplicateKey,
    #[error("key not found in dict")]
    KeyNotFound,
    #[error("cannot resize while a rehash is in progress")]
    Rehashing,
    #[error("resize to {requested} buckets rejected, dict holds {used} entries")]
    ResizeRejected { requested: usize, used: usize },
    #[error("resize forbidden by the current resize policy")]
    ResizeForbidden,
    #[error("requested capacity {requested} overflows the bucket array size")]
    CapacityOverflow { requested: usize },
    #[error("failed to allocate a bucket array of {buckets} buckets")]
    AllocationFailed { buckets: usize },
    #[error("hash seed already initialized")]
    SeedAlreadySet,
}
