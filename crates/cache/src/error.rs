//! Internal error types
//!
//! None of these reach callers of the cache API: the store logs and swallows
//! [`CacheError`], and the size estimator replaces an [`EstimationError`] with
//! its default cost.

use std::time::Duration;

/// Failure while estimating the size of a value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EstimationError {
    #[error("value nesting exceeds {limit} levels")]
    TooDeep { limit: usize },
    #[error("size estimate overflowed")]
    Overflow,
}

/// Failure while mutating the cache store
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("expiry for {key} is not representable (ttl {ttl:?})")]
    ExpiryOverflow { key: String, ttl: Duration },
    #[error("memory accounting overflow while inserting {key} ({size} bytes)")]
    AccountingOverflow { key: String, size: usize },
    #[error("expiry sweep interval must be non-zero")]
    ZeroInterval,
    #[error("failed to spawn expiry reaper thread: {0}")]
    ReaperSpawn(#[from] std::io::Error),
}
