//! Error types for FlashCache.
//!
//! Missing keys are never errors: reads answer with `Option`, `bool` or
//! [`Ttl::Missing`](crate::storage::Ttl::Missing). The only failures are
//! caller misuse, reported synchronously and without touching the store.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by the TTL-taking store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A zero-length TTL was supplied.
    #[error("invalid expire time: ttl must be greater than zero")]
    ZeroTtl,

    /// A signed millisecond TTL was zero or negative.
    #[error("invalid expire time: {0}ms is not a positive ttl")]
    NonPositiveTtl(i64),

    /// The TTL pushes the deadline past what the clock can represent.
    #[error("invalid expire time: ttl of {0:?} overflows the clock")]
    TtlOverflow(Duration),
}

/// Convenience alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
