//! Stored records and TTL replies.

use crate::error::{Result, StoreError};
use std::time::Duration;
use tokio::time::Instant;

/// Represents a stored value with optional expiry time.
///
/// Timestamps use `tokio::time::Instant`, which follows the real monotonic
/// clock normally and the paused clock inside `start_paused` tests.
#[derive(Debug, Clone)]
pub struct Entry<V> {
    /// The actual value stored
    pub value: V,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    /// Creates a new entry without expiry.
    pub fn new(value: V) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Creates a new entry that expires at `deadline`.
    pub fn with_deadline(value: V, deadline: Instant) -> Self {
        Self {
            value,
            expires_at: Some(deadline),
        }
    }

    /// Checks if this entry has expired as of `now`.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Returns the TTL reply for this entry as seen at `now`.
    pub fn ttl_at(&self, now: Instant) -> Ttl {
        match self.expires_at {
            None => Ttl::Persistent,
            Some(exp) if exp <= now => Ttl::Missing,
            Some(exp) => Ttl::Remaining(exp - now),
        }
    }
}

/// Remaining lifetime of a key, as answered by `ExpiringStore::ttl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key is live and expires after this duration.
    Remaining(Duration),
    /// The key is live and has no expiry.
    Persistent,
    /// The key does not exist (or just expired).
    Missing,
}

impl Ttl {
    /// Sentinel returned by [`Ttl::as_millis`] for keys without expiry.
    pub const NO_EXPIRY: i64 = -1;

    /// Sentinel returned by [`Ttl::as_millis`] for missing keys.
    pub const MISSING: i64 = -2;

    /// Returns the remaining duration, if the key has one.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Ttl::Remaining(d) => Some(*d),
            _ => None,
        }
    }

    /// Milliseconds remaining, or `-1` (no expiry) / `-2` (missing).
    ///
    /// Partial milliseconds round up, so a live key never reports `0`.
    pub fn as_millis(&self) -> i64 {
        match self {
            Ttl::Remaining(d) => {
                let millis = d.as_millis() + u128::from(d.subsec_nanos() % 1_000_000 != 0);
                i64::try_from(millis).unwrap_or(i64::MAX)
            }
            Ttl::Persistent => Self::NO_EXPIRY,
            Ttl::Missing => Self::MISSING,
        }
    }
}

/// Validates a signed millisecond TTL, as received from untrusted input.
///
/// Zero and negative values are rejected rather than treated as
/// "expire immediately".
pub fn parse_ttl_millis(ms: i64) -> Result<Duration> {
    if ms <= 0 {
        return Err(StoreError::NonPositiveTtl(ms));
    }
    Ok(Duration::from_millis(ms as u64))
}

/// Computes the absolute deadline for `ttl` starting at `now`.
pub(crate) fn deadline_after(now: Instant, ttl: Duration) -> Result<Instant> {
    if ttl.is_zero() {
        return Err(StoreError::ZeroTtl);
    }
    now.checked_add(ttl).ok_or(StoreError::TtlOverflow(ttl))
}
