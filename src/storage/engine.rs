//! Thread-Safe Expiring Store
//!
//! This module implements the core of FlashCache: a concurrent key-value map
//! where every entry may carry a time-to-live.
//!
//! ## Design Decisions
//!
//! 1. **One Lock**: Entries, timers and the deadline queue live behind a single
//!    `Mutex`, so `clear()` and the lazy deletes inside reads are atomic with
//!    respect to every other operation.
//! 2. **Lazy Expiry**: Read paths check the deadline and delete on the spot.
//! 3. **Timers**: Every entry with a TTL owns exactly one timer, a slot in a
//!    deadline-ordered queue. Overwriting, persisting or deleting a key cancels
//!    its slot, so a stale timer can never remove a newer value.
//! 4. **Re-check on Fire**: A firing timer only removes the entry if it is
//!    still present and still expired at fire time.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       ExpiringStore                          │
//! │  ┌──────────────────────────────────────────────────────┐    │
//! │  │                      Mutex                           │    │
//! │  │  entries: HashMap<K, Entry<V>>                       │    │
//! │  │  timers:  HashMap<K, TimerHandle>                    │    │
//! │  │  queue:   BTreeMap<TimerHandle, K>  (by deadline)    │    │
//! │  └──────────────────────────────────────────────────────┘    │
//! │  wakeup: Notify ──────────────> ExpiryDriver (tokio task)    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::error::Result;
use crate::storage::entry::{deadline_after, Entry, Ttl};
use bytes::Bytes;
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};

/// A scheduled removal for one key.
///
/// Ordered by deadline first, so the queue's first slot is the next timer
/// to fire. `seq` keeps handles unique when deadlines collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct TimerHandle {
    deadline: Instant,
    seq: u64,
}

/// Result of looking a key up on a read path.
enum Lookup<'a, V> {
    Live(&'a mut Entry<V>),
    /// The entry was expired and has just been removed.
    Expired,
    Missing,
}

/// Everything guarded by the store's lock.
struct State<K, V> {
    entries: HashMap<K, Entry<V>>,
    timers: HashMap<K, TimerHandle>,
    queue: BTreeMap<TimerHandle, K>,
    next_seq: u64,
}

impl<K, V> State<K, V>
where
    K: Eq + Hash + Clone,
{
    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            timers: HashMap::new(),
            queue: BTreeMap::new(),
            next_seq: 0,
        }
    }

    fn cancel_timer<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Some(handle) = self.timers.remove(key) {
            self.queue.remove(&handle);
        }
    }

    /// Replaces the key's timer. Returns true if it is now the earliest one.
    fn schedule(&mut self, key: K, deadline: Instant) -> bool {
        self.cancel_timer(&key);

        let handle = TimerHandle {
            deadline,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        self.timers.insert(key.clone(), handle);
        self.queue.insert(handle, key);

        self.queue.keys().next() == Some(&handle)
    }

    /// Inserts an entry, dropping any timer of the previous one.
    ///
    /// Returns true if no live entry existed for the key.
    fn insert(&mut self, key: K, entry: Entry<V>, now: Instant) -> bool {
        self.cancel_timer(&key);
        self.entries
            .insert(key, entry)
            .map_or(true, |old| old.is_expired_at(now))
    }

    fn remove<Q>(&mut self, key: &Q) -> Option<Entry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cancel_timer(key);
        self.entries.remove(key)
    }

    fn lookup<Q>(&mut self, key: &Q, now: Instant) -> Lookup<'_, V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => return Lookup::Missing,
        };

        if expired {
            self.remove(key);
            return Lookup::Expired;
        }

        match self.entries.get_mut(key) {
            Some(entry) => Lookup::Live(entry),
            None => Lookup::Missing,
        }
    }

    /// Fires up to `limit` timers whose deadline is at or before `now`.
    ///
    /// Returns the number of entries removed.
    fn fire_due(&mut self, now: Instant, limit: usize) -> u64 {
        let mut fired = 0;
        let mut removed = 0;

        while fired < limit {
            match self.queue.keys().next() {
                Some(handle) if handle.deadline <= now => {}
                _ => break,
            }
            let Some((handle, key)) = self.queue.pop_first() else {
                break;
            };
            fired += 1;

            if self.timers.get(&key) == Some(&handle) {
                self.timers.remove(&key);
            }

            let still_expired = self
                .entries
                .get(&key)
                .is_some_and(|entry| entry.is_expired_at(now));
            if still_expired {
                self.entries.remove(&key);
                removed += 1;
            }
        }

        removed
    }
}

/// State shared between store handles and the expiry driver.
struct Shared<K, V> {
    state: Mutex<State<K, V>>,

    /// Wakes the expiry driver when an earlier deadline is scheduled
    wakeup: Arc<Notify>,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,

    /// Statistics: total DEL operations
    del_count: AtomicU64,

    /// Statistics: entries removed by a read noticing their expiry
    lazily_expired: AtomicU64,

    /// Statistics: entries removed by a firing timer
    swept: AtomicU64,
}

impl<K, V> Drop for Shared<K, V> {
    fn drop(&mut self) {
        // Lets a parked driver notice that the store is gone.
        self.wakeup.notify_one();
    }
}

/// An in-process key-value store with per-entry TTL.
///
/// Handles are cheap to clone and all refer to the same underlying store.
/// Every operation is thread-safe.
///
/// Expired entries are never returned. They are removed when a read
/// observes them, when [`len`](Self::len) or
/// [`purge_expired`](Self::purge_expired) runs, or when an
/// [`ExpiryDriver`](crate::storage::ExpiryDriver) fires their timer,
/// whichever happens first.
///
/// # Example
///
/// ```
/// use flashcache::storage::{ExpiringStore, Ttl};
/// use std::time::Duration;
///
/// let store: ExpiringStore<String, u32> = ExpiringStore::new();
///
/// store.set("visits".to_string(), 1);
/// assert_eq!(store.get("visits"), Some(1));
///
/// store
///     .set_with_ttl("session".to_string(), 42, Duration::from_secs(60))
///     .unwrap();
/// assert!(matches!(store.ttl("session"), Ttl::Remaining(_)));
/// assert_eq!(store.ttl("visits"), Ttl::Persistent);
/// assert_eq!(store.ttl("nope"), Ttl::Missing);
/// ```
pub struct ExpiringStore<K = String, V = Bytes> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> Clone for ExpiringStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> std::fmt::Debug for ExpiringStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringStore")
            .field("get_count", &self.shared.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.shared.set_count.load(Ordering::Relaxed))
            .field("del_count", &self.shared.del_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K, V> Default for ExpiringStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty store with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::with_capacity(capacity)),
                wakeup: Arc::new(Notify::new()),
                get_count: AtomicU64::new(0),
                set_count: AtomicU64::new(0),
                del_count: AtomicU64::new(0),
                lazily_expired: AtomicU64::new(0),
                swept: AtomicU64::new(0),
            }),
        }
    }

    // A panic inside a critical section cannot leave the maps half-updated,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, State<K, V>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn note_lazy_expiry(&self) {
        self.shared.lazily_expired.fetch_add(1, Ordering::Relaxed);
        trace!("Expired key removed on access");
    }

    /// Sets a key-value pair without expiry.
    ///
    /// Overwrites any existing value and cancels its pending expiry.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if a live key was updated.
    pub fn set(&self, key: K, value: V) -> bool {
        self.shared.set_count.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        let mut state = self.lock();
        state.insert(key, Entry::new(value), now)
    }

    /// Sets a key-value pair that expires after `ttl`.
    ///
    /// A pending timer from a previous value is cancelled first, so the new
    /// value gets the full `ttl`.
    ///
    /// # Errors
    ///
    /// Rejects a zero `ttl` or one that overflows the clock. The store is
    /// left untouched in that case.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let deadline = deadline_after(now, ttl)?;

        self.shared.set_count.fetch_add(1, Ordering::Relaxed);

        let mut state = self.lock();
        let is_new = state.insert(key.clone(), Entry::with_deadline(value, deadline), now);
        let is_head = state.schedule(key, deadline);
        drop(state);

        if is_head {
            self.shared.wakeup.notify_one();
        }

        Ok(is_new)
    }

    /// Sets a key-value pair with an optional TTL.
    ///
    /// `None` behaves like [`set`](Self::set), `Some(ttl)` like
    /// [`set_with_ttl`](Self::set_with_ttl).
    pub fn set_ex(&self, key: K, value: V, ttl: Option<Duration>) -> Result<bool> {
        match ttl {
            Some(ttl) => self.set_with_ttl(key, value, ttl),
            None => Ok(self.set(key, value)),
        }
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    /// An expired entry is removed before returning.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.get_count.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        let mut state = self.lock();
        match state.lookup(key, now) {
            Lookup::Live(entry) => Some(entry.value.clone()),
            Lookup::Expired => {
                self.note_lazy_expiry();
                None
            }
            Lookup::Missing => None,
        }
    }

    /// Checks if a key exists and is not expired.
    ///
    /// Agrees with [`get`](Self::get), including removing an expired entry.
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let mut state = self.lock();
        match state.lookup(key, now) {
            Lookup::Live(_) => true,
            Lookup::Expired => {
                self.note_lazy_expiry();
                false
            }
            Lookup::Missing => false,
        }
    }

    /// Deletes a key, expired or not, and cancels its timer.
    ///
    /// # Returns
    ///
    /// Returns `true` if an entry was present and removed.
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.del_count.fetch_add(1, Ordering::Relaxed);

        self.lock().remove(key).is_some()
    }

    /// Removes all entries and cancels all timers.
    pub fn clear(&self) {
        let mut state = self.lock();
        let removed = state.entries.len();

        state.entries.clear();
        state.timers.clear();
        state.queue.clear();
        drop(state);

        debug!(removed = removed, "Store cleared");
    }

    /// Returns the number of live entries.
    ///
    /// Due timers are fired first, so expired entries are never counted.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let mut state = self.lock();

        let removed = state.fire_due(now, usize::MAX);
        if removed > 0 {
            self.shared.swept.fetch_add(removed, Ordering::Relaxed);
        }

        state.entries.len()
    }

    /// Returns true if the store holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sets or resets the TTL of an existing key, keeping its value.
    ///
    /// # Returns
    ///
    /// Returns `Ok(true)` if the expiry was set, `Ok(false)` if the key doesn't
    /// exist. No entry is ever created.
    ///
    /// # Errors
    ///
    /// Same TTL validation as [`set_with_ttl`](Self::set_with_ttl).
    pub fn expire<Q>(&self, key: &Q, ttl: Duration) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let deadline = deadline_after(now, ttl)?;

        let mut state = self.lock();
        match state.lookup(key, now) {
            Lookup::Live(entry) => entry.expires_at = Some(deadline),
            Lookup::Expired => {
                self.note_lazy_expiry();
                return Ok(false);
            }
            Lookup::Missing => return Ok(false),
        }

        let Some(owned) = state.entries.get_key_value(key).map(|(k, _)| k.clone()) else {
            return Ok(false);
        };
        let is_head = state.schedule(owned, deadline);
        drop(state);

        if is_head {
            self.shared.wakeup.notify_one();
        }

        Ok(true)
    }

    /// Removes the expiry from a key (makes it persistent).
    ///
    /// # Returns
    ///
    /// Returns `true` if the expiry was removed, `false` if the key doesn't exist
    /// or didn't have an expiry.
    pub fn persist<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let mut state = self.lock();
        let had_expiry = match state.lookup(key, now) {
            Lookup::Live(entry) => entry.expires_at.take().is_some(),
            Lookup::Expired => {
                self.note_lazy_expiry();
                return false;
            }
            Lookup::Missing => return false,
        };

        if had_expiry {
            state.cancel_timer(key);
        }
        had_expiry
    }

    /// Gets the remaining TTL for a key.
    ///
    /// An expired entry is removed and reported as [`Ttl::Missing`].
    pub fn ttl<Q>(&self, key: &Q) -> Ttl
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let mut state = self.lock();
        match state.lookup(key, now) {
            Lookup::Live(entry) => entry.ttl_at(now),
            Lookup::Expired => {
                self.note_lazy_expiry();
                Ttl::Missing
            }
            Lookup::Missing => Ttl::Missing,
        }
    }

    /// Returns a snapshot of all live keys, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        let now = Instant::now();
        let mut state = self.lock();

        let removed = state.fire_due(now, usize::MAX);
        if removed > 0 {
            self.shared.swept.fetch_add(removed, Ordering::Relaxed);
        }

        state.entries.keys().cloned().collect()
    }

    /// Fires every due timer now.
    ///
    /// # Returns
    ///
    /// Returns the number of entries that were removed.
    pub fn purge_expired(&self) -> u64 {
        let removed = self.fire_due_timers(Instant::now(), usize::MAX);
        if removed > 0 {
            debug!(removed = removed, "Expired keys purged");
        }
        removed
    }

    /// Fires up to `limit` timers due at `now`. Used by the expiry driver.
    pub(crate) fn fire_due_timers(&self, now: Instant, limit: usize) -> u64 {
        let removed = self.lock().fire_due(now, limit);
        if removed > 0 {
            self.shared.swept.fetch_add(removed, Ordering::Relaxed);
        }
        removed
    }

    /// Returns the number of scheduled expiry timers.
    pub fn pending_timers(&self) -> usize {
        self.lock().timers.len()
    }

    /// Returns the deadline of the next timer to fire, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.lock().queue.keys().next().map(|handle| handle.deadline)
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            get_ops: self.shared.get_count.load(Ordering::Relaxed),
            set_ops: self.shared.set_count.load(Ordering::Relaxed),
            del_ops: self.shared.del_count.load(Ordering::Relaxed),
            lazily_expired: self.shared.lazily_expired.load(Ordering::Relaxed),
            swept: self.shared.swept.load(Ordering::Relaxed),
        }
    }
}

impl<K, V> ExpiringStore<K, V> {
    pub(crate) fn downgrade(&self) -> WeakStore<K, V> {
        WeakStore {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub(crate) fn wakeup(&self) -> Arc<Notify> {
        Arc::clone(&self.shared.wakeup)
    }
}

/// A handle that does not keep the store alive.
pub(crate) struct WeakStore<K, V> {
    shared: Weak<Shared<K, V>>,
}

impl<K, V> WeakStore<K, V> {
    pub(crate) fn upgrade(&self) -> Option<ExpiringStore<K, V>> {
        self.shared.upgrade().map(|shared| ExpiringStore { shared })
    }
}

/// Store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub get_ops: u64,
    pub set_ops: u64,
    pub del_ops: u64,
    /// Entries removed because a read found them expired
    pub lazily_expired: u64,
    /// Entries removed by a firing timer
    pub swept: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_set_and_get() {
        let store = ExpiringStore::new();

        assert!(store.set("key", "value"));
        assert_eq!(store.get("key"), Some("value"));

        // Overwrite is not a new key
        assert!(!store.set("key", "other"));
        assert_eq!(store.get("key"), Some("other"));
    }

    #[test]
    fn test_missing_key_is_absent_everywhere() {
        let store: ExpiringStore<String, u32> = ExpiringStore::new();

        assert_eq!(store.get("missing"), None);
        assert!(!store.has("missing"));
        assert_eq!(store.ttl("missing"), Ttl::Missing);
        assert!(!store.delete("missing"));
        assert_eq!(store.expire("missing", ms(100)), Ok(false));
        assert!(!store.persist("missing"));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_delete() {
        let store = ExpiringStore::new();

        store.set("key", 1);
        assert!(store.delete("key"));
        assert_eq!(store.get("key"), None);
        assert!(!store.delete("key"));
    }

    #[test]
    fn test_delete_cancels_timer() {
        let store = ExpiringStore::new();

        store.set_with_ttl("key", 1, Duration::from_secs(60)).unwrap();
        assert_eq!(store.pending_timers(), 1);

        assert!(store.delete("key"));
        assert_eq!(store.pending_timers(), 0);
        assert_eq!(store.next_deadline(), None);
    }

    #[test]
    fn test_clear() {
        let store = ExpiringStore::new();

        store.set("key1", "value1");
        store.set("key2", "value2");
        store.set_with_ttl("key3", "value3", Duration::from_secs(60)).unwrap();

        store.clear();

        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.pending_timers(), 0);
        assert_eq!(store.get("key1"), None);
        assert_eq!(store.get("key3"), None);
    }

    #[test]
    fn test_persistent_key_has_no_expiry() {
        let store = ExpiringStore::new();

        store.set("key", "value");
        assert_eq!(store.ttl("key"), Ttl::Persistent);
        assert_eq!(store.ttl("key").as_millis(), -1);
        assert_eq!(store.pending_timers(), 0);
    }

    #[test]
    fn test_expiry() {
        let store = ExpiringStore::new();

        store.set_with_ttl("key", "value", ms(50)).unwrap();

        // Key should exist immediately
        assert_eq!(store.get("key"), Some("value"));

        // Wait for expiry
        std::thread::sleep(ms(100));

        // Key should be gone
        assert!(!store.has("key"));
        assert_eq!(store.get("key"), None);
        assert_eq!(store.pending_timers(), 0);
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let store = ExpiringStore::new();

        assert_eq!(
            store.set_with_ttl("key", 1, Duration::ZERO),
            Err(StoreError::ZeroTtl)
        );
        assert!(!store.has("key"));

        store.set("key", 1);
        assert_eq!(store.expire("key", Duration::ZERO), Err(StoreError::ZeroTtl));
        // Rejected expire leaves the entry as it was
        assert_eq!(store.ttl("key"), Ttl::Persistent);
    }

    #[test]
    fn test_overflowing_ttl_is_rejected() {
        let store = ExpiringStore::new();

        assert_eq!(
            store.set_with_ttl("key", 1, Duration::MAX),
            Err(StoreError::TtlOverflow(Duration::MAX))
        );
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_set_ex() {
        let store = ExpiringStore::new();

        store.set_ex("a", 1, None).unwrap();
        store.set_ex("b", 2, Some(Duration::from_secs(60))).unwrap();

        assert_eq!(store.ttl("a"), Ttl::Persistent);
        assert!(matches!(store.ttl("b"), Ttl::Remaining(_)));
        assert_eq!(store.set_ex("c", 3, Some(Duration::ZERO)), Err(StoreError::ZeroTtl));
    }

    #[test]
    fn test_set_without_ttl_cancels_timer() {
        let store = ExpiringStore::new();

        store.set_with_ttl("key", 1, ms(30)).unwrap();
        store.set("key", 2);
        assert_eq!(store.pending_timers(), 0);

        std::thread::sleep(ms(60));

        assert_eq!(store.get("key"), Some(2));
        assert_eq!(store.ttl("key"), Ttl::Persistent);
    }

    #[test]
    fn test_overwrite_replaces_timer() {
        let store = ExpiringStore::new();

        store.set_with_ttl("key", 1, ms(30)).unwrap();
        store.set_with_ttl("key", 2, Duration::from_secs(60)).unwrap();
        assert_eq!(store.pending_timers(), 1);

        std::thread::sleep(ms(60));

        // The first timer is gone, so nothing is due
        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.get("key"), Some(2));
    }

    #[test]
    fn test_expire() {
        let store = ExpiringStore::new();

        store.set("key", "value");

        assert_eq!(store.expire("key", Duration::from_secs(60)), Ok(true));
        assert_eq!(store.get("key"), Some("value"));
        assert_eq!(store.pending_timers(), 1);

        let remaining = store.ttl("key").remaining().unwrap();
        assert!(remaining > Duration::from_secs(59));
        assert!(remaining <= Duration::from_secs(60));

        // Persist (remove expiry)
        assert!(store.persist("key"));
        assert!(!store.persist("key"));
        assert_eq!(store.ttl("key"), Ttl::Persistent);
        assert_eq!(store.pending_timers(), 0);
    }

    #[test]
    fn test_expire_on_expired_key_creates_nothing() {
        let store = ExpiringStore::new();

        store.set_with_ttl("key", "value", ms(20)).unwrap();
        std::thread::sleep(ms(50));

        assert_eq!(store.expire("key", Duration::from_secs(60)), Ok(false));
        assert!(!store.has("key"));
        assert_eq!(store.stats().lazily_expired, 1);
    }

    #[test]
    fn test_ttl_deletes_expired_key() {
        let store = ExpiringStore::new();

        store.set_with_ttl("key", "value", ms(20)).unwrap();
        std::thread::sleep(ms(50));

        assert_eq!(store.ttl("key"), Ttl::Missing);
        assert_eq!(store.ttl("key").as_millis(), -2);
        assert_eq!(store.pending_timers(), 0);
        assert!(!store.delete("key"));
    }

    #[test]
    fn test_delete_expired_but_uncollected_entry() {
        let store = ExpiringStore::new();

        store.set_with_ttl("key", "value", ms(20)).unwrap();
        std::thread::sleep(ms(50));

        // Still physically present until something observes it
        assert!(store.delete("key"));
        assert_eq!(store.pending_timers(), 0);
    }

    #[test]
    fn test_len_skips_expired_entries() {
        let store = ExpiringStore::new();

        store.set("key1", "value1");
        store.set("key2", "value2");
        store.set_with_ttl("key3", "value3", ms(20)).unwrap();
        assert_eq!(store.len(), 3);

        std::thread::sleep(ms(50));

        assert_eq!(store.len(), 2);
        let stats = store.stats();
        assert_eq!(stats.swept, 1);
        assert_eq!(stats.lazily_expired, 0);
    }

    #[test]
    fn test_keys() {
        let store = ExpiringStore::new();

        store.set("a", 1);
        store.set("b", 2);
        store.set_with_ttl("c", 3, ms(20)).unwrap();
        std::thread::sleep(ms(50));

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_purge_expired() {
        let store = ExpiringStore::new();

        store.set_with_ttl("key1", "value1", ms(10)).unwrap();
        store.set_with_ttl("key2", "value2", ms(10)).unwrap();
        store.set("key3", "value3"); // No expiry

        std::thread::sleep(ms(50));

        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.has("key3"));
        assert_eq!(store.pending_timers(), 0);
    }

    #[test]
    fn test_fire_due_respects_limit_and_order() {
        let store = ExpiringStore::new();

        store.set_with_ttl("late", 3, ms(30)).unwrap();
        store.set_with_ttl("early", 1, ms(10)).unwrap();
        store.set_with_ttl("middle", 2, ms(20)).unwrap();

        std::thread::sleep(ms(60));

        assert_eq!(store.fire_due_timers(Instant::now(), 1), 1);
        assert_eq!(store.pending_timers(), 2);
        {
            // "early" fired first
            let state = store.lock();
            assert!(!state.entries.contains_key("early"));
            assert!(state.entries.contains_key("middle"));
            assert!(state.entries.contains_key("late"));
        }
        assert_eq!(store.fire_due_timers(Instant::now(), 10), 2);
        assert_eq!(store.pending_timers(), 0);
    }

    #[test]
    fn test_firing_rechecks_expiry() {
        let store = ExpiringStore::new();

        store.set_with_ttl("key", 1, Duration::from_secs(60)).unwrap();
        let deadline = store.next_deadline().unwrap();

        // Pretend the entry's deadline moved after its timer was queued
        store.lock().entries.get_mut("key").unwrap().expires_at =
            Some(deadline + Duration::from_secs(60));

        assert_eq!(store.fire_due_timers(deadline, usize::MAX), 0);
        assert_eq!(store.get("key"), Some(1));
    }

    #[test]
    fn test_clones_share_state() {
        let store = ExpiringStore::new();
        let other = store.clone();

        store.set("key", 1);
        assert_eq!(other.get("key"), Some(1));
    }

    #[test]
    fn test_stats() {
        let store = ExpiringStore::new();

        store.set("a", 1);
        store.set_with_ttl("b", 2, Duration::from_secs(60)).unwrap();
        store.get("a");
        store.get("missing");
        store.delete("a");

        let stats = store.stats();
        assert_eq!(stats.set_ops, 2);
        assert_eq!(stats.get_ops, 2);
        assert_eq!(stats.del_ops, 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let store = ExpiringStore::new();
        let mut handles = vec![];

        // Spawn multiple writers
        for i in 0..10 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    store.set(key.clone(), Bytes::from("value"));
                    store.get(&key);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 1000);
    }

    #[test]
    fn test_concurrent_mixed_operations() {
        use std::thread;

        let store: ExpiringStore<String, u64> = ExpiringStore::new();
        let mut handles = vec![];

        for i in 0..8u64 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                for j in 0..200u64 {
                    let key = format!("key-{}-{}", i, j);
                    store.set(key.clone(), j);
                    if j % 2 == 0 {
                        assert!(store.delete(&key));
                    } else {
                        store.expire(&key, Duration::from_secs(60)).unwrap();
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 800);
        assert_eq!(store.pending_timers(), 800);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_clock() {
        let store = ExpiringStore::new();

        store.set_with_ttl("k", "v1", ms(100)).unwrap();
        store.set_with_ttl("k", "v2", ms(500)).unwrap();

        tokio::time::advance(ms(150)).await;
        assert_eq!(store.get("k"), Some("v2"));

        tokio::time::advance(ms(400)).await;
        assert_eq!(store.get("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_counts_down() {
        let store = ExpiringStore::new();

        store.set_with_ttl("key", "value", ms(1000)).unwrap();
        tokio::time::advance(ms(1)).await;

        let remaining = store.ttl("key").as_millis();
        assert!(remaining > 0 && remaining < 1000);

        tokio::time::advance(ms(500)).await;
        let remaining = store.ttl("key").as_millis();
        assert!(remaining > 450 && remaining <= 500);

        tokio::time::advance(ms(500)).await;
        assert_eq!(store.ttl("key"), Ttl::Missing);
        assert!(!store.has("key"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_matches_set_with_ttl() {
        let store = ExpiringStore::new();

        store.set("key", "value");
        assert_eq!(store.expire("key", ms(100)), Ok(true));

        tokio::time::advance(ms(99)).await;
        assert_eq!(store.get("key"), Some("value"));

        tokio::time::advance(ms(1)).await;
        assert_eq!(store.get("key"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario() {
        let store = ExpiringStore::new();

        store.set("a", 1);
        store.set_with_ttl("a", 2, ms(50)).unwrap();
        tokio::time::advance(ms(60)).await;
        assert_eq!(store.get("a"), None);

        store.set_with_ttl("b", 1, ms(1000)).unwrap();
        let remaining = store.ttl("b").as_millis();
        assert!((900..=1000).contains(&remaining));

        assert_eq!(store.expire("missing", ms(100)), Ok(false));
        assert!(!store.has("missing"));
    }
}
