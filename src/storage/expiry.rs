//! Background Expiry Driver
//!
//! This module implements "active expiry": a background task that removes
//! entries once their TTL elapses, whether or not anything reads them.
//! Lazy expiry on access (see [`ExpiringStore`]) already hides expired
//! values. The driver exists to reclaim memory for keys nobody touches again.
//!
//! ## Design
//!
//! The driver runs as a Tokio task and:
//! 1. Sleeps until the earliest scheduled deadline
//! 2. Wakes early if a set or expire schedules an even earlier deadline
//! 3. Fires the due timers, a bounded batch per lock acquisition
//! 4. Goes back to sleep until the next deadline
//!
//! A firing timer re-checks the entry before removing it, so a value that was
//! overwritten after its timer was queued survives.
//!
//! The task only holds a weak reference to the store. It exits when the
//! handle is dropped or when the last store handle goes away.

use crate::storage::engine::{ExpiringStore, WeakStore};
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;
use tracing::{debug, info};

/// Configuration for the expiry driver.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Maximum number of timers fired per lock acquisition (default: 512)
    pub max_batch: usize,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self { max_batch: 512 }
    }
}

impl ExpiryConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batch size. Values below 1 are raised to 1.
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }
}

/// A handle to the running expiry driver.
///
/// When this handle is dropped, the driver task will be stopped.
#[derive(Debug)]
pub struct ExpiryDriver {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl ExpiryDriver {
    /// Starts the expiry driver for `store` as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use flashcache::storage::{ExpiringStore, ExpiryDriver, ExpiryConfig};
    ///
    /// let store: ExpiringStore = ExpiringStore::new();
    /// let driver = ExpiryDriver::start(&store, ExpiryConfig::default());
    ///
    /// // Timers fire in the background...
    ///
    /// // Dropping the driver will stop it
    /// drop(driver);
    /// ```
    pub fn start<K, V>(store: &ExpiringStore<K, V>, config: ExpiryConfig) -> Self
    where
        K: Eq + Hash + Clone + Send + 'static,
        V: Clone + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(driver_loop(
            store.downgrade(),
            store.wakeup(),
            config,
            shutdown_rx,
        ));

        info!("Background expiry driver started");

        Self { shutdown_tx }
    }

    /// Stops the expiry driver.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!("Background expiry driver stopped");
        }
    }
}

impl Drop for ExpiryDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// The main driver loop.
async fn driver_loop<K, V>(
    store: WeakStore<K, V>,
    wakeup: Arc<Notify>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    K: Eq + Hash + Clone,
    V: Clone,
{
    loop {
        let next_deadline = {
            let Some(store) = store.upgrade() else {
                debug!("Store dropped, expiry driver exiting");
                return;
            };

            let removed = store.fire_due_timers(Instant::now(), config.max_batch);
            if removed > 0 {
                debug!(
                    removed = removed,
                    pending = store.pending_timers(),
                    "Expired keys removed by timer"
                );
            }

            store.next_deadline()
        };

        tokio::select! {
            _ = sleep_until(next_deadline) => {}
            _ = wakeup.notified() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry driver received shutdown signal");
                    return;
                }
            }
        }
    }
}

/// Starts the expiry driver with default configuration.
pub fn start_expiry_driver<K, V>(store: &ExpiringStore<K, V>) -> ExpiryDriver
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    ExpiryDriver::start(store, ExpiryConfig::default())
}
