//! Server Facade
//!
//! A `Server` owns exactly one [`ExpiringStore`] and, when a Tokio runtime is
//! available, the [`ExpiryDriver`] that actively expires its keys. Every
//! construction allocates a fresh store; nothing is shared between servers.

use crate::storage::{ExpiringStore, ExpiryConfig, ExpiryDriver};
use bytes::Bytes;
use std::hash::Hash;
use tokio::runtime::Handle;
use tracing::{info, warn};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Start a background expiry driver (default: true)
    pub active_expiration: bool,
    /// Initial capacity of the store (default: 0)
    pub initial_capacity: usize,
    /// Settings for the expiry driver
    pub expiry: ExpiryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            active_expiration: true,
            initial_capacity: 0,
            expiry: ExpiryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the background expiry driver.
    pub fn with_active_expiration(mut self, enabled: bool) -> Self {
        self.active_expiration = enabled;
        self
    }

    /// Sets the initial store capacity.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Sets the expiry driver configuration.
    pub fn with_expiry(mut self, expiry: ExpiryConfig) -> Self {
        self.expiry = expiry;
        self
    }
}

/// A server handing out its own store.
#[derive(Debug)]
pub struct Server<K = String, V = Bytes> {
    store: ExpiringStore<K, V>,
    driver: Option<ExpiryDriver>,
}

impl<K, V> Server<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Builds a server with a new, empty store.
    ///
    /// Active expiration needs a running Tokio runtime. Without one the
    /// server falls back to lazy expiry only, which still never returns
    /// expired values.
    pub fn new(config: ServerConfig) -> Self {
        let store = ExpiringStore::with_capacity(config.initial_capacity);

        let driver = if !config.active_expiration {
            None
        } else if Handle::try_current().is_ok() {
            Some(ExpiryDriver::start(&store, config.expiry))
        } else {
            warn!("No Tokio runtime available, active expiration disabled");
            None
        };

        info!(
            active_expiration = driver.is_some(),
            "Server store initialized"
        );

        Self { store, driver }
    }

    /// Returns the store owned by this server.
    pub fn store(&self) -> &ExpiringStore<K, V> {
        &self.store
    }

    /// Returns true if a background expiry driver is running.
    pub fn is_actively_expiring(&self) -> bool {
        self.driver.is_some()
    }
}

/// Builds a server with a new, empty store.
pub fn create_server<K, V>(config: ServerConfig) -> Server<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    Server::new(config)
}
