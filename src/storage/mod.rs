//! Storage Module
//!
//! This module provides the core storage functionality for FlashCache:
//! a thread-safe key-value store with per-entry TTL and a background
//! expiry driver.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ExpiringStore                           │
//! │   entries ─── timers ─── deadline queue   (one Mutex)       │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ fires due timers
//!              ┌─────────────┴─────────────┐
//!              │       ExpiryDriver        │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **TTL Support**: Keys can have time-to-live expiry
//! - **Lazy Expiry**: Expired keys are removed when a read observes them
//! - **Active Expiry**: The driver removes keys at their deadline, even if
//!   nobody reads them again
//! - **Per-Key Timers**: Overwriting or deleting a key cancels its timer
//!
//! ## Example
//!
//! ```
//! use flashcache::storage::ExpiringStore;
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let store: ExpiringStore = ExpiringStore::new();
//!
//! // Basic operations
//! store.set("name".to_string(), Bytes::from("Ariz"));
//! assert_eq!(store.get("name"), Some(Bytes::from("Ariz")));
//!
//! // Set with TTL
//! store
//!     .set_with_ttl(
//!         "session".to_string(),
//!         Bytes::from("token123"),
//!         Duration::from_secs(3600),
//!     )
//!     .unwrap();
//! ```

pub mod engine;
pub mod entry;
pub mod expiry;

// Re-export commonly used types
pub use engine::{ExpiringStore, StoreStats};
pub use entry::{parse_ttl_millis, Entry, Ttl};
pub use expiry::{start_expiry_driver, ExpiryConfig, ExpiryDriver};
