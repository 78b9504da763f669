//! # FlashCache - An In-Process Key-Value Cache with TTL
//!
//! FlashCache is an in-memory key-value store where every entry may carry a
//! time-to-live. It is meant for transient data living inside one process:
//! memoized computations, rate-limit counters, short-lived API responses.
//!
//! ## Features
//!
//! - **Per-Entry TTL**: Each key can expire on its own schedule
//! - **Never Stale**: An expired value is never returned by any read
//! - **Lazy + Active Expiry**: Reads delete what they find expired, and a
//!   background Tokio task removes keys at their deadline
//! - **Thread-Safe**: Store handles are cheap to clone and share across threads
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           Server                                │
//! │                                                                 │
//! │   ┌───────────────────────────────────────────┐                 │
//! │   │              ExpiringStore                │                 │
//! │   │   entries    timers    deadline queue     │<──── callers    │
//! │   └───────────────────────────────────────────┘                 │
//! │                        ▲                                        │
//! │                        │ fires due timers                       │
//! │   ┌────────────────────┴──────────────────────┐                 │
//! │   │              ExpiryDriver                 │                 │
//! │   │         (Background Tokio Task)           │                 │
//! │   └───────────────────────────────────────────┘                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use flashcache::{create_server, Server, ServerConfig, Ttl};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let server: Server = create_server(ServerConfig::default());
//!     let store = server.store();
//!
//!     store.set("user:1".to_string(), Bytes::from("Ariz"));
//!     store
//!         .set_with_ttl("otp".to_string(), Bytes::from("4242"), Duration::from_secs(30))
//!         .unwrap();
//!
//!     assert_eq!(store.get("user:1"), Some(Bytes::from("Ariz")));
//!     assert_eq!(store.ttl("user:1"), Ttl::Persistent);
//!     assert!(store.has("otp"));
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: The expiring store, its entries and the expiry driver
//! - [`server`]: Server facade owning one store per construction
//! - [`error`]: Errors for invalid TTLs
//!
//! ## Design Highlights
//!
//! ### Lazy + Active Expiry
//!
//! Keys with TTL are expired in two ways:
//! 1. **Lazy**: When a key is accessed, we check if it's expired
//! 2. **Active**: A per-key timer fires at the deadline and removes the key
//!    if it is still expired
//!
//! Whichever path sees the entry first removes it; the other becomes a no-op.

pub mod error;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use error::StoreError;
pub use server::{create_server, Server, ServerConfig};
pub use storage::{
    parse_ttl_millis, start_expiry_driver, ExpiringStore, ExpiryConfig, ExpiryDriver, StoreStats,
    Ttl,
};

/// Version of FlashCache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
