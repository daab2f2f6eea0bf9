//! SQLite-backed cache store.
//!
//! The store holds named, versioned containers mapping a request identity
//! (method + URL) to the most recent successful response. It supports:
//!
//! - Explicit per-container insertion order (monotonic sequence numbers)
//! - FIFO count eviction and age-based expiration
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - A small durable key-value table for application state

pub mod connection;
pub mod entries;
pub mod eviction;
pub mod hash;
pub mod migrations;
pub mod names;
pub mod state;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CachedEntry;
pub use eviction::is_expired;
pub use names::CacheNames;
pub use state::{ACTIVE_VERSION_KEY, FIRST_LAUNCH_KEY};
