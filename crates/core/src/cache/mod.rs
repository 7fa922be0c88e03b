//! SQLite-backed cache storage.
//!
//! Holds every named cache store and the background-sync queue in one
//! database, accessed asynchronously through tokio-rusqlite:
//!
//! - Stores keyed by name, entries keyed by SHA-256 of method and URL
//! - Transactional bulk writes for install-time pre-caching
//! - Cascading store deletes for version eviction
//! - Automatic schema migrations and WAL mode

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod queue;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use queue::ParkedRequest;
pub use stores::CachedEntry;
