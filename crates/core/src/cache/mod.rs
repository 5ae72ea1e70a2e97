//! SQLite-backed cache of response snapshots, grouped into generations.
//!
//! Each generation is a named bucket; entries live inside exactly one
//! bucket and disappear with it. It supports:
//!
//! - Keys derived from the normalized request URL (SHA-256)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Atomic multi-entry writes for install
//! - Bucket enumeration and deletion for activation

pub mod buckets;
pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use buckets::BucketStats;
pub use connection::CacheDb;
pub use entries::{CachedResponse, EntrySummary, ResponseType};
