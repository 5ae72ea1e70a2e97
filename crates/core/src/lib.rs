//! Core types and shared functionality for celi.
//!
//! This crate provides:
//! - Generation-scoped response cache with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{BucketStats, CacheDb, CachedResponse, EntrySummary, ResponseType};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
