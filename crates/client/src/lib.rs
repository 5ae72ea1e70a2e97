//! Client code for celi.
//!
//! This crate provides the HTTP fetch pipeline, the offline-cache router
//! that decides between cache, network, and the offline fallback, and a
//! typed client for the journaling backend's JSON contract.

pub mod backend;
pub mod fetch;
pub mod router;

pub use backend::{BackendClient, BackendConfig, BackendError, DashboardSnapshot, Encoding, ProfileOutcome, ProfileUpdate};
pub use fetch::{FetchClient, FetchConfig, FetchRequest, FetchResponse, Network};
pub use router::{CacheRouter, RouteRequest, RoutedResponse, RouterConfig, Strategy, WorkerState};
