//! Offline-cache router.
//!
//! Decides for every request whether it is answered from the current cache
//! generation, from the network, or from the synthesized offline response,
//! and keeps the set of stored generations in line with the deployed one.
//!
//! ### Routing
//! - API calls and page navigations are network-only. When the network is
//!   unreachable they get a plain-text offline response instead of an error.
//! - Static assets are cache-first. A miss goes to the network and a
//!   same-origin `200` is stored for next time; errors and cross-origin
//!   responses pass through unstored.
//! - Until the router is activated, assets go straight to the network.
//!
//! ### Lifecycle
//! See [`lifecycle`] for install/activate.

pub mod classify;
pub mod lifecycle;
pub mod response;

use std::sync::Arc;

use celi_core::{AppConfig, CacheDb, CachedResponse, Error, ResponseType, cache::hash::compute_entry_key};
use reqwest::StatusCode;
use tokio::sync::RwLock;
use url::Url;

use crate::fetch::{Network, normalize};

pub use classify::{Destination, RequestMode, RouteRequest, Strategy, classify};
pub use lifecycle::WorkerState;
pub use response::{ResponseSource, RoutedResponse};

use response::{response_type_for, snapshot};

/// Router settings for one deployed generation.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Name of the current generation's bucket.
    pub cache_name: String,
    /// App origin; responses from it are `basic`.
    pub origin: Url,
    /// Assets cached at install, relative to `origin` unless absolute.
    pub manifest: Vec<String>,
    pub api_markers: Vec<String>,
    pub offline_message: String,
}

impl RouterConfig {
    /// Settings with the built-in manifest, markers, and offline text.
    pub fn new(cache_name: impl Into<String>, origin: Url) -> Self {
        let defaults = AppConfig::default();
        Self {
            cache_name: cache_name.into(),
            origin,
            manifest: defaults.manifest,
            api_markers: defaults.api_markers,
            offline_message: defaults.offline_message,
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            cache_name: config.cache_name.clone(),
            origin,
            manifest: config.manifest.clone(),
            api_markers: config.api_markers.clone(),
            offline_message: config.offline_message.clone(),
        })
    }
}

/// Routes requests between the cache generation, the network, and the
/// offline fallback.
///
/// Cloning is cheap; clones share storage, network, and lifecycle state.
#[derive(Clone)]
pub struct CacheRouter {
    config: Arc<RouterConfig>,
    db: CacheDb,
    network: Arc<dyn Network>,
    state: Arc<RwLock<WorkerState>>,
}

impl CacheRouter {
    pub fn new(config: RouterConfig, db: CacheDb, network: Arc<dyn Network>) -> Self {
        Self { config: Arc::new(config), db, network, state: Arc::new(RwLock::new(WorkerState::Parsed)) }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Answer one request.
    ///
    /// # Errors
    ///
    /// Cache-first and passthrough requests fail when the network fails and
    /// nothing is stored for them. API and navigation requests get the
    /// offline response when the network is unreachable and fail only for
    /// other fetch errors, such as an oversized body.
    pub async fn handle(&self, request: RouteRequest) -> Result<RoutedResponse, Error> {
        let strategy = classify(&request, &self.config.api_markers);
        let controlling = self.state().await == WorkerState::Activated;

        tracing::debug!(method = %request.fetch.method, url = %request.url(), ?strategy, controlling, "routing request");

        match strategy {
            Strategy::NetworkOnly => self.network_only(&request).await,
            Strategy::CacheFirst if controlling => self.cache_first(&request).await,
            Strategy::CacheFirst | Strategy::Passthrough => self.passthrough(&request).await,
        }
    }

    /// Stored entry for a URL in the current generation, if any.
    pub async fn lookup(&self, url: &Url) -> Result<Option<CachedResponse>, Error> {
        let url = normalize(url.clone()).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        self.db
            .match_entry(&self.config.cache_name, &compute_entry_key(url.as_str()))
            .await
    }

    async fn network_only(&self, request: &RouteRequest) -> Result<RoutedResponse, Error> {
        match self.network.fetch(&request.fetch).await {
            Ok(response) => {
                let response_type = response_type_for(&response.final_url, &self.config.origin);
                Ok(RoutedResponse::from_network(response, response_type))
            }
            Err(e) if e.is_network() => {
                tracing::warn!(url = %request.url(), error = %e, "network unavailable; serving offline response");
                Ok(RoutedResponse::offline(&self.config.offline_message))
            }
            Err(e) => Err(e),
        }
    }

    async fn passthrough(&self, request: &RouteRequest) -> Result<RoutedResponse, Error> {
        let response = self.network.fetch(&request.fetch).await?;
        let response_type = response_type_for(&response.final_url, &self.config.origin);
        Ok(RoutedResponse::from_network(response, response_type))
    }

    async fn cache_first(&self, request: &RouteRequest) -> Result<RoutedResponse, Error> {
        let url = normalize(request.url().clone()).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let key = compute_entry_key(url.as_str());
        let cache_name = self.config.cache_name.as_str();

        match self.db.match_entry(cache_name, &key).await {
            Ok(Some(entry)) => {
                tracing::debug!(url = %url, "cache hit");
                return Ok(RoutedResponse::from_cache(entry));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(url = %url, error = %e, "cache lookup failed; using network"),
        }

        let response = self.network.fetch(&request.fetch).await?;
        let response_type = response_type_for(&response.final_url, &self.config.origin);

        if response.status != StatusCode::OK || response_type != ResponseType::Basic {
            tracing::debug!(
                url = %url,
                status = response.status.as_u16(),
                %response_type,
                "response not cacheable; passing through"
            );
            return Ok(RoutedResponse::from_network(response, response_type));
        }

        let entry = snapshot(&url, &response, response_type);
        if let Err(e) = self.db.put_entry(cache_name, &key, &entry).await {
            tracing::warn!(url = %url, error = %e, "failed to store response");
        }

        Ok(RoutedResponse::from_network(response, response_type))
    }
}
