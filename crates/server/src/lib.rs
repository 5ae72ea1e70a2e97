//! Proxy host for the celi cache router.
//!
//! Opens the cache, installs and activates the configured generation, then
//! serves every request through the router until interrupted.

pub mod error;
pub mod proxy;

use std::sync::Arc;

use anyhow::{Context, Result};
use celi_client::{CacheRouter, FetchClient, FetchConfig, RouterConfig};
use celi_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

pub use error::ProxyError;
pub use proxy::{ProxyState, SOURCE_HEADER, app};

/// Install the JSON subscriber on stderr, filtered by `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();
}

/// Build the router for a loaded configuration.
pub async fn build_router(config: &AppConfig) -> Result<CacheRouter> {
    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache at {}", config.db_path.display()))?;
    let network = FetchClient::new(FetchConfig::from(config))?;
    let router_config = RouterConfig::from_app_config(config)?;

    Ok(CacheRouter::new(router_config, db, Arc::new(network)))
}

/// Run the proxy until ctrl-c.
///
/// A failed install is logged and the proxy keeps serving: until a later
/// start succeeds, assets go to the network and the offline fallback still
/// covers pages and API calls.
pub async fn serve(config: AppConfig) -> Result<()> {
    let router = build_router(&config).await?;

    if let Err(e) = router.start().await {
        tracing::error!(error = %e, cache = %config.cache_name, "cache generation not activated; serving from network");
    }

    let app = app(ProxyState { router, body_limit: config.max_bytes });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, origin = %config.origin, "celi proxy listening");

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.context("server error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
