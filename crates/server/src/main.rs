//! celi-proxy entry point.
//!
//! Logging goes to stderr as JSON.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    celi_server::init_tracing();

    let config = celi_core::AppConfig::load()?;
    tracing::info!(cache = %config.cache_name, db = %config.db_path.display(), "starting celi proxy");

    celi_server::serve(config).await
}
