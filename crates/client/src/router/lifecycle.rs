//! Generation lifecycle: install and activate.
//!
//! ```text
//! parsed ──install──▶ installing ──▶ installed ──activate──▶ activating ──▶ activated
//!                          │
//!                          └──failure──▶ redundant ──install (retry)──▶ installing
//! ```

use std::fmt;

use celi_core::{CachedResponse, Error, cache::hash::compute_entry_key};
use tokio::task::JoinSet;

use super::CacheRouter;
use super::response::{response_type_for, snapshot};
use crate::fetch::{FetchRequest, resolve};

/// Lifecycle state of the router's cache generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    /// Controlling clients: asset requests go through the cache.
    Activated,
    /// Install failed; nothing of this generation was stored.
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

impl CacheRouter {
    /// Fetch every manifest asset and store them in the current generation.
    ///
    /// The manifest is fetched concurrently. Any transport failure or
    /// non-success status aborts the install before anything is written;
    /// on success all entries are committed in one transaction. Returns the
    /// number of stored entries.
    pub async fn install(&self) -> Result<usize, Error> {
        self.transition(&[WorkerState::Parsed, WorkerState::Redundant], WorkerState::Installing)
            .await?;

        let cache_name = self.config.cache_name.as_str();
        tracing::info!(cache = cache_name, assets = self.config.manifest.len(), "installing cache generation");

        let result = match self.fetch_manifest().await {
            Ok(entries) => self.db.install_entries(cache_name, entries).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(count) => {
                self.set_state(WorkerState::Installed).await;
                tracing::info!(cache = cache_name, entries = count, "cache generation installed");
                Ok(count)
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant).await;
                tracing::error!(cache = cache_name, error = %e, "install failed; generation left inactive");
                Err(e)
            }
        }
    }

    /// Delete every other generation and take control of clients.
    ///
    /// Returns the names of the deleted buckets.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.transition(&[WorkerState::Installed], WorkerState::Activating).await?;

        match self.purge_stale_generations().await {
            Ok(deleted) => {
                self.set_state(WorkerState::Activated).await;
                tracing::info!(
                    cache = %self.config.cache_name,
                    deleted = deleted.len(),
                    "cache generation activated; controlling clients"
                );
                Ok(deleted)
            }
            Err(e) => {
                self.set_state(WorkerState::Installed).await;
                tracing::error!(cache = %self.config.cache_name, error = %e, "activation failed");
                Err(e)
            }
        }
    }

    /// Install, then activate immediately without waiting for old clients.
    ///
    /// A generation is installed once. If its bucket was already stored in
    /// full by an earlier run, the install step is skipped, so a restart
    /// while the origin is unreachable still serves the stored assets.
    pub async fn start(&self) -> Result<(), Error> {
        let cache_name = self.config.cache_name.as_str();
        if self.db.is_installed(cache_name).await? {
            self.transition(&[WorkerState::Parsed, WorkerState::Redundant], WorkerState::Installed)
                .await?;
            tracing::info!(cache = cache_name, "cache generation already installed; skipping install");
        } else {
            self.install().await?;
        }
        self.activate().await?;
        Ok(())
    }

    /// Delete every bucket whose name is not the current generation.
    pub async fn purge_stale_generations(&self) -> Result<Vec<String>, Error> {
        let deleted = self.db.delete_buckets_except(&self.config.cache_name).await?;
        for name in &deleted {
            tracing::info!(bucket = %name, "deleted stale cache generation");
        }
        Ok(deleted)
    }

    async fn fetch_manifest(&self) -> Result<Vec<(String, CachedResponse)>, Error> {
        let urls = self
            .config
            .manifest
            .iter()
            .map(|entry| {
                resolve(entry, &self.config.origin)
                    .map_err(|e| Error::InstallFailed { url: entry.clone(), reason: e.to_string() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut slots: Vec<Option<(String, CachedResponse)>> = vec![None; urls.len()];
        let mut join_set = JoinSet::new();

        for (index, url) in urls.into_iter().enumerate() {
            let network = self.network.clone();
            join_set.spawn(async move {
                let result = network.fetch(&FetchRequest::get(url.clone())).await;
                (index, url, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            let (index, url, result) =
                joined.map_err(|e| Error::InstallFailed { url: "<manifest task>".into(), reason: e.to_string() })?;

            let response = result.map_err(|e| Error::InstallFailed { url: url.to_string(), reason: e.to_string() })?;

            if !response.status.is_success() {
                return Err(Error::InstallFailed {
                    url: url.to_string(),
                    reason: format!("status {}", response.status.as_u16()),
                });
            }

            let response_type = response_type_for(&response.final_url, &self.config.origin);
            tracing::debug!(url = %url, %response_type, "manifest asset fetched");
            slots[index] = Some((compute_entry_key(url.as_str()), snapshot(&url, &response, response_type)));
        }

        Ok(slots.into_iter().flatten().collect())
    }

    async fn transition(&self, from: &[WorkerState], to: WorkerState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if !from.contains(&*state) {
            return Err(Error::Lifecycle(format!("cannot move from {} to {}", *state, to)));
        }
        *state = to;
        Ok(())
    }

    async fn set_state(&self, next: WorkerState) {
        *self.state.write().await = next;
    }
}
