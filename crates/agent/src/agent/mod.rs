//! The offline cache agent.
//!
//! Three entry points, one per host lifecycle event:
//!
//! - [`OfflineAgent::install`] precaches the manifest into the current
//!   generation
//! - [`OfflineAgent::activate`] deletes every other generation
//! - [`OfflineAgent::handle_fetch`] answers a request cache-first, or
//!   declines to intercept it
//!
//! Each handler's returned future is what the host waits on before moving
//! to the next lifecycle phase.

mod activate;
mod fetch;
mod install;

use std::sync::Arc;

use docscan_client::Network;
use docscan_core::{AgentConfig, BypassRules, CacheGeneration, CacheStorage, Error, PrecacheManifest, Request};
use tokio::sync::OnceCell;
use url::Url;

pub use activate::{ActivateReport, DeletionOutcome, DeletionStatus};
pub use fetch::{FetchDecision, Served, ServedFrom, should_cache};
pub use install::{InstallReport, PrecacheOutcome, PrecacheStatus};

/// Delivered once when a new version is registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallEvent;

/// Delivered once when this version takes control.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivateEvent;

/// Delivered for every request made by a page in scope.
#[derive(Debug, Clone)]
pub struct FetchEvent {
    pub request: Request,
}

impl FetchEvent {
    pub fn new(request: Request) -> Self {
        Self { request }
    }
}

/// Cache policy over a generation store and a network.
pub struct OfflineAgent {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    version: String,
    manifest: PrecacheManifest,
    bypass: BypassRules,
    offline_fallback: Url,
    /// Handle to the current generation, opened on first use.
    current: OnceCell<Arc<dyn CacheGeneration>>,
}

impl OfflineAgent {
    pub fn new(config: &AgentConfig, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Result<Self, Error> {
        config.validate().map_err(|e| Error::InvalidInput(e.to_string()))?;

        let manifest = config.manifest().map_err(|e| Error::InvalidInput(e.to_string()))?;
        let offline_fallback = config.offline_fallback_url().map_err(|e| Error::InvalidInput(e.to_string()))?;

        Ok(Self {
            storage,
            network,
            version: config.cache_version.clone(),
            manifest,
            bypass: config.bypass_rules(),
            offline_fallback,
            current: OnceCell::new(),
        })
    }

    /// Name of the current cache generation.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn manifest(&self) -> &PrecacheManifest {
        &self.manifest
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// The only generation this agent ever writes to.
    ///
    /// Opened (and created if absent) once, then reused.
    async fn current(&self) -> Result<Arc<dyn CacheGeneration>, Error> {
        let generation = self.current.get_or_try_init(|| self.storage.open(&self.version)).await?;
        Ok(Arc::clone(generation))
    }
}

impl std::fmt::Debug for OfflineAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineAgent")
            .field("version", &self.version)
            .field("manifest", &self.manifest)
            .field("bypass", &self.bypass)
            .field("offline_fallback", &self.offline_fallback.as_str())
            .finish_non_exhaustive()
    }
}
