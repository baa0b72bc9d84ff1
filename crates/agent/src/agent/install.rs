//! Install handler: precache the manifest.

use docscan_core::{CacheGeneration, Error, Request, RequestMode, Response};
use futures::future::try_join_all;
use serde::Serialize;
use url::Url;

use super::{InstallEvent, OfflineAgent};

/// What happened to one manifest URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrecacheOutcome {
    pub url: String,
    #[serde(flatten)]
    pub status: PrecacheStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PrecacheStatus {
    Stored,
    /// Best-effort entry that could not be stored.
    Skipped { reason: String },
}

/// Result of a successful install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub generation: String,
    pub precached: Vec<PrecacheOutcome>,
    /// Activate right away instead of waiting for open pages to close.
    pub skip_waiting: bool,
}

impl InstallReport {
    pub fn stored(&self) -> impl Iterator<Item = &str> {
        self.precached
            .iter()
            .filter(|o| o.status == PrecacheStatus::Stored)
            .map(|o| o.url.as_str())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &PrecacheOutcome> {
        self.precached
            .iter()
            .filter(|o| matches!(o.status, PrecacheStatus::Skipped { .. }))
    }
}

impl OfflineAgent {
    /// Populate the current generation from the precache manifest.
    ///
    /// Same-origin entries are all-or-nothing: every one is fetched first
    /// and nothing is written unless all of them answered OK. External
    /// entries are fetched in CORS mode and are allowed to fail.
    ///
    /// # Errors
    ///
    /// Returns `Error::Precache` if a same-origin entry cannot be fetched,
    /// answers with a non-OK status or cannot be stored. The host should
    /// discard this version.
    pub async fn install(&self, _event: InstallEvent) -> Result<InstallReport, Error> {
        let generation = self.current().await?;
        tracing::info!(generation = %self.version, "installing");

        let local: Vec<Request> = self.manifest.same_origin().cloned().map(Request::get).collect();
        let responses = try_join_all(local.iter().map(|request| self.fetch_for_precache(request))).await?;

        let mut precached = Vec::with_capacity(self.manifest.entries().len());
        for (request, response) in local.iter().zip(responses) {
            generation.put(request, &response).await.map_err(|e| precache_error(&request.url, e))?;
            precached.push(PrecacheOutcome { url: request.url.to_string(), status: PrecacheStatus::Stored });
        }

        for url in self.manifest.external() {
            let request = Request::get(url.clone()).with_mode(RequestMode::Cors);
            let status = match self.precache_one(generation.as_ref(), &request).await {
                Ok(()) => PrecacheStatus::Stored,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "could not precache external asset (likely offline)");
                    PrecacheStatus::Skipped { reason: e.to_string() }
                }
            };
            precached.push(PrecacheOutcome { url: url.to_string(), status });
        }

        let report = InstallReport { generation: self.version.clone(), precached, skip_waiting: true };
        tracing::info!(
            generation = %report.generation,
            stored = report.stored().count(),
            skipped = report.skipped().count(),
            "installed"
        );
        Ok(report)
    }

    async fn precache_one(&self, generation: &dyn CacheGeneration, request: &Request) -> Result<(), Error> {
        let response = self.fetch_for_precache(request).await?;
        generation.put(request, &response).await.map_err(|e| precache_error(&request.url, e))
    }

    /// Fetch a manifest entry; anything but an OK response is a failure.
    async fn fetch_for_precache(&self, request: &Request) -> Result<Response, Error> {
        let response = self.network.fetch(request).await.map_err(|e| precache_error(&request.url, e))?;
        if !response.is_ok() {
            return Err(Error::Precache { url: request.url.to_string(), reason: format!("status {}", response.status) });
        }
        Ok(response)
    }
}

fn precache_error(url: &Url, err: impl std::fmt::Display) -> Error {
    Error::Precache { url: url.to_string(), reason: err.to_string() }
}
