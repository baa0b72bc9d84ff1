//! Activate handler: drop every generation but the current one.

use futures::future::join_all;
use serde::Serialize;

use docscan_core::Error;

use super::{ActivateEvent, OfflineAgent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionOutcome {
    pub generation: String,
    #[serde(flatten)]
    pub status: DeletionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeletionStatus {
    Deleted,
    /// Already gone by the time the delete ran.
    Missing,
    Failed { reason: String },
}

/// Result of an activation.
#[derive(Debug, Clone, Serialize)]
pub struct ActivateReport {
    pub generation: String,
    pub deletions: Vec<DeletionOutcome>,
    /// Take control of already-open pages without a reload.
    pub claimed_clients: bool,
}

impl ActivateReport {
    pub fn deleted(&self) -> impl Iterator<Item = &str> {
        self.deletions
            .iter()
            .filter(|d| d.status == DeletionStatus::Deleted)
            .map(|d| d.generation.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = &DeletionOutcome> {
        self.deletions
            .iter()
            .filter(|d| matches!(d.status, DeletionStatus::Failed { .. }))
    }
}

impl OfflineAgent {
    /// Delete every stale generation concurrently, then claim clients.
    ///
    /// A failed deletion is reported in its outcome and does not stop the
    /// others; it is retried on the next activation.
    ///
    /// # Errors
    ///
    /// Returns an error only if the generation names cannot be listed.
    pub async fn activate(&self, _event: ActivateEvent) -> Result<ActivateReport, Error> {
        let stale: Vec<String> = self.storage.keys().await?.into_iter().filter(|name| *name != self.version).collect();

        let deletions = join_all(stale.into_iter().map(|generation| async move {
            let status = match self.storage.delete(&generation).await {
                Ok(true) => {
                    tracing::info!(generation = %generation, "deleted old cache generation");
                    DeletionStatus::Deleted
                }
                Ok(false) => DeletionStatus::Missing,
                Err(e) => {
                    tracing::warn!(generation = %generation, error = %e, "failed to delete old cache generation");
                    DeletionStatus::Failed { reason: e.to_string() }
                }
            };
            DeletionOutcome { generation, status }
        }))
        .await;

        let report = ActivateReport { generation: self.version.clone(), deletions, claimed_clients: true };
        tracing::info!(
            generation = %report.generation,
            deleted = report.deleted().count(),
            failed = report.failed().count(),
            "activated"
        );
        Ok(report)
    }
}
