//! Catalog synchronisation job handler
//!
//! Body of `ProviderSync` and `PlaylistSync` jobs: load the scope, check its
//! preconditions, fetch the document and reconcile the catalog.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::reconcile::{ReconcileError, ReconciliationEngine};
use crate::errors::AppError;
use crate::job_scheduling::{Job, JobHandler, JobOutcome, JobPayload};
use crate::models::ScopeKind;
use crate::repositories::CatalogStore;
use crate::sources::DocumentFetcher;
use crate::utils::Clock;

pub struct CatalogSyncHandler {
    store: Arc<dyn CatalogStore>,
    fetcher: Arc<dyn DocumentFetcher>,
    engine: ReconciliationEngine,
}

impl CatalogSyncHandler {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        fetcher: Arc<dyn DocumentFetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let engine = ReconciliationEngine::new(store.clone(), clock);
        Self {
            store,
            fetcher,
            engine,
        }
    }
}

fn kind_label(kind: ScopeKind) -> &'static str {
    match kind {
        ScopeKind::Provider => "Service provider",
        ScopeKind::Playlist => "Playlist",
    }
}

#[async_trait]
impl JobHandler for CatalogSyncHandler {
    async fn run(&self, job: &Job, cancel: &CancellationToken) -> Result<JobOutcome, AppError> {
        let (scope_id, allow_destructive_retirement, expected_kind) = match &job.payload {
            JobPayload::ProviderSync {
                scope_id,
                allow_destructive_retirement,
            } => (*scope_id, *allow_destructive_retirement, ScopeKind::Provider),
            JobPayload::PlaylistSync {
                scope_id,
                allow_destructive_retirement,
            } => (*scope_id, *allow_destructive_retirement, ScopeKind::Playlist),
            other => {
                return Ok(JobOutcome::Failed(format!(
                    "Catalog sync cannot process {} jobs",
                    other.job_type()
                )));
            }
        };

        let Some(catalog) = self.store.load_scope_catalog(scope_id).await? else {
            return Ok(JobOutcome::Failed(format!(
                "{} {} does not exist",
                kind_label(expected_kind),
                scope_id
            )));
        };

        if catalog.scope.kind != expected_kind {
            return Ok(JobOutcome::Failed(format!(
                "Scope {} is a {} scope, not a {} scope",
                scope_id, catalog.scope.kind, expected_kind
            )));
        }

        // Checked before any network I/O
        if !catalog.scope.is_enabled {
            return Ok(JobOutcome::Failed(format!(
                "{} is not enabled",
                kind_label(expected_kind)
            )));
        }

        let url = catalog.scope.url.clone();
        let scope_name = catalog.scope.name.clone();
        let records = self.fetcher.fetch(&url, cancel).await?;
        info!("Document with {} channels retrieved from {}", records.len(), url);

        match self
            .engine
            .reconcile(catalog, &records, allow_destructive_retirement)
            .await
        {
            Ok(report) => Ok(JobOutcome::Completed(report.summary(&scope_name))),
            Err(e @ ReconcileError::ScopeDisabled { .. }) => Ok(JobOutcome::Failed(e.to_string())),
            Err(ReconcileError::Repository(e)) => Err(e.into()),
        }
    }
}
