//! Catalog reconciliation
//!
//! Computes the add/update/retire delta between a freshly fetched document
//! and the entries already persisted for a scope, then applies it through a
//! [`CatalogStore`] in one unit of work.
//!
//! Entries are matched on `(title, group)` with exact string comparison.
//! After a successful pass every surviving entry of the scope is either
//! present in the document (active) or absent from it (inactive, soft mode).

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::errors::RepositoryError;
use crate::models::{
    CatalogDelta, CatalogEntry, CatalogKey, ChannelRecord, NewCatalogEntry, Scope, ScopeCatalog,
};
use crate::repositories::CatalogStore;
use crate::utils::Clock;

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Synchronisation against a disabled scope is refused
    #[error("Scope '{name}' ({id}) is not enabled")]
    ScopeDisabled { id: i64, name: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A computed delta, ready to be applied
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan {
    pub scope: Scope,
    pub delta: CatalogDelta,
    pub destructive: bool,
    pub skipped_blank: usize,
    pub skipped_duplicate: usize,
}

/// Outcome of an applied reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    pub added: usize,
    pub updated: usize,
    pub retired: usize,
    pub destructive: bool,
    pub skipped_blank: usize,
    pub skipped_duplicate: usize,
}

impl ReconcileReport {
    fn from_plan(plan: &ReconcilePlan) -> Self {
        Self {
            added: plan.delta.to_add.len(),
            updated: plan.delta.to_update.len(),
            retired: plan.delta.to_retire.len(),
            destructive: plan.destructive,
            skipped_blank: plan.skipped_blank,
            skipped_duplicate: plan.skipped_duplicate,
        }
    }

    /// Human readable summary, stored as the job's status note
    pub fn summary(&self, scope_name: &str) -> String {
        let retired_label = if self.destructive { "deleted" } else { "deactivated" };
        format!(
            "Catalog '{}' synced: {} added; {} updated; {} {}",
            scope_name, self.added, self.updated, self.retired, retired_label
        )
    }
}

/// Compute the delta for one scope
///
/// The catalog is consumed: updated and retired entries are moved into the
/// delta with their new field values and timestamps already applied.
pub fn plan(
    catalog: ScopeCatalog,
    records: &[ChannelRecord],
    allow_destructive_retirement: bool,
    now: DateTime<Utc>,
) -> Result<ReconcilePlan, ReconcileError> {
    let ScopeCatalog { scope, entries } = catalog;

    if !scope.is_enabled {
        return Err(ReconcileError::ScopeDisabled {
            id: scope.id,
            name: scope.name,
        });
    }

    // First stored row per key is matched; any extra rows sharing it count as missing
    let mut indexed: HashMap<CatalogKey, CatalogEntry> = HashMap::with_capacity(entries.len());
    let mut unmatched_duplicates: Vec<CatalogEntry> = Vec::new();
    for entry in entries {
        let key = entry.key();
        if indexed.contains_key(&key) {
            unmatched_duplicates.push(entry);
        } else {
            indexed.insert(key, entry);
        }
    }

    let mut delta = CatalogDelta::default();
    let mut processed: HashSet<CatalogKey> = HashSet::with_capacity(records.len());
    let mut skipped_blank = 0;
    let mut skipped_duplicate = 0;

    for record in records {
        if record.is_blank() {
            skipped_blank += 1;
            continue;
        }

        let key = record.key();
        if processed.contains(&key) {
            skipped_duplicate += 1;
            debug!(
                "Skipping duplicate channel '{}' (group {:?}) in scope {}",
                record.title, record.group, scope.id
            );
            continue;
        }

        match indexed.remove(&key) {
            Some(mut entry) => {
                entry.title = record.title.clone();
                entry.group = record.group.clone();
                entry.tvg_id = record.tvg_id.clone();
                entry.media_url = record.media_url.clone();
                entry.logo_url = record.logo_url.clone();
                entry.is_active = true;
                entry.updated_at = now;
                delta.to_update.push(entry);
            }
            None => delta.to_add.push(NewCatalogEntry {
                scope_id: scope.id,
                title: record.title.clone(),
                group: record.group.clone(),
                tvg_id: record.tvg_id.clone(),
                media_url: record.media_url.clone(),
                logo_url: record.logo_url.clone(),
                created_at: now,
            }),
        }
        processed.insert(key);
    }

    // Whatever is still indexed was never seen in this fetch
    let mut missing: Vec<CatalogEntry> = indexed.into_values().collect();
    missing.extend(unmatched_duplicates);
    missing.sort_by_key(|entry| entry.id);

    for mut entry in missing {
        if allow_destructive_retirement {
            delta.to_retire.push(entry);
        } else if entry.is_active {
            entry.is_active = false;
            entry.updated_at = now;
            delta.to_retire.push(entry);
        }
    }

    Ok(ReconcilePlan {
        scope,
        delta,
        destructive: allow_destructive_retirement,
        skipped_blank,
        skipped_duplicate,
    })
}

/// Persist a computed plan in one unit of work
pub async fn apply(
    store: &dyn CatalogStore,
    plan: ReconcilePlan,
) -> Result<ReconcileReport, ReconcileError> {
    let report = ReconcileReport::from_plan(&plan);
    if plan.delta.is_empty() {
        debug!("Scope {} has no catalog changes", plan.scope.id);
        return Ok(report);
    }

    store
        .apply_catalog_delta(plan.scope.id, plan.delta, plan.destructive)
        .await?;
    Ok(report)
}

/// Plans and applies catalog deltas against a store
#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn CatalogStore>,
    clock: Arc<dyn Clock>,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn CatalogStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn reconcile(
        &self,
        catalog: ScopeCatalog,
        records: &[ChannelRecord],
        allow_destructive_retirement: bool,
    ) -> Result<ReconcileReport, ReconcileError> {
        let scope_name = catalog.scope.name.clone();
        let plan = plan(
            catalog,
            records,
            allow_destructive_retirement,
            self.clock.now(),
        )?;
        let report = apply(self.store.as_ref(), plan).await?;

        info!(
            "Reconciled scope '{}': {} added, {} updated, {} retired ({} blank, {} duplicate records skipped)",
            scope_name,
            report.added,
            report.updated,
            report.retired,
            report.skipped_blank,
            report.skipped_duplicate
        );
        Ok(report)
    }
}
