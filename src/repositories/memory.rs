//! In-memory implementation of the job, scope and catalog stores
//!
//! Used by tests and by `--database-url memory` dry runs. Every operation
//! takes a single lock so claims and catalog deltas are atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::traits::{CatalogStore, JobStore, ScopeStore};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{
    CatalogDelta, CatalogEntry, Job, JobState, JobType, NewJob, NewScope, Scope, ScopeCatalog,
};

#[derive(Debug, Default)]
struct Tables {
    jobs: BTreeMap<i64, Job>,
    scopes: BTreeMap<i64, Scope>,
    entries: BTreeMap<i64, CatalogEntry>,
    next_job_id: i64,
    next_scope_id: i64,
    next_entry_id: i64,
}

impl Tables {
    fn allocate(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn insert(&self, job: NewJob) -> RepositoryResult<Job> {
        let mut tables = self.tables.lock().await;
        let id = Tables::allocate(&mut tables.next_job_id);
        let record = Job {
            id,
            job_id: job.job_id,
            state: JobState::Queued,
            attempt_count: 0,
            max_attempts: job.max_attempts,
            status_description: None,
            last_attempt_started_at: None,
            payload: job.payload,
            created_at: job.created_at,
            updated_at: job.created_at,
        };
        tables.jobs.insert(id, record.clone());
        Ok(record)
    }

    async fn find_oldest_queued(
        &self,
        job_types: &[JobType],
        _now: DateTime<Utc>,
    ) -> RepositoryResult<Option<Job>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .jobs
            .values()
            .filter(|job| job.state == JobState::Queued && job_types.contains(&job.job_type()))
            .min_by_key(|job| (job.created_at, job.id))
            .cloned())
    }

    async fn claim(
        &self,
        id: i64,
        now: DateTime<Utc>,
        attempt_ceiling: i32,
    ) -> RepositoryResult<Option<Job>> {
        let mut tables = self.tables.lock().await;
        match tables.jobs.get_mut(&id) {
            Some(job) if job.state == JobState::Queued => {
                job.mark_claimed(now, attempt_ceiling);
                Ok(Some(job.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn save(&self, job: &Job) -> RepositoryResult<()> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| RepositoryError::record_not_found("jobs", "id", job.id))?;
        stored.state = job.state;
        stored.attempt_count = job.attempt_count;
        stored.max_attempts = job.max_attempts;
        stored.status_description = job.status_description.clone();
        stored.last_attempt_started_at = job.last_attempt_started_at;
        stored.updated_at = job.updated_at;
        Ok(())
    }

    async fn find_by_job_id(&self, job_id: Uuid) -> RepositoryResult<Option<Job>> {
        let tables = self.tables.lock().await;
        Ok(tables.jobs.values().find(|job| job.job_id == job_id).cloned())
    }

    async fn list_recent(&self, limit: u64) -> RepositoryResult<Vec<Job>> {
        let tables = self.tables.lock().await;
        let mut jobs: Vec<Job> = tables.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        jobs.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(jobs)
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn load_scope_catalog(&self, scope_id: i64) -> RepositoryResult<Option<ScopeCatalog>> {
        let tables = self.tables.lock().await;
        let Some(scope) = tables.scopes.get(&scope_id).cloned() else {
            return Ok(None);
        };
        let entries = tables
            .entries
            .values()
            .filter(|entry| entry.scope_id == scope_id)
            .cloned()
            .collect();
        Ok(Some(ScopeCatalog { scope, entries }))
    }

    async fn load_entries_for_scope(&self, scope_id: i64) -> RepositoryResult<Vec<CatalogEntry>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .entries
            .values()
            .filter(|entry| entry.scope_id == scope_id)
            .cloned()
            .collect())
    }

    async fn apply_catalog_delta(
        &self,
        scope_id: i64,
        delta: CatalogDelta,
        destructive: bool,
    ) -> RepositoryResult<()> {
        let mut tables = self.tables.lock().await;

        if !tables.scopes.contains_key(&scope_id) {
            return Err(RepositoryError::record_not_found("sync_scopes", "id", scope_id));
        }
        // Validate everything up front so a bad delta leaves no partial writes
        for entry in delta.to_update.iter().chain(delta.to_retire.iter()) {
            if !tables
                .entries
                .get(&entry.id)
                .is_some_and(|stored| stored.scope_id == scope_id)
            {
                return Err(RepositoryError::record_not_found(
                    "catalog_entries",
                    "id",
                    entry.id,
                ));
            }
        }

        for new_entry in delta.to_add {
            let id = Tables::allocate(&mut tables.next_entry_id);
            tables.entries.insert(
                id,
                CatalogEntry {
                    id,
                    scope_id,
                    title: new_entry.title,
                    group: new_entry.group,
                    tvg_id: new_entry.tvg_id,
                    media_url: new_entry.media_url,
                    logo_url: new_entry.logo_url,
                    is_active: true,
                    created_at: new_entry.created_at,
                    updated_at: new_entry.created_at,
                },
            );
        }
        for entry in delta.to_update {
            tables.entries.insert(entry.id, entry);
        }
        for entry in delta.to_retire {
            if destructive {
                tables.entries.remove(&entry.id);
            } else {
                tables.entries.insert(entry.id, entry);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ScopeStore for InMemoryStore {
    async fn create_scope(&self, scope: NewScope, now: DateTime<Utc>) -> RepositoryResult<Scope> {
        let mut tables = self.tables.lock().await;
        let id = Tables::allocate(&mut tables.next_scope_id);
        let record = Scope {
            id,
            kind: scope.kind,
            name: scope.name,
            url: scope.url,
            is_enabled: scope.is_enabled,
            created_at: now,
            updated_at: now,
        };
        tables.scopes.insert(id, record.clone());
        Ok(record)
    }

    async fn find_scope(&self, id: i64) -> RepositoryResult<Option<Scope>> {
        let tables = self.tables.lock().await;
        Ok(tables.scopes.get(&id).cloned())
    }

    async fn set_scope_enabled(
        &self,
        id: i64,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.scopes.get_mut(&id) {
            Some(scope) => {
                scope.is_enabled = enabled;
                scope.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_scopes(&self) -> RepositoryResult<Vec<Scope>> {
        let tables = self.tables.lock().await;
        Ok(tables.scopes.values().cloned().collect())
    }
}
