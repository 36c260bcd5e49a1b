//! Repository trait definitions
//!
//! These traits are the seams between the scheduler, the reconciliation
//! engine and persistence. Both the SeaORM repositories and the in-memory
//! store implement them with identical semantics.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::RepositoryResult;
use crate::models::{
    CatalogDelta, CatalogEntry, Job, JobType, NewJob, NewScope, Scope, ScopeCatalog,
};

/// Persisted job queue
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job in the `Queued` state with zero attempts
    async fn insert(&self, job: NewJob) -> RepositoryResult<Job>;

    /// Oldest queued job among the given types, ordered by `created_at` then `id`
    ///
    /// A queued row whose payload cannot be decoded is moved to `Failed`
    /// (stamped with `now`) and skipped.
    async fn find_oldest_queued(
        &self,
        job_types: &[JobType],
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<Job>>;

    /// Atomically move a queued job to `InProgress`
    ///
    /// `attempt_ceiling` is the limit for jobs enqueued without one; it only
    /// shapes the claim note.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Job))` - the claimed job, attempt count already incremented
    /// * `Ok(None)` - the job was not queued any more (another worker won)
    async fn claim(
        &self,
        id: i64,
        now: DateTime<Utc>,
        attempt_ceiling: i32,
    ) -> RepositoryResult<Option<Job>>;

    /// Persist state, attempt count, note and timestamps of a job
    async fn save(&self, job: &Job) -> RepositoryResult<()>;

    async fn find_by_job_id(&self, job_id: Uuid) -> RepositoryResult<Option<Job>>;

    /// Most recently created jobs first
    async fn list_recent(&self, limit: u64) -> RepositoryResult<Vec<Job>>;
}

/// Catalog persistence used by the reconciliation engine
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Load a scope with all of its entries, active or not
    async fn load_scope_catalog(&self, scope_id: i64) -> RepositoryResult<Option<ScopeCatalog>>;

    async fn load_entries_for_scope(&self, scope_id: i64) -> RepositoryResult<Vec<CatalogEntry>>;

    /// Apply a delta in one unit of work
    ///
    /// Retired entries are deleted when `destructive` is set and written back
    /// with their (inactive) state otherwise.
    async fn apply_catalog_delta(
        &self,
        scope_id: i64,
        delta: CatalogDelta,
        destructive: bool,
    ) -> RepositoryResult<()>;
}

/// Registration and lookup of sync scopes
#[async_trait]
pub trait ScopeStore: Send + Sync {
    async fn create_scope(&self, scope: NewScope, now: DateTime<Utc>) -> RepositoryResult<Scope>;

    async fn find_scope(&self, id: i64) -> RepositoryResult<Option<Scope>>;

    /// Returns false when no scope with this id exists
    async fn set_scope_enabled(
        &self,
        id: i64,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool>;

    async fn list_scopes(&self) -> RepositoryResult<Vec<Scope>>;
}
