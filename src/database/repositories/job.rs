//! SeaORM-based job queue repository
//!
//! Claims are conditional updates guarded on `state = 'queued'` and the
//! observed attempt count, so two workers can never both win the same job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::entities::{jobs, prelude::Jobs};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{Job, JobPayload, JobState, JobType, NewJob};
use crate::repositories::JobStore;

/// Status note prefix for rows failed because their payload cannot be decoded
pub const INVALID_PAYLOAD_NOTE: &str = "Invalid job payload";

/// SeaORM-based repository for job records
#[derive(Clone)]
pub struct SeaOrmJobStore {
    connection: Arc<DatabaseConnection>,
}

impl SeaOrmJobStore {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Convert SeaORM model to domain model
    fn model_to_domain(&self, model: jobs::Model) -> RepositoryResult<Job> {
        let state = JobState::from_str(&model.state)
            .map_err(|_| RepositoryError::invalid_value("jobs.state", model.state.clone()))?;
        let payload: JobPayload = serde_json::from_str(&model.payload)?;

        if payload.job_type().as_ref() != model.job_type {
            warn!(
                "Job {} has type column '{}' but a {} payload; using the payload",
                model.job_id,
                model.job_type,
                payload.job_type()
            );
        }

        Ok(Job {
            id: model.id,
            job_id: model.job_id,
            state,
            attempt_count: model.attempt_count,
            max_attempts: model.max_attempts,
            status_description: model.status_description,
            last_attempt_started_at: model.last_attempt_started_at,
            payload,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    /// Terminally fail a queued row whose payload no longer decodes
    async fn fail_undecodable(
        &self,
        id: i64,
        job_id: Uuid,
        error: &serde_json::Error,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        warn!("Job {} has an undecodable payload and will not run: {}", job_id, error);
        Jobs::update_many()
            .col_expr(jobs::Column::State, Expr::value(JobState::Failed.to_string()))
            .col_expr(
                jobs::Column::StatusDescription,
                Expr::value(format!("{INVALID_PAYLOAD_NOTE}: {error}")),
            )
            .col_expr(jobs::Column::UpdatedAt, Expr::value(now))
            .filter(jobs::Column::Id.eq(id))
            .filter(jobs::Column::State.eq(JobState::Queued.as_ref()))
            .exec(&*self.connection)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for SeaOrmJobStore {
    async fn insert(&self, job: NewJob) -> RepositoryResult<Job> {
        let payload = serde_json::to_string(&job.payload)?;

        let active_model = jobs::ActiveModel {
            job_id: Set(job.job_id),
            job_type: Set(job.payload.job_type().to_string()),
            state: Set(JobState::Queued.to_string()),
            attempt_count: Set(0),
            max_attempts: Set(job.max_attempts),
            status_description: Set(None),
            last_attempt_started_at: Set(None),
            payload: Set(payload),
            created_at: Set(job.created_at),
            updated_at: Set(job.created_at),
            ..Default::default()
        };

        let model = active_model.insert(&*self.connection).await?;
        self.model_to_domain(model)
    }

    async fn find_oldest_queued(
        &self,
        job_types: &[JobType],
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<Job>> {
        if job_types.is_empty() {
            return Ok(None);
        }

        loop {
            let Some(model) = Jobs::find()
                .filter(jobs::Column::State.eq(JobState::Queued.as_ref()))
                .filter(jobs::Column::JobType.is_in(job_types.iter().map(|t| t.to_string())))
                .order_by_asc(jobs::Column::CreatedAt)
                .order_by_asc(jobs::Column::Id)
                .one(&*self.connection)
                .await?
            else {
                return Ok(None);
            };

            let (id, job_id) = (model.id, model.job_id);
            match self.model_to_domain(model) {
                Ok(job) => return Ok(Some(job)),
                Err(RepositoryError::SerializationFailed(e)) => {
                    self.fail_undecodable(id, job_id, &e, now).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn claim(
        &self,
        id: i64,
        now: DateTime<Utc>,
        attempt_ceiling: i32,
    ) -> RepositoryResult<Option<Job>> {
        let Some(model) = Jobs::find_by_id(id).one(&*self.connection).await? else {
            return Ok(None);
        };
        let mut job = self.model_to_domain(model)?;
        if job.state != JobState::Queued {
            return Ok(None);
        }

        let observed_attempts = job.attempt_count;
        job.mark_claimed(now, attempt_ceiling);

        let result = Jobs::update_many()
            .col_expr(jobs::Column::State, Expr::value(job.state.to_string()))
            .col_expr(jobs::Column::AttemptCount, Expr::value(job.attempt_count))
            .col_expr(jobs::Column::LastAttemptStartedAt, Expr::value(Some(now)))
            .col_expr(
                jobs::Column::StatusDescription,
                Expr::value(job.status_description.clone()),
            )
            .col_expr(jobs::Column::UpdatedAt, Expr::value(now))
            .filter(jobs::Column::Id.eq(id))
            .filter(jobs::Column::State.eq(JobState::Queued.as_ref()))
            .filter(jobs::Column::AttemptCount.eq(observed_attempts))
            .exec(&*self.connection)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        Ok(Some(job))
    }

    async fn save(&self, job: &Job) -> RepositoryResult<()> {
        let result = Jobs::update_many()
            .col_expr(jobs::Column::State, Expr::value(job.state.to_string()))
            .col_expr(jobs::Column::AttemptCount, Expr::value(job.attempt_count))
            .col_expr(jobs::Column::MaxAttempts, Expr::value(job.max_attempts))
            .col_expr(
                jobs::Column::StatusDescription,
                Expr::value(job.status_description.clone()),
            )
            .col_expr(
                jobs::Column::LastAttemptStartedAt,
                Expr::value(job.last_attempt_started_at),
            )
            .col_expr(jobs::Column::UpdatedAt, Expr::value(job.updated_at))
            .filter(jobs::Column::Id.eq(job.id))
            .exec(&*self.connection)
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::record_not_found("jobs", "id", job.id));
        }
        Ok(())
    }

    async fn find_by_job_id(&self, job_id: Uuid) -> RepositoryResult<Option<Job>> {
        let model = Jobs::find()
            .filter(jobs::Column::JobId.eq(job_id))
            .one(&*self.connection)
            .await?;

        model.map(|m| self.model_to_domain(m)).transpose()
    }

    async fn list_recent(&self, limit: u64) -> RepositoryResult<Vec<Job>> {
        let models = Jobs::find()
            .order_by_desc(jobs::Column::CreatedAt)
            .order_by_desc(jobs::Column::Id)
            .limit(limit)
            .all(&*self.connection)
            .await?;

        let mut jobs = Vec::with_capacity(models.len());
        for model in models {
            let job_id = model.job_id;
            match self.model_to_domain(model) {
                Ok(job) => jobs.push(job),
                Err(RepositoryError::SerializationFailed(e)) => {
                    warn!("Skipping job {} with undecodable payload: {}", job_id, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(jobs)
    }
}
