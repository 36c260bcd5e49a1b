//! Job executor: dispatches claimed jobs to their registered handlers

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::types::{Job, JobOutcome, JobType};
use crate::errors::AppError;

/// Work performed for one family of jobs
///
/// `Ok(JobOutcome)` covers both success and graceful precondition failures.
/// `Err` is a fault that the retry policy may requeue.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: &Job, cancel: &CancellationToken) -> Result<JobOutcome, AppError>;
}

/// Fails every job it is handed; stands in for families this process cannot run
pub struct UnsupportedJobHandler;

#[async_trait]
impl JobHandler for UnsupportedJobHandler {
    async fn run(&self, job: &Job, _cancel: &CancellationToken) -> Result<JobOutcome, AppError> {
        Ok(JobOutcome::Failed(format!(
            "Unsupported job type {}",
            job.job_type()
        )))
    }
}

/// Lookup table from job type to handler
#[derive(Default, Clone)]
pub struct JobExecutor {
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a job type, replacing any previous one
    pub fn register(mut self, job_type: JobType, handler: Arc<dyn JobHandler>) -> Self {
        if self.handlers.insert(job_type, handler).is_some() {
            warn!("Replaced existing handler for job type {}", job_type);
        }
        self
    }

    /// Job types this executor can run, in a stable order
    pub fn job_types(&self) -> Vec<JobType> {
        let mut job_types: Vec<JobType> = self.handlers.keys().copied().collect();
        job_types.sort();
        job_types
    }

    pub fn handles(&self, job_type: JobType) -> bool {
        self.handlers.contains_key(&job_type)
    }

    /// Register [`UnsupportedJobHandler`] for every job type still unhandled
    ///
    /// The runner then polls every family, so jobs nobody can run are failed
    /// instead of waiting in the queue forever.
    pub fn reject_unhandled(mut self) -> Self {
        let unhandled: Vec<JobType> = JobType::iter().filter(|t| !self.handles(*t)).collect();
        for job_type in unhandled {
            info!("No handler for {} jobs; they will be failed", job_type);
            self.handlers.insert(job_type, Arc::new(UnsupportedJobHandler));
        }
        self
    }

    /// Run the handler for a claimed job
    pub async fn execute(
        &self,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome, AppError> {
        let job_type = job.job_type();
        match self.handlers.get(&job_type) {
            Some(handler) => {
                debug!("Dispatching job {} to {} handler", job.job_id, job_type);
                handler.run(job, cancel).await
            }
            None => Ok(JobOutcome::Failed(format!(
                "No handler registered for job type {job_type}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobPayload, JobState};
    use chrono::Utc;
    use uuid::Uuid;

    struct Echo;

    #[async_trait]
    impl JobHandler for Echo {
        async fn run(&self, job: &Job, _cancel: &CancellationToken) -> Result<JobOutcome, AppError> {
            Ok(JobOutcome::Completed(format!("ran {}", job.id)))
        }
    }

    fn job(payload: JobPayload) -> Job {
        let now = Utc::now();
        Job {
            id: 7,
            job_id: Uuid::new_v4(),
            state: JobState::InProgress,
            attempt_count: 1,
            max_attempts: None,
            status_description: None,
            last_attempt_started_at: Some(now),
            payload,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_dispatch_by_type() {
        let executor = JobExecutor::new().register(JobType::FeedDataSync, Arc::new(Echo));
        assert_eq!(executor.job_types(), vec![JobType::FeedDataSync]);

        let outcome = executor
            .execute(&job(JobPayload::FeedDataSync), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Completed("ran 7".to_string()));
    }

    #[tokio::test]
    async fn test_reject_unhandled_keeps_registered_handlers() {
        let executor = JobExecutor::new()
            .register(JobType::PlaylistSync, Arc::new(Echo))
            .reject_unhandled();
        assert_eq!(executor.job_types(), JobType::iter().collect::<Vec<_>>());

        let cancel = CancellationToken::new();
        let playlist = JobPayload::PlaylistSync {
            scope_id: 1,
            allow_destructive_retirement: false,
        };
        assert_eq!(
            executor.execute(&job(playlist), &cancel).await.unwrap(),
            JobOutcome::Completed("ran 7".to_string())
        );
        assert_eq!(
            executor
                .execute(&job(JobPayload::FeedDataSync), &cancel)
                .await
                .unwrap(),
            JobOutcome::Failed("Unsupported job type feed_data_sync".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_handler_is_graceful_failure() {
        let executor = JobExecutor::new();
        let outcome = executor
            .execute(&job(JobPayload::GuideGen { scope_id: 1 }), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            JobOutcome::Failed("No handler registered for job type guide_gen".to_string())
        );
    }
}
