//! Enqueue path shared by every trigger source

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::types::{Job, JobPayload, JobSchedulingError, NewJob};
use crate::config::SchedulerConfig;
use crate::repositories::JobStore;
use crate::utils::Clock;

/// Persistent job queue front end
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Queue a job, assigning its correlation id and attempt limit
    ///
    /// An explicit `max_attempts` wins over the per-type configuration. With
    /// neither, the job is unlimited and only the absolute ceiling applies.
    pub async fn enqueue(
        &self,
        payload: JobPayload,
        max_attempts: Option<i32>,
    ) -> Result<Job, JobSchedulingError> {
        let job_type = payload.job_type();
        let ceiling = self.config.absolute_max_attempts;
        let max_attempts = match max_attempts {
            Some(value) if !(1..=ceiling).contains(&value) => {
                return Err(JobSchedulingError::InvalidMaxAttempts { value, ceiling });
            }
            Some(value) => Some(value),
            None => self.config.max_attempts_for(job_type),
        };

        let job = self
            .store
            .insert(NewJob {
                job_id: Uuid::new_v4(),
                payload,
                max_attempts,
                created_at: self.clock.now(),
            })
            .await?;

        info!(
            "Enqueued {} job {} (max attempts: {})",
            job_type,
            job.job_id,
            max_attempts
                .map(|m| m.to_string())
                .unwrap_or_else(|| "Unlimited".to_string())
        );
        Ok(job)
    }

    /// Look a job up by its correlation id
    pub async fn status(&self, job_id: Uuid) -> Result<Option<Job>, JobSchedulingError> {
        Ok(self.store.find_by_job_id(job_id).await?)
    }

    pub async fn recent(&self, limit: u64) -> Result<Vec<Job>, JobSchedulingError> {
        Ok(self.store.list_recent(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobState, JobType};
    use crate::repositories::InMemoryStore;
    use crate::utils::SystemClock;
    use tokio_test::{assert_err, assert_ok};

    fn queue() -> JobQueue {
        JobQueue::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(SystemClock),
            SchedulerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_enqueue_uses_configured_limit() {
        let queue = queue();
        let job = queue
            .enqueue(
                JobPayload::PlaylistSync {
                    scope_id: 1,
                    allow_destructive_retirement: false,
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.attempt_count, 0);
        assert_eq!(job.max_attempts, Some(3));
        assert_eq!(job.job_type(), JobType::PlaylistSync);

        let found = queue.status(job.job_id).await.unwrap().unwrap();
        assert_eq!(found.id, job.id);
    }

    #[tokio::test]
    async fn test_enqueue_unconfigured_type_is_unlimited() {
        let queue = queue();
        let job = queue.enqueue(JobPayload::FeedDataSync, None).await.unwrap();
        assert_eq!(job.max_attempts, None);

        let job = queue.enqueue(JobPayload::FeedDataSync, Some(10)).await.unwrap();
        assert_eq!(job.max_attempts, Some(10));
    }

    #[tokio::test]
    async fn test_enqueue_rejects_out_of_range_limits() {
        let queue = queue();
        assert!(matches!(
            queue.enqueue(JobPayload::FeedDataSync, Some(0)).await,
            Err(JobSchedulingError::InvalidMaxAttempts { value: 0, ceiling: 100 })
        ));
        assert_err!(queue.enqueue(JobPayload::FeedDataSync, Some(101)).await);
        let recent = assert_ok!(queue.recent(10).await);
        assert!(recent.is_empty());
    }
}
