//! Job queue runner: the polling loop that claims, executes and resolves jobs

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::job_executor::JobExecutor;
use super::retry_policy::RetryPolicy;
use super::types::{JobSchedulingError, JobState, TickOutcome};
use crate::config::SchedulerConfig;
use crate::repositories::JobStore;
use crate::utils::Clock;
use crate::utils::time::format_elapsed;

pub const INTERRUPTED_NOTE: &str = "Interrupted by shutdown; queued for resumption";

/// Polls the job store for the job types registered in its executor
///
/// One job runs at a time. Run one runner per job family to keep families
/// independent of each other.
pub struct JobQueueRunner {
    store: Arc<dyn JobStore>,
    executor: Arc<JobExecutor>,
    retry_policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl JobQueueRunner {
    pub fn new(
        store: Arc<dyn JobStore>,
        executor: Arc<JobExecutor>,
        clock: Arc<dyn Clock>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            store,
            executor,
            retry_policy: RetryPolicy::new(config.absolute_max_attempts),
            clock,
            poll_interval: config.poll_interval,
        }
    }

    /// Run the polling loop until cancelled
    pub async fn run(&self, cancellation_token: CancellationToken) -> anyhow::Result<()> {
        info!(
            "Starting job queue runner for [{}] (poll interval: {})",
            self.job_type_list(),
            humantime::format_duration(self.poll_interval)
        );
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(&cancellation_token).await {
                        error!("Error processing job queue: {}", e);
                    }
                }
                _ = cancellation_token.cancelled() => {
                    info!("Job queue runner received cancellation signal");
                    break;
                }
            }
        }

        info!("Job queue runner stopped");
        Ok(())
    }

    /// Claim and process at most one job
    pub async fn tick(
        &self,
        cancellation_token: &CancellationToken,
    ) -> Result<TickOutcome, JobSchedulingError> {
        let job_types = self.executor.job_types();
        let Some(candidate) = self
            .store
            .find_oldest_queued(&job_types, self.clock.now())
            .await?
        else {
            return Ok(TickOutcome::Idle);
        };

        let Some(mut job) = self
            .store
            .claim(
                candidate.id,
                self.clock.now(),
                self.retry_policy.absolute_max_attempts(),
            )
            .await?
        else {
            debug!("Job {} was claimed by another worker", candidate.job_id);
            return Ok(TickOutcome::ClaimLost(candidate.id));
        };

        info!(
            "Processing {} job {} (attempt {} of {})",
            job.job_type(),
            job.job_id,
            job.attempt_count,
            self.retry_policy.effective_max(job.max_attempts)
        );

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => None,
            result = self.executor.execute(&job, cancellation_token) => Some(result),
        };
        let elapsed = format_elapsed(started.elapsed());

        let Some(result) = result else {
            job.state = JobState::Queued;
            job.attempt_count -= 1;
            job.status_description = Some(INTERRUPTED_NOTE.to_string());
            job.updated_at = self.clock.now();
            self.store.save(&job).await?;
            warn!(
                "Job {} interrupted by shutdown after {}; returned to the queue",
                job.job_id, elapsed
            );
            return Ok(TickOutcome::Interrupted(job));
        };

        if let Err(e) = &result {
            warn!("Job {} faulted after {}: {}", job.job_id, elapsed, e);
        }
        self.retry_policy.resolve(&mut job, &result, self.clock.now());
        self.store.save(&job).await?;

        match job.state {
            JobState::Completed => info!("Job {} completed in {}", job.job_id, elapsed),
            JobState::Queued => info!(
                "Job {} queued for retry after attempt {}",
                job.job_id, job.attempt_count
            ),
            _ => warn!(
                "Job {} failed after {}: {}",
                job.job_id,
                elapsed,
                job.status_description.as_deref().unwrap_or_default()
            ),
        }

        Ok(TickOutcome::Resolved(job))
    }

    fn job_type_list(&self) -> String {
        self.executor
            .job_types()
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
