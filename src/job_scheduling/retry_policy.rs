//! Retry decisions for faulted jobs
//!
//! Pure functions over attempt counts; the runner persists whatever they
//! decide.

use chrono::{DateTime, Utc};
use std::fmt::Display;

use super::types::{Job, JobOutcome, JobState};
use crate::models::effective_max_attempts;

/// Next state for a job whose handler faulted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Return to the queue for another attempt
    Retry { note: String },
    /// No attempts left; the job fails permanently
    Exhausted { note: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    absolute_max_attempts: i32,
}

impl RetryPolicy {
    pub fn new(absolute_max_attempts: i32) -> Self {
        Self {
            absolute_max_attempts: absolute_max_attempts.max(1),
        }
    }

    /// Ceiling applied to jobs without their own attempt limit
    pub fn absolute_max_attempts(&self) -> i32 {
        self.absolute_max_attempts
    }

    /// Attempt limit actually enforced for a job
    pub fn effective_max(&self, max_attempts: Option<i32>) -> i32 {
        effective_max_attempts(max_attempts, self.absolute_max_attempts)
    }

    pub fn decide(
        &self,
        attempt_count: i32,
        max_attempts: Option<i32>,
        fault: &dyn Display,
    ) -> RetryDecision {
        let effective_max = self.effective_max(max_attempts);
        if attempt_count < effective_max {
            RetryDecision::Retry {
                note: format!(
                    "Error processing job (attempt {attempt_count} of {effective_max}). Queued for retry"
                ),
            }
        } else {
            let message = fault.to_string();
            let message = message.trim_end().trim_end_matches(['.', '!', '?']);
            RetryDecision::Exhausted {
                note: format!(
                    "Error processing job: {message}. Last attempt reached, job will not be retried"
                ),
            }
        }
    }

    /// Apply the result of a handler run to a claimed job
    pub fn resolve<E: Display>(
        &self,
        job: &mut Job,
        result: &Result<JobOutcome, E>,
        now: DateTime<Utc>,
    ) {
        let (state, note) = match result {
            Ok(JobOutcome::Completed(message)) => (JobState::Completed, message.clone()),
            Ok(JobOutcome::Failed(message)) => (JobState::Failed, message.clone()),
            Err(fault) => match self.decide(job.attempt_count, job.max_attempts, fault) {
                RetryDecision::Retry { note } => (JobState::Queued, note),
                RetryDecision::Exhausted { note } => (JobState::Failed, note),
            },
        };
        job.state = state;
        job.status_description = Some(note);
        job.updated_at = now;
    }
}
