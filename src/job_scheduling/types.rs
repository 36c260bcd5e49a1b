//! Job scheduling type definitions

use thiserror::Error;

use crate::errors::RepositoryError;

pub use crate::models::job::{Job, JobPayload, JobState, JobType, NewJob};

/// Result of a handler run that did not fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Work finished; the message becomes the job's status note
    Completed(String),
    /// A precondition failed; terminal, never retried
    Failed(String),
}

/// What a single scheduler tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing eligible was queued
    Idle,
    /// Another worker claimed the job first
    ClaimLost(i64),
    /// The job ran and its next state was persisted
    Resolved(Job),
    /// Shutdown interrupted the job; it was returned to the queue
    Interrupted(Job),
}

#[derive(Error, Debug)]
pub enum JobSchedulingError {
    #[error("Job store error: {0}")]
    Store(#[from] RepositoryError),

    #[error("Invalid max attempts {value}: must be between 1 and {ceiling}")]
    InvalidMaxAttempts { value: i32, ceiling: i32 },
}
