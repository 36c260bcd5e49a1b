//! Persisted job records and their payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

/// Family of work a job performs
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobType {
    /// Refresh the catalog of a provider scope
    ProviderSync,
    /// Refresh the catalog of a playlist scope
    PlaylistSync,
    /// Refresh feed data; handled by an external collaborator
    FeedDataSync,
    /// Build guide output; handled by an external collaborator
    GuideGen,
}

/// Lifecycle state of a job
///
/// `Queued -> InProgress -> {Completed | Failed}` with a single backward
/// edge `InProgress -> Queued` for retries and shutdown rollback.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl JobState {
    /// Completed and Failed jobs are never reclaimed
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Typed job arguments, stored as JSON alongside the job row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobPayload {
    ProviderSync {
        scope_id: i64,
        #[serde(default)]
        allow_destructive_retirement: bool,
    },
    PlaylistSync {
        scope_id: i64,
        #[serde(default)]
        allow_destructive_retirement: bool,
    },
    FeedDataSync,
    GuideGen {
        scope_id: i64,
    },
}

impl JobPayload {
    pub fn job_type(&self) -> JobType {
        match self {
            JobPayload::ProviderSync { .. } => JobType::ProviderSync,
            JobPayload::PlaylistSync { .. } => JobType::PlaylistSync,
            JobPayload::FeedDataSync => JobType::FeedDataSync,
            JobPayload::GuideGen { .. } => JobType::GuideGen,
        }
    }

    /// Scope the job operates on, if any
    pub fn scope_id(&self) -> Option<i64> {
        match self {
            JobPayload::ProviderSync { scope_id, .. }
            | JobPayload::PlaylistSync { scope_id, .. }
            | JobPayload::GuideGen { scope_id } => Some(*scope_id),
            JobPayload::FeedDataSync => None,
        }
    }
}

/// A persisted unit of asynchronous work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub job_id: Uuid,
    pub state: JobState,
    pub attempt_count: i32,
    /// `None` means unlimited, bounded by the scheduler's absolute ceiling
    pub max_attempts: Option<i32>,
    pub status_description: Option<String>,
    pub last_attempt_started_at: Option<DateTime<Utc>>,
    pub payload: JobPayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn job_type(&self) -> JobType {
        self.payload.job_type()
    }

    /// Apply a successful claim to this record
    ///
    /// `attempt_ceiling` is the limit for jobs enqueued without one.
    pub fn mark_claimed(&mut self, now: DateTime<Utc>, attempt_ceiling: i32) {
        self.state = JobState::InProgress;
        self.attempt_count += 1;
        self.last_attempt_started_at = Some(now);
        self.status_description = Some(processing_note(
            self.attempt_count,
            effective_max_attempts(self.max_attempts, attempt_ceiling),
        ));
        self.updated_at = now;
    }
}

/// Attempt limit enforced for a job, clamped to `1..=attempt_ceiling`
pub fn effective_max_attempts(max_attempts: Option<i32>, attempt_ceiling: i32) -> i32 {
    let ceiling = attempt_ceiling.max(1);
    max_attempts.unwrap_or(ceiling).clamp(1, ceiling)
}

/// Status note written when a job is claimed
pub fn processing_note(attempt_count: i32, effective_max: i32) -> String {
    format!("Processing job (attempt {attempt_count} of {effective_max})")
}

/// Insert request for a job row
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_id: Uuid,
    pub payload: JobPayload,
    pub max_attempts: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_payload_json_shape() {
        let payload = JobPayload::PlaylistSync {
            scope_id: 4,
            allow_destructive_retirement: true,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(
            json,
            r#"{"type":"playlist_sync","scope_id":4,"allow_destructive_retirement":true}"#
        );

        let parsed: JobPayload = serde_json::from_str(r#"{"type":"provider_sync","scope_id":9}"#).unwrap();
        assert_eq!(
            parsed,
            JobPayload::ProviderSync {
                scope_id: 9,
                allow_destructive_retirement: false
            }
        );

        let unit: JobPayload = serde_json::from_str(r#"{"type":"feed_data_sync"}"#).unwrap();
        assert_eq!(unit.job_type(), JobType::FeedDataSync);
        assert_eq!(unit.scope_id(), None);
    }

    #[test]
    fn test_job_type_string_forms() {
        assert_eq!(JobType::PlaylistSync.to_string(), "playlist_sync");
        assert_eq!(JobType::from_str("guide_gen").unwrap(), JobType::GuideGen);
        assert_eq!(JobState::InProgress.as_ref(), "in_progress");
        assert_eq!(JobState::from_str("failed").unwrap(), JobState::Failed);
        assert!(JobState::Completed.is_terminal());
        assert!(!JobState::Queued.is_terminal());
    }

    #[test]
    fn test_processing_note() {
        assert_eq!(processing_note(2, 3), "Processing job (attempt 2 of 3)");
    }

    #[test]
    fn test_effective_max_attempts() {
        assert_eq!(effective_max_attempts(Some(3), 100), 3);
        assert_eq!(effective_max_attempts(None, 100), 100);
        assert_eq!(effective_max_attempts(Some(500), 100), 100);
        assert_eq!(effective_max_attempts(Some(0), 100), 1);
    }

    #[test]
    fn test_unlimited_claim_note_names_the_ceiling() {
        let now = Utc::now();
        let mut job = Job {
            id: 1,
            job_id: Uuid::new_v4(),
            state: JobState::Queued,
            attempt_count: 0,
            max_attempts: None,
            status_description: None,
            last_attempt_started_at: None,
            payload: JobPayload::FeedDataSync,
            created_at: now,
            updated_at: now,
        };

        job.mark_claimed(now, 100);

        assert_eq!(job.state, JobState::InProgress);
        assert_eq!(job.attempt_count, 1);
        assert_eq!(
            job.status_description.as_deref(),
            Some("Processing job (attempt 1 of 100)")
        );
    }
}
