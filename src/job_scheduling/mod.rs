//! Job scheduling subsystem for playlist-sync
//!
//! The system is built around four components:
//! - `JobQueue`: enqueue path shared by the CLI and any external trigger
//! - `JobQueueRunner`: polling loop that claims and resolves jobs
//! - `JobExecutor`: dispatch from job type to a registered `JobHandler`
//! - `RetryPolicy`: decides whether a faulted job is retried

pub mod job_executor;
pub mod job_queue;
pub mod job_queue_runner;
pub mod retry_policy;
pub mod types;

pub use job_executor::{JobExecutor, JobHandler, UnsupportedJobHandler};
pub use job_queue::JobQueue;
pub use job_queue_runner::JobQueueRunner;
pub use retry_policy::{RetryDecision, RetryPolicy};
pub use types::*;
