pub mod catalog;
pub mod job;

pub use catalog::{
    CatalogDelta, CatalogEntry, CatalogKey, ChannelRecord, NewCatalogEntry, NewScope, Scope,
    ScopeCatalog, ScopeKind,
};
pub use job::{Job, JobPayload, JobState, JobType, NewJob, effective_max_attempts, processing_note};
