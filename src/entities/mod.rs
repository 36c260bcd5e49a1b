//! SeaORM entities backing the job queue and the catalog

pub mod prelude;

pub mod catalog_entries;
pub mod jobs;
pub mod sync_scopes;
