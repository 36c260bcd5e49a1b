//! SeaORM repository implementations
//!
//! Repositories that work across SQLite and PostgreSQL, implementing the
//! storage traits from [`crate::repositories`].

pub mod catalog;
pub mod job;

pub use catalog::SeaOrmCatalogStore;
pub use job::SeaOrmJobStore;
