//! Centralized error handling for playlist-sync
//!
//! This module unifies the error types used across the application layers.
//!
//! # Error Categories
//!
//! - **Database Errors**: SeaORM operations, migrations, connection issues
//! - **Repository Errors**: Data access layer failures
//! - **Source Errors**: Fetching and parsing remote playlist documents
//! - **Configuration Errors**: Invalid or unreadable settings
//!
//! # Usage
//!
//! ```rust
//! use playlist_sync::errors::{AppError, AppResult};
//!
//! async fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Convenience type alias for Source Results
pub type SourceResult<T> = Result<T, SourceError>;

/// Failure of a document fetch: I/O, HTTP status or parse error
pub type FetchError = SourceError;
