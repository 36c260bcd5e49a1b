//! Error type definitions for playlist-sync
//!
//! A hierarchical error system: layer specific enums convert into
//! [`AppError`] at the service boundary.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Source handling errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// SQL query execution failures
    #[error("Query failed: {query} - {message}")]
    QueryFailed { query: String, message: String },

    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Payload serialization/deserialization failures
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// A stored value could not be mapped back to its domain type
    #[error("Invalid stored value: {field} = {value}")]
    InvalidStoredValue { field: String, value: String },

    /// Record not found
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },
}

/// Source handling specific errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network connection timeouts
    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    /// Transport level failures (DNS, TLS, connection reset)
    #[error("Request failed: {url} - {message}")]
    Request { url: String, message: String },

    /// Parsing errors for source data
    #[error("Parse error: {source_type} - {message}")]
    ParseError { source_type: String, message: String },

    /// HTTP errors from external sources
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Document larger than the configured limit
    #[error("Document too large: {size} bytes (max: {max_size})")]
    TooLarge { size: usize, max_size: usize },

    /// The fetch was abandoned because shutdown was requested
    #[error("Fetch cancelled: {url}")]
    Cancelled { url: String },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl RepositoryError {
    /// Create a record not found error
    pub fn record_not_found<T: Into<String>, F: Into<String>, V: ToString>(
        table: T,
        field: F,
        value: V,
    ) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }

    /// Create an invalid stored value error
    pub fn invalid_value<F: Into<String>, V: Into<String>>(field: F, value: V) -> Self {
        Self::InvalidStoredValue {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl SourceError {
    /// Create a parse error for the given source type
    pub fn parse<S: Into<String>, M: Into<String>>(source_type: S, message: M) -> Self {
        Self::ParseError {
            source_type: source_type.into(),
            message: message.into(),
        }
    }

    /// Map a reqwest failure onto the source error taxonomy
    pub fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = error.status() {
            Self::Http {
                status: status.as_u16(),
                message: error.to_string(),
            }
        } else {
            Self::Request {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = AppError::configuration("poll interval is zero");
        assert_eq!(err.to_string(), "Configuration error: poll interval is zero");

        let err = RepositoryError::record_not_found("jobs", "id", 7);
        assert_eq!(err.to_string(), "Record not found: jobs with id = 7");

        let err = SourceError::Http {
            status: 404,
            message: "missing".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error: 404 - missing");
    }

    #[test]
    fn test_repository_error_converts_into_app_error() {
        let err: AppError = RepositoryError::invalid_value("state", "bogus").into();
        assert!(matches!(err, AppError::Repository(_)));
        assert!(err.to_string().contains("state = bogus"));
    }

    #[test]
    fn test_source_error_converts_into_app_error() {
        let err: AppError = SourceError::TooLarge {
            size: 10,
            max_size: 5,
        }
        .into();
        assert!(matches!(err, AppError::Source(_)));
        assert_eq!(
            err.to_string(),
            "Source error: Document too large: 10 bytes (max: 5)"
        );
    }
}
