//! Error types for salesql

use crate::value::Value;
use thiserror::Error;

/// Result type alias for salesql operations
pub type SqlResult<T> = Result<T, SqlError>;

/// Error types for query construction, execution and report creation.
#[derive(Debug, Error)]
pub enum SqlError {
    // ==================== Builder errors (never reach the database) ====================
    /// `select` was called without any column
    #[error("Empty projection: select() requires at least one column")]
    EmptyProjection,

    /// The builder is missing a mandatory clause
    #[error("Incomplete query: {0}")]
    IncompleteQuery(String),

    /// A builder or report argument is invalid
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A parameter name was bound twice with different values
    #[error("Ambiguous parameter ':{name}': already bound to {existing}, got {incoming}")]
    AmbiguousParameter {
        name: String,
        existing: Value,
        incoming: Value,
    },

    /// A placeholder in the SQL text has no binding
    #[error("Unbound parameter ':{0}'")]
    UnboundParameter(String),

    /// A binding is not referenced by any placeholder
    #[error("Unused parameter ':{0}'")]
    UnusedParameter(String),

    /// Range bounds are reversed
    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange { start: Value, end: Value },

    /// Period granularity outside {day, month, year}
    #[error("Unsupported granularity '{0}' (expected day, month or year)")]
    UnsupportedGranularity(String),

    // ==================== Connection / execution errors ====================
    /// `connect` was never called, or `disconnect` was called since
    #[error("Not connected: call connect() first")]
    NotConnected,

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Driver error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Terminal execution failure, carrying the last driver diagnostic
    #[error("Query execution failed after {attempts} attempt(s): {source}")]
    QueryExecution {
        attempts: u32,
        #[source]
        source: Box<SqlError>,
    },

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    // ==================== Report factory errors ====================
    /// No report registered under the tag
    #[error("Unknown report type '{0}'")]
    UnknownReportType(String),

    /// Required report arguments are absent
    #[error("Missing required argument(s): {}", .0.join(", "))]
    MissingArgument(Vec<String>),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SqlError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an incomplete query error
    pub fn incomplete(message: impl Into<String>) -> Self {
        Self::IncompleteQuery(message.into())
    }

    /// Wrap the final error of an execution attempt loop.
    pub fn execution(attempts: u32, source: SqlError) -> Self {
        Self::QueryExecution {
            attempts,
            source: Box::new(source),
        }
    }

    /// Whether this error was raised while constructing a query (before any I/O).
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyProjection
                | Self::IncompleteQuery(_)
                | Self::InvalidArgument(_)
                | Self::AmbiguousParameter { .. }
                | Self::UnboundParameter(_)
                | Self::UnusedParameter(_)
                | Self::InvalidRange { .. }
                | Self::UnsupportedGranularity(_)
        )
    }

    /// Whether retrying on a fresh connection may succeed.
    ///
    /// Connection-class SQLSTATEs (`08xxx`) and server shutdown (`57P01`..`57P03`)
    /// count as transient, as does any error on a closed client.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Query(e) => {
                if e.is_closed() {
                    return true;
                }
                match e.code() {
                    Some(code) => {
                        let code = code.code();
                        code.starts_with("08") || matches!(code, "57P01" | "57P02" | "57P03")
                    }
                    // No SQLSTATE: only socket-level failures are worth a retry.
                    None => std::error::Error::source(e)
                        .is_some_and(|src| src.is::<std::io::Error>()),
                }
            }
            _ => false,
        }
    }

    /// Check if this is a not-connected error
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected)
    }

    /// Unwrap a `QueryExecution` wrapper to the driver-level cause.
    pub fn root_cause(&self) -> &SqlError {
        match self {
            Self::QueryExecution { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Duplicate an error that carries only plain data.
    ///
    /// Returns `None` for errors holding a driver error.
    pub(crate) fn try_clone(&self) -> Option<SqlError> {
        let cloned = match self {
            Self::EmptyProjection => Self::EmptyProjection,
            Self::IncompleteQuery(m) => Self::IncompleteQuery(m.clone()),
            Self::InvalidArgument(m) => Self::InvalidArgument(m.clone()),
            Self::AmbiguousParameter {
                name,
                existing,
                incoming,
            } => Self::AmbiguousParameter {
                name: name.clone(),
                existing: existing.clone(),
                incoming: incoming.clone(),
            },
            Self::UnboundParameter(n) => Self::UnboundParameter(n.clone()),
            Self::UnusedParameter(n) => Self::UnusedParameter(n.clone()),
            Self::InvalidRange { start, end } => Self::InvalidRange {
                start: start.clone(),
                end: end.clone(),
            },
            Self::UnsupportedGranularity(g) => Self::UnsupportedGranularity(g.clone()),
            Self::NotConnected => Self::NotConnected,
            Self::Connection(m) => Self::Connection(m.clone()),
            Self::Decode { column, message } => Self::decode(column.clone(), message.clone()),
            Self::UnknownReportType(t) => Self::UnknownReportType(t.clone()),
            Self::MissingArgument(f) => Self::MissingArgument(f.clone()),
            Self::Config(m) => Self::Config(m.clone()),
            Self::Query(_) | Self::QueryExecution { .. } => return None,
        };
        Some(cloned)
    }

    /// Parse a tokio_postgres error into a SqlError, keeping the driver diagnostic.
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if err.is_closed() {
            return Self::Connection(err.to_string());
        }
        Self::Query(err)
    }
}
