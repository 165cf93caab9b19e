//! Error types for tabular-client

use thiserror::Error;

/// Errors that can occur while interacting with a tabular model
#[derive(Error, Debug)]
pub enum TabularError {
    #[error("Failed to connect to server: {message}")]
    ConnectError { message: String },

    #[error("Query failed: {message}")]
    QueryError { statement: String, message: String },

    #[error("{kind} '{name}' not found{}", parent.as_deref().map(|p| format!(" in '{p}'")).unwrap_or_default())]
    NotFoundError {
        kind: &'static str,
        name: String,
        parent: Option<String>,
    },

    #[error("Unrecognized property '{property}' for {object_kind}")]
    InvalidPropertyError {
        object_kind: &'static str,
        property: String,
    },

    #[error("Commit rejected by server: {message}")]
    CommitError { message: String },

    #[error("{} refresh check(s) failed", failures.len())]
    RefreshCheckFailure { failures: Vec<CheckFailure> },

    #[error("Trace error (non-fatal): {message}")]
    TraceError { message: String },
}

/// A single failed refresh-check assertion, carrying enough context to diagnose it
#[derive(Debug, Clone)]
pub struct CheckFailure {
    pub name: String,
    pub pre: String,
    pub post: String,
}

/// Convenience constructor used throughout the model layer.
pub fn not_found(kind: &'static str, name: impl Into<String>, parent: Option<String>) -> TabularError {
    TabularError::NotFoundError {
        kind,
        name: name.into(),
        parent,
    }
}

pub type Result<T> = std::result::Result<T, TabularError>;
