use thiserror::Error;

use crate::normalize::Field;

/// Login failed. Fatal to a collection run.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid request header {name}: {reason}")]
    Header { name: String, reason: String },

    #[error("login request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("login returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("login rejected: no logout marker in response")]
    Rejected,
}

/// One module page could not be retrieved. The run continues without it.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// The page did not have the expected schedule structure.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("schedule table not found")]
    TableNotFound,

    #[error("schedule table has no header row")]
    HeaderNotFound,
}

/// A payload field could not be resolved and falls back to its sentinel.
/// Never fatal on its own.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationWarning {
    #[error("{0} not found in payload, using sentinel")]
    Unresolved(Field),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
}
