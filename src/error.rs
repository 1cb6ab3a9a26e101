use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The remote usage endpoint was unreachable or answered with a
    /// non-success status. `status` is `None` for transport failures.
    #[error("Remote fetch failed{}: {message}", status_suffix(.status))]
    RemoteFetch {
        status: Option<u16>,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Invalid period format: {0}")]
    PeriodParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<rusqlite_migration::Error> for Error {
    fn from(e: rusqlite_migration::Error) -> Self {
        Error::Migration(e.to_string())
    }
}

impl<E: fmt::Display> From<tokio_rusqlite::Error<E>> for Error {
    fn from(e: tokio_rusqlite::Error<E>) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::RemoteFetch {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(s) => format!(" (HTTP {s})"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_fetch_display_with_status() {
        let e = Error::RemoteFetch {
            status: Some(404),
            message: "Not Found".into(),
        };
        assert_eq!(e.to_string(), "Remote fetch failed (HTTP 404): Not Found");
    }

    #[test]
    fn test_remote_fetch_display_without_status() {
        let e = Error::RemoteFetch {
            status: None,
            message: "connection refused".into(),
        };
        assert_eq!(e.to_string(), "Remote fetch failed: connection refused");
    }
}
