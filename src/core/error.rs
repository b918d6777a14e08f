//! Error types for fedstat.

use thiserror::Error;

/// Result type alias for fedstat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a federated computation.
#[derive(Error, Debug)]
pub enum Error {
    // Setup errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Site errors
    #[error("Site {site} unavailable: {reason}")]
    SiteUnavailable { site: String, reason: String },

    #[error("No data on site {site}: {reason}")]
    NoDataOnSite { site: String, reason: String },

    #[error("Dimension mismatch on site {site}: expected {expected}, got {actual}")]
    DimensionMismatch {
        site: String,
        expected: usize,
        actual: usize,
    },

    #[error("Site {site} sent {actual}, expected {expected}")]
    EnvelopeMismatch {
        site: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    // Numeric errors
    #[error("Numeric degeneracy: {0}")]
    NumericDegeneracy(String),

    // Round errors
    #[error(
        "{algorithm} round {round} aborted at {}: {source}",
        .site.as_deref().unwrap_or("coordinator")
    )]
    RoundAborted {
        algorithm: &'static str,
        round: usize,
        site: Option<String>,
        source: Box<Error>,
    },

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an error with the round and site it happened in.
    ///
    /// Already wrapped errors are returned unchanged so the innermost context wins.
    pub fn round_aborted(
        algorithm: &'static str,
        round: usize,
        site: Option<String>,
        source: Error,
    ) -> Self {
        match source {
            wrapped @ Error::RoundAborted { .. } => wrapped,
            source => Error::RoundAborted {
                algorithm,
                round,
                site,
                source: Box::new(source),
            },
        }
    }

    /// The underlying error with any round context stripped.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::RoundAborted { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Round in which the failure happened, if known.
    pub fn round(&self) -> Option<usize> {
        match self {
            Error::RoundAborted { round, .. } => Some(*round),
            _ => None,
        }
    }

    /// Site that caused the failure, if known.
    pub fn site(&self) -> Option<&str> {
        match self {
            Error::RoundAborted { site, source, .. } => site.as_deref().or_else(|| source.site()),
            Error::SiteUnavailable { site, .. }
            | Error::NoDataOnSite { site, .. }
            | Error::DimensionMismatch { site, .. }
            | Error::EnvelopeMismatch { site, .. } => Some(site),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
