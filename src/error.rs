//! Error type shared by the tracker, the history store and the location plumbing.
//!
//! Nothing here is fatal to the process: every variant is reported to the caller,
//! which decides whether to retry, discard or restart the session.

use std::fmt;

use crate::session::Status;

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// A lifecycle operation was invoked from a status that does not allow it
    InvalidTransition {
        action: &'static str,
        status: Status,
    },
    /// The location source reported an error or could not be subscribed to
    LocationUnavailable { message: String },
    /// A history store read, write or delete failed
    PersistenceFailure { message: String },
    /// A stored path could not be decoded
    MalformedPathData { message: String },
    /// Configuration or input file could not be used
    Config { message: String },
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::InvalidTransition { action, status } => {
                write!(f, "cannot {} while {}", action, status)
            }
            TrackerError::LocationUnavailable { message } => {
                write!(f, "Location unavailable: {}", message)
            }
            TrackerError::PersistenceFailure { message } => {
                write!(f, "Persistence failure: {}", message)
            }
            TrackerError::MalformedPathData { message } => {
                write!(f, "Malformed path data: {}", message)
            }
            TrackerError::Config { message } => {
                write!(f, "Configuration error: {}", message)
            }
        }
    }
}

impl std::error::Error for TrackerError {}

impl From<rusqlite::Error> for TrackerError {
    fn from(e: rusqlite::Error) -> Self {
        TrackerError::PersistenceFailure {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(e: serde_json::Error) -> Self {
        TrackerError::MalformedPathData {
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for TrackerError {
    fn from(e: std::io::Error) -> Self {
        TrackerError::PersistenceFailure {
            message: e.to_string(),
        }
    }
}

impl From<csv::Error> for TrackerError {
    fn from(e: csv::Error) -> Self {
        TrackerError::Config {
            message: format!("unreadable fix file: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
