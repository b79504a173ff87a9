//! Error types for activity-index

use std::fmt;
use thiserror::Error;

/// Why a pointer could not be turned into a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// The origin could not be mapped to an identity
    UnknownIdentity,
    /// The identity is known but its partition could not be reached
    Unavailable,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionFailure::UnknownIdentity => write!(f, "unknown-identity"),
            ResolutionFailure::Unavailable => write!(f, "unavailable"),
        }
    }
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Must be logged in")]
    Unauthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unable to resolve {target}: {reason}")]
    Resolution {
        target: String,
        reason: ResolutionFailure,
    },

    #[error("Partition is read-only: {0}")]
    ReadOnly(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IndexError {
    pub fn unknown_identity(target: impl Into<String>) -> Self {
        IndexError::Resolution {
            target: target.into(),
            reason: ResolutionFailure::UnknownIdentity,
        }
    }

    pub fn unavailable(target: impl Into<String>) -> Self {
        IndexError::Resolution {
            target: target.into(),
            reason: ResolutionFailure::Unavailable,
        }
    }

    /// The resolution failure reason, if this is a resolution error
    pub fn resolution_failure(&self) -> Option<ResolutionFailure> {
        match self {
            IndexError::Resolution { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
