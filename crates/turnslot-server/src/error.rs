//! Error types for the coordinator runtime.

use std::time::Duration;

use thiserror::Error;
use turnslot_core::ConfigError;

/// Failure of a single remote message store call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The message or sub-surface no longer exists.
    #[error("not found")]
    NotFound,

    /// The coordinator lost permission to touch the target.
    #[error("forbidden")]
    Forbidden,

    /// The platform asked us to slow down.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Server-suggested delay
        retry_after: Duration,
    },

    /// Network blip or server error.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl StoreError {
    /// Whether the referenced object is gone or unusable, so the caller
    /// should recreate it rather than retry.
    pub fn is_stale(&self) -> bool {
        matches!(self, StoreError::NotFound | StoreError::Forbidden)
    }
}

/// Session-level failure reported by a [`crate::Gateway`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Login or connect failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Login was rate limited.
    #[error("session rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Server-suggested delay
        retry_after: Duration,
    },

    /// The established session dropped.
    #[error("session closed: {0}")]
    Closed(String),
}

/// Top-level errors of the runtime and binary.
#[derive(Debug, Error)]
pub enum ServerError {
    /// No session credential was supplied.
    #[error("session credential must not be empty")]
    MissingCredential,

    /// Invalid coordinator configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
