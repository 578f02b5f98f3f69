//! Error types for the core crate.

use std::time::Duration;

use thiserror::Error;

/// Invalid coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No target surface was configured.
    #[error("target surface id must be non-zero")]
    MissingSurface,

    /// Bounded log retention of zero entries.
    #[error("log retention must be at least 1 entry")]
    ZeroRetention,

    /// Hold timeout too short to be meaningful.
    #[error("hold timeout {0:?} is shorter than one second")]
    HoldTimeoutTooShort(Duration),

    /// Periodic reconciliation with a zero interval.
    #[error("reconcile interval must be non-zero")]
    ZeroReconcileInterval,

    /// Backoff bounds are inverted or zero.
    #[error("invalid backoff bounds: min {min:?}, max {max:?}")]
    InvalidBackoff {
        /// Minimum delay
        min: Duration,
        /// Maximum delay
        max: Duration,
    },

    /// Unrecognized handover policy name.
    #[error("unknown handover policy '{0}' (expected 'auto' or 'manual')")]
    UnknownHandover(String),
}
