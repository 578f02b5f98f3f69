//! Coordinator configuration.
//!
//! Tunables an operator may set per deployment. Loading them from the
//! command line or environment is the binary's job; this module only defines
//! the values, their defaults, and validation.

use std::{str::FromStr, time::Duration};

use crate::{error::ConfigError, ids::SurfaceId};

/// Default number of log entries kept in bounded mode.
pub const DEFAULT_LOG_RETENTION: usize = 50;

/// Number of recent messages scanned when looking for duplicate panels.
pub const DEFAULT_DEDUP_WINDOW: usize = 50;

/// Name of the log sub-surface created under the panel surface.
pub const DEFAULT_LOG_THREAD_NAME: &str = "turnslot-log";

/// What happens to the queue when the holder leaves the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandoverPolicy {
    /// The slot stays free until someone presses Start.
    Manual,
    /// The head of the queue immediately becomes the new holder.
    #[default]
    AutoAdvance,
}

impl FromStr for HandoverPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "auto-advance" | "on" | "true" => Ok(Self::AutoAdvance),
            "manual" | "off" | "false" => Ok(Self::Manual),
            other => Err(ConfigError::UnknownHandover(other.to_string())),
        }
    }
}

/// Configuration for one coordinator instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Surface where the panel lives
    pub surface: SurfaceId,
    /// Queue behaviour on release
    pub handover: HandoverPolicy,
    /// Whether completed turns are written to a log sub-surface
    pub log_enabled: bool,
    /// `Some(n)` keeps a single summary of the last `n` entries, `None`
    /// posts one message per entry
    pub log_retention: Option<usize>,
    /// Name of the log sub-surface
    pub log_thread_name: String,
    /// Automatically force-release a holder after this long
    pub hold_timeout: Option<Duration>,
    /// How many recent messages the duplicate-panel scan inspects
    pub dedup_window: usize,
    /// Run the duplicate-panel scan and panel check this often
    pub reconcile_interval: Option<Duration>,
    /// Smallest reconnect delay
    pub backoff_min: Duration,
    /// Largest reconnect delay (before rate-limit overrides)
    pub backoff_max: Duration,
    /// A session that stays up this long resets the backoff
    pub sustained_after: Duration,
}

impl CoordinatorConfig {
    /// Defaults for the given surface.
    pub fn for_surface(surface: SurfaceId) -> Self {
        Self { surface, ..Self::default() }
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.surface.0 == 0 {
            return Err(ConfigError::MissingSurface);
        }
        if self.log_retention == Some(0) {
            return Err(ConfigError::ZeroRetention);
        }
        if let Some(timeout) = self.hold_timeout.filter(|t| *t < Duration::from_secs(1)) {
            return Err(ConfigError::HoldTimeoutTooShort(timeout));
        }
        if self.reconcile_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(ConfigError::ZeroReconcileInterval);
        }
        if self.backoff_min.is_zero() || self.backoff_min > self.backoff_max {
            return Err(ConfigError::InvalidBackoff {
                min: self.backoff_min,
                max: self.backoff_max,
            });
        }
        Ok(())
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            surface: SurfaceId(0),
            handover: HandoverPolicy::default(),
            log_enabled: true,
            log_retention: Some(DEFAULT_LOG_RETENTION),
            log_thread_name: DEFAULT_LOG_THREAD_NAME.to_string(),
            hold_timeout: None,
            dedup_window: DEFAULT_DEDUP_WINDOW,
            reconcile_interval: None,
            backoff_min: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
            sustained_after: Duration::from_secs(60),
        }
    }
}
