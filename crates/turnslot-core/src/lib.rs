//! Turnslot core logic
//!
//! Pure state machine logic for a single-resource turn-taking coordinator,
//! completely decoupled from I/O. One user at a time holds the exclusive
//! "searching" slot, everyone else waits in a FIFO queue, and completed turns
//! are recorded in an append-only log.
//!
//! # Architecture
//!
//! Transitions are deterministic and isolated from I/O, time, randomness, and
//! scheduling. Time is passed in by the caller, and every transition returns
//! declarative [`SlotAction`]s describing the effects a runtime must carry out
//! (re-render the panel, append a log entry, restart the hold timer).
//!
//! The same code runs in the production runtime, in unit tests, and in the
//! deterministic simulation harness.
//!
//! # Components
//!
//! - [`slot`]: Turn state and its transitions (acquire, release, enqueue,
//!   force-release, remove, expire)
//! - [`render`]: Panel text rendering
//! - [`log`]: Log entries and the bounded log book
//! - [`control`]: The four panel controls and their wire ids
//! - [`backoff`]: Reconnect policy (exponential backoff with jitter)
//! - [`config`]: Coordinator configuration
//! - [`mod@env`]: Environment abstraction (time, RNG, sleep)
//! - [`ids`]: Identifier and timestamp newtypes
//! - [`error`]: Error types

pub mod backoff;
pub mod config;
pub mod control;
pub mod env;
pub mod error;
pub mod ids;
pub mod log;
pub mod render;
pub mod slot;

pub use backoff::ReconnectPolicy;
pub use config::{CoordinatorConfig, HandoverPolicy};
pub use control::Control;
pub use env::Environment;
pub use error::ConfigError;
pub use ids::{MessageId, SurfaceId, Timestamp, UserId};
pub use log::{LogBook, LogEntry, LogKind};
pub use slot::{Request, SlotAction, TurnState};
