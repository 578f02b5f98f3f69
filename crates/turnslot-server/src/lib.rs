//! Turnslot coordinator runtime
//!
//! Drives the pure [`turnslot_core`] state machine against a chat platform.
//! Every surface gets its own worker task that serializes button presses
//! under one lock, re-renders the shared panel message, keeps exactly one
//! live copy of it on the surface, and appends finished turns to a log
//! thread.
//!
//! # Components
//!
//! - [`MessageStore`]: Transport abstraction (remote message store)
//! - [`MemoryStore`]: In-process store for the console driver and tests
//! - [`PanelReconciler`]: Keeps one live panel message per surface
//! - [`LogAppender`]: Writes log entries to the log sub-surface
//! - [`SurfaceHandle`]: Per-surface worker, lock, and hold timer
//! - [`Coordinator`]: Routes inbound events to surface workers
//! - [`Supervisor`]: Session reconnect loop with backoff
//! - [`ConsoleGateway`]: Stdin-driven gateway used by the `turnslot` binary

pub mod config;
pub mod console;
pub mod coordinator;
pub mod env;
pub mod error;
pub mod event;
pub mod log_appender;
pub mod memory;
pub mod panel;
pub mod store;
pub mod supervisor;
pub mod surface;

pub use config::ServerConfig;
pub use console::ConsoleGateway;
pub use coordinator::Coordinator;
pub use env::SystemEnv;
pub use error::{ServerError, SessionError, StoreError};
pub use event::{ActionEvent, InboundEvent};
pub use log_appender::LogAppender;
pub use memory::MemoryStore;
pub use panel::{PanelReconciler, PanelStatus};
pub use store::{Message, MessageStore, SubSurface};
pub use supervisor::{Gateway, Supervisor, SupervisorExit};
pub use surface::{SurfaceCommand, SurfaceHandle};
