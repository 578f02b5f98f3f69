//! Deterministic simulation harness for turnslot testing.
//!
//! Seeded implementations of the Environment trait, a fault-injecting
//! wrapper around any message store, and a reference model of the turn
//! slot for model-based tests. Time is driven by tokio's paused clock.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty_store;
pub mod model;
pub mod sim_env;

pub use faulty_store::{FaultyStore, StoreOp};
pub use model::{ModelSlot, Operation};
pub use sim_env::SimEnv;
