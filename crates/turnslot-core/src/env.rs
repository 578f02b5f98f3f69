//! Environment abstraction.
//!
//! Everything non-deterministic the coordinator needs (wall-clock time,
//! sleeping, entropy for backoff jitter) goes through [`Environment`].
//! Production wires it to the system clock and OS randomness, the
//! simulation harness to a manual clock and a seeded RNG.

use std::{future::Future, time::Duration};

use crate::ids::Timestamp;

/// Source of time and randomness.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time.
    fn now(&self) -> Timestamp;

    /// Suspend the current task for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Uniform random fraction in `[0, 1)`.
    fn random_unit(&self) -> f64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        // 53 bits of mantissa
        (u64::from_le_bytes(bytes) >> 11) as f64 / (1u64 << 53) as f64
    }
}
