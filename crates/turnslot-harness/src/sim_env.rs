//! Simulated environment.
//!
//! Time comes from tokio's clock, so tests running with
//! `start_paused = true` advance it with `tokio::time::advance` or by simply
//! sleeping (the runtime auto-advances when idle). Randomness comes from a
//! seeded ChaCha8 stream shared by all clones.

use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::time::Instant;
use turnslot_core::{Environment, Timestamp};

/// Wall-clock time at which every simulation starts (2024-01-01T00:00:00Z).
pub const SIM_EPOCH: Timestamp = Timestamp(1_704_067_200_000);

/// Deterministic [`Environment`] for tests.
#[derive(Clone)]
pub struct SimEnv {
    epoch: Timestamp,
    started: Instant,
    rng: Arc<Mutex<ChaCha8Rng>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl SimEnv {
    /// Environment seeded with 0.
    ///
    /// Must be created inside the runtime whose clock it should follow.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment with an explicit RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            epoch: SIM_EPOCH,
            started: Instant::now(),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every duration passed to [`Environment::sleep`], in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Simulated time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv").field("now", &self.now()).finish_non_exhaustive()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Timestamp {
        let elapsed = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Timestamp(self.epoch.0.saturating_add(elapsed))
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).push(duration);
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
