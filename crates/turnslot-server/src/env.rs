//! Production environment: system clock, tokio timers, OS randomness.

use std::{
    future::Future,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tracing::warn;
use turnslot_core::{Environment, Timestamp};

/// [`Environment`] backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        Timestamp(millis)
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        if let Err(err) = getrandom::fill(buffer) {
            // Jitter only; a zero buffer still yields a valid delay.
            warn!(error = %err, "OS randomness unavailable");
            buffer.fill(0);
        }
    }
}
