//! Session supervision.
//!
//! A [`Gateway`] runs one chat session and forwards its events. The
//! [`Supervisor`] keeps a gateway running forever: after every session end it
//! waits according to the [`ReconnectPolicy`] and tries again. A session that
//! stayed up long enough resets the backoff, and rate-limit responses use the
//! server-suggested delay instead of the exponential schedule.
//!
//! The supervisor never gives up on its own. It stops when told to shut
//! down or when nobody consumes its events any more.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use turnslot_core::{Environment, ReconnectPolicy};

use crate::{error::SessionError, event::InboundEvent};

/// One connection to the chat platform.
#[async_trait]
pub trait Gateway: Send {
    /// Establish a session and forward its events until it ends.
    ///
    /// Sends [`InboundEvent::Ready`] once the session is usable. Returns
    /// `Ok(())` when the session closed normally.
    async fn run(&mut self, events: mpsc::Sender<InboundEvent>) -> Result<(), SessionError>;
}

/// Why the supervisor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// Shutdown was requested.
    Shutdown,
    /// The event consumer went away.
    ConsumerGone,
}

/// Reconnect loop around a [`Gateway`].
pub struct Supervisor<G, E> {
    gateway: G,
    env: E,
    policy: ReconnectPolicy,
    sustained_after: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<G, E> Supervisor<G, E>
where
    G: Gateway,
    E: Environment,
{
    /// Create a supervisor.
    ///
    /// # Arguments
    /// * `gateway` - Session to keep alive
    /// * `env` - Time and jitter source
    /// * `policy` - Backoff schedule
    /// * `sustained_after` - Session uptime that resets the backoff
    /// * `shutdown` - Set to `true` to stop the loop
    pub fn new(
        gateway: G,
        env: E,
        policy: ReconnectPolicy,
        sustained_after: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { gateway, env, policy, sustained_after, shutdown }
    }

    /// Run sessions until shutdown.
    pub async fn run(mut self, events: mpsc::Sender<InboundEvent>) -> SupervisorExit {
        loop {
            if *self.shutdown.borrow() {
                return SupervisorExit::Shutdown;
            }
            if events.is_closed() {
                return SupervisorExit::ConsumerGone;
            }

            let started = self.env.now();
            let result = tokio::select! {
                result = self.gateway.run(events.clone()) => result,
                _ = self.shutdown.changed() => return SupervisorExit::Shutdown,
            };
            let uptime = Duration::from_millis(self.env.now().millis_since(started));

            if uptime >= self.sustained_after {
                self.policy.reset();
            }
            if events.is_closed() {
                return SupervisorExit::ConsumerGone;
            }

            let jitter = self.env.random_unit();
            let delay = match result {
                Ok(()) => {
                    info!(?uptime, "session closed");
                    self.policy.next_delay(jitter)
                },
                Err(SessionError::RateLimited { retry_after }) => {
                    warn!(?retry_after, "session rate limited");
                    self.policy.rate_limited_delay(retry_after, jitter)
                },
                Err(err) => {
                    warn!(error = %err, attempt = self.policy.attempt(), "session failed");
                    self.policy.next_delay(jitter)
                },
            };

            info!(?delay, "reconnecting");
            tokio::select! {
                () = self.env.sleep(delay) => {},
                _ = self.shutdown.changed() => return SupervisorExit::Shutdown,
            }
        }
    }
}
