//! Runtime configuration.
//!
//! Wraps the core [`CoordinatorConfig`] with the settings only the running
//! process needs (session credential, own user id).

use turnslot_core::{CoordinatorConfig, UserId};

use crate::error::ServerError;

/// Full configuration of a running coordinator process.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Session credential for the chat platform
    pub credential: String,
    /// User id the coordinator posts as
    pub self_id: UserId,
    /// Turn-taking configuration
    pub coordinator: CoordinatorConfig,
}

impl ServerConfig {
    /// Validate the credential and the coordinator settings.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.credential.trim().is_empty() {
            return Err(ServerError::MissingCredential);
        }
        self.coordinator.validate()?;
        Ok(())
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("credential", &"<redacted>")
            .field("self_id", &self.self_id)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}
