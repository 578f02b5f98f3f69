//! Event dispatch.
//!
//! The [`Coordinator`] owns the map of managed surfaces and routes every
//! [`InboundEvent`] to the worker of the surface it concerns. It holds no
//! turn state itself; surfaces never share anything, so independent
//! surfaces proceed fully in parallel.

use std::{collections::HashMap, ops::ControlFlow, sync::Arc};

use tokio::sync::mpsc;
use tracing::{debug, info};
use turnslot_core::{CoordinatorConfig, Environment, SurfaceId, UserId};

use crate::{
    event::InboundEvent,
    store::MessageStore,
    surface::{SurfaceCommand, SurfaceHandle},
};

/// Routes inbound events to per-surface workers.
pub struct Coordinator<S, E> {
    store: Arc<S>,
    env: E,
    surfaces: HashMap<SurfaceId, SurfaceHandle>,
    self_id: Option<UserId>,
}

impl<S, E> Coordinator<S, E>
where
    S: MessageStore,
    E: Environment,
{
    /// Create a coordinator and spawn the worker for `config.surface`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(store: Arc<S>, env: E, config: CoordinatorConfig) -> Self {
        let mut coordinator = Self { store, env, surfaces: HashMap::new(), self_id: None };
        coordinator.add_surface(config);
        coordinator
    }

    /// Manage another surface. Replacing an existing surface is ignored.
    pub fn add_surface(&mut self, config: CoordinatorConfig) {
        let id = config.surface;
        if self.surfaces.contains_key(&id) {
            debug!(surface = %id, "surface already managed");
            return;
        }
        let handle = SurfaceHandle::spawn(config, Arc::clone(&self.store), self.env.clone());
        self.surfaces.insert(id, handle);
    }

    /// Handle of a managed surface.
    pub fn surface(&self, id: SurfaceId) -> Option<&SurfaceHandle> {
        self.surfaces.get(&id)
    }

    /// The coordinator's own user id, once the session is ready.
    pub fn self_id(&self) -> Option<UserId> {
        self.self_id
    }

    /// Route one event.
    ///
    /// Returns `ControlFlow::Break` on shutdown.
    pub async fn handle_event(&mut self, event: InboundEvent) -> ControlFlow<()> {
        match event {
            InboundEvent::Ready { self_id } => {
                info!(user = %self_id, surfaces = self.surfaces.len(), "session ready");
                self.self_id = Some(self_id);
                for handle in self.surfaces.values() {
                    handle.send(SurfaceCommand::Bootstrap { self_id }).await;
                }
            },
            InboundEvent::Action(action) => {
                let surface = action.surface;
                self.route(surface, SurfaceCommand::Action(action)).await;
            },
            InboundEvent::Remove { surface, actor, target } => {
                self.route(surface, SurfaceCommand::Remove { actor, target }).await;
            },
            InboundEvent::ExternalActivity { surface, author } => {
                if Some(author) == self.self_id {
                    return ControlFlow::Continue(());
                }
                self.route(surface, SurfaceCommand::MoveToBottom).await;
            },
            InboundEvent::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Drain `events` until shutdown or until every sender is gone, then
    /// stop all surface workers.
    pub async fn run(mut self, mut events: mpsc::Receiver<InboundEvent>) {
        while let Some(event) = events.recv().await {
            if self.handle_event(event).await.is_break() {
                break;
            }
        }
        info!("coordinator shutting down");
        self.shutdown().await;
    }

    /// Wait until every surface has handled all queued commands.
    pub async fn settle(&self) {
        for handle in self.surfaces.values() {
            handle.settle().await;
        }
    }

    /// Stop all surface workers.
    pub async fn shutdown(self) {
        for (_, handle) in self.surfaces {
            handle.shutdown().await;
        }
    }

    async fn route(&self, surface: SurfaceId, command: SurfaceCommand) {
        match self.surfaces.get(&surface) {
            Some(handle) => {
                if !handle.send(command).await {
                    debug!(surface = %surface, "surface worker gone");
                }
            },
            None => debug!(surface = %surface, "event for unmanaged surface"),
        }
    }
}
