//! Per-surface worker.
//!
//! Each surface has one worker task that drains its own command channel.
//! Every command runs under the surface lock for its whole critical section
//! (mutate state, render, reconcile the panel, append to the log), so two
//! presses of Start on a free slot can never both win. Remote I/O happens
//! while the lock is held: presses arrive at human speed, and strict
//! serialization matters more than latency.
//!
//! # Timers
//!
//! The hold timer is restarted whenever the holder changes and cancelled
//! when the slot becomes free. Expiry is delivered through the worker's own
//! channel, so it is serialized with presses. Each arming carries a
//! generation number and stale expiries are dropped. Timers only hold a
//! weak sender and are aborted when the worker goes away.
//!
//! # Repair
//!
//! A command that leaves the surface out of sync (panel not updated or
//! missing, superseded panels not deleted, log entries not written) makes
//! the worker schedule a one-shot [`SurfaceCommand::Reconcile`] on an
//! exponential backoff. It keeps rescheduling until a pass comes back clean,
//! so the surface heals even when nobody presses anything.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use turnslot_core::{
    Control, CoordinatorConfig, Environment, LogBook, MessageId, Request, SlotAction, SurfaceId,
    ReconnectPolicy, Timestamp, TurnState, UserId, render::render,
};

use crate::{
    event::ActionEvent,
    log_appender::LogAppender,
    panel::{PanelReconciler, PanelStatus},
    store::MessageStore,
};

/// Capacity of a surface's command channel.
const COMMAND_BUFFER: usize = 64;

/// Work items for a surface worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCommand {
    /// Session (re)established: find the log thread, clean up duplicate
    /// panels, and make sure the panel exists.
    Bootstrap {
        /// Coordinator's own user id
        self_id: UserId,
    },

    /// A control was pressed on one of this surface's messages.
    Action(ActionEvent),

    /// Administrative removal.
    Remove {
        /// Administrator
        actor: UserId,
        /// User to remove
        target: UserId,
    },

    /// Unrelated content was posted; repost the panel at the bottom.
    MoveToBottom,

    /// The hold timer fired.
    HoldExpired {
        /// Holder the timer was armed for
        holder: UserId,
        /// Arming generation
        generation: u64,
    },

    /// Duplicate cleanup, panel check, and log backlog flush.
    Reconcile,
}

/// A queued command, or a barrier when `command` is `None`.
#[derive(Debug)]
struct Envelope {
    command: Option<SurfaceCommand>,
    done: Option<oneshot::Sender<()>>,
}

impl Envelope {
    fn command(command: SurfaceCommand) -> Self {
        Self { command: Some(command), done: None }
    }
}

/// Everything owned by one surface, guarded by the surface lock.
#[derive(Debug)]
struct Surface {
    state: TurnState,
    panel: PanelReconciler,
    log: LogAppender,
    /// Last panel call could not update the remote side
    panel_stale: bool,
}

impl Surface {
    fn record(&mut self, status: PanelStatus) {
        self.panel_stale = status == PanelStatus::Stale;
    }

    /// Whether the remote side lags the local state.
    fn needs_repair(&self) -> bool {
        self.panel_stale
            || self.panel.message_id().is_none()
            || self.panel.pending_deletions() > 0
            || self.log.backlog() > 0
    }

    /// Apply a request, reconcile the panel, and append log entries.
    async fn execute<S>(
        &mut self,
        store: &S,
        config: &CoordinatorConfig,
        request: Request,
        now: Timestamp,
        origin: Option<&ActionEvent>,
    ) -> Vec<SlotAction>
    where
        S: MessageStore + ?Sized,
    {
        let actions = self.state.apply(request, now, config.handover);

        if actions.contains(&SlotAction::Render) {
            let text = render(&self.state);
            let status = match origin {
                Some(event) => self.panel.edit_in_place(store, event.origin, &text).await,
                None => self.panel.ensure_exists(store, &text).await,
            };
            debug!(surface = %config.surface, ?request, ?status, "panel reconciled");
            self.record(status);
        } else if let Some(event) = origin {
            debug!(surface = %config.surface, ?request, "request ignored");
            if let Err(err) = store.acknowledge(event).await {
                warn!(surface = %config.surface, error = %err, "acknowledge failed");
            }
        }

        for action in &actions {
            if let SlotAction::Log(entry) = action {
                info!(
                    surface = %config.surface,
                    actor = %entry.actor,
                    target = %entry.target,
                    kind = ?entry.kind,
                    "turn logged"
                );
                self.log.append(store, *entry).await;
            }
        }

        actions
    }

    async fn reconcile<S>(&mut self, store: &S)
    where
        S: MessageStore + ?Sized,
    {
        self.panel.deduplicate(store).await;
        let text = render(&self.state);
        let status = self.panel.ensure_exists(store, &text).await;
        self.record(status);
        self.log.flush(store).await;
    }
}

/// Handle to a running surface worker.
#[derive(Debug)]
pub struct SurfaceHandle {
    id: SurfaceId,
    commands: mpsc::Sender<Envelope>,
    shared: Arc<Mutex<Surface>>,
    task: JoinHandle<()>,
}

impl SurfaceHandle {
    /// Spawn the worker for `config.surface` on the current runtime.
    pub fn spawn<S, E>(config: CoordinatorConfig, store: Arc<S>, env: E) -> Self
    where
        S: MessageStore,
        E: Environment,
    {
        let id = config.surface;
        let shared = Arc::new(Mutex::new(Surface {
            state: TurnState::new(),
            panel: PanelReconciler::new(id, config.dedup_window),
            log: LogAppender::new(
                id,
                config.log_thread_name.clone(),
                config.log_retention,
                config.log_enabled,
            ),
            panel_stale: false,
        }));

        let repair = ReconnectPolicy::from_config(&config);
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let worker = SurfaceWorker {
            config,
            store,
            env,
            shared: Arc::clone(&shared),
            commands: commands.downgrade(),
            hold_timer: None,
            hold_generation: 0,
            reconcile_timer: None,
            repair,
            repair_timer: None,
            repair_pending: false,
        };
        let task = tokio::spawn(worker.run(receiver));

        Self { id, commands, shared, task }
    }

    /// Surface this worker manages.
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// Queue a command. Returns false if the worker has stopped.
    pub async fn send(&self, command: SurfaceCommand) -> bool {
        self.commands.send(Envelope::command(command)).await.is_ok()
    }

    /// Wait until every command queued before this call has been handled.
    pub async fn settle(&self) {
        let (done, finished) = oneshot::channel();
        if self.commands.send(Envelope { command: None, done: Some(done) }).await.is_ok() {
            let _ = finished.await;
        }
    }

    /// Snapshot of the turn state, taken under the surface lock.
    pub async fn state(&self) -> TurnState {
        self.shared.lock().await.state.clone()
    }

    /// Currently tracked panel message.
    pub async fn panel_message(&self) -> Option<MessageId> {
        self.shared.lock().await.panel.message_id()
    }

    /// Log entries recorded since startup.
    pub async fn log_book(&self) -> LogBook {
        self.shared.lock().await.log.book().clone()
    }

    /// Log sub-surface in use, if discovered.
    pub async fn log_thread(&self) -> Option<SurfaceId> {
        self.shared.lock().await.log.thread()
    }

    /// Stop the worker after it drains queued commands.
    pub async fn shutdown(self) {
        let Self { id, commands, task, .. } = self;
        drop(commands);
        if let Err(err) = task.await {
            warn!(surface = %id, error = %err, "surface worker ended abnormally");
        }
    }
}

struct SurfaceWorker<S, E> {
    config: CoordinatorConfig,
    store: Arc<S>,
    env: E,
    shared: Arc<Mutex<Surface>>,
    commands: mpsc::WeakSender<Envelope>,
    hold_timer: Option<JoinHandle<()>>,
    hold_generation: u64,
    reconcile_timer: Option<JoinHandle<()>>,
    repair: ReconnectPolicy,
    repair_timer: Option<JoinHandle<()>>,
    repair_pending: bool,
}

impl<S, E> SurfaceWorker<S, E>
where
    S: MessageStore,
    E: Environment,
{
    async fn run(mut self, mut receiver: mpsc::Receiver<Envelope>) {
        debug!(surface = %self.config.surface, "surface worker started");
        self.start_reconcile_timer();

        while let Some(Envelope { command, done }) = receiver.recv().await {
            if let Some(command) = command {
                if command == SurfaceCommand::Reconcile {
                    self.repair_pending = false;
                }
                self.handle(command).await;
                self.schedule_repair().await;
            }
            if let Some(done) = done {
                let _ = done.send(());
            }
        }

        debug!(surface = %self.config.surface, "surface worker stopped");
    }

    async fn handle(&mut self, command: SurfaceCommand) {
        let shared = Arc::clone(&self.shared);
        let mut surface = shared.lock().await;
        let store = self.store.as_ref();
        let now = self.env.now();

        let actions = match command {
            SurfaceCommand::Bootstrap { self_id } => {
                surface.panel.set_self_id(self_id);
                surface.log.discover(store).await;
                surface.reconcile(store).await;
                info!(surface = %self.config.surface, panel = ?surface.panel.message_id(), "surface ready");
                return;
            },
            SurfaceCommand::Action(event) => {
                let Some(control) = Control::from_id(&event.control_id) else {
                    debug!(surface = %self.config.surface, control = %event.control_id, "unknown control");
                    if let Err(err) = store.acknowledge(&event).await {
                        warn!(surface = %self.config.surface, error = %err, "acknowledge failed");
                    }
                    return;
                };
                let request = Request::from_control(control, event.actor);
                surface.execute(store, &self.config, request, now, Some(&event)).await
            },
            SurfaceCommand::Remove { actor, target } => {
                let request = Request::Remove { target, actor };
                surface.execute(store, &self.config, request, now, None).await
            },
            SurfaceCommand::HoldExpired { holder, generation } => {
                if generation != self.hold_generation {
                    debug!(surface = %self.config.surface, user = %holder, "stale hold expiry");
                    return;
                }
                info!(surface = %self.config.surface, user = %holder, "hold timeout reached");
                surface.execute(store, &self.config, Request::Expire { holder }, now, None).await
            },
            SurfaceCommand::MoveToBottom => {
                let text = render(&surface.state);
                let status = surface.panel.push_fresh(store, &text).await;
                surface.record(status);
                return;
            },
            SurfaceCommand::Reconcile => {
                surface.reconcile(store).await;
                return;
            },
        };

        for action in actions {
            if let SlotAction::HolderChanged { holder } = action {
                self.restart_hold_timer(holder);
            }
        }
    }

    fn restart_hold_timer(&mut self, holder: Option<UserId>) {
        if let Some(timer) = self.hold_timer.take() {
            timer.abort();
        }
        self.hold_generation += 1;

        let (Some(holder), Some(timeout)) = (holder, self.config.hold_timeout) else {
            return;
        };

        let generation = self.hold_generation;
        let commands = self.commands.clone();
        let env = self.env.clone();
        self.hold_timer = Some(tokio::spawn(async move {
            env.sleep(timeout).await;
            if let Some(commands) = commands.upgrade() {
                let expired = SurfaceCommand::HoldExpired { holder, generation };
                let _ = commands.send(Envelope::command(expired)).await;
            }
        }));
    }

    /// Arm a one-shot reconcile if the last command left the surface out
    /// of sync and none is pending.
    async fn schedule_repair(&mut self) {
        let needs_repair = self.shared.lock().await.needs_repair();
        if !needs_repair {
            if self.repair.attempt() > 0 {
                info!(surface = %self.config.surface, attempts = self.repair.attempt(), "surface repaired");
                self.repair.reset();
            }
            return;
        }
        if self.repair_pending {
            return;
        }

        let delay = self.repair.next_delay(self.env.random_unit());
        warn!(surface = %self.config.surface, ?delay, attempt = self.repair.attempt(), "surface out of sync, scheduling repair");

        if let Some(timer) = self.repair_timer.take() {
            timer.abort();
        }
        self.repair_pending = true;
        let commands = self.commands.clone();
        let env = self.env.clone();
        self.repair_timer = Some(tokio::spawn(async move {
            env.sleep(delay).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Envelope::command(SurfaceCommand::Reconcile)).await;
            }
        }));
    }

    fn start_reconcile_timer(&mut self) {
        let Some(interval) = self.config.reconcile_interval else {
            return;
        };

        let commands = self.commands.clone();
        let env = self.env.clone();
        self.reconcile_timer = Some(tokio::spawn(reconcile_loop(commands, env, interval)));
    }
}

impl<S, E> Drop for SurfaceWorker<S, E> {
    fn drop(&mut self) {
        let timers = [self.hold_timer.take(), self.reconcile_timer.take(), self.repair_timer.take()];
        for timer in timers.into_iter().flatten() {
            timer.abort();
        }
    }
}

async fn reconcile_loop<E: Environment>(
    commands: mpsc::WeakSender<Envelope>,
    env: E,
    interval: Duration,
) {
    loop {
        env.sleep(interval).await;
        let Some(sender) = commands.upgrade() else {
            return;
        };
        if sender.send(Envelope::command(SurfaceCommand::Reconcile)).await.is_err() {
            return;
        }
    }
}
