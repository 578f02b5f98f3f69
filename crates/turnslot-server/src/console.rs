//! Console gateway.
//!
//! Drives the coordinator from text commands instead of a chat platform
//! session, against the in-process [`MemoryStore`]. Each line is one
//! command:
//!
//! ```text
//! /start <user>            press Start as <user>
//! /release <user>          press Found as <user>
//! /queue <user>            press Join queue as <user>
//! /force <user>            press Force release as <user>
//! /remove <target> <actor> administrative removal
//! /say <user> [text]       post unrelated content as <user>
//! /show                    log the current panel
//! /quit                    stop
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufRead, Lines},
    sync::mpsc,
};
use tracing::{info, warn};
use turnslot_core::{Control, SurfaceId, UserId};

use crate::{
    error::SessionError,
    event::{ActionEvent, InboundEvent},
    memory::MemoryStore,
    supervisor::Gateway,
};

/// Parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Press a panel control.
    Press {
        /// Control to press
        control: Control,
        /// Pressing user
        user: UserId,
    },

    /// Remove a user from the slot and queue.
    Remove {
        /// User to remove
        target: UserId,
        /// Administrator
        actor: UserId,
    },

    /// Post unrelated content.
    Say {
        /// Author
        user: UserId,
        /// Message text
        text: String,
    },

    /// Log the current panel.
    Show,

    /// Stop the coordinator.
    Quit,

    /// Blank line.
    Empty,

    /// Unknown command.
    Unknown {
        /// The original input
        input: String,
    },

    /// Command with missing or invalid arguments.
    InvalidArgs {
        /// Command name
        command: String,
        /// Error message
        error: String,
    },
}

/// Parse one console line.
pub fn parse(input: &str) -> Command {
    let input = input.trim();
    if input.is_empty() {
        return Command::Empty;
    }

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Unknown { input: input.to_string() };
    };

    let parts: Vec<&str> = cmd_str.split_whitespace().collect();
    let command = parts.first().copied().unwrap_or("");

    let press = |control: Control| match user_arg(command, parts.get(1)) {
        Ok(user) => Command::Press { control, user },
        Err(invalid) => invalid,
    };

    match command {
        "start" => press(Control::Start),
        "release" | "found" => press(Control::Release),
        "queue" => press(Control::Queue),
        "force" => press(Control::ForceRelease),

        "remove" => match (user_arg(command, parts.get(1)), user_arg(command, parts.get(2))) {
            (Ok(target), Ok(actor)) => Command::Remove { target, actor },
            (Err(invalid), _) | (_, Err(invalid)) => invalid,
        },

        "say" => match user_arg(command, parts.get(1)) {
            Ok(user) => Command::Say { user, text: parts.get(2..).unwrap_or_default().join(" ") },
            Err(invalid) => invalid,
        },

        "show" => Command::Show,
        "quit" | "q" => Command::Quit,

        _ => Command::Unknown { input: input.to_string() },
    }
}

fn user_arg(command: &str, arg: Option<&&str>) -> Result<UserId, Command> {
    match arg {
        Some(id_str) => id_str.parse::<u64>().map(UserId).map_err(|_| Command::InvalidArgs {
            command: command.to_string(),
            error: "Invalid user ID".into(),
        }),
        None => Err(Command::InvalidArgs {
            command: command.to_string(),
            error: format!("Usage: /{command} <user_id>"),
        }),
    }
}

/// [`Gateway`] reading commands from a line-oriented reader.
pub struct ConsoleGateway<R> {
    lines: Lines<R>,
    store: Arc<MemoryStore>,
    surface: SurfaceId,
}

impl<R> ConsoleGateway<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Create a gateway for `surface` backed by `store`.
    pub fn new(lines: Lines<R>, store: Arc<MemoryStore>, surface: SurfaceId) -> Self {
        Self { lines, store, surface }
    }

    /// Translate one command into events. Returns false to end the session.
    async fn dispatch(&mut self, command: Command, events: &mpsc::Sender<InboundEvent>) -> bool {
        let event = match command {
            Command::Press { control, user } => {
                let Some(panel) = self.store.latest_with_controls(self.surface).await else {
                    warn!(surface = %self.surface, "no panel to press yet");
                    return true;
                };
                InboundEvent::Action(ActionEvent {
                    surface: self.surface,
                    origin: panel.id,
                    actor: user,
                    control_id: control.id().to_string(),
                })
            },
            Command::Remove { target, actor } => {
                InboundEvent::Remove { surface: self.surface, actor, target }
            },
            Command::Say { user, text } => {
                self.store.post_as(self.surface, user, &text).await;
                InboundEvent::ExternalActivity { surface: self.surface, author: user }
            },
            Command::Show => {
                match self.store.panels(self.surface).await.last() {
                    Some(panel) => info!(message = %panel.id, "panel:\n{}", panel.content),
                    None => info!("no panel"),
                }
                return true;
            },
            Command::Quit => InboundEvent::Shutdown,
            Command::Empty => return true,
            Command::Unknown { input } => {
                warn!(%input, "unknown command");
                return true;
            },
            Command::InvalidArgs { command, error } => {
                warn!(%command, %error, "invalid command");
                return true;
            },
        };

        let shutdown = event == InboundEvent::Shutdown;
        events.send(event).await.is_ok() && !shutdown
    }
}

#[async_trait]
impl<R> Gateway for ConsoleGateway<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn run(&mut self, events: mpsc::Sender<InboundEvent>) -> Result<(), SessionError> {
        let self_id = self.store.self_id();
        if events.send(InboundEvent::Ready { self_id }).await.is_err() {
            return Ok(());
        }

        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    if !self.dispatch(parse(&line), &events).await {
                        return Ok(());
                    }
                },
                Ok(None) => {
                    let _ = events.send(InboundEvent::Shutdown).await;
                    return Ok(());
                },
                Err(err) => return Err(SessionError::Closed(err.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

    use super::*;

    #[test]
    fn parse_presses() {
        assert_eq!(parse("/start 1"), Command::Press { control: Control::Start, user: UserId(1) });
        assert_eq!(parse("/found 2"), Command::Press { control: Control::Release, user: UserId(2) });
        assert_eq!(parse("/queue 3"), Command::Press { control: Control::Queue, user: UserId(3) });
        assert_eq!(
            parse("/force 4"),
            Command::Press { control: Control::ForceRelease, user: UserId(4) }
        );
    }

    #[test]
    fn parse_remove() {
        assert_eq!(parse("/remove 2 99"), Command::Remove { target: UserId(2), actor: UserId(99) });
        assert!(matches!(parse("/remove 2"), Command::InvalidArgs { command, .. } if command == "remove"));
    }

    #[test]
    fn parse_say_keeps_text() {
        assert_eq!(
            parse("/say 5 anyone around?"),
            Command::Say { user: UserId(5), text: "anyone around?".into() }
        );
    }

    #[test]
    fn parse_missing_user() {
        assert!(matches!(parse("/start"), Command::InvalidArgs { command, .. } if command == "start"));
        assert!(matches!(parse("/start bob"), Command::InvalidArgs { error, .. } if error == "Invalid user ID"));
    }

    #[test]
    fn parse_misc() {
        assert_eq!(parse(""), Command::Empty);
        assert_eq!(parse("/show"), Command::Show);
        assert_eq!(parse("/q"), Command::Quit);
        assert!(matches!(parse("/dance"), Command::Unknown { .. }));
        assert!(matches!(parse("hello"), Command::Unknown { .. }));
    }

    #[tokio::test]
    async fn gateway_translates_lines() {
        let store = Arc::new(MemoryStore::new(UserId(7)));
        let panel = store.post_panel_copy(SurfaceId(1), "Searching: nobody\n\nQueue: empty").await;

        let input: &[u8] = b"/start 1\n/say 2 hi\n/quit\n/start 3\n";
        let mut gateway = ConsoleGateway::new(BufReader::new(input).lines(), Arc::clone(&store), SurfaceId(1));
        let (events, mut received) = mpsc::channel(16);

        gateway.run(events).await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = received.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                InboundEvent::Ready { self_id: UserId(7) },
                InboundEvent::Action(ActionEvent {
                    surface: SurfaceId(1),
                    origin: panel.id,
                    actor: UserId(1),
                    control_id: "turnslot:start".into(),
                }),
                InboundEvent::ExternalActivity { surface: SurfaceId(1), author: UserId(2) },
                InboundEvent::Shutdown,
            ]
        );
    }

    #[tokio::test]
    async fn gateway_runs_on_spawned_task() {
        let store = Arc::new(MemoryStore::new(UserId(7)));
        store.post_panel_copy(SurfaceId(1), "Searching: nobody\n\nQueue: empty").await;

        // Boxed readers are Send but not Sync.
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(&b"/start 1\n"[..]);
        let mut gateway = ConsoleGateway::new(BufReader::new(reader).lines(), Arc::clone(&store), SurfaceId(1));
        let (events, mut received) = mpsc::channel(16);

        tokio::spawn(async move { gateway.run(events).await }).await.unwrap().unwrap();

        assert_eq!(received.recv().await, Some(InboundEvent::Ready { self_id: UserId(7) }));
        assert!(matches!(received.recv().await, Some(InboundEvent::Action(_))));
        assert_eq!(received.recv().await, Some(InboundEvent::Shutdown));
    }
}
