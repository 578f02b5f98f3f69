//! Turnslot coordinator binary
//!
//! Runs one coordinator against the in-process store, driven by console
//! commands on stdin (see [`turnslot_server::console`]).

use std::{sync::Arc, time::Duration};

use clap::Parser;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::{mpsc, watch},
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use turnslot_core::{CoordinatorConfig, HandoverPolicy, ReconnectPolicy, SurfaceId, UserId};
use turnslot_server::{
    ConsoleGateway, Coordinator, MemoryStore, ServerConfig, ServerError, Supervisor, SystemEnv,
};

/// Single-resource turn-taking coordinator.
#[derive(Parser, Debug)]
#[command(name = "turnslot")]
#[command(about = "Coordinates turns on one shared resource through a chat panel")]
struct Args {
    /// Session credential
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    token: String,

    /// Surface (channel) that hosts the panel
    #[arg(long, env = "CHANNEL_ID")]
    channel: u64,

    /// User id the coordinator posts as
    #[arg(long, env = "TURNSLOT_BOT_ID", default_value_t = 1)]
    bot_id: u64,

    /// Number of turns kept in the log summary
    #[arg(long, env = "TURNSLOT_LOG_RETENTION", default_value_t = turnslot_core::config::DEFAULT_LOG_RETENTION)]
    log_retention: usize,

    /// Post one log line per turn instead of a bounded summary
    #[arg(long)]
    unbounded_log: bool,

    /// Disable the log thread
    #[arg(long)]
    no_log: bool,

    /// Release a holder automatically after this many seconds
    #[arg(long, env = "TURNSLOT_HOLD_TIMEOUT_SECS")]
    hold_timeout_secs: Option<u64>,

    /// Re-check the panel every this many seconds
    #[arg(long, env = "TURNSLOT_RECONCILE_SECS")]
    reconcile_secs: Option<u64>,

    /// Handover policy when the slot frees up (auto, manual)
    #[arg(long, env = "TURNSLOT_HANDOVER", default_value = "auto")]
    handover: String,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, ServerError> {
        let handover: HandoverPolicy = self.handover.parse()?;
        let coordinator = CoordinatorConfig {
            handover,
            log_enabled: !self.no_log,
            log_retention: (!self.unbounded_log).then_some(self.log_retention),
            hold_timeout: self.hold_timeout_secs.map(Duration::from_secs),
            reconcile_interval: self.reconcile_secs.map(Duration::from_secs),
            ..CoordinatorConfig::for_surface(SurfaceId(self.channel))
        };
        Ok(ServerConfig { credential: self.token, self_id: UserId(self.bot_id), coordinator })
    }
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.into_config()?;
    config.validate()?;
    info!(?config, "starting turnslot");

    let surface = config.coordinator.surface;
    let store = Arc::new(MemoryStore::new(config.self_id));
    let coordinator = Coordinator::new(Arc::clone(&store), SystemEnv, config.coordinator.clone());

    let (events_tx, events_rx) = mpsc::channel(256);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let lines = BufReader::new(tokio::io::stdin()).lines();
    let gateway = ConsoleGateway::new(lines, Arc::clone(&store), surface);
    let supervisor = Supervisor::new(
        gateway,
        SystemEnv,
        ReconnectPolicy::from_config(&config.coordinator),
        config.coordinator.sustained_after,
        shutdown_rx,
    );
    let supervisor = tokio::spawn(supervisor.run(events_tx));

    tokio::select! {
        () = coordinator.run(events_rx) => {},
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("interrupted");
        },
    }

    let _ = shutdown_tx.send(true);
    if let Ok(exit) = supervisor.await {
        info!(?exit, "supervisor stopped");
    }
    Ok(())
}
