//! Master (showlink-master) - Main entry point
//!
//! Runs the cluster master: heartbeat polling, readiness gating, the
//! synchronized start sequence, and the hardware schedule.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use showlink_common::config::{self, ClusterConfig};
use showlink_common::playorder::PlayOrder;
use showlink_common::wire;
use showlink_master::command::{self, MasterContext};
use showlink_master::hardware::LoggingHardware;
use showlink_master::sequencer::StartSequencer;
use showlink_master::transport::WireTransport;
use showlink_master::watcher::BufferWatcher;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for showlink-master
#[derive(Parser, Debug)]
#[command(name = "showlink-master")]
#[command(about = "Master node for a showlink cluster")]
#[command(version)]
struct Args {
    /// Cluster configuration file
    #[arg(short, long, env = "SHOWLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Command listener bind address
    #[arg(long, default_value = "0.0.0.0:7300", env = "SHOWLINK_COMMAND_ADDR")]
    command_addr: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "showlink_master=debug,showlink_common=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config_path = config::resolve_config_path(args.config.as_deref());
    let cluster = ClusterConfig::load(&config_path)
        .with_context(|| format!("loading cluster config {}", config_path.display()))?;
    info!("loaded cluster config from {}", config_path.display());

    let order = PlayOrder::new(&cluster.media, &cluster.playback.default_order)
        .context("building play order")?;
    let renderers = cluster.renderers();
    info!("cluster has {} renderer nodes", renderers.len());

    let transport = Arc::new(WireTransport::from_config(&cluster.transport));
    let watcher = Arc::new(BufferWatcher::new(
        renderers.clone(),
        cluster.buffer.lower_limit,
        Duration::from_millis(cluster.heartbeat.poll_timeout_ms),
    ));
    let hardware = Arc::new(LoggingHardware);
    let sequencer = Arc::new(StartSequencer::new(
        Arc::clone(&transport),
        Arc::clone(&watcher),
        hardware.clone(),
        renderers,
        order,
        cluster.schedule.clone(),
    ));

    let shutdown = CancellationToken::new();
    let poll_task = watcher.spawn_polling(
        Duration::from_millis(cluster.heartbeat.poll_period_ms),
        shutdown.clone(),
    );

    let context = Arc::new(MasterContext {
        config: cluster,
        transport,
        watcher,
        sequencer: Arc::clone(&sequencer),
        hardware: hardware.clone(),
        power: hardware,
    });

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let command_listener = tokio::net::TcpListener::bind(&args.command_addr)
        .await
        .with_context(|| format!("binding command port {}", args.command_addr))?;
    let command_task = tokio::spawn(wire::serve_requests(command_listener, tx, shutdown.clone()));
    let dispatch_task = tokio::spawn(command::dispatch_loop(
        rx,
        Arc::clone(&context),
        shutdown.clone(),
    ));

    tokio::select! {
        _ = signal::ctrl_c() => info!("interrupt received, shutting down"),
        _ = shutdown.cancelled() => info!("shutdown requested over the wire"),
    }
    shutdown.cancel();
    sequencer.stop().await;

    let _ = poll_task.await;
    let _ = command_task.await;
    let _ = dispatch_task.await;
    info!("master stopped");
    Ok(())
}
