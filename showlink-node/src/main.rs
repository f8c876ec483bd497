//! Render node (showlink-node) - Main entry point
//!
//! Runs one video/fusion renderer: media buffer, playback tasks,
//! command listener, and heartbeat listener.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use showlink_common::config::{self, ClusterConfig};
use showlink_common::playorder::PlayOrder;
use showlink_node::command;
use showlink_node::engine::NodeEngine;
use showlink_node::heartbeat;
use showlink_node::sink::NullSink;
use showlink_node::source::SyntheticOpener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for showlink-node
#[derive(Parser, Debug)]
#[command(name = "showlink-node")]
#[command(about = "Render node for a showlink cluster")]
#[command(version)]
struct Args {
    /// Cluster configuration file
    #[arg(short, long, env = "SHOWLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Command listener bind address
    #[arg(long, default_value = "0.0.0.0:7400", env = "SHOWLINK_COMMAND_ADDR")]
    command_addr: String,

    /// Heartbeat listener bind address
    #[arg(long, default_value = "0.0.0.0:7401", env = "SHOWLINK_HEARTBEAT_ADDR")]
    heartbeat_addr: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "showlink_node=debug,showlink_common=debug".into()),
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

    let engine = Arc::new(NodeEngine::new(
        cluster.buffer.frame_capacity,
        order,
        cluster.playback.pace_tolerance_us,
        Arc::new(SyntheticOpener),
        Arc::new(NullSink),
        Arc::new(NullSink),
    ));
    info!("node engine initialized");

    let shutdown = CancellationToken::new();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    let command_listener = tokio::net::TcpListener::bind(&args.command_addr)
        .await
        .with_context(|| format!("binding command port {}", args.command_addr))?;
    let heartbeat_listener = tokio::net::TcpListener::bind(&args.heartbeat_addr)
        .await
        .with_context(|| format!("binding heartbeat port {}", args.heartbeat_addr))?;

    let command_task = tokio::spawn(showlink_common::wire::serve_requests(
        command_listener,
        tx,
        shutdown.clone(),
    ));
    let heartbeat_task = tokio::spawn(heartbeat::serve_heartbeat(
        heartbeat_listener,
        engine.buffer(),
        shutdown.clone(),
    ));
    let dispatch_task = tokio::spawn(command::dispatch_loop(
        rx,
        Arc::clone(&engine),
        shutdown.clone(),
    ));

    tokio::select! {
        _ = signal::ctrl_c() => info!("interrupt received, shutting down"),
        _ = shutdown.cancelled() => info!("shutdown requested over the wire"),
    }
    shutdown.cancel();
    engine.stop().await;

    let _ = command_task.await;
    let _ = heartbeat_task.await;
    let _ = dispatch_task.await;
    info!("node stopped");
    Ok(())
}
