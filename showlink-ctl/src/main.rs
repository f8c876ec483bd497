//! Operator CLI (showlink-ctl)
//!
//! Sends one typed request to the master's command port, or polls the
//! renderers' heartbeat ports for a status overview. The master address
//! comes from the cluster config unless `--addr` overrides it.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use showlink_common::config::{self, ClusterConfig};
use showlink_common::protocol::Request;
use showlink_common::wire;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for showlink-ctl
#[derive(Parser, Debug)]
#[command(name = "showlink-ctl")]
#[command(about = "Operator control for a showlink cluster")]
#[command(version)]
struct Args {
    /// Cluster configuration file
    #[arg(short, long, env = "SHOWLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Master command address, overriding the config file
    #[arg(long, env = "SHOWLINK_MASTER_ADDR")]
    addr: Option<String>,

    /// Send timeout in milliseconds
    #[arg(long, default_value_t = 1_000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the show
    Start,
    /// Stop playback and the hardware schedule
    Stop,
    /// Pause playback on every renderer
    Pause,
    /// Resume paused playback
    Resume,
    /// Select a branch item for the next play position
    Select { index: u32 },
    /// Push a blend test image to the fusion nodes
    FusionTest {
        image: String,
        #[arg(default_value_t = 1.0)]
        factor: f32,
    },
    /// Run the party lighting program
    Party {
        #[arg(default_value_t = 8)]
        lamps: u8,
    },
    /// Turn every light off
    LightsOut,
    /// Wake the render nodes
    Wake,
    /// Reboot the render nodes
    Reboot,
    /// Shut the cluster down
    Shutdown,
    /// Poll every renderer's buffer metrics
    Status,
}

impl Command {
    fn request(&self) -> Option<Request> {
        match self {
            Command::Start => Some(Request::Start),
            Command::Stop => Some(Request::Stop),
            Command::Pause => Some(Request::Pause { paused: true }),
            Command::Resume => Some(Request::Pause { paused: false }),
            Command::Select { index } => Some(Request::Select { index: *index }),
            Command::FusionTest { image, factor } => Some(Request::FusionTest {
                image: image.clone(),
                factor: *factor,
            }),
            Command::Party { lamps } => Some(Request::Party { lamps: *lamps }),
            Command::LightsOut => Some(Request::LightsOut),
            Command::Wake => Some(Request::Wake),
            Command::Reboot => Some(Request::Reboot),
            Command::Shutdown => Some(Request::Shutdown),
            Command::Status => None,
        }
    }
}

fn load_config(args: &Args) -> Result<ClusterConfig> {
    let path = config::resolve_config_path(args.config.as_deref());
    ClusterConfig::load(&path)
        .with_context(|| format!("loading cluster config {}", path.display()))
}

fn master_addr(args: &Args) -> Result<String> {
    if let Some(addr) = &args.addr {
        return Ok(addr.clone());
    }
    Ok(load_config(args)?.master().command_addr())
}

async fn status(args: &Args, timeout: Duration) -> Result<()> {
    let cluster = load_config(args)?;
    for node in cluster.renderers() {
        let addr = node.heartbeat_addr();
        match wire::fetch_metrics(&addr, timeout).await {
            Ok(metrics) => {
                let position = metrics
                    .current
                    .map(|p| format!("item {} at {}us", p.index, p.timestamp_us))
                    .unwrap_or_else(|| "idle".to_string());
                println!(
                    "{}  frames {}/{}  samples {}  heap {}B  {}",
                    node.key(),
                    metrics.frame_count,
                    metrics.frame_capacity,
                    metrics.sample_count,
                    metrics.heap_bytes,
                    position
                );
            }
            Err(e) => println!("{}  unreachable ({})", node.key(), e),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "showlink_ctl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let timeout = Duration::from_millis(args.timeout_ms);

    match args.command.request() {
        Some(request) => {
            let addr = master_addr(&args)?;
            wire::send_request(&addr, &request, timeout)
                .await
                .with_context(|| format!("sending {} to {}", request, addr))?;
            println!("sent {} to {}", request, addr);
        }
        None => status(&args, timeout).await?,
    }
    Ok(())
}
