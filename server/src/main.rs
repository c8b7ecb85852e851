use clap::Parser;
use log::info;
use server::broadcast::Broadcaster;
use server::service::Coordinator;
use shared::{Announcement, DEFAULT_CONTROL_PORT, DEFAULT_DISCOVERY_PORT};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TEXT: &str =
    "The quick brown fox jumps over the lazy dog while every racer hammers the keys.";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the control channel to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Control channel port
    #[arg(short, long, default_value_t = DEFAULT_CONTROL_PORT)]
    port: u16,

    /// UDP port for discovery announcements
    #[arg(long, default_value_t = DEFAULT_DISCOVERY_PORT)]
    discovery_port: u16,

    /// Session label shown to participants browsing for a race
    #[arg(short, long, default_value = "Typedash Room")]
    label: String,

    /// Maximum number of participants
    #[arg(short, long, default_value_t = 4)]
    capacity: usize,

    /// The passage everyone races to type
    #[arg(short, long, default_value = DEFAULT_TEXT)]
    text: String,

    /// Read the passage from a file instead of --text
    #[arg(long)]
    text_file: Option<String>,

    /// Seconds between discovery announcements
    #[arg(long, default_value_t = 1)]
    announce_interval: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let text = match &args.text_file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => args.text.clone(),
    };

    let bind_addr = format!("{}:{}", args.host, args.port);
    let mut coordinator = Coordinator::start(&bind_addr, text, args.capacity).await?;

    let control_port = coordinator.local_addr().port();
    let state = coordinator.state();
    let label = args.label.clone();
    let mut broadcaster = Broadcaster::start(
        args.discovery_port,
        move || {
            let state = Arc::clone(&state);
            let label = label.clone();
            async move {
                let session = state.read().await;
                Announcement {
                    control_port,
                    label,
                    player_count: session.player_count(),
                    capacity: session.capacity(),
                }
            }
        },
        Duration::from_secs(args.announce_interval),
    )
    .await?;

    info!(
        "Session '{}' open for up to {} participants",
        args.label, args.capacity
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    broadcaster.stop().await;
    coordinator.stop().await;

    Ok(())
}
