use clap::Parser;
use client::discovery::{CoordinatorDirectory, Listener};
use client::network::{Client, ClientError, DEFAULT_SYNC_INTERVAL};
use log::{info, warn};
use rand::Rng;
use shared::DEFAULT_DISCOVERY_PORT;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Coordinator address; discovered over the LAN when omitted
    #[arg(short, long)]
    server: Option<SocketAddr>,

    /// UDP port to listen on for coordinator announcements
    #[arg(long, default_value_t = DEFAULT_DISCOVERY_PORT)]
    discovery_port: u16,

    /// Milliseconds between progress sync ticks
    #[arg(long, default_value_t = DEFAULT_SYNC_INTERVAL.as_millis() as u64)]
    sync_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let coordinator_addr = match args.server {
        Some(addr) => addr,
        None => discover_coordinator(args.discovery_port).await?,
    };

    let mut racer = match Client::connect_and_join(coordinator_addr).await {
        Ok(client) => client,
        Err(ClientError::SessionFull) => {
            eprintln!("That session is already full, try another coordinator");
            return Ok(());
        }
        Err(e) => {
            eprintln!("Could not reach coordinator {}: {}", coordinator_addr, e);
            return Ok(());
        }
    };

    let text = racer.fetch_shared_text().await?;
    let goal = text.chars().count() as u32;
    info!(
        "Racing as participant {} over {} characters",
        racer.participant_id(),
        goal
    );

    racer.start_sync_loop(Duration::from_millis(args.sync_interval_ms));

    // Stands in for the real presentation layer: type the passage at a
    // jittered pace and report standings as snapshots come back.
    let mut typed = 0u32;
    let mut rng = rand::thread_rng();
    while typed < goal {
        let pause = rng.gen_range(60..240);
        sleep(Duration::from_millis(pause)).await;
        typed += 1;
        racer.submit_local_progress(typed);

        if typed % 20 == 0 || typed == goal {
            print_standings(&racer.latest_snapshot(), goal);
        }
    }

    // Flush the final progress so the finish is on the board even if
    // the next background tick never runs.
    if let Err(e) = racer.sync_now().await {
        warn!("Could not flush final progress: {}", e);
    }

    // Linger until everyone finishes or the user quits.
    loop {
        let snapshot = racer.latest_snapshot();
        if !snapshot.is_empty() && snapshot.iter().all(|&p| p >= goal) {
            print_standings(&snapshot, goal);
            info!("Race complete");
            break;
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = sleep(Duration::from_secs(1)) => {}
        }
    }

    racer.stop().await;
    Ok(())
}

/// Listens for announcements and returns the first coordinator heard.
async fn discover_coordinator(port: u16) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    info!("Browsing for coordinators on UDP port {}...", port);

    let directory = CoordinatorDirectory::new();
    let callback_directory = directory.clone();
    let mut listener = Listener::start(
        port,
        move |found| callback_directory.record(found),
        Duration::from_millis(250),
    )
    .await?;

    let mut found = None;
    for _ in 0..20 {
        sleep(Duration::from_millis(250)).await;
        if let Some(first) = directory.entries().into_iter().next() {
            found = Some(first);
            break;
        }
    }

    listener.stop().await;
    directory.clear();

    match found {
        Some(coordinator) => {
            info!(
                "Found '{}' at {} ({}/{} racers)",
                coordinator.label,
                coordinator.control_addr(),
                coordinator.player_count,
                coordinator.capacity
            );
            Ok(coordinator.control_addr())
        }
        None => Err("no coordinator announced itself on the local network".into()),
    }
}

fn print_standings(snapshot: &[u32], goal: u32) {
    if snapshot.is_empty() {
        return;
    }

    let standings: Vec<String> = snapshot
        .iter()
        .enumerate()
        .map(|(id, progress)| format!("P{}: {}/{}", id, progress, goal))
        .collect();
    println!("{}", standings.join("  "));
}
