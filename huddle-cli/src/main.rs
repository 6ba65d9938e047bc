use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::*;
use futures::future::join_all;
use huddle::PeerId;
use huddle::client::{
    CallClient, CallConfig, CallHandle, MemoryBackend, PeerState, PeerStatus,
    SyntheticMediaSource, TransportConfig, TransportFactory, WebRtcTransportFactory,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Mesh video-call signaling coordinator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run several participants in this process and connect them to each other.
    Loopback {
        #[arg(short, long, default_value_t = 3)]
        participants: usize,

        #[arg(short, long, default_value_t = 20)]
        wait_secs: u64,

        /// JSON call configuration. Host candidates only if omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the default call configuration as JSON.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    match Cli::parse().command {
        Commands::Loopback {
            participants,
            wait_secs,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            run_loopback(participants, Duration::from_secs(wait_secs), config).await?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&CallConfig::default())?);
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<CallConfig> {
    let Some(path) = path else {
        return Ok(CallConfig {
            transport: TransportConfig::local_only(),
            ..Default::default()
        });
    };

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))
}

async fn run_loopback(count: usize, wait: Duration, config: CallConfig) -> Result<()> {
    if count < 2 {
        bail!("A call needs at least 2 participants, got {}", count);
    }

    println!(
        "{}",
        format!("📞 Starting loopback call with {} participants...", count)
            .green()
            .bold()
    );

    let backend = Arc::new(MemoryBackend::new());
    let transports: Arc<dyn TransportFactory> = Arc::new(
        WebRtcTransportFactory::new(config.transport.clone())
            .context("Failed to set up the WebRTC API")?,
    );
    let media = Arc::new(SyntheticMediaSource::new());

    let clients: Vec<CallClient> = (1..=count)
        .map(|i| {
            CallClient::new(
                PeerId::from(format!("participant-{i}")),
                config.clone(),
                backend.clone(),
                backend.clone(),
                transports.clone(),
                media.clone(),
            )
        })
        .collect();

    let host = clients[0].start_call().await.context("Failed to start call")?;
    let room = host.room_id().clone();
    println!("   🏠 Room: {}", room.to_string().cyan());

    let mut calls = vec![host];
    for client in &clients[1..] {
        let call = client
            .join_call(&room)
            .await
            .with_context(|| format!("{} failed to join", client.self_id()))?;
        calls.push(call);
    }

    println!("{}", "🔗 Negotiating...".cyan());
    let (connected, statuses) = wait_for_mesh(&calls, count - 1, wait).await?;

    for (client, peers) in clients.iter().zip(&statuses) {
        println!("   👤 {}", client.self_id().to_string().bold());
        for peer in peers {
            print_status(peer);
        }
    }

    for result in join_all(calls.iter().map(CallHandle::end_call)).await {
        result.context("Failed to end call")?;
    }
    info!("Loopback call in room {} ended", room);

    if !connected {
        bail!("Not every pair connected within {}s", wait.as_secs());
    }

    println!("{}", "✨ Every participant connected!".green().bold());
    Ok(())
}

async fn wait_for_mesh(
    calls: &[CallHandle],
    expected: usize,
    wait: Duration,
) -> Result<(bool, Vec<Vec<PeerStatus>>)> {
    let deadline = Instant::now() + wait;

    loop {
        let statuses = join_all(calls.iter().map(CallHandle::peers))
            .await
            .into_iter()
            .collect::<huddle::Result<Vec<_>>>()?;

        let done = statuses.iter().all(|peers| {
            peers.len() == expected && peers.iter().all(|p| p.state == PeerState::Connected)
        });
        if done || Instant::now() >= deadline {
            return Ok((done, statuses));
        }

        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

fn print_status(peer: &PeerStatus) {
    let state = format!("{}", peer.state);
    let state = match peer.state {
        PeerState::Connected => state.green(),
        PeerState::Failed | PeerState::Closed => state.red(),
        _ => state.yellow(),
    };

    println!(
        "      ↳ {:<16} {:<14} {:?}, round {}, retries {}",
        peer.peer_id.to_string(),
        state,
        peer.role,
        peer.round,
        peer.retries
    );
}
