use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

use huddle::config::LogFormat;
use huddle::media::NullCapture;
use huddle::peer::rtc::{LocalTracks, RemoteTrack, RtcConnector};
use huddle::{ClientConfig, SessionUpdate};

#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Join a Huddle meeting without a user interface")]
struct Args {
    /// Meeting to join
    #[arg(short, long)]
    meeting: String,

    /// Display name shown to other participants
    #[arg(short, long, default_value = "")]
    name: String,

    /// Configuration file (defaults to ./huddle.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ClientConfig::load(args.config.as_deref())?;
    init_tracing(config.log_format);

    tracing::info!("Starting Huddle client...");

    let tracks = Arc::new(LocalTracks::new("huddle-local"));
    let (remote_tx, remote_rx) = mpsc::unbounded_channel();
    let connector = RtcConnector::new(&config.ice_servers, tracks)?.with_remote_tracks(remote_tx);
    tokio::spawn(drain_remote_tracks(remote_rx));

    let (session, handle, mut updates) = huddle::join(
        &config,
        &args.meeting,
        &args.name,
        Arc::new(NullCapture),
        Arc::new(connector),
    )
    .await?;
    let session_task = tokio::spawn(session.run());

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(update) => log_update(&update),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, leaving meeting");
                if let Err(e) = handle.leave() {
                    tracing::debug!("Leave request not delivered: {}", e);
                }
            }
        }
    }

    let ctx = session_task.await?;
    tracing::info!("Left meeting {} after {}", ctx.meeting_id, ctx.elapsed_display());
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let fmt_layer = match format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle=debug".into()),
        )
        .with(fmt_layer)
        .init();
}

fn log_update(update: &SessionUpdate) {
    match update {
        SessionUpdate::Notice {
            level,
            message,
            blocking,
        } => tracing::info!("[{:?}{}] {}", level, if *blocking { ", blocking" } else { "" }, message),
        SessionUpdate::ChatReceived(entry) => {
            tracing::info!("[chat {}] {}: {}", entry.timestamp.format("%H:%M"), entry.sender, entry.message)
        }
        other => tracing::debug!("{:?}", other),
    }
}

/// Nothing renders remote media here, but tracks must be read to keep RTCP flowing
async fn drain_remote_tracks(mut remote_rx: mpsc::UnboundedReceiver<RemoteTrack>) {
    while let Some(RemoteTrack { peer_id, track }) = remote_rx.recv().await {
        tokio::spawn(async move {
            let mut bytes = 0usize;
            while let Ok((packet, _)) = track.read_rtp().await {
                bytes += packet.payload.len();
            }
            tracing::debug!("Track {} from {} ended after {} bytes", track.id(), peer_id, bytes);
        });
    }
}
