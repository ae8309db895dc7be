//! Tower Duel Demo
//!
//! Plays a scripted match between a host and a client over in-process
//! loopback rooms. Pass a JSON config path to override the tuning.

use std::time::Duration;
use anyhow::Context;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tower_duel::{
    VERSION,
    core::rng::DeterministicRng,
    game::{
        config::GameConfig,
        events::{GameEvent, GameEventData, SessionListener},
        input::PointerButton,
        physics::SimplePhysics,
        rematch::RematchDecision,
        state::Side,
        viewport::RecordingViewport,
    },
    network::{
        driver::{run_session, UiCommand},
        lobby::{Lobby, MemoryClipboard},
        session::{GameSession, SessionConfig},
        transport::{LoopbackNetwork, Transport},
    },
};

/// Match length used when no config file is given.
const DEMO_MATCH_SECS: u32 = 6;

type DemoSession = GameSession<SimplePhysics, RecordingViewport, LogListener>;

/// Logs lifecycle events for one side.
struct LogListener {
    side: Side,
}

impl SessionListener for LogListener {
    fn on_event(&mut self, event: &GameEvent) {
        match &event.data {
            GameEventData::PieceSpawned { piece_id, type_index, owner } => {
                info!("[{}] tick {}: {} spawned {} (type {})", self.side, event.tick, owner, piece_id, type_index);
            }
            GameEventData::PieceSettled { piece_id, score } => {
                info!("[{}] tick {}: {} settled, score {}", self.side, event.tick, piece_id, score);
            }
            GameEventData::GameEnded { result, cause } => {
                info!("[{}] Game over: {:?} ({:?})", self.side, result, cause);
            }
            other => info!("[{}] tick {}: {:?}", self.side, event.tick, other),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")?;

    info!("Tower Duel v{}", VERSION);

    let config = match std::env::args().nth(1) {
        Some(path) => GameConfig::from_json_file(&path).with_context(|| format!("Loading config from {}", path))?,
        None => GameConfig {
            match_duration_secs: DEMO_MATCH_SECS,
            ..GameConfig::default()
        },
    };
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    runtime.block_on(demo_match(config))
}

fn build_session(config: &GameConfig, role: Side, seed: u64, transport: Transport) -> DemoSession {
    let session_config = SessionConfig { game: config.clone(), role, seed };
    GameSession::new(
        session_config,
        transport,
        SimplePhysics::new(config),
        RecordingViewport::new(config.screen_width),
        LogListener { side: role },
    )
}

/// Demo: lobby handshake, one turn each, then the clock runs out.
async fn demo_match(config: GameConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Match ===");

    let network = LoopbackNetwork::new();
    let seed = DeterministicRng::from_entropy().next_u64();
    let mut host_lobby = Lobby::new(network.clone(), seed);
    let mut client_lobby = Lobby::new(network.clone(), seed.wrapping_add(1));

    let hosted = host_lobby.create_room().await?;
    let mut clipboard = MemoryClipboard::default();
    info!("Room {} ({:?} to clipboard)", hosted.room_id(), host_lobby.copy_room_id(&mut clipboard));

    let mut arrival = hosted.on_peer_join();
    let joined = client_lobby.join_room(hosted.room_id().as_str()).await?;
    if !arrival.wait().await {
        anyhow::bail!("Room closed before the opponent arrived");
    }
    host_lobby.peer_arrived();
    info!("Lobby: {:?}", host_lobby.status());

    let host_role = hosted.role;
    let client_role = joined.role;
    let mut host = build_session(&config, host_role, seed, hosted.into_transport());
    let mut client = build_session(&config, client_role, seed, joined.into_transport());

    let (host_tx, host_rx) = mpsc::unbounded_channel();
    let (client_tx, client_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, _) = broadcast::channel(1);

    let interrupt = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt.send(());
        }
    });

    let center = config.center_x();
    let match_length = Duration::from_secs(u64::from(config.match_duration_secs));
    let script = async move {
        sleep(Duration::from_millis(500)).await;
        let _ = host_tx.send(UiCommand::PointerMove(center - 40.0));
        let _ = host_tx.send(UiCommand::PointerRelease(PointerButton::Primary));

        sleep(Duration::from_secs(2)).await;
        let _ = client_tx.send(UiCommand::PointerMove(center + 30.0));
        let _ = client_tx.send(UiCommand::PointerRelease(PointerButton::Secondary));
        let _ = client_tx.send(UiCommand::PointerRelease(PointerButton::Primary));

        sleep(match_length.saturating_sub(Duration::from_millis(2500)) + Duration::from_secs(1)).await;
        let _ = client_tx.send(UiCommand::Rematch(RematchDecision::Rematch));
        let _ = host_tx.send(UiCommand::Rematch(RematchDecision::Quit));
        sleep(Duration::from_millis(200)).await;
    };

    let (host_report, client_report, ()) = tokio::join!(
        run_session(&mut host, host_rx, shutdown_tx.subscribe()),
        run_session(&mut client, client_rx, shutdown_tx.subscribe()),
        script,
    );

    info!("=== Match Results ===");
    for report in [&host_report, &client_report] {
        let summary = &report.summary;
        info!(
            "{}: exit={:?} result={:?} score={} time_left={}s",
            summary.role, report.exit, summary.result, summary.score, summary.time_left_secs
        );
    }
    info!("Open rooms after teardown: {}", network.room_count());
    Ok(())
}
