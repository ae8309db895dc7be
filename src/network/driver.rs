//! Session Driver
//!
//! Runs a [`GameSession`] on the current task: physics, sync and clock
//! timers, the peer inbox, UI commands and shutdown are multiplexed through
//! one `select!` loop, so handlers never overlap. On exit the timers and
//! inbox are dropped before the room is left.

use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::game::events::SessionListener;
use crate::game::input::PointerButton;
use crate::game::physics::PhysicsWorld;
use crate::game::rematch::RematchDecision;
use crate::game::viewport::Viewport;
use crate::network::protocol::Envelope;
use crate::network::session::{GameSession, SessionSummary};

/// Local player action forwarded from the UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiCommand {
    /// Pointer moved to world X.
    PointerMove(f32),
    /// Pointer button released.
    PointerRelease(PointerButton),
    /// Post-game choice.
    Rematch(RematchDecision),
    /// Leave now. After game over the other player is sent `Quit`.
    Quit,
}

/// Why the driver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverExit {
    /// Rematch handshake or a quit sent the player back to the lobby.
    ReturnedToLobby,
    /// Shutdown signal received.
    Shutdown,
    /// The UI command channel closed.
    Detached,
}

/// Final report from [`run_session`].
#[derive(Debug, Clone, PartialEq)]
pub struct DriverReport {
    /// Why the loop ended.
    pub exit: DriverExit,
    /// Session state at exit.
    pub summary: SessionSummary,
}

/// Drive a session until it closes, the UI detaches, or shutdown fires.
pub async fn run_session<P, V, L>(
    session: &mut GameSession<P, V, L>,
    mut commands: mpsc::UnboundedReceiver<UiCommand>,
    mut shutdown: broadcast::Receiver<()>,
) -> DriverReport
where
    P: PhysicsWorld,
    V: Viewport,
    L: SessionListener,
{
    let config = session.state().config.clone();
    let dt = config.physics_tick().as_secs_f32();

    let mut physics_timer = time::interval(config.physics_tick());
    physics_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sync_timer = time::interval(config.sync_interval());
    sync_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let second = Duration::from_secs(1);
    let mut clock_timer = time::interval_at(Instant::now() + second, second);

    let mut inbox = session.transport_mut().take_inbox();
    session.start();

    let exit = loop {
        tokio::select! {
            _ = physics_timer.tick() => session.on_physics_tick(dt),
            _ = sync_timer.tick() => session.on_sync_timer(),
            _ = clock_timer.tick() => session.on_clock_second(),
            envelope = next_envelope(&mut inbox) => match envelope {
                Some(envelope) => session.handle_envelope(envelope),
                None => {
                    debug!("Peer inbox closed");
                    inbox = None;
                }
            },
            command = commands.recv() => match command {
                Some(command) => apply_command(session, command),
                None => break DriverExit::Detached,
            },
            _ = shutdown.recv() => break DriverExit::Shutdown,
        }

        if session.is_closed() {
            break DriverExit::ReturnedToLobby;
        }
    };

    drop(physics_timer);
    drop(sync_timer);
    drop(clock_timer);
    drop(inbox);
    session.teardown();

    let summary = session.summary();
    info!("Driver stopped ({:?}): {:?}", exit, summary);
    DriverReport { exit, summary }
}

async fn next_envelope(inbox: &mut Option<mpsc::UnboundedReceiver<Envelope>>) -> Option<Envelope> {
    match inbox {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn apply_command<P, V, L>(session: &mut GameSession<P, V, L>, command: UiCommand)
where
    P: PhysicsWorld,
    V: Viewport,
    L: SessionListener,
{
    match command {
        UiCommand::PointerMove(x) => {
            session.pointer_move(x);
        }
        UiCommand::PointerRelease(button) => {
            if let Err(e) = session.pointer_release(button) {
                debug!("Pointer release ignored: {}", e);
            }
        }
        UiCommand::Rematch(decision) => {
            if let Err(e) = session.choose_rematch(decision) {
                warn!("Rematch choice rejected: {}", e);
            }
        }
        UiCommand::Quit => session.quit(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::GameConfig;
    use crate::game::events::{EventLog, GameEventData};
    use crate::game::game_over::GameResult;
    use crate::game::physics::SimplePhysics;
    use crate::game::state::Side;
    use crate::game::viewport::RecordingViewport;
    use crate::network::room::RoomId;
    use crate::network::session::{SessionConfig, SessionState};
    use crate::network::transport::{LoopbackNetwork, PeerNetwork, Transport};

    type TestSession = GameSession<SimplePhysics, RecordingViewport, EventLog>;

    fn fast_config() -> GameConfig {
        GameConfig {
            physics_tick_ms: 5,
            sync_interval_ms: 10,
            match_duration_secs: 2,
            ..GameConfig::default()
        }
    }

    fn session(role: Side, transport: Transport) -> TestSession {
        let config = SessionConfig { game: fast_config(), role, seed: 5 };
        let physics = SimplePhysics::new(&config.game);
        let viewport = RecordingViewport::new(config.game.screen_width);
        GameSession::new(config, transport, physics, viewport, EventLog::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_leaves_room() {
        let network = LoopbackNetwork::new();
        let room_id = RoomId::parse("DRV001").unwrap();
        let room = network.join(&room_id).await.unwrap();
        let mut host = session(Side::Host, Transport::Connected(Box::new(room)));

        let (_commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let stopper = async {
            time::sleep(Duration::from_millis(100)).await;
            let _ = shutdown_tx.send(());
        };
        let (report, ()) = tokio::join!(run_session(&mut host, commands_rx, shutdown_rx), stopper);

        assert_eq!(report.exit, DriverExit::Shutdown);
        assert_eq!(report.summary.state, SessionState::Closed);
        assert_eq!(network.room_count(), 0);
        assert!(host.state().pieces.held().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_quit() {
        let network = LoopbackNetwork::new();
        let room_id = RoomId::parse("DRV002").unwrap();
        let host_room = network.join(&room_id).await.unwrap();
        let client_room = network.join(&room_id).await.unwrap();
        let mut host = session(Side::Host, Transport::Connected(Box::new(host_room)));
        let mut client = session(Side::Client, Transport::Connected(Box::new(client_room)));

        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let script = async {
            // Two-second match runs out; then the host asks for a rematch
            // and the client quits.
            time::sleep(Duration::from_millis(2500)).await;
            let _ = host_tx.send(UiCommand::Rematch(RematchDecision::Rematch));
            time::sleep(Duration::from_millis(50)).await;
            let _ = client_tx.send(UiCommand::Rematch(RematchDecision::Quit));
        };

        let (host_report, client_report, ()) = tokio::join!(
            run_session(&mut host, host_rx, shutdown_tx.subscribe()),
            run_session(&mut client, client_rx, shutdown_tx.subscribe()),
            script,
        );

        assert_eq!(host_report.exit, DriverExit::ReturnedToLobby);
        assert_eq!(client_report.exit, DriverExit::ReturnedToLobby);
        assert_eq!(host_report.summary.result, Some(GameResult::Draw));
        assert_eq!(client_report.summary.result, Some(GameResult::Draw));
        assert!(client.listener().contains(|d| *d == GameEventData::ReturnedToLobby));
        assert_eq!(network.room_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_after_timeout_returns_both_to_lobby() {
        let network = LoopbackNetwork::new();
        let room_id = RoomId::parse("DRV003").unwrap();
        let host_room = network.join(&room_id).await.unwrap();
        let client_room = network.join(&room_id).await.unwrap();
        let mut host = session(Side::Host, Transport::Connected(Box::new(host_room)));
        let mut client = session(Side::Client, Transport::Connected(Box::new(client_room)));

        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let (_client_tx, client_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let script = async {
            time::sleep(Duration::from_millis(2500)).await;
            let _ = host_tx.send(UiCommand::Quit);
        };

        // The client never sends anything; it must leave on the host's quit.
        let (host_report, client_report, ()) = tokio::join!(
            run_session(&mut host, host_rx, shutdown_tx.subscribe()),
            run_session(&mut client, client_rx, shutdown_tx.subscribe()),
            script,
        );

        assert_eq!(host_report.exit, DriverExit::ReturnedToLobby);
        assert_eq!(client_report.exit, DriverExit::ReturnedToLobby);
        assert_eq!(client.negotiator().remote(), Some(RematchDecision::Quit));
        assert_eq!(network.room_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_ui_stops_offline_session() {
        let mut solo = session(Side::Host, Transport::Offline);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let script = async move {
            time::sleep(Duration::from_millis(20)).await;
            let _ = commands_tx.send(UiCommand::PointerMove(200.0));
            let _ = commands_tx.send(UiCommand::PointerRelease(PointerButton::Secondary));
            time::sleep(Duration::from_millis(20)).await;
        };
        let (report, ()) = tokio::join!(run_session(&mut solo, commands_rx, shutdown_rx), script);

        assert_eq!(report.exit, DriverExit::Detached);
        let held = solo.state().pieces.held().unwrap();
        assert_eq!(held.position.x, 200.0);
        assert_eq!(held.angle, 45.0);
    }
}
