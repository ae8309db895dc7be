//! Game Session
//!
//! One peer's view of a match in a room: the match state, its engine
//! adapters, the transport to the other player, and the post-game rematch
//! handshake. Every entry point is a synchronous handler; the async driver
//! calls them from a single loop so they never overlap.

use tracing::{debug, info, warn};

use crate::game::config::GameConfig;
use crate::game::events::{GameEvent, GameEventData, SessionListener};
use crate::game::game_over::{EndCause, GameResult};
use crate::game::input::{PointerButton, RemoteInputRelay};
use crate::game::physics::PhysicsWorld;
use crate::game::rematch::{RematchDecision, RematchNegotiator, RematchResolution};
use crate::game::state::{MatchError, MatchState, Side};
use crate::game::tick::{host_tick, mirror_tick};
use crate::game::turn::TurnPhase;
use crate::game::viewport::Viewport;
use crate::network::protocol::{Envelope, PeerMessage};
use crate::network::room::RoomId;
use crate::network::sync::{SyncBroadcaster, SyncReconciler};
use crate::network::transport::Transport;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Match in progress.
    Playing,
    /// Match over, waiting for rematch decisions.
    Ended,
    /// Session disbanded; the room is released on teardown.
    Closed,
}

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Tuning constants.
    pub game: GameConfig,
    /// This peer's role.
    pub role: Side,
    /// Piece RNG seed.
    pub seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            role: Side::Host,
            seed: 0,
        }
    }
}

/// Snapshot of a session for display and logging.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// This peer's role
    pub role: Side,
    /// Room, if connected
    pub room_id: Option<RoomId>,
    /// Lifecycle state
    pub state: SessionState,
    /// Side on turn
    pub turn: Side,
    /// Turn phase
    pub phase: TurnPhase,
    /// Settled pieces
    pub score: u32,
    /// Countdown
    pub time_left_secs: u32,
    /// Result, once ended
    pub result: Option<GameResult>,
}

/// A match session bound to its physics, viewport, transport and listener.
pub struct GameSession<P, V, L>
where
    P: PhysicsWorld,
    V: Viewport,
    L: SessionListener,
{
    state: MatchState,
    physics: P,
    viewport: V,
    transport: Transport,
    relay: RemoteInputRelay,
    negotiator: RematchNegotiator,
    listener: L,
    lifecycle: SessionState,
}

impl<P, V, L> GameSession<P, V, L>
where
    P: PhysicsWorld,
    V: Viewport,
    L: SessionListener,
{
    /// Create a session. Offline transports play both turns locally.
    pub fn new(config: SessionConfig, transport: Transport, physics: P, viewport: V, listener: L) -> Self {
        let offline = transport.is_offline();
        let negotiator = if offline {
            RematchNegotiator::offline()
        } else {
            RematchNegotiator::online()
        };
        Self {
            state: MatchState::new(config.game, config.role, offline, config.seed),
            physics,
            viewport,
            transport,
            relay: RemoteInputRelay::new(),
            negotiator,
            listener,
            lifecycle: SessionState::Playing,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Match state.
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Lifecycle state.
    pub fn lifecycle(&self) -> SessionState {
        self.lifecycle
    }

    /// True once the session has been disbanded. The room may still be
    /// held until [`teardown`](Self::teardown).
    pub fn is_closed(&self) -> bool {
        self.lifecycle == SessionState::Closed
    }

    /// Physics adapter.
    pub fn physics(&self) -> &P {
        &self.physics
    }

    /// Viewport adapter.
    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    /// Event listener.
    pub fn listener(&self) -> &L {
        &self.listener
    }

    /// Mutable event listener.
    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// Rematch handshake.
    pub fn negotiator(&self) -> &RematchNegotiator {
        &self.negotiator
    }

    /// Transport to the other peer.
    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    /// Summary for display.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            role: self.state.role,
            room_id: self.transport.room_id().cloned(),
            state: self.lifecycle,
            turn: self.state.turn.turn(),
            phase: self.state.turn.phase(),
            score: self.state.score,
            time_left_secs: self.state.time_left_secs,
            result: self.state.result(),
        }
    }

    // -------------------------------------------------------------------------
    // Timers
    // -------------------------------------------------------------------------

    /// Publish initial world bounds. The first piece spawns on the first
    /// authoritative tick.
    pub fn start(&mut self) {
        self.state.bounds.publish(&mut self.physics, &mut self.viewport);
        info!(
            "Session started: role={} room={:?} offline={}",
            self.state.role,
            self.transport.room_id().map(RoomId::as_str),
            self.state.offline
        );
    }

    /// Physics step.
    pub fn on_physics_tick(&mut self, dt: f32) {
        if self.lifecycle != SessionState::Playing {
            return;
        }
        let result = if self.state.is_authoritative() {
            host_tick(&mut self.state, &mut self.physics, &mut self.viewport, dt)
        } else {
            mirror_tick(&mut self.state, &mut self.physics, dt)
        };
        for event in &result.events {
            self.listener.on_event(event);
        }
        self.after_update();
    }

    /// Sync cadence: the host broadcasts a snapshot, the client flushes its
    /// throttled move.
    pub fn on_sync_timer(&mut self) {
        if self.lifecycle != SessionState::Playing || self.transport.is_offline() {
            return;
        }
        match self.state.role {
            Side::Host => self.broadcast_snapshot(),
            Side::Client => {
                if !self.state.is_my_turn() {
                    return;
                }
                if let Some(command) = self.relay.flush() {
                    self.send(PeerMessage::Input(command));
                }
            }
        }
    }

    /// One second of countdown.
    pub fn on_clock_second(&mut self) {
        if self.lifecycle != SessionState::Playing {
            return;
        }
        self.state.tick_clock();
        self.after_update();
    }

    // -------------------------------------------------------------------------
    // Local input
    // -------------------------------------------------------------------------

    /// Pointer moved to world `x`. Returns true if the held piece moved.
    pub fn pointer_move(&mut self, x: f32) -> bool {
        if self.lifecycle != SessionState::Playing || !self.state.is_my_turn() {
            return false;
        }
        if !self.state.move_held(x, &mut self.physics) {
            return false;
        }
        if !self.state.is_authoritative() {
            self.relay.on_pointer_move(self.state.config.clamp_x(x));
        }
        true
    }

    /// Pointer released: primary drops, secondary rotates.
    pub fn pointer_release(&mut self, button: PointerButton) -> Result<(), SessionError> {
        if self.lifecycle != SessionState::Playing {
            return Err(SessionError::NotPlaying);
        }
        if !self.state.is_my_turn() {
            return Err(SessionError::NotYourTurn);
        }
        match button {
            PointerButton::Primary => {
                self.state.drop_held(&mut self.physics)?;
            }
            PointerButton::Secondary => {
                if !self.state.rotate_held(&mut self.physics) {
                    return Err(SessionError::NothingHeld);
                }
            }
        }
        if !self.state.is_authoritative() {
            for command in self.relay.on_pointer_release(button) {
                self.send(PeerMessage::Input(command));
            }
        }
        self.after_update();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Remote messages
    // -------------------------------------------------------------------------

    /// Handle one message from the other peer.
    pub fn handle_envelope(&mut self, envelope: Envelope) {
        if self.is_closed() {
            return;
        }
        let format = self.state.config.wire_format;
        let message = match PeerMessage::decode(&envelope, format) {
            Ok(message) => message,
            Err(e) => {
                let preview = &envelope.payload[..envelope.payload.len().min(16)];
                warn!("Undecodable {} payload ({}): {}", envelope.channel, hex::encode(preview), e);
                return;
            }
        };

        match (self.state.role, message) {
            (Side::Host, PeerMessage::Input(command)) => {
                self.state.apply_remote_input(command, &mut self.physics);
            }
            (Side::Client, PeerMessage::Sync(snapshot)) => {
                let report = SyncReconciler::apply(&mut self.state, &snapshot, &mut self.physics, &mut self.viewport);
                if report.turn_changed {
                    self.relay.reset();
                }
            }
            (Side::Client, PeerMessage::Result(result)) => {
                if self.state.end(result, EndCause::Remote) {
                    info!("Adopted result {:?} from host", result);
                }
            }
            (_, PeerMessage::Rematch(decision)) => self.remote_rematch(decision),
            (role, other) => {
                debug!("{} ignoring {} message", role, other.channel());
            }
        }
        self.after_update();
    }

    // -------------------------------------------------------------------------
    // Rematch
    // -------------------------------------------------------------------------

    /// Record and transmit the local player's post-game decision.
    pub fn choose_rematch(&mut self, decision: RematchDecision) -> Result<Option<RematchResolution>, SessionError> {
        if self.lifecycle != SessionState::Ended {
            return Err(SessionError::NotEnded);
        }
        if self.negotiator.local().is_some() {
            return Ok(None);
        }
        let resolution = self.decide_local(decision);
        self.deliver_events();
        Ok(resolution)
    }

    /// Leave at the player's request.
    ///
    /// After game over an undecided player's exit is sent as `Quit`, so the
    /// other player returns to the lobby too. The room itself is released by
    /// [`teardown`](Self::teardown).
    pub fn quit(&mut self) {
        if self.lifecycle == SessionState::Ended && self.negotiator.resolution().is_none() {
            self.decide_local(RematchDecision::Quit);
        }
        self.close();
    }

    fn decide_local(&mut self, decision: RematchDecision) -> Option<RematchResolution> {
        info!("{} chose {:?}", self.state.role, decision);
        self.send(PeerMessage::Rematch(decision));
        let side = self.state.role;
        self.state.push_event(GameEvent::new(self.state.tick, GameEventData::RematchDecided { side, decision }));

        let resolution = self.negotiator.set_local(decision);
        if let Some(resolution) = resolution {
            self.resolve(resolution);
        }
        resolution
    }

    fn remote_rematch(&mut self, decision: RematchDecision) {
        if self.lifecycle != SessionState::Ended {
            debug!("Ignoring rematch {:?} outside game over", decision);
            return;
        }
        let side = self.state.role.other();
        self.state.push_event(GameEvent::new(self.state.tick, GameEventData::RematchDecided { side, decision }));
        if let Some(resolution) = self.negotiator.set_remote(decision) {
            self.resolve(resolution);
        }
    }

    fn resolve(&mut self, resolution: RematchResolution) {
        info!("Rematch resolved: {:?}", resolution);
        self.state.push_event(GameEvent::new(self.state.tick, GameEventData::RematchResolved { resolution }));
        match resolution {
            RematchResolution::Restart => self.restart(),
            RematchResolution::ReturnToLobby => self.close(),
        }
    }

    /// Fresh match in the same room with the same roles.
    pub fn restart(&mut self) {
        self.state.reset(&mut self.physics, &mut self.viewport);
        self.negotiator.reset();
        self.relay.reset();
        self.lifecycle = SessionState::Playing;
        info!("Restarted match as {}", self.state.role);
    }

    /// Close the session if still open, then leave the room. Idempotent.
    ///
    /// Call after the timers and the inbox have been dropped.
    pub fn teardown(&mut self) {
        self.close();
        self.transport.leave();
    }

    /// Stop handling timers, input and messages. The room is kept until
    /// [`teardown`](Self::teardown).
    fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.lifecycle = SessionState::Closed;
        self.state.push_event(GameEvent::new(self.state.tick, GameEventData::ReturnedToLobby));
        self.deliver_events();
        info!("Session closed");
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn send(&self, message: PeerMessage) {
        self.transport.send(&message, self.state.config.wire_format);
    }

    fn broadcast_snapshot(&self) {
        self.send(PeerMessage::Sync(SyncBroadcaster::snapshot(&self.state)));
    }

    /// Detect the transition into game over and deliver pending events.
    fn after_update(&mut self) {
        if self.lifecycle == SessionState::Playing && self.state.is_ended() {
            self.lifecycle = SessionState::Ended;
            if let (Side::Host, false, Some(result)) =
                (self.state.role, self.transport.is_offline(), self.state.result())
            {
                // Final poses first so the client shows the collapse.
                self.broadcast_snapshot();
                self.send(PeerMessage::Result(result));
            }
        }
        self.deliver_events();
    }

    fn deliver_events(&mut self) {
        for event in self.state.take_events() {
            self.listener.on_event(&event);
        }
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The match is not in progress.
    #[error("Match not in progress")]
    NotPlaying,

    /// Rematch requested before game over.
    #[error("Match has not ended")]
    NotEnded,

    /// Local input on the other player's turn.
    #[error("Not your turn")]
    NotYourTurn,

    /// No held piece to act on.
    #[error("No held piece")]
    NothingHeld,

    /// Match state rejected the operation.
    #[error(transparent)]
    Match(#[from] MatchError),
}
