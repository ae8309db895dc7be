//! Match State
//!
//! Everything one peer knows about the running match. On the host (and
//! offline) this is ground truth; on the client it is a mirror that only
//! changes through reconciliation.

use std::fmt;
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::bounds::WorldBoundsManager;
use crate::game::catalog;
use crate::game::config::GameConfig;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::game_over::{EndCause, GameOverDetector, GameResult};
use crate::game::input::InputCommand;
use crate::game::physics::PhysicsWorld;
use crate::game::piece::{PieceError, PieceId, PieceRegistry, StillnessRule};
use crate::game::turn::{TurnError, TurnPhase, TurnStateMachine};
use crate::game::viewport::Viewport;

// =============================================================================
// SIDE
// =============================================================================

/// One of the two players.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Room creator; owns ground truth.
    Host,
    /// Joiner; mirrors the host.
    Client,
}

impl Side {
    /// The opposing side.
    #[inline]
    pub fn other(self) -> Self {
        match self {
            Side::Host => Side::Client,
            Side::Client => Side::Host,
        }
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Host => "host",
            Side::Client => "client",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of one match as seen by one peer.
#[derive(Clone, Debug)]
pub struct MatchState {
    /// Tuning constants
    pub config: GameConfig,

    /// This peer's role
    pub role: Side,

    /// Single-player mode: the local player plays both turns
    pub offline: bool,

    /// Turn and phase
    pub turn: TurnStateMachine,

    /// Held, dropping and settled pieces
    pub pieces: PieceRegistry,

    /// World extent and camera scroll
    pub bounds: WorldBoundsManager,

    /// Terminal result latch
    pub detector: GameOverDetector,

    /// Settled piece count
    pub score: u32,

    /// Countdown in whole seconds
    pub time_left_secs: u32,

    /// Physics ticks since the match started
    pub tick: u32,

    /// Piece kind RNG
    pub rng: DeterministicRng,

    /// Events not yet delivered to the listener
    pending_events: Vec<GameEvent>,
}

impl MatchState {
    /// Create a fresh match.
    pub fn new(config: GameConfig, role: Side, offline: bool, rng_seed: u64) -> Self {
        Self {
            role,
            offline,
            turn: TurnStateMachine::new(),
            pieces: PieceRegistry::new(),
            bounds: WorldBoundsManager::new(&config),
            detector: GameOverDetector::new(config.fall_line()),
            score: 0,
            time_left_secs: config.match_duration_secs,
            tick: 0,
            rng: DeterministicRng::new(rng_seed),
            pending_events: Vec::new(),
            config,
        }
    }

    /// True if this peer's view is ground truth.
    #[inline]
    pub fn is_authoritative(&self) -> bool {
        self.offline || self.role == Side::Host
    }

    /// True if the local player controls the current turn.
    #[inline]
    pub fn is_my_turn(&self) -> bool {
        self.offline || self.turn.turn() == self.role
    }

    /// True once the match is over.
    #[inline]
    pub fn is_ended(&self) -> bool {
        self.turn.is_ended()
    }

    /// The latched result.
    pub fn result(&self) -> Option<GameResult> {
        self.detector.result()
    }

    /// Stillness thresholds from the config.
    pub fn stillness_rule(&self) -> StillnessRule {
        StillnessRule {
            max_speed: self.config.still_speed_threshold,
            max_angular_speed: self.config.still_angular_threshold,
            run_length: self.config.still_ticks_required,
        }
    }

    /// Highest point of the tower: the minimum top bound over every piece and
    /// the ground.
    pub fn tower_top(&self) -> f32 {
        self.pieces
            .iter()
            .map(|p| p.top_bound())
            .fold(self.bounds.bounds().ground_top, f32::min)
    }

    /// Y for the next held piece.
    pub fn spawn_y(&self) -> f32 {
        self.tower_top() - self.config.drop_margin
    }

    /// Held piece belongs to the side on turn (or nothing is held).
    pub fn check_turn_invariant(&self) -> bool {
        self.pieces
            .held()
            .map_or(true, |p| p.owner == self.turn.turn())
    }

    // -------------------------------------------------------------------------
    // Turn actions
    // -------------------------------------------------------------------------

    /// Create the held piece for the side on turn.
    ///
    /// Grows the world so the spawn point has headroom, then scrolls the
    /// camera to follow the tower.
    pub fn spawn_piece(
        &mut self,
        physics: &mut dyn PhysicsWorld,
        viewport: &mut dyn Viewport,
    ) -> Result<PieceId, MatchError> {
        if self.is_ended() {
            return Err(MatchError::Ended);
        }
        if self.turn.phase() != TurnPhase::Spawning {
            return Err(TurnError::InvalidTransition { phase: self.turn.phase(), action: "spawn" }.into());
        }
        let tower_top = self.tower_top();
        let spawn_y = tower_top - self.config.drop_margin;
        self.grow_world(spawn_y, physics, viewport);

        let type_index = catalog::random_kind(&mut self.rng);
        let owner = self.turn.turn();
        let center_x = self.config.center_x();
        let piece = self.pieces.spawn_held(type_index, Vec2::new(center_x, spawn_y), owner)?;
        let id = piece.id;
        if let Some(kind) = piece.kind() {
            physics.spawn_body(id, kind, piece.position, piece.angle, true);
        }
        self.turn.piece_spawned()?;
        self.bounds.follow_tower(tower_top, viewport);

        info!("Spawned {} ({}) for {} at y={}", id, type_index, owner, spawn_y);
        self.push_event(GameEvent::piece_spawned(self.tick, id, type_index, owner));
        Ok(id)
    }

    /// Move the held piece horizontally. Returns false if nothing moved.
    pub fn move_held(&mut self, x: f32, physics: &mut dyn PhysicsWorld) -> bool {
        if !self.turn.accepts_input() {
            return false;
        }
        let x = self.config.clamp_x(x);
        let Some(piece) = self.pieces.held_mut() else { return false };
        piece.position.x = x;
        physics.set_pose(piece.id, piece.position, piece.angle);
        true
    }

    /// Rotate the held piece by one step.
    pub fn rotate_held(&mut self, physics: &mut dyn PhysicsWorld) -> bool {
        if !self.turn.accepts_input() {
            return false;
        }
        let step = self.config.rotate_step_degrees;
        let Some(piece) = self.pieces.held_mut() else { return false };
        piece.angle = (piece.angle + step).rem_euclid(360.0);
        physics.set_pose(piece.id, piece.position, piece.angle);
        true
    }

    /// Release the held piece.
    ///
    /// Only the authoritative peer hands the body to the simulation; a client
    /// keeps it kinematic and follows the host's poses.
    pub fn drop_held(&mut self, physics: &mut dyn PhysicsWorld) -> Result<PieceId, MatchError> {
        if self.is_ended() {
            return Err(MatchError::Ended);
        }
        if self.pieces.held().is_none() {
            return Err(MatchError::Piece(PieceError::NoHeldPiece));
        }
        self.turn.release()?;
        let id = self.pieces.release()?;
        if self.is_authoritative() {
            physics.set_kinematic(id, false);
        }
        info!("Dropped {}", id);
        self.push_event(GameEvent::new(self.tick, GameEventData::PieceDropped { piece_id: id }));
        Ok(id)
    }

    /// Apply a command received from the client.
    ///
    /// Accepted only while it is the client's turn and a piece is held;
    /// anything else is stale and silently discarded.
    pub fn apply_remote_input(&mut self, command: InputCommand, physics: &mut dyn PhysicsWorld) -> bool {
        if self.is_ended() || self.turn.turn() != Side::Client || self.pieces.held().is_none() {
            debug!("Discarding stale input {:?} (turn={}, phase={:?})", command, self.turn.turn(), self.turn.phase());
            return false;
        }
        match command {
            InputCommand::Move { x } => self.move_held(x, physics),
            InputCommand::Rotate => self.rotate_held(physics),
            InputCommand::Drop => self.drop_held(physics).is_ok(),
        }
    }

    /// Copy simulated poses back onto the pieces.
    pub fn pull_poses(&mut self, physics: &dyn PhysicsWorld) {
        for id in self.pieces.ids() {
            if let (Some(body), Some(piece)) = (physics.body_state(id), self.pieces.get_mut(id)) {
                piece.position = body.position;
                piece.angle = body.angle;
            }
        }
    }

    /// Confirm the dropping piece has settled: score it and pass the turn.
    pub fn complete_turn(&mut self, id: PieceId) -> Result<Side, MatchError> {
        self.score += 1;
        self.push_event(GameEvent::piece_settled(self.tick, id, self.score));
        let next = self.turn.piece_settled()?;
        info!("{} settled (score {}), turn -> {}", id, self.score, next);
        self.push_event(GameEvent::new(self.tick, GameEventData::TurnChanged { turn: next }));
        Ok(next)
    }

    /// Follow the host's turn value.
    ///
    /// When the turn moves on, whatever piece was active locally is settled
    /// so the next snapshot can hand over a new held piece.
    pub fn mirror_turn(&mut self, turn: Side) -> bool {
        if !self.turn.mirror_turn(turn) {
            return false;
        }
        if let Some(id) = self.pieces.settle_active() {
            debug!("Settled {} on turn change", id);
        }
        self.score = self.pieces.settled_len() as u32;
        self.push_event(GameEvent::new(self.tick, GameEventData::TurnChanged { turn }));
        true
    }

    /// Grow the world for `target_y`, recording an event if it grew.
    pub fn grow_world(&mut self, target_y: f32, physics: &mut dyn PhysicsWorld, viewport: &mut dyn Viewport) {
        if self.bounds.ensure_headroom(target_y, physics, viewport) > 0 {
            let bounds = self.bounds.bounds();
            self.push_event(GameEvent::new(
                self.tick,
                GameEventData::WorldGrown { top: bounds.top, height: bounds.height },
            ));
        }
    }

    // -------------------------------------------------------------------------
    // Clock and end
    // -------------------------------------------------------------------------

    /// Count down one second. Returns a result if the clock ran out here.
    pub fn tick_clock(&mut self) -> Option<GameResult> {
        if self.is_ended() {
            return None;
        }
        self.time_left_secs = self.time_left_secs.saturating_sub(1);
        if !self.is_authoritative() {
            return None;
        }
        let result = self.detector.check_timeout(self.time_left_secs)?;
        self.end(result, EndCause::Timeout).then_some(result)
    }

    /// Latch the result and enter `Ended`. Returns false if already ended.
    pub fn end(&mut self, result: GameResult, cause: EndCause) -> bool {
        if !self.detector.fire(result, cause) {
            return false;
        }
        self.turn.end();
        info!("Game over: {:?} ({:?}) after {} ticks", result, cause, self.tick);
        self.push_event(GameEvent::game_ended(self.tick, result, cause));
        true
    }

    /// Fresh match in place: same role and room, Host on turn.
    pub fn reset(&mut self, physics: &mut dyn PhysicsWorld, viewport: &mut dyn Viewport) {
        physics.clear();
        self.pieces.clear();
        self.bounds.reset(physics, viewport);
        self.detector.reset();
        self.turn.reset();
        self.score = 0;
        self.time_left_secs = self.config.match_duration_secs;
        self.tick = 0;
        self.push_event(GameEvent::new(0, GameEventData::Restarted));
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

/// Match-level errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    /// The match is over.
    #[error("Match has ended")]
    Ended,

    /// Turn transition rejected.
    #[error(transparent)]
    Turn(#[from] TurnError),

    /// Piece registry rejected the operation.
    #[error(transparent)]
    Piece(#[from] PieceError),
}

// =============================================================================
// TESTS
// =============================================================================
