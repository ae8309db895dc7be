//! Simulation Tick
//!
//! One physics step on the authoritative peer: advance the world, read poses
//! back, check for collapse, drive the settle/flip/spawn cycle. Mirrors run
//! [`mirror_tick`] instead and never decide anything.

use tracing::warn;

use crate::game::events::GameEvent;
use crate::game::game_over::{EndCause, GameResult};
use crate::game::physics::PhysicsWorld;
use crate::game::piece::PieceId;
use crate::game::state::MatchState;
use crate::game::turn::TurnPhase;
use crate::game::viewport::Viewport;

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Piece that settled this tick
    pub settled: Option<PieceId>,
    /// Result if the match ended this tick
    pub ended: Option<GameResult>,
}

/// Run one authoritative tick.
///
/// Collapse is evaluated before stillness so a piece that falls off while
/// still dropping ends the match rather than passing the turn.
pub fn host_tick(
    state: &mut MatchState,
    physics: &mut dyn PhysicsWorld,
    viewport: &mut dyn Viewport,
    dt: f32,
) -> TickResult {
    let mut result = TickResult::default();
    if state.is_ended() {
        return result;
    }

    // 0. Advance tick counter
    state.tick += 1;

    // 1. Step the world and read poses back
    physics.step(dt);
    state.pull_poses(physics);

    #[cfg(feature = "debug-tracing")]
    tracing::trace!(tick = state.tick, pieces = state.pieces.len(), phase = ?state.turn.phase(), "host tick");

    // 2. Collapse
    let turn = state.turn.turn();
    if let Some(outcome) = state.detector.check_collapse(state.pieces.iter(), turn) {
        if state.end(outcome, EndCause::Collapse) {
            result.ended = Some(outcome);
        }
        result.events = state.take_events();
        return result;
    }

    // 3. Turn cycle
    if state.turn.phase() == TurnPhase::Dropping {
        if let Err(e) = state.turn.begin_settling() {
            warn!("Settling rejected: {}", e);
        }
    }
    match state.turn.phase() {
        TurnPhase::Settling => settle_dropping(state, physics, viewport, &mut result),
        TurnPhase::Spawning => {
            if let Err(e) = state.spawn_piece(physics, viewport) {
                warn!("Spawn failed: {}", e);
            }
        }
        _ => {}
    }

    result.events = state.take_events();
    result
}

/// Feed the dropping piece's speeds to the stillness tracker; on settle,
/// pass the turn and spawn the next piece.
fn settle_dropping(
    state: &mut MatchState,
    physics: &mut dyn PhysicsWorld,
    viewport: &mut dyn Viewport,
    result: &mut TickResult,
) {
    let Some(id) = state.pieces.dropping().map(|p| p.id) else { return };
    let Some(body) = physics.body_state(id) else { return };
    let rule = state.stillness_rule();
    let Some(settled) = state.pieces.observe_stillness(body.speed, body.angular_speed, &rule) else {
        return;
    };
    result.settled = Some(settled);

    if let Err(e) = state.complete_turn(settled) {
        warn!("Turn flip failed: {}", e);
        return;
    }
    if let Err(e) = state.spawn_piece(physics, viewport) {
        warn!("Spawn failed: {}", e);
    }
}

/// Tick on a mirror: only the local step and counter advance.
pub fn mirror_tick(state: &mut MatchState, physics: &mut dyn PhysicsWorld, dt: f32) -> TickResult {
    if state.is_ended() {
        return TickResult::default();
    }
    state.tick += 1;
    physics.step(dt);
    TickResult {
        events: state.take_events(),
        ..TickResult::default()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::GameConfig;
    use crate::game::events::GameEventData;
    use crate::game::physics::SimplePhysics;
    use crate::game::piece::PieceState;
    use crate::game::state::Side;
    use crate::game::viewport::RecordingViewport;

    const DT: f32 = 1.0 / 60.0;

    fn setup() -> (MatchState, SimplePhysics, RecordingViewport) {
        let config = GameConfig::default();
        (
            MatchState::new(config.clone(), Side::Host, false, 42),
            SimplePhysics::new(&config),
            RecordingViewport::new(config.screen_width),
        )
    }

    fn run_until<F>(state: &mut MatchState, physics: &mut SimplePhysics, viewport: &mut RecordingViewport, mut done: F) -> Vec<GameEvent>
    where
        F: FnMut(&TickResult) -> bool,
    {
        let mut events = Vec::new();
        for _ in 0..600 {
            let result = host_tick(state, physics, viewport, DT);
            events.extend(result.events.iter().cloned());
            if done(&result) {
                return events;
            }
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_first_tick_spawns_for_host() {
        let (mut state, mut physics, mut viewport) = setup();
        let result = host_tick(&mut state, &mut physics, &mut viewport, DT);
        assert_eq!(state.turn.phase(), TurnPhase::Aiming);
        assert_eq!(state.pieces.held().unwrap().owner, Side::Host);
        assert!(matches!(result.events[0].data, GameEventData::PieceSpawned { owner: Side::Host, .. }));
    }

    #[test]
    fn test_drop_settles_then_flips_turn() {
        let (mut state, mut physics, mut viewport) = setup();
        host_tick(&mut state, &mut physics, &mut viewport, DT);
        let first = state.drop_held(&mut physics).unwrap();

        let events = run_until(&mut state, &mut physics, &mut viewport, |r| r.settled.is_some());
        assert_eq!(state.pieces.get(first).unwrap().state, PieceState::Settled);
        assert_eq!(state.score, 1);
        assert_eq!(state.turn.turn(), Side::Client);
        assert_eq!(state.turn.phase(), TurnPhase::Aiming);

        let next = state.pieces.held().unwrap();
        assert_eq!(next.owner, Side::Client);
        assert!(next.id > first);
        assert!(state.check_turn_invariant());
        assert!(events.iter().any(|e| e.data == GameEventData::TurnChanged { turn: Side::Client }));
    }

    #[test]
    fn test_settling_waits_for_full_still_run() {
        let (mut state, mut physics, mut viewport) = setup();
        host_tick(&mut state, &mut physics, &mut viewport, DT);
        state.drop_held(&mut physics).unwrap();

        let mut quiet = 0;
        for _ in 0..600 {
            let result = host_tick(&mut state, &mut physics, &mut viewport, DT);
            if result.settled.is_some() {
                break;
            }
            quiet = state.pieces.stillness_run();
        }
        assert_eq!(quiet, state.config.still_ticks_required - 1);
    }

    #[test]
    fn test_collapse_on_host_turn_client_wins() {
        let (mut state, mut physics, mut viewport) = setup();
        host_tick(&mut state, &mut physics, &mut viewport, DT);
        state.move_held(0.0, &mut physics);
        state.drop_held(&mut physics).unwrap();

        run_until(&mut state, &mut physics, &mut viewport, |r| r.ended.is_some());
        assert_eq!(state.result(), Some(GameResult::Client));
        assert!(state.is_ended());

        // Ended is absorbing
        let tick = state.tick;
        let result = host_tick(&mut state, &mut physics, &mut viewport, DT);
        assert!(result.events.is_empty());
        assert_eq!(state.tick, tick);
    }

    #[test]
    fn test_mirror_tick_decides_nothing() {
        let config = GameConfig::default();
        let mut state = MatchState::new(config.clone(), Side::Client, false, 1);
        let mut physics = SimplePhysics::new(&config);
        let result = mirror_tick(&mut state, &mut physics, DT);
        assert!(result.events.is_empty());
        assert!(state.pieces.is_empty());
        assert_eq!(state.turn.phase(), TurnPhase::Spawning);
        assert_eq!(state.tick, 1);
    }
}
