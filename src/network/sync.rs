//! Snapshot Replication
//!
//! The host serializes its whole world at a fixed cadence; the client
//! reconciles each snapshot against what it already knows. Snapshots are
//! never diffs, so a lost one is repaired by the next.

use tracing::{debug, warn};

use crate::core::vec2::Vec2;
use crate::game::catalog;
use crate::game::physics::PhysicsWorld;
use crate::game::piece::{Piece, PieceId, PieceState};
use crate::game::state::MatchState;
use crate::game::turn::TurnPhase;
use crate::game::viewport::Viewport;
use crate::network::protocol::{PieceSync, SyncPayload};

/// Host-side snapshot builder.
pub struct SyncBroadcaster;

impl SyncBroadcaster {
    /// Capture turn, every piece (settled first, then the active piece) and
    /// world bounds/scroll. Poses are rounded to whole units.
    pub fn snapshot(state: &MatchState) -> SyncPayload {
        let bounds = state.bounds.bounds();
        SyncPayload {
            turn: state.turn.turn(),
            pieces: state
                .pieces
                .iter()
                .map(|p| {
                    let position = p.position.round();
                    PieceSync {
                        id: p.id,
                        kind: p.type_index,
                        x: position.x,
                        y: position.y,
                        angle: p.angle.round(),
                    }
                })
                .collect(),
            world_top: bounds.top,
            world_height: bounds.height,
            scroll_y: state.bounds.scroll_y(),
        }
    }
}

/// What applying one snapshot changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Snapshot arrived after game over and was ignored.
    pub ignored: bool,
    /// The turn changed.
    pub turn_changed: bool,
    /// Known pieces whose pose was overwritten.
    pub updated: usize,
    /// Unknown pieces created as settled.
    pub created: Vec<PieceId>,
    /// Unknown piece adopted as the local held piece.
    pub adopted: Option<PieceId>,
    /// Unknown catalog indices that were skipped.
    pub skipped: usize,
}

/// Client-side snapshot application.
pub struct SyncReconciler;

impl SyncReconciler {
    /// Apply a host snapshot to the local mirror.
    ///
    /// Known pieces only get a new pose; their id and type never change.
    /// Unknown pieces are built from the catalog and marked settled, except
    /// that on this peer's turn with nothing held locally the newest unknown
    /// piece becomes the local held piece.
    pub fn apply(
        state: &mut MatchState,
        snapshot: &SyncPayload,
        physics: &mut dyn PhysicsWorld,
        viewport: &mut dyn Viewport,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        if state.is_ended() {
            debug!("Ignoring snapshot after game over");
            report.ignored = true;
            return report;
        }

        report.turn_changed = state.mirror_turn(snapshot.turn);

        // Newest unknown id is the candidate held piece.
        let adopt = (state.is_my_turn() && state.pieces.active().is_none())
            .then(|| {
                snapshot
                    .pieces
                    .iter()
                    .filter(|p| !state.pieces.contains(p.id))
                    .map(|p| p.id)
                    .max()
            })
            .flatten();

        for synced in &snapshot.pieces {
            let position = Vec2::new(synced.x, synced.y);
            if let Some(piece) = state.pieces.get_mut(synced.id) {
                piece.position = position;
                piece.angle = synced.angle;
                physics.set_pose(piece.id, position, piece.angle);
                report.updated += 1;
                continue;
            }

            let Some(kind) = catalog::kind(synced.kind) else {
                warn!("Snapshot piece {} has unknown type {}", synced.id, synced.kind);
                report.skipped += 1;
                continue;
            };
            let held = adopt == Some(synced.id);
            let piece = Piece {
                id: synced.id,
                type_index: synced.kind,
                position,
                angle: synced.angle,
                owner: if held { state.role } else { snapshot.turn },
                state: if held { PieceState::Held } else { PieceState::Settled },
            };
            let inserted = if held {
                state.pieces.adopt_held(piece)
            } else {
                state.pieces.insert_settled(piece)
            };
            if let Err(e) = inserted {
                warn!("Could not mirror {}: {}", synced.id, e);
                continue;
            }
            physics.spawn_body(synced.id, kind, position, synced.angle, true);

            if held {
                if state.turn.phase() == TurnPhase::Spawning {
                    if let Err(e) = state.turn.piece_spawned() {
                        warn!("Adopting {} out of phase: {}", synced.id, e);
                    }
                }
                debug!("Adopted {} as held piece", synced.id);
                report.adopted = Some(synced.id);
            } else {
                report.created.push(synced.id);
            }
        }

        state.bounds.absorb(
            snapshot.world_top,
            snapshot.world_height,
            snapshot.scroll_y,
            physics,
            viewport,
        );
        let spawn_y = state.spawn_y();
        state.grow_world(spawn_y, physics, viewport);
        state.score = state.pieces.settled_len() as u32;

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::GameConfig;
    use crate::game::game_over::{EndCause, GameResult};
    use crate::game::physics::SimplePhysics;
    use crate::game::state::Side;
    use crate::game::viewport::RecordingViewport;

    struct Peer {
        state: MatchState,
        physics: SimplePhysics,
        viewport: RecordingViewport,
    }

    impl Peer {
        fn new(role: Side) -> Self {
            let config = GameConfig::default();
            Self {
                state: MatchState::new(config.clone(), role, false, 9),
                physics: SimplePhysics::new(&config),
                viewport: RecordingViewport::new(config.screen_width),
            }
        }

        fn apply(&mut self, snapshot: &SyncPayload) -> ReconcileReport {
            SyncReconciler::apply(&mut self.state, snapshot, &mut self.physics, &mut self.viewport)
        }
    }

    fn piece(id: u32, kind: u8, x: f32, y: f32) -> PieceSync {
        PieceSync { id: PieceId(id), kind, x, y, angle: 0.0 }
    }

    fn payload(turn: Side, pieces: Vec<PieceSync>) -> SyncPayload {
        SyncPayload { turn, pieces, world_top: 0.0, world_height: 768.0, scroll_y: 0.0 }
    }

    #[test]
    fn test_snapshot_lists_every_piece() {
        let mut host = Peer::new(Side::Host);
        host.state.spawn_piece(&mut host.physics, &mut host.viewport).unwrap();
        host.state.move_held(300.4, &mut host.physics);

        let snapshot = SyncBroadcaster::snapshot(&host.state);
        assert_eq!(snapshot.turn, Side::Host);
        assert_eq!(snapshot.pieces.len(), 1);
        assert_eq!(snapshot.pieces[0].id, PieceId(1));
        assert_eq!(snapshot.pieces[0].x, 300.0);
        assert_eq!(snapshot.world_height, 768.0);
    }

    #[test]
    fn test_unseen_piece_adopted_on_own_turn() {
        let mut client = Peer::new(Side::Client);
        let report = client.apply(&payload(Side::Client, vec![piece(1, 0, 512.0, 474.0)]));

        assert_eq!(report.adopted, Some(PieceId(1)));
        let held = client.state.pieces.held().unwrap();
        assert_eq!(held.id, PieceId(1));
        assert_eq!(held.owner, Side::Client);
        assert!(client.state.turn.accepts_input());
        assert!(client.state.check_turn_invariant());
    }

    #[test]
    fn test_unseen_piece_settled_off_turn() {
        let mut client = Peer::new(Side::Client);
        let report = client.apply(&payload(Side::Host, vec![piece(1, 0, 512.0, 474.0)]));

        assert_eq!(report.adopted, None);
        assert_eq!(report.created, vec![PieceId(1)]);
        assert_eq!(client.state.pieces.get(PieceId(1)).unwrap().state, PieceState::Settled);
        assert!(client.state.pieces.held().is_none());
    }

    #[test]
    fn test_known_piece_gets_pose_only() {
        let mut client = Peer::new(Side::Client);
        client.apply(&payload(Side::Host, vec![piece(1, 3, 512.0, 474.0)]));

        // Same id, different type: type is kept
        let mut moved = piece(1, 1, 400.0, 500.0);
        moved.angle = 45.0;
        let report = client.apply(&payload(Side::Host, vec![moved]));

        assert_eq!(report.updated, 1);
        let mirrored = client.state.pieces.get(PieceId(1)).unwrap();
        assert_eq!(mirrored.type_index, 3);
        assert_eq!(mirrored.position, Vec2::new(400.0, 500.0));
        assert_eq!(mirrored.angle, 45.0);
        assert_eq!(client.physics.body_state(PieceId(1)).unwrap().position.x, 400.0);
    }

    #[test]
    fn test_turn_change_settles_local_piece() {
        let mut client = Peer::new(Side::Client);
        client.apply(&payload(Side::Host, vec![piece(1, 0, 512.0, 554.0)]));
        client.apply(&payload(Side::Client, vec![piece(1, 0, 512.0, 554.0), piece(2, 0, 512.0, 394.0)]));
        client.state.drop_held(&mut client.physics).unwrap();
        assert_eq!(client.state.pieces.dropping().map(|p| p.id), Some(PieceId(2)));

        let report = client.apply(&payload(
            Side::Host,
            vec![piece(1, 0, 512.0, 554.0), piece(2, 0, 512.0, 474.0), piece(3, 1, 512.0, 300.0)],
        ));
        assert!(report.turn_changed);
        assert_eq!(client.state.pieces.get(PieceId(2)).unwrap().state, PieceState::Settled);
        assert_eq!(client.state.pieces.get(PieceId(3)).unwrap().state, PieceState::Settled);
        assert!(client.state.pieces.active().is_none());
        assert_eq!(client.state.score, 3);
    }

    #[test]
    fn test_bounds_absorbed_and_never_shrink() {
        let mut client = Peer::new(Side::Client);
        let mut snapshot = payload(Side::Host, vec![]);
        snapshot.world_top = -400.0;
        snapshot.world_height = 1168.0;
        snapshot.scroll_y = -150.0;
        client.apply(&snapshot);
        assert_eq!(client.state.bounds.bounds().top, -400.0);
        assert_eq!(client.viewport.scroll_y, -150.0);
        assert_eq!(client.physics.world_bounds(), (-400.0, 1168.0));

        client.apply(&payload(Side::Host, vec![]));
        assert_eq!(client.state.bounds.bounds().height, 1168.0);
    }

    #[test]
    fn test_ended_ignores_snapshots() {
        let mut client = Peer::new(Side::Client);
        client.state.end(GameResult::Host, EndCause::Remote);
        let report = client.apply(&payload(Side::Client, vec![piece(1, 0, 512.0, 474.0)]));
        assert!(report.ignored);
        assert!(client.state.pieces.is_empty());
    }

    #[test]
    fn test_unknown_type_skipped() {
        let mut client = Peer::new(Side::Client);
        let report = client.apply(&payload(Side::Host, vec![piece(1, 200, 512.0, 474.0)]));
        assert_eq!(report.skipped, 1);
        assert!(client.state.pieces.is_empty());
    }
}
