//! Turn cycle benchmarks: host ticks through drop and settle, and snapshot
//! build plus reconciliation of a tall tower.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tower_duel::game::config::GameConfig;
use tower_duel::game::physics::SimplePhysics;
use tower_duel::game::state::{MatchState, Side};
use tower_duel::game::tick::host_tick;
use tower_duel::game::viewport::RecordingViewport;
use tower_duel::network::sync::{SyncBroadcaster, SyncReconciler};

const DT: f32 = 1.0 / 60.0;

/// Offline match with `turns` pieces stacked.
fn stacked(turns: usize) -> (MatchState, SimplePhysics, RecordingViewport) {
    let config = GameConfig::default();
    let mut state = MatchState::new(config.clone(), Side::Host, true, 42);
    let mut physics = SimplePhysics::new(&config);
    let mut viewport = RecordingViewport::new(config.screen_width);

    for _ in 0..turns {
        host_tick(&mut state, &mut physics, &mut viewport, DT);
        if state.drop_held(&mut physics).is_err() {
            break;
        }
        for _ in 0..600 {
            if host_tick(&mut state, &mut physics, &mut viewport, DT).settled.is_some() || state.is_ended() {
                break;
            }
        }
    }
    (state, physics, viewport)
}

fn bench_turn(c: &mut Criterion) {
    c.bench_function("drop_and_settle", |b| {
        b.iter(|| black_box(stacked(1)))
    });
}

fn bench_sync(c: &mut Criterion) {
    let (host, _, _) = stacked(20);
    let snapshot = SyncBroadcaster::snapshot(&host);

    c.bench_function("snapshot_20", |b| {
        b.iter(|| black_box(SyncBroadcaster::snapshot(&host)))
    });

    c.bench_function("reconcile_20", |b| {
        b.iter(|| {
            let config = GameConfig::default();
            let mut client = MatchState::new(config.clone(), Side::Client, false, 7);
            let mut physics = SimplePhysics::new(&config);
            let mut viewport = RecordingViewport::new(config.screen_width);
            black_box(SyncReconciler::apply(&mut client, &snapshot, &mut physics, &mut viewport))
        })
    });
}

criterion_group!(benches, bench_turn, bench_sync);
criterion_main!(benches);
