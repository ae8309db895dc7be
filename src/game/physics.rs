//! Physics Adapter
//!
//! The rigid-body boundary. The engine never simulates contacts itself; it
//! creates bodies, toggles them between kinematic (held) and dynamic
//! (dropping), and reads back poses and speeds every tick.
//!
//! [`SimplePhysics`] is a small deterministic stand-in used headless: gravity
//! with per-body damping, stacking on the ground and on other bodies, and a
//! resting body tipping onto its nearest face.

use std::collections::BTreeMap;

use crate::core::vec2::Vec2;
use crate::game::catalog::PieceKind;
use crate::game::config::GameConfig;
use crate::game::piece::PieceId;

/// Pose and motion of one body, as read back after a step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyState {
    /// Centre position.
    pub position: Vec2,
    /// Rotation in degrees.
    pub angle: f32,
    /// Linear speed (pixels per step).
    pub speed: f32,
    /// Angular speed (degrees per step).
    pub angular_speed: f32,
}

/// Rigid-body physics collaborator.
pub trait PhysicsWorld {
    /// Create a body for a piece.
    fn spawn_body(&mut self, id: PieceId, kind: &PieceKind, position: Vec2, angle: f32, kinematic: bool);

    /// Toggle between held (not simulated) and dropping (simulated).
    fn set_kinematic(&mut self, id: PieceId, kinematic: bool);

    /// Teleport a body.
    fn set_pose(&mut self, id: PieceId, position: Vec2, angle: f32);

    /// Read a body's pose and speeds.
    fn body_state(&self, id: PieceId) -> Option<BodyState>;

    /// Publish the world's vertical extent.
    fn set_world_bounds(&mut self, top: f32, height: f32);

    /// Advance the simulation.
    fn step(&mut self, dt: f32);

    /// Remove every body.
    fn clear(&mut self);
}

// =============================================================================
// SIMPLE PHYSICS
// =============================================================================

#[derive(Clone, Debug)]
struct Body {
    position: Vec2,
    angle: f32,
    velocity: Vec2,
    half_width: f32,
    half_height: f32,
    kinematic: bool,
    /// Degrees per second.
    angular_velocity: f32,
    /// Fraction of velocity lost per second.
    damping: f32,
    last_speed: f32,
    last_angular_speed: f32,
}

/// Nearest angle at which a box lies flat on a face.
fn rest_angle(angle: f32) -> f32 {
    (angle / 90.0).round() * 90.0
}

impl Body {
    /// Axis-aligned half extents of the box rotated to `angle`.
    fn extents_at(&self, angle: f32) -> (f32, f32) {
        let rad = angle.to_radians();
        let (sin, cos) = (rad.sin().abs(), rad.cos().abs());
        (
            self.half_width * cos + self.half_height * sin,
            self.half_width * sin + self.half_height * cos,
        )
    }

    fn extents(&self) -> (f32, f32) {
        self.extents_at(self.angle)
    }

    fn left(&self) -> f32 {
        self.position.x - self.extents().0
    }

    fn right(&self) -> f32 {
        self.position.x + self.extents().0
    }

    fn top(&self) -> f32 {
        self.position.y - self.extents().1
    }

    fn bottom(&self) -> f32 {
        self.position.y + self.extents().1
    }
}

/// Minimal deterministic physics: bodies fall and come to rest on whatever
/// surface lies beneath them.
#[derive(Clone, Debug)]
pub struct SimplePhysics {
    bodies: BTreeMap<PieceId, Body>,
    gravity: f32,
    ground_top: f32,
    ground_left: f32,
    ground_right: f32,
    world_top: f32,
    world_height: f32,
}

impl SimplePhysics {
    /// Gravity in pixels per second squared.
    pub const GRAVITY: f32 = 1000.0;

    /// Air drag per second, scaled by each kind's friction.
    pub const AIR_DRAG: f32 = 0.5;

    /// Rate (per second) at which a resting body closes the gap to its
    /// nearest face.
    pub const TIP_RATE: f32 = 6.0;

    /// A resting body this close to a face (degrees) snaps flat.
    pub const REST_SNAP_DEGREES: f32 = 0.05;

    /// Create a world with the configured ground slab.
    pub fn new(config: &GameConfig) -> Self {
        let half_ground = config.ground_width() / 2.0;
        Self {
            bodies: BTreeMap::new(),
            gravity: Self::GRAVITY,
            ground_top: config.ground_top(),
            ground_left: config.center_x() - half_ground,
            ground_right: config.center_x() + half_ground,
            world_top: 0.0,
            world_height: config.screen_height,
        }
    }

    /// Last published world bounds.
    pub fn world_bounds(&self) -> (f32, f32) {
        (self.world_top, self.world_height)
    }

    /// Number of bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Whether a body is kinematic.
    pub fn is_kinematic(&self, id: PieceId) -> Option<bool> {
        self.bodies.get(&id).map(|b| b.kinematic)
    }

    /// Highest supporting surface under `[left, right]` at or below `from_y`.
    fn support_below(&self, skip: PieceId, left: f32, right: f32, from_y: f32) -> Option<f32> {
        let mut support: Option<f32> = None;
        if right > self.ground_left && left < self.ground_right && self.ground_top >= from_y {
            support = Some(self.ground_top);
        }
        for (id, other) in &self.bodies {
            if *id == skip {
                continue;
            }
            let top = other.top();
            if right > other.left() && left < other.right() && top >= from_y {
                support = Some(support.map_or(top, |s| s.min(top)));
            }
        }
        support
    }
}

impl PhysicsWorld for SimplePhysics {
    fn spawn_body(&mut self, id: PieceId, kind: &PieceKind, position: Vec2, angle: f32, kinematic: bool) {
        self.bodies.insert(id, Body {
            position,
            angle,
            velocity: Vec2::ZERO,
            half_width: kind.half_width,
            half_height: kind.half_height,
            kinematic,
            angular_velocity: 0.0,
            damping: kind.friction * Self::AIR_DRAG,
            last_speed: 0.0,
            last_angular_speed: 0.0,
        });
    }

    fn set_kinematic(&mut self, id: PieceId, kinematic: bool) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.kinematic = kinematic;
            body.velocity = Vec2::ZERO;
            body.angular_velocity = 0.0;
        }
    }

    fn set_pose(&mut self, id: PieceId, position: Vec2, angle: f32) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.position = position;
            body.angle = angle;
        }
    }

    fn body_state(&self, id: PieceId) -> Option<BodyState> {
        self.bodies.get(&id).map(|b| BodyState {
            position: b.position,
            angle: b.angle,
            speed: b.last_speed,
            angular_speed: b.last_angular_speed,
        })
    }

    fn set_world_bounds(&mut self, top: f32, height: f32) {
        self.world_top = top;
        self.world_height = height;
    }

    fn step(&mut self, dt: f32) {
        // Lowest bodies first so stacks resolve bottom-up within one step
        let mut order: Vec<(PieceId, f32)> = self
            .bodies
            .iter()
            .filter(|(_, b)| !b.kinematic)
            .map(|(id, b)| (*id, b.bottom()))
            .collect();
        order.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (id, _) in order {
            let Some(body) = self.bodies.get(&id) else { continue };
            let half_y = body.extents().1;
            let prev_bottom = body.bottom();
            let (left, right) = (body.left(), body.right());
            let drag = (1.0 - body.damping * dt).max(0.0);

            let mut velocity = body.velocity;
            velocity.y += self.gravity * dt;
            velocity = velocity.scale(drag);
            let mut position = body.position + velocity.scale(dt);
            let mut angle = body.angle;
            let mut spin = body.angular_velocity * drag;

            let support = self
                .support_below(id, left, right, prev_bottom - 0.5)
                .filter(|support| position.y + half_y >= *support);

            match support {
                Some(support) => {
                    velocity = Vec2::ZERO;
                    let gap = rest_angle(angle) - angle;
                    if gap.abs() < Self::REST_SNAP_DEGREES {
                        angle += gap;
                        spin = 0.0;
                    } else {
                        spin = gap * Self::TIP_RATE;
                        angle += spin * dt;
                    }
                    position.y = support - body.extents_at(angle).1;
                }
                None => angle += spin * dt,
            }

            if let Some(body) = self.bodies.get_mut(&id) {
                let moved = position - body.position;
                let turned = (angle - body.angle).abs();
                body.position = position;
                body.angle = angle;
                body.velocity = velocity;
                body.angular_velocity = spin;
                body.last_speed = moved.length();
                body.last_angular_speed = turned;
            }
        }
    }

    fn clear(&mut self) {
        self.bodies.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog::PIECE_KINDS;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_kinematic_body_does_not_fall() {
        let config = GameConfig::default();
        let mut physics = SimplePhysics::new(&config);
        physics.spawn_body(PieceId(1), &PIECE_KINDS[0], Vec2::new(512.0, 100.0), 0.0, true);
        for _ in 0..30 {
            physics.step(DT);
        }
        assert_eq!(physics.body_state(PieceId(1)).unwrap().position.y, 100.0);
    }

    #[test]
    fn test_body_comes_to_rest_on_ground() {
        let config = GameConfig::default();
        let mut physics = SimplePhysics::new(&config);
        physics.spawn_body(PieceId(1), &PIECE_KINDS[0], Vec2::new(512.0, 300.0), 0.0, true);
        physics.set_kinematic(PieceId(1), false);
        for _ in 0..120 {
            physics.step(DT);
        }
        let state = physics.body_state(PieceId(1)).unwrap();
        assert!((state.position.y - (config.ground_top() - 40.0)).abs() < 1e-3);
        assert_eq!(state.speed, 0.0);
    }

    #[test]
    fn test_bodies_stack() {
        let config = GameConfig::default();
        let mut physics = SimplePhysics::new(&config);
        physics.spawn_body(PieceId(1), &PIECE_KINDS[0], Vec2::new(512.0, 300.0), 0.0, false);
        for _ in 0..120 {
            physics.step(DT);
        }
        physics.spawn_body(PieceId(2), &PIECE_KINDS[0], Vec2::new(520.0, 200.0), 0.0, false);
        for _ in 0..120 {
            physics.step(DT);
        }
        let lower = physics.body_state(PieceId(1)).unwrap();
        let upper = physics.body_state(PieceId(2)).unwrap();
        assert!((upper.position.y - (lower.position.y - 80.0)).abs() < 1e-3);
    }

    #[test]
    fn test_tilted_body_tips_flat() {
        let config = GameConfig::default();
        let mut physics = SimplePhysics::new(&config);
        physics.spawn_body(PieceId(1), &PIECE_KINDS[0], Vec2::new(512.0, 300.0), 30.0, false);

        let mut peak_spin: f32 = 0.0;
        for _ in 0..300 {
            physics.step(DT);
            peak_spin = peak_spin.max(physics.body_state(PieceId(1)).unwrap().angular_speed);
        }
        let state = physics.body_state(PieceId(1)).unwrap();
        assert!(peak_spin > 0.02);
        assert_eq!(state.angle, 0.0);
        assert_eq!(state.angular_speed, 0.0);
        assert!((state.position.y - (config.ground_top() - 40.0)).abs() < 1e-3);
    }

    #[test]
    fn test_damping_slows_fall() {
        let config = GameConfig::default();
        let mut physics = SimplePhysics::new(&config);
        physics.spawn_body(PieceId(1), &PIECE_KINDS[0], Vec2::new(60.0, 0.0), 0.0, false);
        for _ in 0..60 {
            physics.step(DT);
        }
        // One second of undamped fall covers ~508 pixels at this step size
        let y = physics.body_state(PieceId(1)).unwrap().position.y;
        assert!(y > 400.0 && y < 508.0);
    }

    #[test]
    fn test_body_off_ground_keeps_falling() {
        let config = GameConfig::default();
        let mut physics = SimplePhysics::new(&config);
        physics.spawn_body(PieceId(1), &PIECE_KINDS[0], Vec2::new(60.0, 300.0), 0.0, false);
        for _ in 0..120 {
            physics.step(DT);
        }
        assert!(physics.body_state(PieceId(1)).unwrap().position.y > config.fall_line());
    }
}
