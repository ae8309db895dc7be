//! World Bounds
//!
//! Vertical extent of the playfield. The world only ever grows upward
//! (toward negative Y) during a session and is reset on restart.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::game::config::GameConfig;
use crate::game::physics::PhysicsWorld;
use crate::game::viewport::Viewport;

/// Current world extent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    /// Upper edge; starts at 0 and extends negative.
    pub top: f32,
    /// Total height from `top`.
    pub height: f32,
    /// Y of the ground's upper surface.
    pub ground_top: f32,
}

/// Grows the world ahead of the tower and tracks the camera scroll.
#[derive(Clone, Debug)]
pub struct WorldBoundsManager {
    bounds: WorldBounds,
    initial: WorldBounds,
    scroll_y: f32,
    extend_step: f32,
    headroom_margin: f32,
    camera_top_offset: f32,
}

impl WorldBoundsManager {
    /// Create a manager with the initial one-screen world.
    pub fn new(config: &GameConfig) -> Self {
        let initial = WorldBounds {
            top: 0.0,
            height: config.screen_height,
            ground_top: config.ground_top(),
        };
        Self {
            bounds: initial,
            initial,
            scroll_y: 0.0,
            extend_step: config.world_extend_step,
            headroom_margin: config.headroom_margin,
            camera_top_offset: config.camera_top_offset,
        }
    }

    /// Current bounds.
    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    /// Bounds the session started with.
    pub fn initial(&self) -> WorldBounds {
        self.initial
    }

    /// Current camera scroll.
    pub fn scroll_y(&self) -> f32 {
        self.scroll_y
    }

    /// Grow the world until `target_y` has headroom.
    ///
    /// Each step moves `top` up and grows `height` by the same amount, then
    /// republishes. Returns the number of steps taken.
    pub fn ensure_headroom(
        &mut self,
        target_y: f32,
        physics: &mut dyn PhysicsWorld,
        viewport: &mut dyn Viewport,
    ) -> u32 {
        let mut steps = 0;
        while target_y < self.bounds.top + self.headroom_margin {
            self.bounds.top -= self.extend_step;
            self.bounds.height += self.extend_step;
            steps += 1;
            self.publish(physics, viewport);
        }
        if steps > 0 {
            debug!(
                "World grown {} step(s): top={} height={}",
                steps, self.bounds.top, self.bounds.height
            );
        }
        steps
    }

    /// Scroll the camera up so the tower top stays in view. Never scrolls down.
    pub fn follow_tower(&mut self, tower_top: f32, viewport: &mut dyn Viewport) -> bool {
        let target = tower_top - self.camera_top_offset;
        if target < self.scroll_y {
            self.scroll_y = target;
            viewport.set_scroll(self.scroll_y);
            true
        } else {
            false
        }
    }

    /// Take world bounds and scroll announced by the host.
    ///
    /// Bounds smaller than the local ones are ignored so height never shrinks
    /// within a session; scroll is taken verbatim.
    pub fn absorb(
        &mut self,
        top: f32,
        height: f32,
        scroll_y: f32,
        physics: &mut dyn PhysicsWorld,
        viewport: &mut dyn Viewport,
    ) {
        if height >= self.bounds.height && (top != self.bounds.top || height != self.bounds.height) {
            self.bounds.top = top;
            self.bounds.height = height;
            self.publish(physics, viewport);
        }
        if scroll_y != self.scroll_y {
            self.scroll_y = scroll_y;
            viewport.set_scroll(scroll_y);
        }
    }

    /// Restore the initial world and scroll.
    pub fn reset(&mut self, physics: &mut dyn PhysicsWorld, viewport: &mut dyn Viewport) {
        self.bounds = self.initial;
        self.scroll_y = 0.0;
        self.publish(physics, viewport);
        viewport.set_scroll(0.0);
    }

    /// Push current bounds to every collaborator.
    pub fn publish(&self, physics: &mut dyn PhysicsWorld, viewport: &mut dyn Viewport) {
        physics.set_world_bounds(self.bounds.top, self.bounds.height);
        viewport.set_world_bounds(self.bounds.top, self.bounds.height);
        viewport.fit_minimap(self.bounds.top, self.bounds.height);
    }
}
