//! Game Configuration
//!
//! Every tuning constant of the turn and sync engine in one place.
//! Defaults reproduce the reference game at 1024x768.

use std::path::Path;
use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::network::protocol::WireFormat;

/// Tuning constants for a session.
///
/// Loadable from JSON; missing fields fall back to [`GameConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Visible playfield width (pixels).
    pub screen_width: f32,
    /// Visible playfield height (pixels).
    pub screen_height: f32,
    /// Ground centre Y as a fraction of screen height.
    pub ground_y_ratio: f32,
    /// Ground slab height (pixels).
    pub ground_height: f32,
    /// Ground slab width as a fraction of screen width.
    pub ground_width_ratio: f32,
    /// Distance above the tower top at which a new piece spawns.
    pub drop_margin: f32,
    /// Camera keeps the tower top this far below its upper edge.
    pub camera_top_offset: f32,
    /// Amount the world grows upward per extension step.
    pub world_extend_step: f32,
    /// Minimum headroom between a spawn point and the world top.
    pub headroom_margin: f32,
    /// A piece below `screen_height + fall_margin` has fallen off.
    pub fall_margin: f32,
    /// Linear speed must be strictly below this to count as still.
    pub still_speed_threshold: f32,
    /// Angular speed must be strictly below this to count as still.
    pub still_angular_threshold: f32,
    /// Consecutive still ticks before a piece settles.
    pub still_ticks_required: u32,
    /// Degrees added per rotate command.
    pub rotate_step_degrees: f32,
    /// Held piece X is clamped to `[margin, width - margin]`.
    pub input_clamp_margin: f32,
    /// Countdown length in seconds.
    pub match_duration_secs: u32,
    /// Snapshot and move-relay cadence (milliseconds).
    pub sync_interval_ms: u64,
    /// Physics step interval for the session driver (milliseconds).
    pub physics_tick_ms: u64,
    /// Payload encoding used on every channel.
    pub wire_format: WireFormat,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            screen_width: 1024.0,
            screen_height: 768.0,
            ground_y_ratio: 0.8,
            ground_height: 40.0,
            ground_width_ratio: 0.5,
            drop_margin: 120.0,
            camera_top_offset: 400.0,
            world_extend_step: 200.0,
            headroom_margin: 100.0,
            fall_margin: 80.0,
            still_speed_threshold: 0.02,
            still_angular_threshold: 0.02,
            still_ticks_required: 6,
            rotate_step_degrees: 45.0,
            input_clamp_margin: 48.0,
            match_duration_secs: 600,
            sync_interval_ms: 50,
            physics_tick_ms: 16,
            wire_format: WireFormat::Json,
        }
    }
}

impl GameConfig {
    /// Load a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.screen_width <= 2.0 * self.input_clamp_margin {
            return Err(ConfigError::Invalid("screen_width must exceed twice input_clamp_margin"));
        }
        if self.world_extend_step <= 0.0 {
            return Err(ConfigError::Invalid("world_extend_step must be positive"));
        }
        if self.still_ticks_required == 0 {
            return Err(ConfigError::Invalid("still_ticks_required must be at least 1"));
        }
        if self.sync_interval_ms == 0 || self.physics_tick_ms == 0 {
            return Err(ConfigError::Invalid("timer intervals must be non-zero"));
        }
        Ok(())
    }

    /// Ground slab centre Y.
    #[inline]
    pub fn ground_center_y(&self) -> f32 {
        self.screen_height * self.ground_y_ratio
    }

    /// Ground slab width.
    #[inline]
    pub fn ground_width(&self) -> f32 {
        self.screen_width * self.ground_width_ratio
    }

    /// Y of the ground's upper surface.
    #[inline]
    pub fn ground_top(&self) -> f32 {
        self.ground_center_y() - self.ground_height / 2.0
    }

    /// Y beyond which a piece counts as fallen.
    #[inline]
    pub fn fall_line(&self) -> f32 {
        self.screen_height + self.fall_margin
    }

    /// Horizontal centre of the playfield.
    #[inline]
    pub fn center_x(&self) -> f32 {
        self.screen_width / 2.0
    }

    /// Clamp a pointer X to the playable range.
    #[inline]
    pub fn clamp_x(&self, x: f32) -> f32 {
        x.max(self.input_clamp_margin)
            .min(self.screen_width - self.input_clamp_margin)
    }

    /// Snapshot cadence.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    /// Physics step cadence.
    pub fn physics_tick(&self) -> Duration {
        Duration::from_millis(self.physics_tick_ms)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for [`GameConfig`].
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Values are out of range.
    #[error("Invalid config: {0}")]
    Invalid(&'static str),
}
