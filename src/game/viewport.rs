//! Viewport Adapter
//!
//! The camera/minimap boundary. Rendering itself lives outside this crate;
//! the engine only publishes world bounds and the vertical scroll.

/// Rendering/camera collaborator.
pub trait Viewport {
    /// Publish the world's vertical extent to the main camera.
    fn set_world_bounds(&mut self, top: f32, height: f32);

    /// Move the main camera's vertical scroll.
    fn set_scroll(&mut self, y: f32);

    /// Refit the minimap to the world's vertical extent.
    fn fit_minimap(&mut self, top: f32, height: f32);
}

/// Minimap placement derived from world bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimapFit {
    /// Zoom applied to the minimap camera.
    pub zoom: f32,
    /// World point the minimap is centred on.
    pub center: (f32, f32),
}

impl MinimapFit {
    /// Fit a `view_width x view_height` minimap over the whole world.
    pub fn compute(view_width: f32, view_height: f32, screen_width: f32, top: f32, height: f32) -> Self {
        let zoom_x = view_width / screen_width;
        let zoom_y = view_height / height;
        Self {
            zoom: zoom_x.min(zoom_y),
            center: (screen_width / 2.0, top + height / 2.0),
        }
    }
}

/// Viewport that records what the engine published.
///
/// Used headless (tests, demo binary) in place of a real renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingViewport {
    /// Screen width used for the minimap fit.
    pub screen_width: f32,
    /// Last published world top.
    pub world_top: f32,
    /// Last published world height.
    pub world_height: f32,
    /// Last published scroll.
    pub scroll_y: f32,
    /// Last minimap fit.
    pub minimap: Option<MinimapFit>,
    /// Number of bounds publications received.
    pub bounds_updates: u32,
}

impl RecordingViewport {
    /// Minimap width in pixels.
    pub const MINIMAP_WIDTH: f32 = 160.0;
    /// Minimap height in pixels.
    pub const MINIMAP_HEIGHT: f32 = 240.0;

    /// Create a recorder for a screen of the given width.
    pub fn new(screen_width: f32) -> Self {
        Self {
            screen_width,
            world_top: 0.0,
            world_height: 0.0,
            scroll_y: 0.0,
            minimap: None,
            bounds_updates: 0,
        }
    }
}

impl Viewport for RecordingViewport {
    fn set_world_bounds(&mut self, top: f32, height: f32) {
        self.world_top = top;
        self.world_height = height;
        self.bounds_updates += 1;
    }

    fn set_scroll(&mut self, y: f32) {
        self.scroll_y = y;
    }

    fn fit_minimap(&mut self, top: f32, height: f32) {
        self.minimap = Some(MinimapFit::compute(
            Self::MINIMAP_WIDTH,
            Self::MINIMAP_HEIGHT,
            self.screen_width,
            top,
            height,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimap_fit_shrinks_with_world() {
        let small = MinimapFit::compute(160.0, 240.0, 1024.0, 0.0, 768.0);
        let tall = MinimapFit::compute(160.0, 240.0, 1024.0, -2000.0, 2768.0);
        assert!(tall.zoom < small.zoom);
        assert_eq!(tall.center, (512.0, -616.0));
    }
}
