use std::path::PathBuf;

use crate::gpu::clamp_radius;

/// Radius applied when the caller does not ask for one.
pub const DEFAULT_RADIUS: f32 = 5.0;

/// Configuration parameters supplied to the renderer at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct RendererConfig {
    /// Window or output size in physical pixels.
    pub surface_size: (u32, u32),
    /// Image shown (or exported) at startup.
    pub image: Option<PathBuf>,
    /// Initial blur radius; clamped to the supported range when applied.
    pub radius: f32,
    /// Index into the enumerated adapter list.
    pub adapter_index: usize,
    /// Wait for vertical sync when presenting.
    pub vsync: bool,
}

impl RendererConfig {
    /// Radius actually handed to the blur.
    pub fn effective_radius(&self) -> f32 {
        clamp_radius(self.radius)
    }
}

impl Default for RendererConfig {
    /// A 1280x720 window with vsync and no image.
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            image: None,
            radius: DEFAULT_RADIUS,
            adapter_index: 0,
            vsync: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{RADIUS_MAX, RADIUS_MIN};

    #[test]
    fn defaults_match_initial_window() {
        let config = RendererConfig::default();
        assert_eq!(config.surface_size, (1280, 720));
        assert_eq!(config.effective_radius(), DEFAULT_RADIUS);
        assert!(config.vsync);
        assert!(config.image.is_none());
    }

    #[test]
    fn effective_radius_is_clamped() {
        let mut config = RendererConfig {
            radius: 0.0,
            ..RendererConfig::default()
        };
        assert_eq!(config.effective_radius(), RADIUS_MIN);
        config.radius = 1000.0;
        assert_eq!(config.effective_radius(), RADIUS_MAX);
    }
}
