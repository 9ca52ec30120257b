//! Renderer configuration

use serde::Deserialize;

/// Configuration for creating a renderer, read from the `[renderer]` table
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub clear_color: [f64; 4],
    /// Ask the driver for validation and debug labels
    pub gpu_debug: bool,
    pub vsync: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.1, 0.1, 0.1, 1.0],
            gpu_debug: false,
            vsync: true,
        }
    }
}
