//! Layered player configuration
//!
//! Values are resolved with three layers of precedence (highest wins):
//! 1. Command-line overrides
//! 2. The file given by `--config`, or `kiln.toml` next to the scene
//! 3. Built-in defaults

use kiln_core::{KilnError, Result};
use kiln_render::RendererConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "kiln.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_title() -> String {
    "Kiln Player".to_string()
}
fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}

/// Camera spawned when the scene brings none
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_camera_position")]
    pub position: [f32; 3],
    #[serde(default)]
    pub target: [f32; 3],
    #[serde(default = "default_fov")]
    pub fov_y_degrees: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
    /// Units per second for W/S movement
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: default_camera_position(),
            target: [0.0; 3],
            fov_y_degrees: default_fov(),
            near: default_near(),
            far: default_far(),
            move_speed: default_move_speed(),
        }
    }
}

fn default_camera_position() -> [f32; 3] {
    [0.0, 1.0, 5.0]
}
fn default_fov() -> f32 {
    45.0
}
fn default_near() -> f32 {
    0.1
}
fn default_far() -> f32 {
    100.0
}
fn default_move_speed() -> f32 {
    2.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LightConfig {
    #[serde(default = "default_light_position")]
    pub position: [f32; 3],
    #[serde(default = "default_light_color")]
    pub color: [f32; 3],
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            position: default_light_position(),
            color: default_light_color(),
        }
    }
}

fn default_light_position() -> [f32; 3] {
    [4.0, 6.0, 4.0]
}
fn default_light_color() -> [f32; 3] {
    [100.0, 100.0, 100.0]
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogConfig {
    /// `env_logger` filter; `RUST_LOG` takes precedence
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

/// Top-level `kiln.toml` structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub light: LightConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl PlayerConfig {
    /// Resolve the config file for `scene`: an explicit path must exist, the
    /// file next to the scene is optional
    pub fn load(explicit: Option<&Path>, scene: &Path) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(KilnError::ConfigError(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                Self::load_file(path)
            }
            None => {
                let beside_scene = Self::scene_config_path(scene);
                if beside_scene.exists() {
                    Self::load_file(&beside_scene)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn scene_config_path(scene: &Path) -> PathBuf {
        scene
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(CONFIG_FILE_NAME)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| {
            KilnError::ConfigError(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply command-line window size overrides
    pub fn override_size(&mut self, width: Option<u32>, height: Option<u32>) {
        if let Some(width) = width {
            self.window.width = width;
        }
        if let Some(height) = height {
            self.window.height = height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::from_toml("").unwrap();
        assert_eq!(config, PlayerConfig::default());
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.camera.fov_y_degrees, 45.0);
        assert_eq!(config.renderer.clear_color, [0.1, 0.1, 0.1, 1.0]);
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn test_partial_sections() {
        let config = PlayerConfig::from_toml(
            r#"
[window]
title = "Viewer"

[camera]
position = [2.0, 0.0, 0.0]
move_speed = 5.0

[renderer]
vsync = false
"#,
        )
        .unwrap();

        assert_eq!(config.window.title, "Viewer");
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.camera.position, [2.0, 0.0, 0.0]);
        assert_eq!(config.camera.move_speed, 5.0);
        assert_eq!(config.camera.far, 100.0);
        assert!(!config.renderer.vsync);
        assert_eq!(config.light, LightConfig::default());
    }

    #[test]
    fn test_malformed_file() {
        let err = PlayerConfig::from_toml("[window]\nwidth = \"wide\"").unwrap_err();
        assert!(matches!(err, KilnError::TomlParseError(_)));
    }

    #[test]
    fn test_layering() {
        let dir = std::env::temp_dir().join(format!("kiln-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let scene = dir.join("scene.json");

        // Nothing beside the scene: defaults
        assert_eq!(PlayerConfig::load(None, &scene).unwrap(), PlayerConfig::default());

        std::fs::write(dir.join(CONFIG_FILE_NAME), "[window]\nwidth = 640").unwrap();
        let mut config = PlayerConfig::load(None, &scene).unwrap();
        assert_eq!(config.window.width, 640);

        config.override_size(None, Some(480));
        assert_eq!((config.window.width, config.window.height), (640, 480));

        let missing = dir.join("missing.toml");
        assert!(matches!(
            PlayerConfig::load(Some(&missing), &scene),
            Err(KilnError::ConfigError(_))
        ));

        std::fs::remove_dir_all(&dir).ok();
    }
}
