//! Kiln Player - open a scene document and render it
//!
//! Imports the scene, adds a camera and light when the document has none and
//! runs the frame schedule, either in a window or offscreen.

pub mod config;
mod headless;
pub mod input;
mod player_app;
pub mod rig;

pub use config::PlayerConfig;
pub use headless::{run_headless, HeadlessReport};
pub use input::InputState;
pub use player_app::PlayerApp;
pub use rig::{frame_schedule, spawn_default_rig, CameraControl, CameraController, PlayerResources, Rig};
