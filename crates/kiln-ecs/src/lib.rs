//! Kiln ECS - Entity Component System with stable IDs
//!
//! This crate wraps hecs with stable entity identifiers, parent and prefab
//! relations, per-entity change versions and a phase-ordered system schedule.
//! The transform cascade that resolves world matrices lives here as well.

mod change;
mod clock;
pub mod components;
mod schedule;
mod system;
mod transform;
mod world;

pub use change::{ChangeGroup, ChangeTicks};
pub use clock::FrameClock;
pub use components::{Camera, LookAt, Light, Position, Prefab, Projection, Rotation, Scale, Tracked, Transform};
pub use schedule::Schedule;
pub use system::{FrameInfo, Phase, System, SystemAccess};
pub use transform::{AddTransforms, CascadeStats, TransformCascade};
pub use world::{ComponentSource, SceneWorld};
