//! Kiln Core - Foundational types for the Kiln engine
//!
//! This crate provides the types every other Kiln crate depends on:
//! - `EntityId`, `MaterialId` - Stable identifiers
//! - `math` - Node matrix composition/decomposition and Euler conversion
//! - Error taxonomy and Result alias

mod error;
mod id;
pub mod math;

pub use error::{KilnError, Result};
pub use id::{EntityId, MaterialId};

/// Re-export of the math library used across the engine
pub use glam;
