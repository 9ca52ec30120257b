//! Kiln Import - Scene document importer
//!
//! Reads a JSON scene document (buffers, accessors, textures, materials,
//! meshes, cameras and a node hierarchy), creates the GPU resources it
//! describes through a [`kiln_render::RenderContext`] and mounts one entity
//! per node into a [`kiln_ecs::SceneWorld`].

pub mod document;
mod importer;
mod load;
mod types;
mod validate;

pub use document::Document;
pub use importer::{import_document, import_scene};
pub use types::ImportedScene;
pub use validate::validate;
