//! Render components attached to scene entities

use crate::mesh::Mesh;
use std::sync::Arc;

/// Draw this mesh at the entity's world transform
#[derive(Debug, Clone)]
pub struct MeshComponent(pub Arc<Mesh>);

impl MeshComponent {
    pub fn mesh(&self) -> &Mesh {
        &self.0
    }
}
