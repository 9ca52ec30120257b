//! Import result types

use kiln_core::EntityId;
use kiln_ecs::{Camera, SceneWorld};
use kiln_render::{Material, Mesh, Texture};
use std::sync::Arc;

/// A scene mounted into a world by the importer.
///
/// The resource tables keep their GPU objects alive; entities hold further
/// references through their mesh components. Everything is released once the
/// scene is unmounted and the last reference drops.
#[derive(Debug)]
pub struct ImportedScene {
    /// One entity per document node, in node order
    pub entities: Vec<EntityId>,
    /// Entities of nodes that no other node lists as a child
    pub roots: Vec<EntityId>,
    pub meshes: Vec<Arc<Mesh>>,
    pub materials: Vec<Arc<Material>>,
    pub textures: Vec<Arc<Texture>>,
}

impl ImportedScene {
    /// Entity created for node `index`
    pub fn entity(&self, index: usize) -> Option<EntityId> {
        self.entities.get(index).copied()
    }

    /// True when any imported node carries a camera
    pub fn has_camera(&self, world: &SceneWorld) -> bool {
        self.entities.iter().any(|id| world.has::<Camera>(*id))
    }

    /// Despawn every entity of the scene, returning how many were still alive
    pub fn unmount(self, world: &mut SceneWorld) -> usize {
        let mut despawned = 0;
        for id in self.entities.iter().rev() {
            if world.despawn(*id).is_ok() {
                despawned += 1;
            }
        }
        log::info!("Unmounted scene: {} entities despawned", despawned);
        despawned
    }
}
