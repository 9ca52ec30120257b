//! Graphics systems: feed the batcher from the world and draw each camera

use crate::components::MeshComponent;
use crate::context::RenderResources;
use crate::mesh::Mesh;
use glam::{Mat4, Vec3};
use kiln_core::{EntityId, Result};
use kiln_ecs::{Camera, FrameInfo, Light, LookAt, Phase, Prefab, SceneWorld, System, SystemAccess, Transform};
use std::sync::Arc;

/// Mesh of `id`, taken from the entity or the nearest prefab that has one
fn resolve_mesh(world: &SceneWorld, id: EntityId) -> Option<Arc<Mesh>> {
    let mut cursor = Some(id);
    while let Some(current) = cursor {
        if let Some(mesh) = world.get::<MeshComponent>(current) {
            return Some(mesh.0.clone());
        }
        cursor = world.get_prefab(current);
    }
    None
}

/// Submits every drawable entity's mesh with its world transform
pub struct SubmitMeshes;

impl<R: RenderResources> System<R> for SubmitMeshes {
    fn name(&self) -> &str {
        "submit_meshes"
    }

    fn phase(&self) -> Phase {
        Phase::PreStore
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new()
            .read::<Transform>()
            .optional::<MeshComponent>()
            .optional::<Prefab>()
    }

    fn run(&mut self, world: &mut SceneWorld, resources: &mut R, _frame: &FrameInfo) -> Result<()> {
        let mut drawables = Vec::new();
        for (entity, (transform, prefab)) in world.ecs().query::<(&Transform, Option<&Prefab>)>().iter() {
            if prefab.is_some() {
                continue;
            }
            let Some(id) = world.id_of(entity) else {
                continue;
            };
            if let Some(mesh) = resolve_mesh(world, id) {
                drawables.push((mesh, transform.0));
            }
        }

        let renderer = resources.renderer();
        for (mesh, world_matrix) in &drawables {
            renderer.submit_mesh(mesh, *world_matrix);
        }
        Ok(())
    }
}

/// Submits point lights at their world positions
pub struct SubmitLights;

impl<R: RenderResources> System<R> for SubmitLights {
    fn name(&self) -> &str {
        "submit_lights"
    }

    fn phase(&self) -> Phase {
        Phase::PreStore
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new().read::<Light>().read::<Transform>()
    }

    fn run(&mut self, world: &mut SceneWorld, resources: &mut R, _frame: &FrameInfo) -> Result<()> {
        let mut lights: Vec<(EntityId, Vec3, Vec3)> = world
            .ecs()
            .query::<(&Light, &Transform, Option<&Prefab>)>()
            .iter()
            .filter(|(_, (_, _, prefab))| prefab.is_none())
            .filter_map(|(entity, (light, transform, _))| {
                Some((world.id_of(entity)?, transform.translation(), light.color))
            })
            .collect();
        // Stable choice when more lights exist than the shader takes
        lights.sort_by_key(|(id, _, _)| *id);

        let renderer = resources.renderer();
        for (_, position, color) in lights {
            renderer.submit_light(position, color);
        }
        Ok(())
    }
}

/// Renders the frame from the first camera; discards it when there is none
pub struct RenderCameras;

impl RenderCameras {
    /// View matrix for a camera entity at `world`
    pub fn view_matrix(world: &Mat4, look_at: Option<&LookAt>) -> Mat4 {
        match look_at {
            Some(look_at) => Mat4::look_at_rh(world.w_axis.truncate(), look_at.target, Vec3::Y),
            None => world.inverse(),
        }
    }
}

impl<R: RenderResources> System<R> for RenderCameras {
    fn name(&self) -> &str {
        "render_cameras"
    }

    fn phase(&self) -> Phase {
        Phase::OnStore
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new()
            .read::<Camera>()
            .read::<Transform>()
            .optional::<LookAt>()
    }

    fn run(&mut self, world: &mut SceneWorld, resources: &mut R, _frame: &FrameInfo) -> Result<()> {
        let camera = world
            .ecs()
            .query::<(&Camera, &Transform, Option<&LookAt>)>()
            .iter()
            .filter_map(|(entity, (camera, transform, look_at))| {
                let id = world.id_of(entity)?;
                Some((id, *camera, Self::view_matrix(&transform.0, look_at)))
            })
            .min_by_key(|(id, _, _)| *id);

        let renderer = resources.renderer();
        match camera {
            Some((_, camera, view)) => {
                let projection = camera.projection_matrix(renderer.viewport_aspect());
                let stats = renderer.render(projection, view)?;
                log::trace!(
                    "Frame {}: {} draws, {} material binds",
                    renderer.frame_count(),
                    stats.draw_calls,
                    stats.material_binds
                );
            }
            None => {
                log::trace!("No camera in scene, discarding frame");
                renderer.discard_frame();
            }
        }
        Ok(())
    }
}
