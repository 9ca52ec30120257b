//! Material-keyed draw batching.
//!
//! Meshes are submitted once per frame with their world transform. Each
//! primitive lands in the bucket of its material; [`RenderBatcher::render`]
//! binds every material once and draws its whole queue. Buckets that went a
//! full frame without submissions are evicted after the pass.

use crate::backend::{DrawCommand, FrameUniforms, GpuBackend, PointLight, MAX_POINT_LIGHTS};
use crate::material::Material;
use crate::mesh::{Mesh, MeshPrimitive};
use glam::Mat4;
use kiln_core::{math, MaterialId, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

struct Bucket {
    material: Arc<Material>,
    queue: Vec<(Mat4, Arc<MeshPrimitive>)>,
}

/// Counters from one rendered frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: usize,
    pub material_binds: usize,
    /// Buckets removed because nothing used their material this frame
    pub evicted: usize,
}

#[derive(Default)]
pub struct RenderBatcher {
    buckets: BTreeMap<MaterialId, Bucket>,
    lights: Vec<PointLight>,
}

impl RenderBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit_mesh(&mut self, mesh: &Mesh, world: Mat4) {
        for primitive in &mesh.primitives {
            self.submit_primitive(primitive, world);
        }
    }

    pub fn submit_primitive(&mut self, primitive: &Arc<MeshPrimitive>, world: Mat4) {
        let material = primitive.material();
        self.buckets
            .entry(material.id())
            .or_insert_with(|| Bucket {
                material: material.clone(),
                queue: Vec::new(),
            })
            .queue
            .push((world, primitive.clone()));
    }

    pub fn submit_light(&mut self, light: PointLight) {
        if self.lights.len() == MAX_POINT_LIGHTS {
            log::trace!("Ignoring light at {}: limit of {} reached", light.position, MAX_POINT_LIGHTS);
            return;
        }
        self.lights.push(light);
    }

    /// Materials currently holding a bucket
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn has_bucket(&self, material: MaterialId) -> bool {
        self.buckets.contains_key(&material)
    }

    /// Entries queued for the next frame
    pub fn queued(&self) -> usize {
        self.buckets.values().map(|b| b.queue.len()).sum()
    }

    /// Draw all queued primitives grouped by material, then clear the queues
    pub fn render<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        projection: Mat4,
        view: Mat4,
    ) -> Result<FrameStats> {
        let uniforms = FrameUniforms {
            projection,
            view,
            camera_position: math::camera_position(&view),
            lights: std::mem::take(&mut self.lights),
        };

        let result = self.draw(backend, &uniforms);
        if result.is_err() {
            self.discard();
        }
        result
    }

    fn draw<B: GpuBackend + ?Sized>(&mut self, backend: &mut B, uniforms: &FrameUniforms) -> Result<FrameStats> {
        let mut stats = FrameStats::default();
        let mut empty = Vec::new();

        backend.begin_frame(uniforms)?;
        for (id, bucket) in &mut self.buckets {
            if bucket.queue.is_empty() {
                empty.push(*id);
                continue;
            }

            backend.bind_material(&bucket.material.binding())?;
            stats.material_binds += 1;

            for (model, primitive) in bucket.queue.drain(..) {
                backend.draw_indexed(&DrawCommand {
                    vertex_array: primitive.vertex_array(),
                    model,
                    vertex_flags: primitive.vertex_flags(),
                    index_count: primitive.index_count(),
                    index_type: primitive.index_type(),
                    topology: primitive.topology(),
                })?;
                stats.draw_calls += 1;
            }
        }
        backend.end_frame()?;

        for id in &empty {
            self.buckets.remove(id);
        }
        stats.evicted = empty.len();
        Ok(stats)
    }

    /// Drop queued draws and lights, keeping the buckets
    pub fn discard(&mut self) {
        for bucket in self.buckets.values_mut() {
            bucket.queue.clear();
        }
        self.lights.clear();
    }

    /// Drop every bucket
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.lights.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{TextureFlags, TextureSlot};
    use crate::context::RenderContext;
    use crate::mesh::fixtures::triangle;
    use crate::recording::RecordingBackend;
    use crate::texture::{Image, Texture};
    use glam::{Vec3, Vec4};

    fn material(name: &str) -> Arc<Material> {
        Arc::new(Material::new(Some(name.into())))
    }

    #[test]
    fn test_single_draw() {
        let mut ctx = RenderContext::new(RecordingBackend::new());
        let primitive = triangle(&mut ctx, None);
        let mesh = Mesh::new(Some("tri".into()), vec![primitive.clone()]);

        ctx.submit_mesh(&mesh, Mat4::IDENTITY);
        let stats = ctx.render(Mat4::IDENTITY, Mat4::IDENTITY).unwrap();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.material_binds, 1);

        let frame = ctx.backend().last_frame().unwrap();
        assert_eq!(frame.draws.len(), 1);
        assert_eq!(frame.draws[0].model, Mat4::IDENTITY);
        assert_eq!(frame.draws[0].index_count, 3);
        assert_eq!(frame.draws[0].vertex_array, primitive.vertex_array());
    }

    #[test]
    fn test_groups_by_material() {
        let mut ctx = RenderContext::new(RecordingBackend::new());
        let red = material("red");
        let blue = material("blue");
        let a = triangle(&mut ctx, Some(red.clone()));
        let b = triangle(&mut ctx, Some(blue.clone()));
        let c = triangle(&mut ctx, Some(red.clone()));
        let mesh = Mesh::new(None, vec![a, b, c]);

        ctx.submit_mesh(&mesh, Mat4::IDENTITY);
        ctx.submit_mesh(&mesh, Mat4::from_translation(Vec3::X));
        let stats = ctx.render(Mat4::IDENTITY, Mat4::IDENTITY).unwrap();

        assert_eq!(stats.material_binds, 2);
        assert_eq!(stats.draw_calls, 6);
        let frame = ctx.backend().last_frame().unwrap();
        let bound: Vec<MaterialId> = frame.materials.iter().map(|m| m.material).collect();
        assert!(bound.contains(&red.id()) && bound.contains(&blue.id()));
        assert_eq!(ctx.batcher().queued(), 0);
    }

    #[test]
    fn test_unused_buckets_evicted() {
        let mut ctx = RenderContext::new(RecordingBackend::new());
        let red = material("red");
        let blue = material("blue");
        let a = Mesh::new(None, vec![triangle(&mut ctx, Some(red.clone()))]);
        let b = Mesh::new(None, vec![triangle(&mut ctx, Some(blue.clone()))]);

        // Frame 1: both materials
        ctx.submit_mesh(&a, Mat4::IDENTITY);
        ctx.submit_mesh(&b, Mat4::IDENTITY);
        ctx.render(Mat4::IDENTITY, Mat4::IDENTITY).unwrap();
        assert_eq!(ctx.batcher().bucket_count(), 2);

        // Frame 2: only red; blue's bucket was empty and goes away
        ctx.submit_mesh(&a, Mat4::IDENTITY);
        let stats = ctx.render(Mat4::IDENTITY, Mat4::IDENTITY).unwrap();
        assert_eq!(stats.evicted, 1);
        assert!(ctx.batcher().has_bucket(red.id()));
        assert!(!ctx.batcher().has_bucket(blue.id()));

        // Frame 3: blue comes back
        ctx.submit_mesh(&b, Mat4::from_translation(Vec3::Y));
        let stats = ctx.render(Mat4::IDENTITY, Mat4::IDENTITY).unwrap();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.evicted, 1);
        assert!(!ctx.batcher().has_bucket(red.id()));

        let frame = ctx.backend().last_frame().unwrap();
        assert_eq!(frame.materials.len(), 1);
        assert_eq!(frame.materials[0].material, blue.id());
        assert_eq!(frame.draws[0].model, Mat4::from_translation(Vec3::Y));
    }

    #[test]
    fn test_texture_bitmask() {
        let mut ctx = RenderContext::new(RecordingBackend::new());
        let image = Image::from_rgba(2, 2, vec![128; 16]).unwrap();
        let albedo = Arc::new(Texture::new(&mut ctx, "albedo", &image, None).unwrap());
        let orm = Arc::new(Texture::new(&mut ctx, "orm", &image, None).unwrap());

        let mut textured = Material::new(Some("textured".into()));
        textured.pbr.base_color_factor = Vec4::new(1.0, 0.5, 0.25, 1.0);
        textured.pbr.base_color_texture = Some(albedo.clone());
        textured.pbr.metallic_roughness_texture = Some(orm.clone());
        let textured = Arc::new(textured);

        let mut desc = crate::mesh::fixtures::triangle_desc(&mut ctx, Some(textured));
        desc.texcoord = Some(crate::mesh::fixtures::accessor(
            &mut ctx,
            crate::accessor::AccessorType::Vec2,
            crate::accessor::ComponentType::Float,
            3,
        ));
        let primitive = Arc::new(MeshPrimitive::new(&mut ctx, desc).unwrap());

        ctx.submit_mesh(&Mesh::new(None, vec![primitive]), Mat4::IDENTITY);
        ctx.render(Mat4::IDENTITY, Mat4::IDENTITY).unwrap();

        let binding = &ctx.backend().last_frame().unwrap().materials[0];
        assert_eq!(
            binding.texture_flags,
            TextureFlags::BASE_COLOR | TextureFlags::METALLIC_ROUGHNESS
        );
        assert_eq!(binding.textures[TextureSlot::BaseColor as usize], Some(albedo.handle()));
        assert_eq!(binding.textures[TextureSlot::MetallicRoughness as usize], Some(orm.handle()));
        assert_eq!(binding.textures[TextureSlot::Normal as usize], None);
        assert_eq!(binding.base_color_factor, Vec4::new(1.0, 0.5, 0.25, 1.0));
    }

    #[test]
    fn test_lights_capped_and_cleared() {
        let mut ctx = RenderContext::new(RecordingBackend::new());
        for i in 0..6 {
            ctx.submit_light(Vec3::splat(i as f32), Vec3::ONE);
        }
        ctx.render(Mat4::IDENTITY, Mat4::IDENTITY).unwrap();
        assert_eq!(ctx.backend().last_frame().unwrap().uniforms.lights.len(), MAX_POINT_LIGHTS);

        ctx.render(Mat4::IDENTITY, Mat4::IDENTITY).unwrap();
        assert!(ctx.backend().last_frame().unwrap().uniforms.lights.is_empty());
    }

    #[test]
    fn test_dropped_mesh_released_next_frame() {
        let mut ctx = RenderContext::new(RecordingBackend::new());
        let mesh = Mesh::new(None, vec![triangle(&mut ctx, None)]);
        let live = ctx.backend().live_objects();
        assert!(live > 0);

        ctx.submit_mesh(&mesh, Mat4::IDENTITY);
        ctx.render(Mat4::IDENTITY, Mat4::IDENTITY).unwrap();
        drop(mesh);
        ctx.render(Mat4::IDENTITY, Mat4::IDENTITY).unwrap();
        assert_eq!(ctx.backend().live_objects(), 0);
    }
}
