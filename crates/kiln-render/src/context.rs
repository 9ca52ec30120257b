//! Render context: the backend plus everything that outlives a frame

use crate::backend::{GpuBackend, PointLight};
use crate::batcher::{FrameStats, RenderBatcher};
use crate::material::Material;
use crate::mesh::Mesh;
use crate::release::{ReleaseQueue, Releaser};
use glam::{Mat4, Vec3};
use kiln_core::Result;
use std::sync::Arc;

/// Owns the GPU backend, the deferred-release queue, the default material
/// and the batcher.
///
/// Resources are created through the context so they can register their
/// handles for release; frames are drawn with [`RenderContext::render`].
pub struct RenderContext<B: GpuBackend> {
    backend: B,
    releases: ReleaseQueue,
    default_material: Arc<Material>,
    batcher: RenderBatcher,
    frames: u64,
}

impl<B: GpuBackend> RenderContext<B> {
    pub fn new(backend: B) -> Self {
        let info = backend.driver_info();
        log::info!("Renderer: {} ({})", info.renderer, info.vendor);
        log::info!("Driver version: {}", info.version);

        Self {
            backend,
            releases: ReleaseQueue::new(),
            default_material: Arc::new(Material::default()),
            batcher: RenderBatcher::new(),
            frames: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Handle for queueing GPU object releases from any thread
    pub fn releaser(&self) -> Releaser {
        self.releases.releaser()
    }

    /// Material for primitives that don't name one
    pub fn default_material(&self) -> &Arc<Material> {
        &self.default_material
    }

    pub fn batcher(&self) -> &RenderBatcher {
        &self.batcher
    }

    /// Queue every primitive of `mesh` for this frame
    pub fn submit_mesh(&mut self, mesh: &Mesh, world: Mat4) {
        self.batcher.submit_mesh(mesh, world);
    }

    pub fn submit_light(&mut self, position: Vec3, color: Vec3) {
        self.batcher.submit_light(PointLight { position, color });
    }

    /// Destroy GPU objects whose owners have been dropped
    pub fn flush_releases(&mut self) -> usize {
        let released = self.releases.drain(&mut self.backend);
        if released > 0 {
            log::debug!("Released {} GPU objects", released);
        }
        released
    }

    /// Draw everything submitted since the last frame
    pub fn render(&mut self, projection: Mat4, view: Mat4) -> Result<FrameStats> {
        self.flush_releases();
        let stats = self.batcher.render(&mut self.backend, projection, view)?;
        self.frames += 1;
        Ok(stats)
    }

    /// Drop this frame's submissions without drawing
    pub fn discard_frame(&mut self) {
        self.batcher.discard();
    }

    /// Frames rendered so far
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn viewport_aspect(&self) -> f32 {
        let (width, height) = self.backend.viewport();
        width.max(1) as f32 / height.max(1) as f32
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.backend.resize(width, height);
        }
    }

    /// Release everything still queued and hand the backend back
    pub fn shutdown(mut self) -> B {
        self.batcher.discard();
        self.batcher.clear();
        drop(self.default_material);
        self.releases.drain(&mut self.backend);
        log::info!("Render context shut down after {} frames", self.frames);
        self.backend
    }
}

/// Resources that carry a render context, for the graphics systems
pub trait RenderResources {
    type Backend: GpuBackend;

    fn renderer(&mut self) -> &mut RenderContext<Self::Backend>;
}

impl<B: GpuBackend> RenderResources for RenderContext<B> {
    type Backend = B;

    fn renderer(&mut self) -> &mut RenderContext<B> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingBackend;

    #[test]
    fn test_viewport_aspect_follows_resize() {
        let mut ctx = RenderContext::new(RecordingBackend::new());
        assert!((ctx.viewport_aspect() - 1280.0 / 720.0).abs() < 1e-6);

        ctx.resize(400, 400);
        assert_eq!(ctx.viewport_aspect(), 1.0);

        ctx.resize(0, 300);
        assert_eq!(ctx.backend().viewport(), (400, 400));
    }

    #[test]
    fn test_empty_frame_still_sets_uniforms() {
        let mut ctx = RenderContext::new(RecordingBackend::new());
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let stats = ctx.render(Mat4::IDENTITY, view).unwrap();

        assert_eq!(stats.draw_calls, 0);
        assert_eq!(ctx.frame_count(), 1);
        let frame = ctx.backend().last_frame().unwrap();
        assert!(frame.uniforms.camera_position.abs_diff_eq(Vec3::new(0.0, 0.0, 5.0), 1e-5));
    }
}
