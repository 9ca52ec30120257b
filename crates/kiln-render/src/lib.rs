//! Kiln Render - GPU resources and the material-batched renderer
//!
//! Buffer views, accessors, textures, materials and mesh primitives own GPU
//! objects through a [`GpuBackend`]; dropping them queues the objects for
//! release on the render thread. The [`RenderBatcher`] groups submitted
//! primitives by material and draws each group with one material bind.
//! [`WgpuBackend`] renders through wgpu; [`RecordingBackend`] records
//! commands for tests and tools.

pub mod accessor;
pub mod backend;
mod batcher;
mod buffer_view;
mod components;
mod config;
mod context;
mod material;
mod mesh;
mod recording;
pub mod release;
mod systems;
mod texture;
mod wgpu_backend;

pub use accessor::{AccessorType, BufferAccessor, ComponentType};
pub use backend::{GpuBackend, GpuError, Topology};
pub use batcher::{FrameStats, RenderBatcher};
pub use buffer_view::BufferView;
pub use components::MeshComponent;
pub use config::RendererConfig;
pub use context::{RenderContext, RenderResources};
pub use material::{AlphaMode, Material, PbrMetallicRoughness};
pub use mesh::{Mesh, MeshPrimitive, PrimitiveDesc};
pub use recording::{RecordedFrame, RecordingBackend};
pub use systems::{RenderCameras, SubmitLights, SubmitMeshes};
pub use texture::{full_mip_chain, Image, MinFilter, Texture, TextureSampler};
pub use wgpu_backend::WgpuBackend;

#[cfg(test)]
mod tests {
    #[test]
    fn shader_wgsl_parses() {
        let source = include_str!("wgpu_backend/shader.wgsl");
        naga::front::wgsl::parse_str(source).expect("shader.wgsl failed to parse");
    }
}
