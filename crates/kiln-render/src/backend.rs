//! GPU backend interface
//!
//! The batcher and the resource types talk to the GPU only through
//! [`GpuBackend`]. Objects are addressed by plain handles; ownership and
//! deferred destruction live in [`crate::release`].

use crate::accessor::ComponentType;
use crate::material::AlphaMode;
use bitflags::bitflags;
use glam::{Mat4, Vec3, Vec4};
use kiln_core::{KilnError, MaterialId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("Failed to create surface: {0}")]
    SurfaceCreation(String),
    #[error("Failed to get adapter")]
    AdapterNotFound,
    #[error("Failed to create device: {0}")]
    DeviceCreation(String),
    #[error("Surface error: {0}")]
    SurfaceError(String),
    #[error("Shader compilation failed:\n{0}")]
    ShaderCompilation(String),
    #[error("Driver reported an error: {0}")]
    Driver(String),
    #[error("Allocation failed: {0}")]
    Allocation(String),
    #[error("Unsupported by this backend: {0}")]
    Unsupported(String),
    #[error("Unknown {kind} handle {id}")]
    InvalidHandle { kind: &'static str, id: u32 },
    #[error("Frame protocol violated: {0}")]
    Frame(String),
    #[error("Failed to read render buffer: {0}")]
    BufferReadFailed(String),
}

impl From<GpuError> for KilnError {
    fn from(err: GpuError) -> Self {
        KilnError::GpuError(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayHandle(pub u32);

/// Fixed shader input locations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeLocation {
    Position = 0,
    Normal = 1,
    Tangent = 2,
    TexCoord = 3,
}

/// One vertex input sourced from a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: AttributeLocation,
    pub buffer: BufferHandle,
    pub byte_offset: u64,
    pub byte_stride: u32,
    pub component_type: ComponentType,
    pub components: u32,
    pub normalized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn size(self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexBinding {
    pub buffer: BufferHandle,
    pub byte_offset: u64,
    pub index_type: IndexType,
}

/// Draw topology, numbered like the interchange format's `mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Topology {
    pub fn from_mode(mode: u32) -> Option<Self> {
        Some(match mode {
            0 => Topology::Points,
            1 => Topology::Lines,
            2 => Topology::LineLoop,
            3 => Topology::LineStrip,
            4 => Topology::Triangles,
            5 => Topology::TriangleStrip,
            6 => Topology::TriangleFan,
            _ => return None,
        })
    }

    /// Line loops and triangle fans have no modern GPU equivalent
    pub fn is_drawable(self) -> bool {
        !matches!(self, Topology::LineLoop | Topology::TriangleFan)
    }
}

/// Everything a vertex-array object binds
#[derive(Debug, Clone, PartialEq)]
pub struct VertexArrayDesc {
    pub label: String,
    pub attributes: Vec<VertexAttribute>,
    pub indices: IndexBinding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    ClampToEdge,
    MirroredRepeat,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    /// None when the texture is sampled without mipmaps
    pub mipmap_filter: Option<FilterMode>,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
}

/// An RGBA8 texture; the backend generates levels `1..mip_levels` from level 0
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub sampler: SamplerDesc,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
}

/// Lights uploaded per frame
pub const MAX_POINT_LIGHTS: usize = 4;

/// Per-frame shader inputs
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUniforms {
    pub projection: Mat4,
    pub view: Mat4,
    pub camera_position: Vec3,
    pub lights: Vec<PointLight>,
}

bitflags! {
    /// Which optional material textures are bound
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct TextureFlags: u32 {
        const BASE_COLOR         = 1 << 0;
        const NORMAL             = 1 << 1;
        const METALLIC_ROUGHNESS = 1 << 2;
    }
}

bitflags! {
    /// Which optional vertex inputs a draw supplies
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct VertexFlags: u32 {
        const TANGENTS = 1 << 0;
    }
}

/// Fixed texture units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSlot {
    BaseColor = 0,
    MetallicRoughness = 1,
    Normal = 2,
}

/// Material state bound before a run of draws
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialBinding {
    pub material: MaterialId,
    pub base_color_factor: Vec4,
    pub emissive_factor: Vec3,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub normal_scale: f32,
    pub alpha_cutoff: f32,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
    /// Indexed by [`TextureSlot`]
    pub textures: [Option<TextureHandle>; 3],
    pub texture_flags: TextureFlags,
}

/// One indexed draw using the last bound material
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand {
    pub vertex_array: VertexArrayHandle,
    pub model: Mat4,
    pub vertex_flags: VertexFlags,
    pub index_count: u32,
    pub index_type: IndexType,
    pub topology: Topology,
}

/// Strings identifying the driver
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DriverInfo {
    pub version: String,
    pub vendor: String,
    pub renderer: String,
}

/// GPU object creation and frame submission.
///
/// A frame is `begin_frame`, any number of `bind_material` each followed by
/// `draw_indexed` calls, then `end_frame`.
pub trait GpuBackend {
    fn driver_info(&self) -> DriverInfo;

    /// Render target size in pixels
    fn viewport(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);

    /// Upload `data` into a new buffer usable for vertices and indices
    fn create_buffer(&mut self, label: &str, data: &[u8]) -> Result<BufferHandle, GpuError>;

    fn destroy_buffer(&mut self, handle: BufferHandle);

    /// Upload tightly packed RGBA8 `pixels` as level 0 of a new texture
    fn create_texture(&mut self, desc: &TextureDesc, pixels: &[u8]) -> Result<TextureHandle, GpuError>;

    fn destroy_texture(&mut self, handle: TextureHandle);

    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> Result<VertexArrayHandle, GpuError>;

    fn destroy_vertex_array(&mut self, handle: VertexArrayHandle);

    fn begin_frame(&mut self, uniforms: &FrameUniforms) -> Result<(), GpuError>;

    fn bind_material(&mut self, binding: &MaterialBinding) -> Result<(), GpuError>;

    fn draw_indexed(&mut self, draw: &DrawCommand) -> Result<(), GpuError>;

    /// Submit the frame. Driver errors raised since the last frame surface here.
    fn end_frame(&mut self) -> Result<(), GpuError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_modes() {
        assert_eq!(Topology::from_mode(4), Some(Topology::Triangles));
        assert_eq!(Topology::from_mode(9), None);
        assert!(!Topology::LineLoop.is_drawable());
        assert!(!Topology::TriangleFan.is_drawable());
        assert!(Topology::TriangleStrip.is_drawable());
    }

    #[test]
    fn test_flag_bits() {
        assert_eq!(TextureFlags::BASE_COLOR.bits(), 1);
        assert_eq!(TextureFlags::NORMAL.bits(), 2);
        assert_eq!(TextureFlags::METALLIC_ROUGHNESS.bits(), 4);
        assert_eq!(VertexFlags::TANGENTS.bits(), 1);
    }

    #[test]
    fn test_gpu_error_converts_with_diagnostics() {
        let err: KilnError = GpuError::ShaderCompilation("line 3: unknown type".into()).into();
        assert!(err.to_string().contains("line 3: unknown type"));
    }
}
