//! Shader program: uniform layouts, bind group layouts and the pipeline cache

use crate::backend::{AttributeLocation, FrameUniforms, GpuError, IndexType, MaterialBinding, Topology, MAX_POINT_LIGHTS};
use crate::material::AlphaMode;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use std::collections::HashMap;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct PointLightGpu {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

/// Bind group 0
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FrameUniformsGpu {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub lights: [PointLightGpu; MAX_POINT_LIGHTS],
    pub light_count: u32,
    pub _pad: [u32; 3],
}

impl FrameUniformsGpu {
    pub fn new(uniforms: &FrameUniforms) -> Self {
        let mut gpu = Self::zeroed();
        gpu.projection = uniforms.projection.to_cols_array_2d();
        gpu.view = uniforms.view.to_cols_array_2d();
        gpu.camera_position = uniforms.camera_position.extend(1.0).to_array();
        for (slot, light) in gpu.lights.iter_mut().zip(&uniforms.lights) {
            slot.position = light.position.extend(1.0).to_array();
            slot.color = light.color.extend(1.0).to_array();
        }
        gpu.light_count = uniforms.lights.len().min(MAX_POINT_LIGHTS) as u32;
        gpu
    }
}

/// Bind group 1, binding 0
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MaterialUniformsGpu {
    pub base_color_factor: [f32; 4],
    pub emissive_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub normal_scale: f32,
    pub alpha_cutoff: f32,
    pub texture_flags: u32,
    pub alpha_mode: u32,
    pub _pad: [u32; 2],
}

impl MaterialUniformsGpu {
    pub fn new(binding: &MaterialBinding) -> Self {
        Self {
            base_color_factor: binding.base_color_factor.to_array(),
            emissive_factor: binding.emissive_factor.extend(0.0).to_array(),
            metallic_factor: binding.metallic_factor,
            roughness_factor: binding.roughness_factor,
            normal_scale: binding.normal_scale,
            alpha_cutoff: binding.alpha_cutoff,
            texture_flags: binding.texture_flags.bits(),
            alpha_mode: match binding.alpha_mode {
                AlphaMode::Opaque => 0,
                AlphaMode::Mask => 1,
                AlphaMode::Blend => 2,
            },
            _pad: [0; 2],
        }
    }
}

/// Bind group 2
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct DrawUniformsGpu {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub vertex_flags: u32,
    pub _pad: [u32; 3],
}

impl DrawUniformsGpu {
    pub fn new(model: &Mat4, vertex_flags: u32) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: model.inverse().transpose().to_cols_array_2d(),
            vertex_flags,
            _pad: [0; 3],
        }
    }
}

/// Vertex buffer slot for one shader input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotLayout {
    pub stride: u64,
    pub format: wgpu::VertexFormat,
    pub step_mode: wgpu::VertexStepMode,
}

impl SlotLayout {
    /// Constant zero input for attributes a primitive doesn't supply
    pub fn fallback(location: AttributeLocation) -> Self {
        Self {
            stride: 0,
            format: match location {
                AttributeLocation::TexCoord => wgpu::VertexFormat::Float32x2,
                AttributeLocation::Position | AttributeLocation::Normal => wgpu::VertexFormat::Float32x3,
                AttributeLocation::Tangent => wgpu::VertexFormat::Float32x4,
            },
            step_mode: wgpu::VertexStepMode::Instance,
        }
    }
}

/// Everything that selects a distinct render pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    /// Indexed by [`AttributeLocation`]
    pub slots: [SlotLayout; 4],
    pub topology: Topology,
    pub index_type: IndexType,
    pub blend: bool,
    pub double_sided: bool,
}

pub fn primitive_topology(topology: Topology) -> Result<wgpu::PrimitiveTopology, GpuError> {
    Ok(match topology {
        Topology::Points => wgpu::PrimitiveTopology::PointList,
        Topology::Lines => wgpu::PrimitiveTopology::LineList,
        Topology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
        Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        Topology::LineLoop | Topology::TriangleFan => {
            return Err(GpuError::Unsupported(format!("{:?} topology", topology)))
        }
    })
}

pub fn index_format(index_type: IndexType) -> wgpu::IndexFormat {
    match index_type {
        IndexType::U16 => wgpu::IndexFormat::Uint16,
        IndexType::U32 => wgpu::IndexFormat::Uint32,
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entries(binding: u32) -> [wgpu::BindGroupLayoutEntry; 2] {
    [
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: binding + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
    ]
}

/// The compiled shader module, its layouts and every pipeline built from it
pub struct Program {
    shader: wgpu::ShaderModule,
    layout: wgpu::PipelineLayout,
    pub frame_layout: wgpu::BindGroupLayout,
    pub material_layout: wgpu::BindGroupLayout,
    pub draw_layout: wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl Program {
    /// Compile the shader; compiler diagnostics come back in the error
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Result<Self, GpuError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Kiln PBR Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::ShaderCompilation(error.to_string()));
        }

        let both = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[uniform_entry(0, both)],
        });

        let [base_tex, base_sampler] = texture_entries(1);
        let [mr_tex, mr_sampler] = texture_entries(3);
        let [normal_tex, normal_sampler] = texture_entries(5);
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Bind Group Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                base_tex,
                base_sampler,
                mr_tex,
                mr_sampler,
                normal_tex,
                normal_sampler,
            ],
        });

        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Bind Group Layout"),
            entries: &[uniform_entry(0, both)],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Kiln Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &material_layout, &draw_layout],
            push_constant_ranges: &[],
        });

        Ok(Self {
            shader,
            layout,
            frame_layout,
            material_layout,
            draw_layout,
            format,
            pipelines: HashMap::new(),
        })
    }

    pub fn pipeline(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(key)
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Build the pipeline for `key` unless it is cached
    pub fn prepare(&mut self, device: &wgpu::Device, key: PipelineKey) -> Result<(), GpuError> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }

        let topology = primitive_topology(key.topology)?;
        let strip_index_format = match key.topology {
            Topology::LineStrip | Topology::TriangleStrip => Some(index_format(key.index_type)),
            _ => None,
        };

        let attributes: Vec<[wgpu::VertexAttribute; 1]> = key
            .slots
            .iter()
            .enumerate()
            .map(|(location, slot)| {
                [wgpu::VertexAttribute {
                    format: slot.format,
                    offset: 0,
                    shader_location: location as u32,
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout> = key
            .slots
            .iter()
            .zip(&attributes)
            .map(|(slot, attributes)| wgpu::VertexBufferLayout {
                array_stride: slot.stride,
                step_mode: slot.step_mode,
                attributes,
            })
            .collect();

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Kiln Render Pipeline"),
            layout: Some(&self.layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                buffers: &buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.format,
                    blend: key.blend.then_some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: if key.double_sided { None } else { Some(wgpu::Face::Back) },
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: !key.blend,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::ShaderCompilation(error.to_string()));
        }

        log::debug!("Built pipeline for {:?} ({} cached)", key.topology, self.pipelines.len() + 1);
        self.pipelines.insert(key, pipeline);
        Ok(())
    }
}
