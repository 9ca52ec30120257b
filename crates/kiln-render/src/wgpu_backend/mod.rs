//! wgpu implementation of [`GpuBackend`]
//!
//! Objects live in handle-keyed maps. Frame commands are recorded as they
//! arrive and encoded into one render pass at `end_frame`, after every
//! pipeline they need has been built.

mod program;
mod target;

use crate::accessor::ComponentType;
use crate::backend::{
    AddressMode, AttributeLocation, BufferHandle, DrawCommand, DriverInfo, FilterMode, FrameUniforms, GpuBackend,
    GpuError, IndexBinding, MaterialBinding, SamplerDesc, TextureDesc, TextureHandle, Topology, VertexArrayDesc,
    VertexArrayHandle,
};
use crate::config::RendererConfig;
use crate::material::AlphaMode;
use program::{index_format, DrawUniformsGpu, FrameUniformsGpu, MaterialUniformsGpu, PipelineKey, Program, SlotLayout};
use std::collections::HashMap;
use std::sync::Arc;
use target::RenderTarget;
use wgpu::util::DeviceExt;
use winit::window::Window;

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

/// One vertex input: source buffer and byte offset, or the zero fallback
type SlotSource = Option<(BufferHandle, u64)>;

struct VertexArray {
    sources: [SlotSource; 4],
    layouts: [SlotLayout; 4],
    indices: IndexBinding,
}

enum PendingOp {
    Material {
        bind_group: wgpu::BindGroup,
        blend: bool,
        double_sided: bool,
    },
    Draw {
        bind_group: wgpu::BindGroup,
        vertex_array: VertexArrayHandle,
        index_count: u32,
        topology: Topology,
    },
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    target: RenderTarget,
    program: Program,
    clear_color: wgpu::Color,
    next_id: u32,
    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    textures: HashMap<TextureHandle, GpuTexture>,
    vertex_arrays: HashMap<VertexArrayHandle, VertexArray>,
    /// 1x1 textures bound to empty slots, indexed by texture slot
    defaults: [GpuTexture; 3],
    zero_buffer: wgpu::Buffer,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    pending: Vec<PendingOp>,
    in_frame: bool,
    errors: flume::Receiver<String>,
}

impl WgpuBackend {
    /// Backend presenting to `window`
    pub fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self, GpuError> {
        let size = window.inner_size();
        let instance = create_instance(config);
        let surface = instance
            .create_surface(window)
            .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?;
        pollster::block_on(Self::create(instance, Some(surface), size.width, size.height, config))
    }

    /// Backend rendering into an offscreen texture
    pub fn headless(width: u32, height: u32, config: &RendererConfig) -> Result<Self, GpuError> {
        let instance = create_instance(config);
        pollster::block_on(Self::create(instance, None, width, height, config))
    }

    async fn create(
        instance: wgpu::Instance,
        surface: Option<wgpu::Surface<'static>>,
        width: u32,
        height: u32,
        config: &RendererConfig,
    ) -> Result<Self, GpuError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: surface.as_ref(),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::AdapterNotFound)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Kiln Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| GpuError::DeviceCreation(e.to_string()))?;

        let (tx, errors) = flume::unbounded();
        device.on_uncaptured_error(Box::new(move |error| {
            let _ = tx.send(error.to_string());
        }));

        let target = match surface {
            Some(surface) => RenderTarget::surface(&device, &adapter, surface, width, height, config.vsync)?,
            None => RenderTarget::offscreen(&device, width, height),
        };
        let program = Program::new(&device, target.format())?;

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<FrameUniformsGpu>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &program.frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let zero_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Zero Vertex Input"),
            contents: &[0u8; 16],
            usage: wgpu::BufferUsages::VERTEX,
        });

        let defaults = [
            create_1x1(&device, &queue, [255, 255, 255, 255], "Default Base Color"),
            create_1x1(&device, &queue, [255, 255, 255, 255], "Default Metallic Roughness"),
            create_1x1(&device, &queue, [128, 128, 255, 255], "Default Normal"),
        ];

        let [r, g, b, a] = config.clear_color;
        Ok(Self {
            device,
            queue,
            adapter_info: adapter.get_info(),
            target,
            program,
            clear_color: wgpu::Color { r, g, b, a },
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            vertex_arrays: HashMap::new(),
            defaults,
            zero_buffer,
            frame_buffer,
            frame_bind_group,
            pending: Vec::new(),
            in_frame: false,
            errors,
        })
    }

    /// Pixels of the last frame; offscreen targets only
    pub fn read_pixels(&self) -> Result<Vec<u8>, GpuError> {
        self.target.read_pixels(&self.device, &self.queue)
    }

    pub fn pipeline_count(&self) -> usize {
        self.program.pipeline_count()
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Run `create` inside an out-of-memory error scope
    fn scoped<T>(&self, what: &str, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T, GpuError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let value = create(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(GpuError::Allocation(format!("{}: {}", what, error))),
            None => Ok(value),
        }
    }

    fn texture_view(&self, binding: &MaterialBinding, slot: usize) -> Result<&GpuTexture, GpuError> {
        match binding.textures[slot] {
            Some(handle) => self.textures.get(&handle).ok_or(GpuError::InvalidHandle {
                kind: "texture",
                id: handle.0,
            }),
            None => Ok(&self.defaults[slot]),
        }
    }

    fn require_frame(&self, what: &str) -> Result<(), GpuError> {
        if self.in_frame {
            Ok(())
        } else {
            Err(GpuError::Frame(format!("{} outside begin_frame/end_frame", what)))
        }
    }

    /// Pipeline keys for each recorded draw, building missing pipelines
    fn prepare_pipelines(&mut self, ops: &[PendingOp]) -> Result<Vec<Option<PipelineKey>>, GpuError> {
        let mut keys = Vec::with_capacity(ops.len());
        let mut state = None;
        for op in ops {
            match op {
                PendingOp::Material {
                    blend, double_sided, ..
                } => {
                    state = Some((*blend, *double_sided));
                    keys.push(None);
                }
                PendingOp::Draw {
                    vertex_array, topology, ..
                } => {
                    let (blend, double_sided) =
                        state.ok_or_else(|| GpuError::Frame("draw issued before any material was bound".into()))?;
                    let vao = self.vertex_arrays.get(vertex_array).ok_or(GpuError::InvalidHandle {
                        kind: "vertex array",
                        id: vertex_array.0,
                    })?;
                    let key = PipelineKey {
                        slots: vao.layouts,
                        topology: *topology,
                        index_type: vao.indices.index_type,
                        blend,
                        double_sided,
                    };
                    self.program.prepare(&self.device, key)?;
                    keys.push(Some(key));
                }
            }
        }
        Ok(keys)
    }

    fn take_driver_error(&self) -> Result<(), GpuError> {
        match self.errors.try_recv() {
            Ok(message) => {
                // Drain the rest so one bad frame reports once
                let extra = self.errors.try_iter().count();
                if extra > 0 {
                    log::warn!("{} further driver errors suppressed", extra);
                }
                Err(GpuError::Driver(message))
            }
            Err(_) => Ok(()),
        }
    }
}

impl GpuBackend for WgpuBackend {
    fn driver_info(&self) -> DriverInfo {
        let info = &self.adapter_info;
        DriverInfo {
            version: format!("{} {}", info.driver, info.driver_info).trim().to_string(),
            vendor: format!("{:?} (0x{:04x})", info.backend, info.vendor),
            renderer: info.name.clone(),
        }
    }

    fn viewport(&self) -> (u32, u32) {
        self.target.size()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.target.resize(&self.device, width, height);
    }

    fn create_buffer(&mut self, label: &str, data: &[u8]) -> Result<BufferHandle, GpuError> {
        let buffer = self.scoped(label, |device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: data,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::INDEX,
            })
        })?;
        let handle = BufferHandle(self.allocate_id());
        self.buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(&handle) {
            buffer.destroy();
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc, pixels: &[u8]) -> Result<TextureHandle, GpuError> {
        let levels = mip_chain(desc, pixels)?;
        let texture = self.scoped(&desc.label, |device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&desc.label),
                size: wgpu::Extent3d {
                    width: desc.width,
                    height: desc.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: desc.mip_levels,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        })?;

        for (level, image) in levels.iter().enumerate() {
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                image.as_raw(),
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * image.width()),
                    rows_per_image: Some(image.height()),
                },
                wgpu::Extent3d {
                    width: image.width(),
                    height: image.height(),
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.device.create_sampler(&sampler_descriptor(&desc.sampler, &desc.label));
        let handle = TextureHandle(self.allocate_id());
        self.textures.insert(
            handle,
            GpuTexture {
                texture,
                view,
                sampler,
            },
        );
        Ok(handle)
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        if let Some(texture) = self.textures.remove(&handle) {
            texture.texture.destroy();
        }
    }

    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> Result<VertexArrayHandle, GpuError> {
        let mut sources: [SlotSource; 4] = [None; 4];
        let mut layouts = [
            SlotLayout::fallback(AttributeLocation::Position),
            SlotLayout::fallback(AttributeLocation::Normal),
            SlotLayout::fallback(AttributeLocation::Tangent),
            SlotLayout::fallback(AttributeLocation::TexCoord),
        ];

        for buffer in desc.attributes.iter().map(|a| a.buffer).chain([desc.indices.buffer]) {
            if !self.buffers.contains_key(&buffer) {
                return Err(GpuError::InvalidHandle {
                    kind: "buffer",
                    id: buffer.0,
                });
            }
        }

        for attribute in &desc.attributes {
            let format = vertex_format(attribute.component_type, attribute.components, attribute.normalized)
                .ok_or_else(|| {
                    GpuError::Unsupported(format!(
                        "{:?} input as {} x {:?}",
                        attribute.location, attribute.components, attribute.component_type
                    ))
                })?;
            if attribute.byte_stride % wgpu::VERTEX_STRIDE_ALIGNMENT as u32 != 0 {
                return Err(GpuError::Unsupported(format!(
                    "{:?} stride {} is not a multiple of {}",
                    attribute.location,
                    attribute.byte_stride,
                    wgpu::VERTEX_STRIDE_ALIGNMENT
                )));
            }
            let slot = attribute.location as usize;
            sources[slot] = Some((attribute.buffer, attribute.byte_offset));
            layouts[slot] = SlotLayout {
                stride: attribute.byte_stride as u64,
                format,
                step_mode: wgpu::VertexStepMode::Vertex,
            };
        }

        let handle = VertexArrayHandle(self.allocate_id());
        self.vertex_arrays.insert(
            handle,
            VertexArray {
                sources,
                layouts,
                indices: desc.indices,
            },
        );
        log::trace!("Created vertex array '{}'", desc.label);
        Ok(handle)
    }

    fn destroy_vertex_array(&mut self, handle: VertexArrayHandle) {
        self.vertex_arrays.remove(&handle);
    }

    fn begin_frame(&mut self, uniforms: &FrameUniforms) -> Result<(), GpuError> {
        if self.in_frame {
            return Err(GpuError::Frame("begin_frame called twice".into()));
        }
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&FrameUniformsGpu::new(uniforms)));
        self.pending.clear();
        self.in_frame = true;
        Ok(())
    }

    fn bind_material(&mut self, binding: &MaterialBinding) -> Result<(), GpuError> {
        self.require_frame("bind_material")?;
        let uniforms = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material Uniforms"),
            contents: bytemuck::bytes_of(&MaterialUniformsGpu::new(binding)),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let base = self.texture_view(binding, 0)?;
        let metallic_roughness = self.texture_view(binding, 1)?;
        let normal = self.texture_view(binding, 2)?;
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Bind Group"),
            layout: &self.program.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&base.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&base.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&metallic_roughness.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&metallic_roughness.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(&normal.sampler),
                },
            ],
        });

        self.pending.push(PendingOp::Material {
            bind_group,
            blend: binding.alpha_mode == AlphaMode::Blend,
            double_sided: binding.double_sided,
        });
        Ok(())
    }

    fn draw_indexed(&mut self, draw: &DrawCommand) -> Result<(), GpuError> {
        self.require_frame("draw_indexed")?;
        if !self.vertex_arrays.contains_key(&draw.vertex_array) {
            return Err(GpuError::InvalidHandle {
                kind: "vertex array",
                id: draw.vertex_array.0,
            });
        }

        let uniforms = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Draw Uniforms"),
            contents: bytemuck::bytes_of(&DrawUniformsGpu::new(&draw.model, draw.vertex_flags.bits())),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Bind Group"),
            layout: &self.program.draw_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });

        self.pending.push(PendingOp::Draw {
            bind_group,
            vertex_array: draw.vertex_array,
            index_count: draw.index_count,
            topology: draw.topology,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), GpuError> {
        self.require_frame("end_frame")?;
        self.in_frame = false;
        let ops = std::mem::take(&mut self.pending);
        let keys = self.prepare_pipelines(&ops)?;

        let Some(frame) = self.target.acquire(&self.device)? else {
            return self.take_driver_error();
        };

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Kiln Frame Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Kiln Main Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.target.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_bind_group(0, &self.frame_bind_group, &[]);

            for (op, key) in ops.iter().zip(&keys) {
                match (op, key) {
                    (PendingOp::Material { bind_group, .. }, _) => pass.set_bind_group(1, bind_group, &[]),
                    (
                        PendingOp::Draw {
                            bind_group,
                            vertex_array,
                            index_count,
                            ..
                        },
                        Some(key),
                    ) => {
                        let (Some(pipeline), Some(vao)) =
                            (self.program.pipeline(key), self.vertex_arrays.get(vertex_array))
                        else {
                            continue;
                        };
                        pass.set_pipeline(pipeline);
                        pass.set_bind_group(2, bind_group, &[]);
                        for (slot, source) in vao.sources.iter().enumerate() {
                            let slice = match source.and_then(|(buffer, offset)| {
                                self.buffers.get(&buffer).map(|b| b.slice(offset..))
                            }) {
                                Some(slice) => slice,
                                None => self.zero_buffer.slice(..),
                            };
                            pass.set_vertex_buffer(slot as u32, slice);
                        }
                        let Some(index_buffer) = self.buffers.get(&vao.indices.buffer) else {
                            continue;
                        };
                        pass.set_index_buffer(
                            index_buffer.slice(vao.indices.byte_offset..),
                            index_format(vao.indices.index_type),
                        );
                        pass.draw_indexed(0..*index_count, 0, 0..1);
                    }
                    (PendingOp::Draw { .. }, None) => {}
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        self.take_driver_error()
    }
}

fn create_instance(config: &RendererConfig) -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: if config.gpu_debug {
            wgpu::InstanceFlags::debugging()
        } else {
            wgpu::InstanceFlags::default()
        },
        ..Default::default()
    })
}

fn create_1x1(device: &wgpu::Device, queue: &wgpu::Queue, color: [u8; 4], label: &str) -> GpuTexture {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &color,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });
    GpuTexture {
        texture,
        view,
        sampler,
    }
}

/// Level 0 plus downscaled levels up to `desc.mip_levels`
fn mip_chain(desc: &TextureDesc, pixels: &[u8]) -> Result<Vec<image::RgbaImage>, GpuError> {
    let base = image::RgbaImage::from_raw(desc.width, desc.height, pixels.to_vec()).ok_or_else(|| {
        GpuError::Allocation(format!(
            "texture '{}' expects {} bytes, got {}",
            desc.label,
            desc.width as usize * desc.height as usize * 4,
            pixels.len()
        ))
    })?;

    let mut levels = vec![base];
    for _ in 1..desc.mip_levels {
        let Some(previous) = levels.last() else {
            break;
        };
        let width = (previous.width() / 2).max(1);
        let height = (previous.height() / 2).max(1);
        let next = image::imageops::resize(previous, width, height, image::imageops::FilterType::Triangle);
        levels.push(next);
    }
    Ok(levels)
}

fn filter(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn address(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        AddressMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
    }
}

fn sampler_descriptor<'a>(desc: &SamplerDesc, label: &'a str) -> wgpu::SamplerDescriptor<'a> {
    wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address(desc.address_u),
        address_mode_v: address(desc.address_v),
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter(desc.mag_filter),
        min_filter: filter(desc.min_filter),
        mipmap_filter: desc.mipmap_filter.map(filter).unwrap_or(wgpu::FilterMode::Nearest),
        ..Default::default()
    }
}

/// Vertex format for an attribute, when the shader can read it as floats
fn vertex_format(component_type: ComponentType, components: u32, normalized: bool) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;
    Some(match (component_type, components, normalized) {
        (ComponentType::Float, 1, _) => F::Float32,
        (ComponentType::Float, 2, _) => F::Float32x2,
        (ComponentType::Float, 3, _) => F::Float32x3,
        (ComponentType::Float, 4, _) => F::Float32x4,
        (ComponentType::UnsignedByte, 2, true) => F::Unorm8x2,
        (ComponentType::UnsignedByte, 4, true) => F::Unorm8x4,
        (ComponentType::Byte, 2, true) => F::Snorm8x2,
        (ComponentType::Byte, 4, true) => F::Snorm8x4,
        (ComponentType::UnsignedShort, 2, true) => F::Unorm16x2,
        (ComponentType::UnsignedShort, 4, true) => F::Unorm16x4,
        (ComponentType::Short, 2, true) => F::Snorm16x2,
        (ComponentType::Short, 4, true) => F::Snorm16x4,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_formats() {
        assert_eq!(vertex_format(ComponentType::Float, 3, false), Some(wgpu::VertexFormat::Float32x3));
        assert_eq!(vertex_format(ComponentType::UnsignedShort, 2, true), Some(wgpu::VertexFormat::Unorm16x2));
        assert_eq!(vertex_format(ComponentType::UnsignedShort, 2, false), None);
        assert_eq!(vertex_format(ComponentType::Double, 3, false), None);
    }

    #[test]
    fn test_mip_chain_halves_to_one() {
        let desc = TextureDesc {
            label: "chain".into(),
            width: 8,
            height: 2,
            mip_levels: 4,
            sampler: SamplerDesc {
                mag_filter: FilterMode::Linear,
                min_filter: FilterMode::Linear,
                mipmap_filter: Some(FilterMode::Linear),
                address_u: AddressMode::Repeat,
                address_v: AddressMode::Repeat,
            },
        };
        let levels = mip_chain(&desc, &[200; 8 * 2 * 4]).unwrap();
        let sizes: Vec<(u32, u32)> = levels.iter().map(|l| (l.width(), l.height())).collect();
        assert_eq!(sizes, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);

        assert!(mip_chain(&desc, &[0; 3]).is_err());
    }

    #[test]
    fn test_sampler_mapping() {
        let desc = SamplerDesc {
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Linear,
            mipmap_filter: None,
            address_u: AddressMode::MirroredRepeat,
            address_v: AddressMode::ClampToEdge,
        };
        let sampler = sampler_descriptor(&desc, "s");
        assert_eq!(sampler.mag_filter, wgpu::FilterMode::Nearest);
        assert_eq!(sampler.address_mode_u, wgpu::AddressMode::MirrorRepeat);
        assert_eq!(sampler.mipmap_filter, wgpu::FilterMode::Nearest);
    }
}
