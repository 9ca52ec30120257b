//! Recording backend: a [`GpuBackend`] without a GPU.
//!
//! Every object creation, destruction and frame command is recorded so tests
//! can assert on exactly what the renderer asked for.

use crate::backend::{
    BufferHandle, DrawCommand, DriverInfo, FrameUniforms, GpuBackend, GpuError, MaterialBinding,
    TextureDesc, TextureHandle, VertexArrayDesc, VertexArrayHandle,
};
use std::collections::HashMap;

/// Commands captured between `begin_frame` and `end_frame`
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub uniforms: FrameUniforms,
    pub materials: Vec<MaterialBinding>,
    pub draws: Vec<DrawCommand>,
}

pub struct RecordingBackend {
    next_id: u32,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    textures: HashMap<TextureHandle, TextureDesc>,
    vertex_arrays: HashMap<VertexArrayHandle, VertexArrayDesc>,
    created: usize,
    destroyed: usize,
    /// Fail every creation once this many objects exist in total
    fail_after: Option<usize>,
    current: Option<RecordedFrame>,
    frames: Vec<RecordedFrame>,
    viewport: (u32, u32),
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            vertex_arrays: HashMap::new(),
            created: 0,
            destroyed: 0,
            fail_after: None,
            current: None,
            frames: Vec::new(),
            viewport: (1280, 720),
        }
    }

    /// Make creations fail once `count` objects have been created
    pub fn fail_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Objects created and not yet destroyed
    pub fn live_objects(&self) -> usize {
        self.buffers.len() + self.textures.len() + self.vertex_arrays.len()
    }

    pub fn created_objects(&self) -> usize {
        self.created
    }

    pub fn destroyed_objects(&self) -> usize {
        self.destroyed
    }

    pub fn buffer_data(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&handle).map(Vec::as_slice)
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureDesc> {
        self.textures.get(&handle)
    }

    pub fn vertex_array(&self, handle: VertexArrayHandle) -> Option<&VertexArrayDesc> {
        self.vertex_arrays.get(&handle)
    }

    /// Completed frames, oldest first
    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }

    fn allocate(&mut self, what: &str) -> Result<u32, GpuError> {
        if self.fail_after.is_some_and(|limit| self.created >= limit) {
            return Err(GpuError::Allocation(format!("{} (injected failure)", what)));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.created += 1;
        Ok(id)
    }

    fn frame(&mut self) -> Result<&mut RecordedFrame, GpuError> {
        self.current
            .as_mut()
            .ok_or_else(|| GpuError::Frame("command issued outside begin_frame/end_frame".into()))
    }
}

impl GpuBackend for RecordingBackend {
    fn driver_info(&self) -> DriverInfo {
        DriverInfo {
            version: "recording".into(),
            vendor: "kiln".into(),
            renderer: "RecordingBackend".into(),
        }
    }

    fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
    }

    fn create_buffer(&mut self, label: &str, data: &[u8]) -> Result<BufferHandle, GpuError> {
        let handle = BufferHandle(self.allocate(label)?);
        self.buffers.insert(handle, data.to_vec());
        Ok(handle)
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) {
        if self.buffers.remove(&handle).is_some() {
            self.destroyed += 1;
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc, pixels: &[u8]) -> Result<TextureHandle, GpuError> {
        let expected = desc.width as usize * desc.height as usize * 4;
        if pixels.len() != expected {
            return Err(GpuError::Allocation(format!(
                "texture '{}' expects {} bytes, got {}",
                desc.label,
                expected,
                pixels.len()
            )));
        }
        let handle = TextureHandle(self.allocate(&desc.label)?);
        self.textures.insert(handle, desc.clone());
        Ok(handle)
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        if self.textures.remove(&handle).is_some() {
            self.destroyed += 1;
        }
    }

    fn create_vertex_array(&mut self, desc: &VertexArrayDesc) -> Result<VertexArrayHandle, GpuError> {
        for buffer in desc.attributes.iter().map(|a| a.buffer).chain([desc.indices.buffer]) {
            if !self.buffers.contains_key(&buffer) {
                return Err(GpuError::InvalidHandle {
                    kind: "buffer",
                    id: buffer.0,
                });
            }
        }
        let handle = VertexArrayHandle(self.allocate(&desc.label)?);
        self.vertex_arrays.insert(handle, desc.clone());
        Ok(handle)
    }

    fn destroy_vertex_array(&mut self, handle: VertexArrayHandle) {
        if self.vertex_arrays.remove(&handle).is_some() {
            self.destroyed += 1;
        }
    }

    fn begin_frame(&mut self, uniforms: &FrameUniforms) -> Result<(), GpuError> {
        if self.current.is_some() {
            return Err(GpuError::Frame("begin_frame called twice".into()));
        }
        self.current = Some(RecordedFrame {
            uniforms: uniforms.clone(),
            materials: Vec::new(),
            draws: Vec::new(),
        });
        Ok(())
    }

    fn bind_material(&mut self, binding: &MaterialBinding) -> Result<(), GpuError> {
        for texture in binding.textures.iter().flatten() {
            if !self.textures.contains_key(texture) {
                return Err(GpuError::InvalidHandle {
                    kind: "texture",
                    id: texture.0,
                });
            }
        }
        self.frame()?.materials.push(binding.clone());
        Ok(())
    }

    fn draw_indexed(&mut self, draw: &DrawCommand) -> Result<(), GpuError> {
        if !self.vertex_arrays.contains_key(&draw.vertex_array) {
            return Err(GpuError::InvalidHandle {
                kind: "vertex array",
                id: draw.vertex_array.0,
            });
        }
        let frame = self.frame()?;
        if frame.materials.is_empty() {
            return Err(GpuError::Frame("draw issued before any material was bound".into()));
        }
        frame.draws.push(*draw);
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), GpuError> {
        let frame = self
            .current
            .take()
            .ok_or_else(|| GpuError::Frame("end_frame without begin_frame".into()))?;
        self.frames.push(frame);
        Ok(())
    }
}
