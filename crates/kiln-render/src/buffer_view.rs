//! GPU-resident buffer views

use crate::backend::{BufferHandle, GpuBackend};
use crate::context::RenderContext;
use crate::release::Owned;
use kiln_core::Result;

/// A byte range copied into one GPU buffer
#[derive(Debug)]
pub struct BufferView {
    gpu: Owned<BufferHandle>,
    byte_length: usize,
    /// Distance between elements; 0 means tightly packed
    byte_stride: u32,
}

impl BufferView {
    /// Copy `bytes` into a new GPU buffer
    pub fn new<B: GpuBackend>(
        ctx: &mut RenderContext<B>,
        label: &str,
        bytes: &[u8],
        byte_stride: u32,
    ) -> Result<Self> {
        let handle = ctx.backend_mut().create_buffer(label, bytes)?;
        Ok(Self {
            gpu: Owned::new(handle, ctx.releaser()),
            byte_length: bytes.len(),
            byte_stride,
        })
    }

    pub fn handle(&self) -> BufferHandle {
        self.gpu.handle()
    }

    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    pub fn byte_stride(&self) -> u32 {
        self.byte_stride
    }
}
