//! Typed accessors over buffer views

use crate::backend::{AttributeLocation, GpuBackend, IndexBinding, IndexType, VertexAttribute};
use crate::buffer_view::BufferView;
use crate::context::RenderContext;
use kiln_core::{KilnError, Result};
use std::sync::Arc;

/// Scalar type of one component, with the interchange format's numeric codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Float,
    Double,
    HalfFloat,
}

impl ComponentType {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            5120 => ComponentType::Byte,
            5121 => ComponentType::UnsignedByte,
            5122 => ComponentType::Short,
            5123 => ComponentType::UnsignedShort,
            5124 => ComponentType::Int,
            5125 => ComponentType::UnsignedInt,
            5126 => ComponentType::Float,
            5130 => ComponentType::Double,
            5131 => ComponentType::HalfFloat,
            _ => return None,
        })
    }

    /// Size in bytes
    pub fn size(self) -> u32 {
        match self {
            ComponentType::Byte | ComponentType::UnsignedByte => 1,
            ComponentType::Short | ComponentType::UnsignedShort | ComponentType::HalfFloat => 2,
            ComponentType::Int | ComponentType::UnsignedInt | ComponentType::Float => 4,
            ComponentType::Double => 8,
        }
    }

    /// Index format for this component type, if it can index vertices
    pub fn index_type(self) -> Option<IndexType> {
        match self {
            ComponentType::UnsignedShort => Some(IndexType::U16),
            ComponentType::UnsignedInt => Some(IndexType::U32),
            _ => None,
        }
    }
}

/// Element shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AccessorType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "SCALAR" => AccessorType::Scalar,
            "VEC2" => AccessorType::Vec2,
            "VEC3" => AccessorType::Vec3,
            "VEC4" => AccessorType::Vec4,
            "MAT2" => AccessorType::Mat2,
            "MAT3" => AccessorType::Mat3,
            "MAT4" => AccessorType::Mat4,
            _ => return None,
        })
    }

    /// Components per element
    pub fn type_count(self) -> u32 {
        match self {
            AccessorType::Scalar => 1,
            AccessorType::Vec2 => 2,
            AccessorType::Vec3 => 3,
            AccessorType::Vec4 | AccessorType::Mat2 => 4,
            AccessorType::Mat3 => 9,
            AccessorType::Mat4 => 16,
        }
    }
}

/// Typed view over a [`BufferView`]
#[derive(Debug, Clone)]
pub struct BufferAccessor {
    view: Arc<BufferView>,
    kind: AccessorType,
    component_type: ComponentType,
    count: u32,
    byte_offset: u64,
    normalized: bool,
}

impl BufferAccessor {
    /// Wrap `view`, checking the elements fit inside it
    pub fn new(
        view: Arc<BufferView>,
        kind: AccessorType,
        component_type: ComponentType,
        count: u32,
        byte_offset: u64,
        normalized: bool,
    ) -> Result<Self> {
        let accessor = Self {
            view,
            kind,
            component_type,
            count,
            byte_offset,
            normalized,
        };
        let end = accessor.byte_end();
        if end > accessor.view.byte_length() as u64 {
            return Err(KilnError::FormatError(format!(
                "accessor of {} {:?} elements at offset {} needs {} bytes, view holds {}",
                count,
                kind,
                byte_offset,
                end,
                accessor.view.byte_length()
            )));
        }
        Ok(accessor)
    }

    /// 16-bit index accessor holding `indices` (widened from a narrower source)
    pub fn widened_indices<B: GpuBackend>(
        ctx: &mut RenderContext<B>,
        label: &str,
        indices: &[u16],
    ) -> Result<Self> {
        let view = BufferView::new(ctx, label, bytemuck::cast_slice(indices), 0)?;
        Self::new(
            Arc::new(view),
            AccessorType::Scalar,
            ComponentType::UnsignedShort,
            indices.len() as u32,
            0,
            false,
        )
    }

    pub fn view(&self) -> &Arc<BufferView> {
        &self.view
    }

    pub fn kind(&self) -> AccessorType {
        self.kind
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    pub fn normalized(&self) -> bool {
        self.normalized
    }

    /// Bytes in one element
    pub fn element_size(&self) -> u32 {
        self.kind.type_count() * self.component_type.size()
    }

    /// The view's stride, or the element size when the view is tightly packed
    pub fn byte_stride(&self) -> u32 {
        match self.view.byte_stride() {
            0 => self.element_size(),
            stride => stride,
        }
    }

    /// One past the last byte read inside the view
    fn byte_end(&self) -> u64 {
        if self.count == 0 {
            return self.byte_offset;
        }
        self.byte_offset
            + (self.count as u64 - 1) * self.byte_stride() as u64
            + self.element_size() as u64
    }

    pub fn vertex_attribute(&self, location: AttributeLocation) -> VertexAttribute {
        VertexAttribute {
            location,
            buffer: self.view.handle(),
            byte_offset: self.byte_offset,
            byte_stride: self.byte_stride(),
            component_type: self.component_type,
            components: self.kind.type_count(),
            normalized: self.normalized,
        }
    }

    /// Index binding, if this accessor holds 16- or 32-bit unsigned scalars
    pub fn index_binding(&self) -> Option<IndexBinding> {
        if self.kind != AccessorType::Scalar {
            return None;
        }
        Some(IndexBinding {
            buffer: self.view.handle(),
            byte_offset: self.byte_offset,
            index_type: self.component_type.index_type()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingBackend;

    const ALL_COMPONENTS: [ComponentType; 9] = [
        ComponentType::Byte,
        ComponentType::UnsignedByte,
        ComponentType::Short,
        ComponentType::UnsignedShort,
        ComponentType::Int,
        ComponentType::UnsignedInt,
        ComponentType::Float,
        ComponentType::Double,
        ComponentType::HalfFloat,
    ];

    const ALL_TYPES: [AccessorType; 7] = [
        AccessorType::Scalar,
        AccessorType::Vec2,
        AccessorType::Vec3,
        AccessorType::Vec4,
        AccessorType::Mat2,
        AccessorType::Mat3,
        AccessorType::Mat4,
    ];

    fn view(ctx: &mut RenderContext<RecordingBackend>, len: usize, stride: u32) -> Arc<BufferView> {
        Arc::new(BufferView::new(ctx, "view", &vec![0u8; len], stride).unwrap())
    }

    #[test]
    fn test_packed_stride_is_element_size() {
        let mut ctx = RenderContext::new(RecordingBackend::new());
        let packed = view(&mut ctx, 1024, 0);
        for kind in ALL_TYPES {
            for component_type in ALL_COMPONENTS {
                let accessor =
                    BufferAccessor::new(packed.clone(), kind, component_type, 1, 0, false).unwrap();
                assert_eq!(
                    accessor.byte_stride(),
                    kind.type_count() * component_type.size(),
                    "{:?} of {:?}",
                    kind,
                    component_type
                );
            }
        }
    }

    #[test]
    fn test_explicit_stride_wins() {
        let mut ctx = RenderContext::new(RecordingBackend::new());
        let interleaved = view(&mut ctx, 96, 32);
        let accessor = BufferAccessor::new(
            interleaved,
            AccessorType::Vec3,
            ComponentType::Float,
            3,
            12,
            false,
        )
        .unwrap();
        assert_eq!(accessor.byte_stride(), 32);
        assert_eq!(accessor.vertex_attribute(AttributeLocation::Normal).byte_offset, 12);
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut ctx = RenderContext::new(RecordingBackend::new());
        let small = view(&mut ctx, 36, 0);
        assert!(BufferAccessor::new(small.clone(), AccessorType::Vec3, ComponentType::Float, 3, 0, false).is_ok());
        assert!(matches!(
            BufferAccessor::new(small, AccessorType::Vec3, ComponentType::Float, 3, 4, false),
            Err(KilnError::FormatError(_))
        ));
    }

    #[test]
    fn test_codes_and_index_types() {
        assert_eq!(ComponentType::from_code(5126), Some(ComponentType::Float));
        assert_eq!(ComponentType::from_code(1), None);
        assert_eq!(AccessorType::from_name("MAT3").map(AccessorType::type_count), Some(9));
        assert_eq!(ComponentType::UnsignedShort.index_type(), Some(IndexType::U16));
        assert_eq!(ComponentType::UnsignedByte.index_type(), None);
    }

    #[test]
    fn test_widened_indices() {
        let mut ctx = RenderContext::new(RecordingBackend::new());
        let accessor = BufferAccessor::widened_indices(&mut ctx, "indices", &[0, 1, 2]).unwrap();
        let binding = accessor.index_binding().unwrap();
        assert_eq!(binding.index_type, IndexType::U16);
        assert_eq!(ctx.backend().buffer_data(binding.buffer), Some(&[0u8, 0, 1, 0, 2, 0][..]));
    }
}
