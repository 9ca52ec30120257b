//! Meshes and drawable primitives

use crate::accessor::BufferAccessor;
use crate::backend::{
    AttributeLocation, GpuBackend, IndexType, Topology, VertexArrayDesc, VertexArrayHandle, VertexFlags,
};
use crate::context::RenderContext;
use crate::material::Material;
use crate::release::Owned;
use kiln_core::{KilnError, Result};
use std::sync::Arc;

/// Inputs for one primitive
pub struct PrimitiveDesc {
    pub label: String,
    pub position: BufferAccessor,
    pub normal: BufferAccessor,
    pub texcoord: Option<BufferAccessor>,
    pub tangent: Option<BufferAccessor>,
    pub indices: BufferAccessor,
    pub topology: Topology,
    /// The context's default material when absent
    pub material: Option<Arc<Material>>,
}

/// One indexed draw: vertex inputs, indices and a material
#[derive(Debug)]
pub struct MeshPrimitive {
    position: BufferAccessor,
    normal: BufferAccessor,
    texcoord: Option<BufferAccessor>,
    tangent: Option<BufferAccessor>,
    indices: BufferAccessor,
    topology: Topology,
    index_type: IndexType,
    material: Arc<Material>,
    vertex_array: Owned<VertexArrayHandle>,
}

impl MeshPrimitive {
    /// Check the inputs and create the primitive's vertex-array object
    pub fn new<B: GpuBackend>(ctx: &mut RenderContext<B>, desc: PrimitiveDesc) -> Result<Self> {
        let material = desc
            .material
            .unwrap_or_else(|| ctx.default_material().clone());

        if material.requires_texcoords() && desc.texcoord.is_none() {
            return Err(KilnError::ValidationError(format!(
                "primitive '{}' uses textured material {} but has no texture coordinates",
                desc.label,
                material.name.as_deref().unwrap_or("<unnamed>")
            )));
        }
        if !desc.topology.is_drawable() {
            return Err(KilnError::NotSupported(format!(
                "primitive '{}' uses {:?} topology",
                desc.label, desc.topology
            )));
        }
        let indices = desc.indices.index_binding().ok_or_else(|| {
            KilnError::FormatError(format!(
                "primitive '{}' indices must be unsigned 16- or 32-bit scalars",
                desc.label
            ))
        })?;

        let mut attributes = vec![
            desc.position.vertex_attribute(AttributeLocation::Position),
            desc.normal.vertex_attribute(AttributeLocation::Normal),
        ];
        if let Some(tangent) = &desc.tangent {
            attributes.push(tangent.vertex_attribute(AttributeLocation::Tangent));
        }
        if let Some(texcoord) = &desc.texcoord {
            attributes.push(texcoord.vertex_attribute(AttributeLocation::TexCoord));
        }

        let handle = ctx.backend_mut().create_vertex_array(&VertexArrayDesc {
            label: desc.label.clone(),
            attributes,
            indices,
        })?;

        Ok(Self {
            position: desc.position,
            normal: desc.normal,
            texcoord: desc.texcoord,
            tangent: desc.tangent,
            index_type: indices.index_type,
            indices: desc.indices,
            topology: desc.topology,
            material,
            vertex_array: Owned::new(handle, ctx.releaser()),
        })
    }

    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    pub fn vertex_array(&self) -> VertexArrayHandle {
        self.vertex_array.handle()
    }

    pub fn index_count(&self) -> u32 {
        self.indices.count()
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn vertex_count(&self) -> u32 {
        self.position.count()
    }

    pub fn normals(&self) -> &BufferAccessor {
        &self.normal
    }

    pub fn indices(&self) -> &BufferAccessor {
        &self.indices
    }

    pub fn texcoords(&self) -> Option<&BufferAccessor> {
        self.texcoord.as_ref()
    }

    pub fn vertex_flags(&self) -> VertexFlags {
        if self.tangent.is_some() {
            VertexFlags::TANGENTS
        } else {
            VertexFlags::empty()
        }
    }
}

/// A named list of primitives drawn with one transform
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Arc<MeshPrimitive>>,
}

impl Mesh {
    pub fn new(name: Option<String>, primitives: Vec<Arc<MeshPrimitive>>) -> Self {
        Self { name, primitives }
    }
}
