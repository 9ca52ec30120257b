//! Scene importer
//!
//! Materializes a validated document in dependency order (buffer views,
//! accessors, textures, materials, meshes), then creates one entity per node
//! and links the hierarchy. A failed import leaves nothing behind: entities
//! are despawned and the GPU objects created so far are released before the
//! error is returned.

use crate::document::{CameraDef, Document, NodeDef, TextureInfo};
use crate::load::{load_buffers, load_images, view_bytes};
use crate::types::ImportedScene;
use crate::validate::{accessor_layout, lookup, validate};
use glam::{Mat4, Quat, Vec3, Vec4};
use kiln_core::math::{quat_to_euler, Trs};
use kiln_core::{EntityId, KilnError, Result};
use kiln_ecs::{Camera, Position, Projection, Rotation, Scale, SceneWorld};
use kiln_render::{
    AlphaMode, BufferAccessor, BufferView, ComponentType, GpuBackend, Image, Material, Mesh, MeshComponent,
    MeshPrimitive, PrimitiveDesc, RenderContext, Texture, TextureSampler, Topology,
};
use std::path::Path;
use std::sync::Arc;

/// Import the scene document at `path` into `world`
pub fn import_scene<P: AsRef<Path>, B: GpuBackend>(
    path: P,
    ctx: &mut RenderContext<B>,
    world: &mut SceneWorld,
) -> Result<ImportedScene> {
    let path = path.as_ref();
    let document = Document::open(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    log::info!("Importing {}", path.display());
    import_document(&document, base_dir, ctx, world)
}

/// Import an already parsed document; relative URIs resolve against `base_dir`
pub fn import_document<B: GpuBackend>(
    doc: &Document,
    base_dir: &Path,
    ctx: &mut RenderContext<B>,
    world: &mut SceneWorld,
) -> Result<ImportedScene> {
    validate(doc)?;
    let buffers = load_buffers(doc, base_dir)?;
    let images = load_images(doc, &buffers, base_dir)?;

    let mut spawned = Vec::new();
    match mount(doc, &buffers, &images, ctx, world, &mut spawned) {
        Ok(scene) => {
            log::info!(
                "Imported {} nodes, {} meshes, {} materials, {} textures",
                scene.entities.len(),
                scene.meshes.len(),
                scene.materials.len(),
                scene.textures.len()
            );
            Ok(scene)
        }
        Err(err) => {
            for id in spawned.into_iter().rev() {
                if let Err(e) = world.despawn(id) {
                    log::warn!("Could not despawn {} after failed import: {}", id, e);
                }
            }
            let released = ctx.flush_releases();
            log::warn!("Import failed, released {} GPU objects: {}", released, err);
            Err(err)
        }
    }
}

fn mount<B: GpuBackend>(
    doc: &Document,
    buffers: &[Vec<u8>],
    images: &[Option<Image>],
    ctx: &mut RenderContext<B>,
    world: &mut SceneWorld,
    spawned: &mut Vec<EntityId>,
) -> Result<ImportedScene> {
    let tables = ResourceTables::build(doc, buffers, images, ctx)?;

    for (i, node) in doc.nodes.iter().enumerate() {
        let id = spawn_node(doc, &tables, world, node, i)?;
        spawned.push(id);
    }

    let mut is_child = vec![false; doc.nodes.len()];
    for (parent, node) in doc.nodes.iter().enumerate() {
        for &child in &node.children {
            world.set_parent(spawned[child], spawned[parent])?;
            is_child[child] = true;
        }
    }
    log::debug!("Spawned {} entities", spawned.len());

    let roots = spawned
        .iter()
        .zip(&is_child)
        .filter(|(_, child)| !**child)
        .map(|(id, _)| *id)
        .collect();

    Ok(ImportedScene {
        entities: spawned.clone(),
        roots,
        meshes: tables.meshes,
        materials: tables.materials,
        textures: tables.textures,
    })
}

fn label(table: &str, index: usize, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{}[{}] '{}'", table, index, name),
        None => format!("{}[{}]", table, index),
    }
}

/// Local matrix from an explicit matrix or translation/rotation/scale
fn node_matrix(node: &NodeDef) -> Mat4 {
    if let Some(matrix) = node.matrix {
        return Mat4::from_cols_array(&matrix);
    }
    Trs {
        translation: node.translation.map(Vec3::from_array).unwrap_or(Vec3::ZERO),
        rotation: node
            .rotation
            .map(|r| Quat::from_array(r).normalize())
            .unwrap_or(Quat::IDENTITY),
        scale: node.scale.map(Vec3::from_array).unwrap_or(Vec3::ONE),
    }
    .to_matrix()
}

fn camera_component(camera: &CameraDef) -> Result<Camera> {
    let projection = match (&camera.perspective, &camera.orthographic) {
        (Some(p), _) if camera.kind == "perspective" => Projection::Perspective {
            yfov: p.yfov,
            aspect_ratio: p.aspect_ratio,
            znear: p.znear,
            zfar: p.zfar,
        },
        (_, Some(o)) if camera.kind == "orthographic" => Projection::Orthographic {
            xmag: o.xmag,
            ymag: o.ymag,
            znear: o.znear,
            zfar: o.zfar,
        },
        _ => {
            return Err(KilnError::FormatError(format!(
                "camera of type '{}' has no matching parameters",
                camera.kind
            )))
        }
    };
    Ok(Camera { projection })
}

fn spawn_node(
    doc: &Document,
    tables: &ResourceTables,
    world: &mut SceneWorld,
    node: &NodeDef,
    index: usize,
) -> Result<EntityId> {
    let id = match node.name.as_deref() {
        Some(name) if world.get_id(name).is_none() => world.spawn(name)?,
        Some(name) => {
            log::warn!("Entity name '{}' already taken, nodes[{}] is imported unnamed", name, index);
            world.spawn_anonymous()
        }
        None => world.spawn_anonymous(),
    };

    let from = format!("nodes[{}]", index);
    let trs = Trs::from_matrix(&node_matrix(node));
    world.set(id, Position(trs.translation))?;
    world.set(id, Rotation(quat_to_euler(trs.rotation)))?;
    world.set(id, Scale(trs.scale))?;

    if let Some(mesh) = node.mesh {
        let mesh = lookup(&tables.meshes, "meshes", mesh, &from)?;
        world.insert(id, MeshComponent(mesh.clone()))?;
    }
    if let Some(camera) = node.camera {
        let camera = lookup(&doc.cameras, "cameras", camera, &from)?;
        world.insert(id, camera_component(camera)?)?;
    }
    Ok(id)
}

/// Live objects for the document's tables, indexed as the document indexes them
struct ResourceTables {
    accessors: Vec<BufferAccessor>,
    textures: Vec<Arc<Texture>>,
    materials: Vec<Arc<Material>>,
    meshes: Vec<Arc<Mesh>>,
}

impl ResourceTables {
    fn build<B: GpuBackend>(
        doc: &Document,
        buffers: &[Vec<u8>],
        images: &[Option<Image>],
        ctx: &mut RenderContext<B>,
    ) -> Result<Self> {
        let mut tables = Self {
            accessors: Vec::with_capacity(doc.accessors.len()),
            textures: Vec::with_capacity(doc.textures.len()),
            materials: Vec::with_capacity(doc.materials.len()),
            meshes: Vec::with_capacity(doc.meshes.len()),
        };

        let views = build_views(doc, buffers, ctx)?;
        for (i, def) in doc.accessors.iter().enumerate() {
            let from = format!("accessors[{}]", i);
            let view_index = def
                .buffer_view
                .ok_or_else(|| KilnError::NotSupported(format!("{} has no bufferView", from)))?;
            let view = lookup(&views, "bufferViews", view_index, &from)?
                .clone()
                .ok_or_else(|| KilnError::reference("bufferViews", view_index, views.len(), from.as_str()))?;
            let (component, kind) = accessor_layout(def, &from)?;
            tables.accessors.push(BufferAccessor::new(
                view,
                kind,
                component,
                def.count,
                def.byte_offset as u64,
                def.normalized,
            )?);
        }
        log::debug!("Created {} accessors", tables.accessors.len());

        for (i, def) in doc.textures.iter().enumerate() {
            let from = label("textures", i, def.name.as_deref());
            let source = def
                .source
                .ok_or_else(|| KilnError::FormatError(format!("{} has no source", from)))?;
            let image = lookup(images, "images", source, &from)?
                .as_ref()
                .ok_or_else(|| KilnError::FormatError(format!("{} image was not loaded", from)))?;
            let sampler = def
                .sampler
                .map(|s| {
                    let sampler = lookup(&doc.samplers, "samplers", s, &from)?;
                    TextureSampler::from_codes(sampler.mag_filter, sampler.min_filter, sampler.wrap_s, sampler.wrap_t)
                })
                .transpose()?;
            tables.textures.push(Arc::new(Texture::new(ctx, &from, image, sampler)?));
        }

        for (i, def) in doc.materials.iter().enumerate() {
            let from = label("materials", i, def.name.as_deref());
            let pbr = &def.pbr_metallic_roughness;
            let mut material = Material::new(def.name.clone());
            material.pbr.base_color_factor = Vec4::from_array(pbr.base_color_factor);
            material.pbr.base_color_texture = tables.texture(pbr.base_color_texture.as_ref(), &from)?;
            material.pbr.metallic_factor = pbr.metallic_factor;
            material.pbr.roughness_factor = pbr.roughness_factor;
            material.pbr.metallic_roughness_texture =
                tables.texture(pbr.metallic_roughness_texture.as_ref(), &from)?;
            material.normal_texture = tables.texture(def.normal_texture.as_ref(), &from)?;
            material.normal_scale = def.normal_texture.as_ref().map_or(1.0, |info| info.scale);
            material.emissive_factor = Vec3::from_array(def.emissive_factor);
            material.alpha_mode = AlphaMode::from_name(&def.alpha_mode)?;
            material.alpha_cutoff = def.alpha_cutoff;
            material.double_sided = def.double_sided;
            tables.materials.push(Arc::new(material));
        }

        for (m, def) in doc.meshes.iter().enumerate() {
            let mesh_label = label("meshes", m, def.name.as_deref());
            let mut primitives = Vec::with_capacity(def.primitives.len());
            for (p, primitive) in def.primitives.iter().enumerate() {
                let from = format!("{} primitive {}", mesh_label, p);
                let attribute = |name: &str| {
                    primitive
                        .attributes
                        .get(name)
                        .map(|&index| tables.accessor(index, &from))
                        .transpose()
                };
                let position = attribute("POSITION")?
                    .ok_or_else(|| KilnError::FormatError(format!("{} has no POSITION", from)))?;
                let normal = attribute("NORMAL")?
                    .ok_or_else(|| KilnError::FormatError(format!("{} has no NORMAL", from)))?;
                let texcoord = attribute("TEXCOORD_0")?;
                let tangent = attribute("TANGENT")?;

                let index_accessor = primitive
                    .indices
                    .ok_or_else(|| KilnError::FormatError(format!("{} has no index accessor", from)))?;
                let mut indices = tables.accessor(index_accessor, &from)?;
                if indices.component_type() == ComponentType::UnsignedByte {
                    let widened = widen_byte_indices(doc, buffers, index_accessor)?;
                    indices = BufferAccessor::widened_indices(ctx, &format!("{} indices", from), &widened)?;
                }

                let material = primitive
                    .material
                    .map(|index| lookup(&tables.materials, "materials", index, &from).cloned())
                    .transpose()?;
                let topology = Topology::from_mode(primitive.mode)
                    .ok_or_else(|| KilnError::FormatError(format!("{} has unknown mode {}", from, primitive.mode)))?;

                let desc = PrimitiveDesc {
                    label: from,
                    position,
                    normal,
                    texcoord,
                    tangent,
                    indices,
                    topology,
                    material,
                };
                primitives.push(Arc::new(MeshPrimitive::new(ctx, desc)?));
            }
            tables.meshes.push(Arc::new(Mesh::new(def.name.clone(), primitives)));
        }
        log::debug!(
            "Created {} textures, {} materials, {} meshes",
            tables.textures.len(),
            tables.materials.len(),
            tables.meshes.len()
        );

        Ok(tables)
    }

    fn accessor(&self, index: usize, from: &str) -> Result<BufferAccessor> {
        lookup(&self.accessors, "accessors", index, from).cloned()
    }

    fn texture(&self, info: Option<&TextureInfo>, from: &str) -> Result<Option<Arc<Texture>>> {
        info.map(|info| lookup(&self.textures, "textures", info.index, from).cloned())
            .transpose()
    }
}

/// Upload the buffer views that accessors read; views only images use stay on the CPU
fn build_views<B: GpuBackend>(
    doc: &Document,
    buffers: &[Vec<u8>],
    ctx: &mut RenderContext<B>,
) -> Result<Vec<Option<Arc<BufferView>>>> {
    let mut used = vec![false; doc.buffer_views.len()];
    for accessor in &doc.accessors {
        if let Some(slot) = accessor.buffer_view.and_then(|view| used.get_mut(view)) {
            *slot = true;
        }
    }

    let mut views = Vec::with_capacity(doc.buffer_views.len());
    for (i, def) in doc.buffer_views.iter().enumerate() {
        if !used[i] {
            views.push(None);
            continue;
        }
        let bytes = view_bytes(doc, buffers, i)?;
        let view = BufferView::new(
            ctx,
            &label("bufferViews", i, def.name.as_deref()),
            bytes,
            def.byte_stride.unwrap_or(0),
        )?;
        views.push(Some(Arc::new(view)));
    }
    Ok(views)
}

/// Read 8-bit indices back from the CPU buffer as 16-bit values
fn widen_byte_indices(doc: &Document, buffers: &[Vec<u8>], accessor: usize) -> Result<Vec<u16>> {
    let from = format!("accessors[{}]", accessor);
    let def = lookup(&doc.accessors, "accessors", accessor, &from)?;
    let view_index = def
        .buffer_view
        .ok_or_else(|| KilnError::NotSupported(format!("{} has no bufferView", from)))?;
    let bytes = view_bytes(doc, buffers, view_index)?;
    let stride = doc.buffer_views[view_index]
        .byte_stride
        .filter(|stride| *stride > 0)
        .unwrap_or(1) as usize;

    (0..def.count as usize)
        .map(|i| {
            bytes
                .get(def.byte_offset + i * stride)
                .map(|&index| u16::from(index))
                .ok_or_else(|| KilnError::FormatError(format!("{} index {} is outside its view", from, i)))
        })
        .collect()
}
