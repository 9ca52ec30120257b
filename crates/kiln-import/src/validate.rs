//! Document checks that run before anything is loaded or allocated
//!
//! Every cross-table reference, unsupported feature and missing texcoord is
//! reported here, so a rejected document never touches the GPU.

use crate::document::{AccessorDef, Document, MaterialDef, PrimitiveDef};
use kiln_core::{KilnError, Result};
use kiln_render::{AccessorType, AlphaMode, ComponentType, TextureSampler, Topology};

/// Look up `table[index]`, or fail with a `ReferenceError` naming `from`
pub(crate) fn lookup<'a, T>(table: &'a [T], name: &'static str, index: usize, from: &str) -> Result<&'a T> {
    table
        .get(index)
        .ok_or_else(|| KilnError::reference(name, index, table.len(), from))
}

/// Component and element type of an accessor
pub(crate) fn accessor_layout(accessor: &AccessorDef, from: &str) -> Result<(ComponentType, AccessorType)> {
    let component = ComponentType::from_code(accessor.component_type).ok_or_else(|| {
        KilnError::FormatError(format!("{} has unknown componentType {}", from, accessor.component_type))
    })?;
    let kind = AccessorType::from_name(&accessor.kind)
        .ok_or_else(|| KilnError::FormatError(format!("{} has unknown type '{}'", from, accessor.kind)))?;
    Ok((component, kind))
}

pub fn validate(doc: &Document) -> Result<()> {
    check_asset(doc)?;
    check_buffers(doc)?;
    check_buffer_views(doc)?;
    check_accessors(doc)?;
    check_images(doc)?;
    check_samplers(doc)?;
    check_textures(doc)?;
    check_materials(doc)?;
    check_meshes(doc)?;
    check_cameras(doc)?;
    check_nodes(doc)?;
    Ok(())
}

fn check_asset(doc: &Document) -> Result<()> {
    let major = doc.asset.version.split('.').next().unwrap_or_default();
    if major != "2" {
        return Err(KilnError::NotSupported(format!(
            "document version {}",
            doc.asset.version
        )));
    }
    if let Some(extension) = doc.extensions_required.first() {
        return Err(KilnError::NotSupported(format!("required extension {}", extension)));
    }
    for extension in &doc.extensions_used {
        log::warn!("Ignoring optional extension {}", extension);
    }
    Ok(())
}

fn check_buffers(doc: &Document) -> Result<()> {
    for (i, buffer) in doc.buffers.iter().enumerate() {
        if buffer.uri.is_none() {
            return Err(KilnError::FormatError(format!("buffers[{}] has no uri", i)));
        }
    }
    Ok(())
}

fn check_buffer_views(doc: &Document) -> Result<()> {
    for (i, view) in doc.buffer_views.iter().enumerate() {
        let from = format!("bufferViews[{}]", i);
        let buffer = lookup(&doc.buffers, "buffers", view.buffer, &from)?;
        let end = view
            .byte_offset
            .checked_add(view.byte_length)
            .ok_or_else(|| overflow(&from))?;
        if end > buffer.byte_length {
            return Err(KilnError::FormatError(format!(
                "{} covers bytes {}..{} of a {}-byte buffer",
                from, view.byte_offset, end, buffer.byte_length
            )));
        }
        if let Some(stride) = view.byte_stride {
            if !(4..=252).contains(&stride) || stride % 4 != 0 {
                return Err(KilnError::FormatError(format!("{} has invalid byteStride {}", from, stride)));
            }
        }
    }
    Ok(())
}

fn check_accessors(doc: &Document) -> Result<()> {
    for (i, accessor) in doc.accessors.iter().enumerate() {
        let from = format!("accessors[{}]", i);
        if accessor.sparse.is_some() {
            return Err(KilnError::NotSupported(format!("{} is sparse", from)));
        }
        let view_index = accessor
            .buffer_view
            .ok_or_else(|| KilnError::NotSupported(format!("{} has no bufferView", from)))?;
        let view = lookup(&doc.buffer_views, "bufferViews", view_index, &from)?;
        let (component, kind) = accessor_layout(accessor, &from)?;
        if accessor.count == 0 {
            return Err(KilnError::FormatError(format!("{} has count 0", from)));
        }

        let element_size = (component.size() * kind.type_count()) as usize;
        let stride = match view.byte_stride {
            Some(stride) if stride > 0 => stride as usize,
            _ => element_size,
        };
        if stride < element_size {
            return Err(KilnError::FormatError(format!(
                "{} elements are {} bytes but the view stride is {}",
                from, element_size, stride
            )));
        }
        let end = (accessor.count as usize - 1)
            .checked_mul(stride)
            .and_then(|span| span.checked_add(element_size))
            .and_then(|span| span.checked_add(accessor.byte_offset))
            .ok_or_else(|| overflow(&from))?;
        if end > view.byte_length {
            return Err(KilnError::FormatError(format!(
                "{} reads {} bytes from a {}-byte view",
                from, end, view.byte_length
            )));
        }
    }
    Ok(())
}

fn overflow(from: &str) -> KilnError {
    KilnError::FormatError(format!("{} byte range overflows", from))
}

fn check_images(doc: &Document) -> Result<()> {
    for (i, image) in doc.images.iter().enumerate() {
        let from = format!("images[{}]", i);
        match (&image.uri, image.buffer_view) {
            (Some(_), None) => {}
            (None, Some(view)) => {
                lookup(&doc.buffer_views, "bufferViews", view, &from)?;
                if image.mime_type.is_none() {
                    return Err(KilnError::FormatError(format!(
                        "{} reads from a bufferView but has no mimeType",
                        from
                    )));
                }
            }
            _ => {
                return Err(KilnError::FormatError(format!(
                    "{} needs exactly one of uri or bufferView",
                    from
                )))
            }
        }
    }
    Ok(())
}

fn check_samplers(doc: &Document) -> Result<()> {
    for sampler in &doc.samplers {
        TextureSampler::from_codes(sampler.mag_filter, sampler.min_filter, sampler.wrap_s, sampler.wrap_t)?;
    }
    Ok(())
}

fn check_textures(doc: &Document) -> Result<()> {
    for (i, texture) in doc.textures.iter().enumerate() {
        let from = format!("textures[{}]", i);
        let source = texture
            .source
            .ok_or_else(|| KilnError::FormatError(format!("{} has no source", from)))?;
        lookup(&doc.images, "images", source, &from)?;
        if let Some(sampler) = texture.sampler {
            lookup(&doc.samplers, "samplers", sampler, &from)?;
        }
    }
    Ok(())
}

fn check_material(doc: &Document, material: &MaterialDef, from: &str) -> Result<()> {
    for (slot, info) in material.texture_infos() {
        lookup(&doc.textures, "textures", info.index, &format!("{}.{}", from, slot))?;
        if info.tex_coord != 0 {
            return Err(KilnError::NotSupported(format!(
                "{}.{} uses texture coordinate set {}",
                from, slot, info.tex_coord
            )));
        }
    }
    AlphaMode::from_name(&material.alpha_mode)?;
    Ok(())
}

fn check_materials(doc: &Document) -> Result<()> {
    for (i, material) in doc.materials.iter().enumerate() {
        check_material(doc, material, &format!("materials[{}]", i))?;
    }
    Ok(())
}

/// Check an attribute accessor's layout against what the renderer reads
fn expect_layout(
    doc: &Document,
    index: usize,
    from: &str,
    components: &[ComponentType],
    kind: AccessorType,
) -> Result<u32> {
    let accessor = lookup(&doc.accessors, "accessors", index, from)?;
    let (component, actual) = accessor_layout(accessor, from)?;
    if actual != kind || !components.contains(&component) {
        return Err(KilnError::FormatError(format!(
            "{} must be {:?} of {:?}, found {:?} of {:?}",
            from, kind, components, actual, component
        )));
    }
    Ok(accessor.count)
}

fn check_primitive(doc: &Document, primitive: &PrimitiveDef, from: &str) -> Result<()> {
    for (name, &index) in &primitive.attributes {
        lookup(&doc.accessors, "accessors", index, &format!("{}.{}", from, name))?;
    }
    if let Some(index) = primitive.indices {
        lookup(&doc.accessors, "accessors", index, &format!("{}.indices", from))?;
    }
    let material = primitive
        .material
        .map(|index| lookup(&doc.materials, "materials", index, from))
        .transpose()?;

    let floats = [ComponentType::Float];
    let required = |name: &str| {
        primitive
            .attributes
            .get(name)
            .copied()
            .ok_or_else(|| KilnError::FormatError(format!("{} has no {} attribute", from, name)))
    };

    let vertex_count = expect_layout(doc, required("POSITION")?, &format!("{}.POSITION", from), &floats, AccessorType::Vec3)?;
    let mut counts = vec![(
        "NORMAL",
        expect_layout(doc, required("NORMAL")?, &format!("{}.NORMAL", from), &floats, AccessorType::Vec3)?,
    )];
    if let Some(&index) = primitive.attributes.get("TANGENT") {
        counts.push((
            "TANGENT",
            expect_layout(doc, index, &format!("{}.TANGENT", from), &floats, AccessorType::Vec4)?,
        ));
    }
    if let Some(&index) = primitive.attributes.get("TEXCOORD_0") {
        counts.push((
            "TEXCOORD_0",
            expect_layout(
                doc,
                index,
                &format!("{}.TEXCOORD_0", from),
                &[ComponentType::Float, ComponentType::UnsignedByte, ComponentType::UnsignedShort],
                AccessorType::Vec2,
            )?,
        ));
    }
    for (name, count) in counts {
        if count != vertex_count {
            return Err(KilnError::FormatError(format!(
                "{}.{} has {} elements but POSITION has {}",
                from, name, count, vertex_count
            )));
        }
    }

    let indices = primitive
        .indices
        .ok_or_else(|| KilnError::FormatError(format!("{} has no index accessor", from)))?;
    expect_layout(
        doc,
        indices,
        &format!("{}.indices", from),
        &[ComponentType::UnsignedByte, ComponentType::UnsignedShort, ComponentType::UnsignedInt],
        AccessorType::Scalar,
    )?;

    let topology = Topology::from_mode(primitive.mode)
        .ok_or_else(|| KilnError::FormatError(format!("{} has unknown mode {}", from, primitive.mode)))?;
    if !topology.is_drawable() {
        return Err(KilnError::NotSupported(format!("{} uses {:?} topology", from, topology)));
    }

    if let Some(material) = material {
        if material.samples_textures() && !primitive.attributes.contains_key("TEXCOORD_0") {
            return Err(KilnError::ValidationError(format!(
                "{} uses textured material {} without TEXCOORD_0",
                from,
                material.name.as_deref().unwrap_or("<unnamed>")
            )));
        }
    }
    Ok(())
}

fn check_meshes(doc: &Document) -> Result<()> {
    for (m, mesh) in doc.meshes.iter().enumerate() {
        if mesh.primitives.is_empty() {
            return Err(KilnError::FormatError(format!("meshes[{}] has no primitives", m)));
        }
        for (p, primitive) in mesh.primitives.iter().enumerate() {
            check_primitive(doc, primitive, &format!("meshes[{}].primitives[{}]", m, p))?;
        }
    }
    Ok(())
}

fn check_cameras(doc: &Document) -> Result<()> {
    for (i, camera) in doc.cameras.iter().enumerate() {
        let from = format!("cameras[{}]", i);
        let valid = match camera.kind.as_str() {
            "perspective" => camera
                .perspective
                .as_ref()
                .is_some_and(|p| p.yfov > 0.0 && p.znear > 0.0 && p.zfar.map_or(true, |far| far > p.znear)),
            "orthographic" => camera
                .orthographic
                .as_ref()
                .is_some_and(|o| o.zfar > o.znear && o.xmag != 0.0 && o.ymag != 0.0),
            other => {
                return Err(KilnError::FormatError(format!("{} has unknown type '{}'", from, other)));
            }
        };
        if !valid {
            return Err(KilnError::FormatError(format!(
                "{} is missing or has invalid {} parameters",
                from, camera.kind
            )));
        }
    }
    Ok(())
}

fn check_nodes(doc: &Document) -> Result<()> {
    let mut parents: Vec<Option<usize>> = vec![None; doc.nodes.len()];

    for (i, node) in doc.nodes.iter().enumerate() {
        let from = format!("nodes[{}]", i);
        if let Some(mesh) = node.mesh {
            lookup(&doc.meshes, "meshes", mesh, &from)?;
        }
        if let Some(camera) = node.camera {
            lookup(&doc.cameras, "cameras", camera, &from)?;
        }
        for &child in &node.children {
            lookup(&doc.nodes, "nodes", child, &format!("{}.children", from))?;
            if child == i {
                return Err(KilnError::FormatError(format!("{} lists itself as a child", from)));
            }
            if let Some(other) = parents[child].replace(i) {
                return Err(KilnError::FormatError(format!(
                    "nodes[{}] is a child of both nodes[{}] and nodes[{}]",
                    child, other, i
                )));
            }
        }
    }

    // With single parents, a cycle shows up as a parent chain longer than the node count
    for start in 0..doc.nodes.len() {
        let mut cursor = parents[start];
        let mut steps = 0;
        while let Some(parent) = cursor {
            steps += 1;
            if steps > doc.nodes.len() {
                return Err(KilnError::FormatError(format!("nodes[{}] is part of a child cycle", start)));
            }
            cursor = parents[parent];
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: serde_json::Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    /// One triangle: 36 bytes of positions, 36 of normals, 6 of u16 indices
    fn triangle() -> serde_json::Value {
        json!({
            "asset": {"version": "2.0"},
            "buffers": [{"uri": "tri.bin", "byteLength": 78}],
            "bufferViews": [
                {"buffer": 0, "byteOffset": 0, "byteLength": 72},
                {"buffer": 0, "byteOffset": 72, "byteLength": 6}
            ],
            "accessors": [
                {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"},
                {"bufferView": 0, "byteOffset": 36, "componentType": 5126, "count": 3, "type": "VEC3"},
                {"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}
            ],
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0, "NORMAL": 1}, "indices": 2}]}],
            "nodes": [{"mesh": 0}]
        })
    }

    #[test]
    fn test_valid_triangle() {
        validate(&document(triangle())).unwrap();
    }

    #[test]
    fn test_out_of_range_references() {
        let mut doc = triangle();
        doc["meshes"][0]["primitives"][0]["attributes"]["NORMAL"] = json!(7);
        let err = validate(&document(doc)).unwrap_err();
        assert!(matches!(
            err,
            KilnError::ReferenceError { table: "accessors", index: 7, len: 3, .. }
        ));

        let mut doc = triangle();
        doc["meshes"][0]["primitives"][0]["material"] = json!(0);
        let err = validate(&document(doc)).unwrap_err();
        assert!(matches!(err, KilnError::ReferenceError { table: "materials", .. }));

        let mut doc = triangle();
        doc["nodes"][0]["mesh"] = json!(1);
        let err = validate(&document(doc)).unwrap_err();
        assert!(matches!(err, KilnError::ReferenceError { table: "meshes", .. }));
    }

    #[test]
    fn test_missing_indices_and_attributes() {
        let mut doc = triangle();
        doc["meshes"][0]["primitives"][0]
            .as_object_mut()
            .unwrap()
            .remove("indices");
        assert!(matches!(validate(&document(doc)), Err(KilnError::FormatError(_))));

        let mut doc = triangle();
        doc["meshes"][0]["primitives"][0]["attributes"]
            .as_object_mut()
            .unwrap()
            .remove("NORMAL");
        let err = validate(&document(doc)).unwrap_err();
        assert!(matches!(err, KilnError::FormatError(msg) if msg.contains("NORMAL")));
    }

    #[test]
    fn test_accessor_outside_view() {
        let mut doc = triangle();
        doc["accessors"][1]["byteOffset"] = json!(40);
        assert!(matches!(validate(&document(doc)), Err(KilnError::FormatError(_))));

        let mut doc = triangle();
        doc["bufferViews"][1]["byteLength"] = json!(8);
        assert!(matches!(validate(&document(doc)), Err(KilnError::FormatError(_))));
    }

    #[test]
    fn test_overflowing_ranges_are_format_errors() {
        let mut doc = triangle();
        doc["bufferViews"][0]["byteOffset"] = json!(u64::MAX);
        assert!(matches!(validate(&document(doc)), Err(KilnError::FormatError(_))));

        let mut doc = triangle();
        doc["accessors"][1]["byteOffset"] = json!(u64::MAX);
        assert!(matches!(validate(&document(doc)), Err(KilnError::FormatError(_))));
    }

    #[test]
    fn test_index_accessor_must_be_unsigned_scalar() {
        let mut doc = triangle();
        doc["accessors"][2]["componentType"] = json!(5122);
        assert!(matches!(validate(&document(doc)), Err(KilnError::FormatError(_))));
    }

    #[test]
    fn test_unsupported_features() {
        let mut doc = triangle();
        doc["extensionsRequired"] = json!(["KHR_draco_mesh_compression"]);
        assert!(matches!(validate(&document(doc)), Err(KilnError::NotSupported(_))));

        let mut doc = triangle();
        doc["asset"]["version"] = json!("1.0");
        assert!(matches!(validate(&document(doc)), Err(KilnError::NotSupported(_))));

        let mut doc = triangle();
        doc["meshes"][0]["primitives"][0]["mode"] = json!(6);
        assert!(matches!(validate(&document(doc)), Err(KilnError::NotSupported(_))));

        let mut doc = triangle();
        doc["accessors"][0]
            .as_object_mut()
            .unwrap()
            .remove("bufferView");
        assert!(matches!(validate(&document(doc)), Err(KilnError::NotSupported(_))));
    }

    #[test]
    fn test_secondary_uv_set_rejected() {
        let mut doc = triangle();
        doc["images"] = json!([{"uri": "albedo.png"}]);
        doc["textures"] = json!([{"source": 0}]);
        doc["materials"] = json!([{"pbrMetallicRoughness": {"baseColorTexture": {"index": 0, "texCoord": 1}}}]);
        let err = validate(&document(doc)).unwrap_err();
        assert!(matches!(err, KilnError::NotSupported(msg) if msg.contains("coordinate set 1")));
    }

    #[test]
    fn test_textured_material_needs_texcoords() {
        let mut doc = triangle();
        doc["images"] = json!([{"uri": "albedo.png"}]);
        doc["textures"] = json!([{"source": 0}]);
        doc["materials"] = json!([{"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}}]);
        doc["meshes"][0]["primitives"][0]["material"] = json!(0);
        assert!(matches!(validate(&document(doc)), Err(KilnError::ValidationError(_))));
    }

    #[test]
    fn test_texture_needs_source() {
        let mut doc = triangle();
        doc["images"] = json!([{"uri": "albedo.png"}]);
        doc["textures"] = json!([{}]);
        assert!(matches!(validate(&document(doc)), Err(KilnError::FormatError(_))));
    }

    #[test]
    fn test_node_hierarchy_errors() {
        let mut doc = triangle();
        doc["nodes"] = json!([{"children": [2]}, {"children": [2]}, {}]);
        let err = validate(&document(doc)).unwrap_err();
        assert!(matches!(err, KilnError::FormatError(msg) if msg.contains("child of both")));

        let mut doc = triangle();
        doc["nodes"] = json!([{"children": [1]}, {"children": [0]}]);
        let err = validate(&document(doc)).unwrap_err();
        assert!(matches!(err, KilnError::FormatError(msg) if msg.contains("cycle")));

        let mut doc = triangle();
        doc["nodes"] = json!([{"children": [0]}]);
        assert!(matches!(validate(&document(doc)), Err(KilnError::FormatError(_))));

        let mut doc = triangle();
        doc["nodes"] = json!([{"children": [5]}]);
        assert!(matches!(
            validate(&document(doc)),
            Err(KilnError::ReferenceError { table: "nodes", .. })
        ));
    }

    #[test]
    fn test_cameras() {
        let mut doc = triangle();
        doc["cameras"] = json!([{"type": "perspective", "perspective": {"yfov": 0.8, "znear": 0.1}}]);
        doc["nodes"][0]["camera"] = json!(0);
        validate(&document(doc)).unwrap();

        let mut doc = triangle();
        doc["cameras"] = json!([{"type": "perspective"}]);
        assert!(matches!(validate(&document(doc)), Err(KilnError::FormatError(_))));

        let mut doc = triangle();
        doc["nodes"][0]["camera"] = json!(0);
        assert!(matches!(
            validate(&document(doc)),
            Err(KilnError::ReferenceError { table: "cameras", .. })
        ));
    }
}
