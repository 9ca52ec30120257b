//! Typed scene document
//!
//! Tables are kept in document order so integer references index them
//! directly. Optional fields carry the format's documented defaults.

use kiln_core::{KilnError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const WRAP_REPEAT: u32 = 10497;
pub const MODE_TRIANGLES: u32 = 4;

fn one() -> f32 {
    1.0
}

fn half() -> f32 {
    0.5
}

fn white() -> [f32; 4] {
    [1.0; 4]
}

fn repeat() -> u32 {
    WRAP_REPEAT
}

fn triangles() -> u32 {
    MODE_TRIANGLES
}

fn opaque() -> String {
    "OPAQUE".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub asset: Asset,
    #[serde(default)]
    pub extensions_used: Vec<String>,
    #[serde(default)]
    pub extensions_required: Vec<String>,
    #[serde(default)]
    pub buffers: Vec<BufferDef>,
    #[serde(default)]
    pub buffer_views: Vec<BufferViewDef>,
    #[serde(default)]
    pub accessors: Vec<AccessorDef>,
    #[serde(default)]
    pub images: Vec<ImageDef>,
    #[serde(default)]
    pub samplers: Vec<SamplerDef>,
    #[serde(default)]
    pub textures: Vec<TextureDef>,
    #[serde(default)]
    pub materials: Vec<MaterialDef>,
    #[serde(default)]
    pub meshes: Vec<MeshDef>,
    #[serde(default)]
    pub cameras: Vec<CameraDef>,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
}

impl Document {
    /// Parse a document from JSON bytes; `source` names it in errors
    pub fn from_slice(bytes: &[u8], source: &str) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| KilnError::FormatError(format!("{}: {}", source, e)))
    }

    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| KilnError::read(path.display().to_string(), e))?;
        Self::from_slice(&bytes, &path.display().to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub version: String,
    pub generator: Option<String>,
    pub min_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferDef {
    pub uri: Option<String>,
    pub byte_length: usize,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferViewDef {
    pub buffer: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<u32>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessorDef {
    pub buffer_view: Option<usize>,
    #[serde(default)]
    pub byte_offset: usize,
    pub component_type: u32,
    #[serde(default)]
    pub normalized: bool,
    pub count: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub sparse: Option<serde_json::Value>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDef {
    pub uri: Option<String>,
    pub mime_type: Option<String>,
    pub buffer_view: Option<usize>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplerDef {
    pub mag_filter: Option<u32>,
    pub min_filter: Option<u32>,
    #[serde(default = "repeat")]
    pub wrap_s: u32,
    #[serde(default = "repeat")]
    pub wrap_t: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureDef {
    pub sampler: Option<usize>,
    pub source: Option<usize>,
    pub name: Option<String>,
}

/// Reference from a material to a texture
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureInfo {
    pub index: usize,
    #[serde(default)]
    pub tex_coord: u32,
    /// Normal textures only
    #[serde(default = "one")]
    pub scale: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrDef {
    #[serde(default = "white")]
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<TextureInfo>,
    #[serde(default = "one")]
    pub metallic_factor: f32,
    #[serde(default = "one")]
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<TextureInfo>,
}

impl Default for PbrDef {
    fn default() -> Self {
        Self {
            base_color_factor: white(),
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDef {
    pub name: Option<String>,
    #[serde(default)]
    pub pbr_metallic_roughness: PbrDef,
    pub normal_texture: Option<TextureInfo>,
    pub occlusion_texture: Option<TextureInfo>,
    pub emissive_texture: Option<TextureInfo>,
    #[serde(default)]
    pub emissive_factor: [f32; 3],
    #[serde(default = "opaque")]
    pub alpha_mode: String,
    #[serde(default = "half")]
    pub alpha_cutoff: f32,
    #[serde(default)]
    pub double_sided: bool,
}

impl MaterialDef {
    /// Every texture reference with the slot it fills
    pub fn texture_infos(&self) -> impl Iterator<Item = (&'static str, &TextureInfo)> {
        [
            ("baseColorTexture", self.pbr_metallic_roughness.base_color_texture.as_ref()),
            (
                "metallicRoughnessTexture",
                self.pbr_metallic_roughness.metallic_roughness_texture.as_ref(),
            ),
            ("normalTexture", self.normal_texture.as_ref()),
            ("occlusionTexture", self.occlusion_texture.as_ref()),
            ("emissiveTexture", self.emissive_texture.as_ref()),
        ]
        .into_iter()
        .filter_map(|(slot, info)| Some((slot, info?)))
    }

    /// True when a texture bound for shading needs texture coordinates
    pub fn samples_textures(&self) -> bool {
        self.pbr_metallic_roughness.base_color_texture.is_some()
            || self.pbr_metallic_roughness.metallic_roughness_texture.is_some()
            || self.normal_texture.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeshDef {
    pub primitives: Vec<PrimitiveDef>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrimitiveDef {
    pub attributes: BTreeMap<String, usize>,
    pub indices: Option<usize>,
    pub material: Option<usize>,
    #[serde(default = "triangles")]
    pub mode: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerspectiveDef {
    pub aspect_ratio: Option<f32>,
    pub yfov: f32,
    pub znear: f32,
    pub zfar: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrthographicDef {
    pub xmag: f32,
    pub ymag: f32,
    pub znear: f32,
    pub zfar: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraDef {
    #[serde(rename = "type")]
    pub kind: String,
    pub perspective: Option<PerspectiveDef>,
    pub orthographic: Option<OrthographicDef>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeDef {
    pub camera: Option<usize>,
    #[serde(default)]
    pub children: Vec<usize>,
    /// Column-major
    pub matrix: Option<[f32; 16]>,
    pub mesh: Option<usize>,
    /// Unit quaternion `[x, y, z, w]`
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
    pub translation: Option<[f32; 3]>,
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let doc = Document::from_slice(
            br#"{
                "asset": {"version": "2.0"},
                "materials": [{}],
                "samplers": [{}],
                "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}]
            }"#,
            "inline",
        )
        .unwrap();

        let material = &doc.materials[0];
        assert_eq!(material.pbr_metallic_roughness.base_color_factor, [1.0; 4]);
        assert_eq!(material.pbr_metallic_roughness.metallic_factor, 1.0);
        assert_eq!(material.alpha_mode, "OPAQUE");
        assert_eq!(material.alpha_cutoff, 0.5);
        assert!(!material.double_sided);
        assert_eq!(doc.samplers[0].wrap_s, WRAP_REPEAT);
        assert_eq!(doc.meshes[0].primitives[0].mode, MODE_TRIANGLES);
        assert!(doc.nodes.is_empty());
    }

    #[test]
    fn test_missing_required_field_is_format_error() {
        let err = Document::from_slice(br#"{"asset": {"version": "2.0"}, "buffers": [{"uri": "a.bin"}]}"#, "doc")
            .unwrap_err();
        assert!(matches!(err, KilnError::FormatError(msg) if msg.contains("byteLength")));

        let err = Document::from_slice(b"{}", "doc").unwrap_err();
        assert!(matches!(err, KilnError::FormatError(_)));
    }

    #[test]
    fn test_texture_infos() {
        let doc = Document::from_slice(
            br#"{
                "asset": {"version": "2.0"},
                "materials": [{
                    "pbrMetallicRoughness": {"baseColorTexture": {"index": 0}},
                    "normalTexture": {"index": 1, "scale": 0.5},
                    "emissiveTexture": {"index": 2}
                }]
            }"#,
            "inline",
        )
        .unwrap();
        let material = &doc.materials[0];
        let slots: Vec<_> = material.texture_infos().map(|(slot, info)| (slot, info.index)).collect();
        assert_eq!(
            slots,
            vec![("baseColorTexture", 0), ("normalTexture", 1), ("emissiveTexture", 2)]
        );
        assert_eq!(material.normal_texture.as_ref().unwrap().scale, 0.5);
        assert!(material.samples_textures());
    }
}
