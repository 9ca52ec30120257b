//! PBR metallic-roughness materials

use crate::backend::{MaterialBinding, TextureFlags, TextureSlot};
use crate::texture::Texture;
use glam::{Vec3, Vec4};
use kiln_core::{KilnError, MaterialId, Result};
use std::sync::Arc;

/// How the base color alpha is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    /// Fragments below the cutoff are discarded
    Mask,
    Blend,
}

impl AlphaMode {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "OPAQUE" => Ok(AlphaMode::Opaque),
            "MASK" => Ok(AlphaMode::Mask),
            "BLEND" => Ok(AlphaMode::Blend),
            other => Err(KilnError::FormatError(format!("unknown alphaMode '{}'", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PbrMetallicRoughness {
    pub base_color_factor: Vec4,
    pub base_color_texture: Option<Arc<Texture>>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<Arc<Texture>>,
}

impl Default for PbrMetallicRoughness {
    fn default() -> Self {
        Self {
            base_color_factor: Vec4::ONE,
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
        }
    }
}

/// A material. Its id is the batching key, so materials are shared through
/// `Arc` and never cloned.
#[derive(Debug)]
pub struct Material {
    id: MaterialId,
    pub name: Option<String>,
    pub pbr: PbrMetallicRoughness,
    pub normal_texture: Option<Arc<Texture>>,
    pub normal_scale: f32,
    pub emissive_factor: Vec3,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            id: MaterialId::new(),
            name: None,
            pbr: PbrMetallicRoughness::default(),
            normal_texture: None,
            normal_scale: 1.0,
            emissive_factor: Vec3::ZERO,
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
        }
    }
}

impl Material {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn id(&self) -> MaterialId {
        self.id
    }

    /// True when any texture is sampled, so primitives need texture coordinates
    pub fn requires_texcoords(&self) -> bool {
        self.pbr.base_color_texture.is_some()
            || self.pbr.metallic_roughness_texture.is_some()
            || self.normal_texture.is_some()
    }

    /// Uniform values and texture units for this material
    pub fn binding(&self) -> MaterialBinding {
        let mut textures = [None; 3];
        let mut texture_flags = TextureFlags::empty();
        let slots = [
            (TextureSlot::BaseColor, &self.pbr.base_color_texture, TextureFlags::BASE_COLOR),
            (
                TextureSlot::MetallicRoughness,
                &self.pbr.metallic_roughness_texture,
                TextureFlags::METALLIC_ROUGHNESS,
            ),
            (TextureSlot::Normal, &self.normal_texture, TextureFlags::NORMAL),
        ];
        for (slot, texture, flag) in slots {
            if let Some(texture) = texture {
                textures[slot as usize] = Some(texture.handle());
                texture_flags |= flag;
            }
        }

        MaterialBinding {
            material: self.id,
            base_color_factor: self.pbr.base_color_factor,
            emissive_factor: self.emissive_factor,
            metallic_factor: self.pbr.metallic_factor,
            roughness_factor: self.pbr.roughness_factor,
            normal_scale: self.normal_scale,
            alpha_cutoff: self.alpha_cutoff,
            alpha_mode: self.alpha_mode,
            double_sided: self.double_sided,
            textures,
            texture_flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RenderContext;
    use crate::recording::RecordingBackend;
    use crate::texture::Image;

    #[test]
    fn test_defaults() {
        let material = Material::default();
        assert_eq!(material.pbr.base_color_factor, Vec4::ONE);
        assert_eq!(material.alpha_cutoff, 0.5);
        assert!(!material.requires_texcoords());
        assert_ne!(material.id(), Material::default().id());
    }

    #[test]
    fn test_binding_flags_follow_textures() {
        let mut ctx = RenderContext::new(RecordingBackend::new());
        let image = Image::from_rgba(1, 1, vec![255; 4]).unwrap();
        let normal = Arc::new(Texture::new(&mut ctx, "normal", &image, None).unwrap());

        let mut material = Material::new(Some("bumpy".into()));
        material.normal_texture = Some(normal.clone());
        assert!(material.requires_texcoords());

        let binding = material.binding();
        assert_eq!(binding.texture_flags, TextureFlags::NORMAL);
        assert_eq!(binding.textures[TextureSlot::Normal as usize], Some(normal.handle()));
        assert_eq!(binding.textures[TextureSlot::BaseColor as usize], None);
    }

    #[test]
    fn test_alpha_mode_names() {
        assert_eq!(AlphaMode::from_name("MASK").unwrap(), AlphaMode::Mask);
        assert!(AlphaMode::from_name("mask").is_err());
    }
}
