//! Images, samplers and GPU textures

use crate::backend::{AddressMode, FilterMode, GpuBackend, SamplerDesc, TextureDesc, TextureHandle};
use crate::context::RenderContext;
use crate::release::Owned;
use kiln_core::{KilnError, Result};
use std::path::Path;

/// A decoded RGBA8 pixel buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Image {
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if pixels.len() != width as usize * height as usize * 4 {
            return Err(KilnError::FormatError(format!(
                "{}x{} RGBA image needs {} bytes, got {}",
                width,
                height,
                width as usize * height as usize * 4,
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }

    /// Decode an encoded image (PNG, JPEG, ...) held in memory
    pub fn decode(bytes: &[u8], source: &str) -> Result<Self> {
        let decoded = image::load_from_memory(bytes).map_err(|e| KilnError::read(source, e))?;
        let rgba = decoded.to_rgba8();
        Ok(Self {
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        })
    }

    /// Read and decode an image file
    pub fn open(path: &Path) -> Result<Self> {
        let decoded = image::open(path).map_err(|e| KilnError::read(path.display().to_string(), e))?;
        let rgba = decoded.to_rgba8();
        Ok(Self {
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        })
    }
}

/// Minification filter, including the mipmapped variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl MinFilter {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            9728 => MinFilter::Nearest,
            9729 => MinFilter::Linear,
            9984 => MinFilter::NearestMipmapNearest,
            9985 => MinFilter::LinearMipmapNearest,
            9986 => MinFilter::NearestMipmapLinear,
            9987 => MinFilter::LinearMipmapLinear,
            _ => return None,
        })
    }

    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, MinFilter::Nearest | MinFilter::Linear)
    }

    /// Split into (texel filter, mip filter)
    fn modes(self) -> (FilterMode, Option<FilterMode>) {
        use FilterMode::{Linear, Nearest};
        match self {
            MinFilter::Nearest => (Nearest, None),
            MinFilter::Linear => (Linear, None),
            MinFilter::NearestMipmapNearest => (Nearest, Some(Nearest)),
            MinFilter::LinearMipmapNearest => (Linear, Some(Nearest)),
            MinFilter::NearestMipmapLinear => (Nearest, Some(Linear)),
            MinFilter::LinearMipmapLinear => (Linear, Some(Linear)),
        }
    }
}

fn mag_filter_from_code(code: u32) -> Option<FilterMode> {
    match code {
        9728 => Some(FilterMode::Nearest),
        9729 => Some(FilterMode::Linear),
        _ => None,
    }
}

fn wrap_from_code(code: u32) -> Option<AddressMode> {
    match code {
        33071 => Some(AddressMode::ClampToEdge),
        33648 => Some(AddressMode::MirroredRepeat),
        10497 => Some(AddressMode::Repeat),
        _ => None,
    }
}

/// Sampling state; filters left unset fall back to linear without mipmaps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSampler {
    pub mag_filter: Option<FilterMode>,
    pub min_filter: Option<MinFilter>,
    pub wrap_s: AddressMode,
    pub wrap_t: AddressMode,
}

impl Default for TextureSampler {
    fn default() -> Self {
        Self {
            mag_filter: None,
            min_filter: None,
            wrap_s: AddressMode::Repeat,
            wrap_t: AddressMode::Repeat,
        }
    }
}

impl TextureSampler {
    /// Build from interchange-format filter and wrap codes
    pub fn from_codes(mag: Option<u32>, min: Option<u32>, wrap_s: u32, wrap_t: u32) -> Result<Self> {
        let bad = |what: &str, code: u32| KilnError::FormatError(format!("unknown sampler {} {}", what, code));
        Ok(Self {
            mag_filter: mag
                .map(|c| mag_filter_from_code(c).ok_or_else(|| bad("magFilter", c)))
                .transpose()?,
            min_filter: min
                .map(|c| MinFilter::from_code(c).ok_or_else(|| bad("minFilter", c)))
                .transpose()?,
            wrap_s: wrap_from_code(wrap_s).ok_or_else(|| bad("wrapS", wrap_s))?,
            wrap_t: wrap_from_code(wrap_t).ok_or_else(|| bad("wrapT", wrap_t))?,
        })
    }

    pub fn uses_mipmaps(&self) -> bool {
        self.min_filter.is_some_and(MinFilter::uses_mipmaps)
    }

    /// Mip levels to allocate for a `width` x `height` image
    pub fn mip_levels(&self, width: u32, height: u32) -> u32 {
        if self.uses_mipmaps() {
            full_mip_chain(width, height)
        } else {
            1
        }
    }

    pub fn desc(&self) -> SamplerDesc {
        let (min_filter, mipmap_filter) = self
            .min_filter
            .map(MinFilter::modes)
            .unwrap_or((FilterMode::Linear, None));
        SamplerDesc {
            mag_filter: self.mag_filter.unwrap_or(FilterMode::Linear),
            min_filter,
            mipmap_filter,
            address_u: self.wrap_s,
            address_v: self.wrap_t,
        }
    }
}

/// `1 + floor(log2(max(width, height)))`
pub fn full_mip_chain(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// A GPU texture with its sampling state
#[derive(Debug)]
pub struct Texture {
    gpu: Owned<TextureHandle>,
    width: u32,
    height: u32,
    mip_levels: u32,
    sampler: TextureSampler,
}

impl Texture {
    /// Upload `image`, generating mipmaps when the sampler needs them
    pub fn new<B: GpuBackend>(
        ctx: &mut RenderContext<B>,
        label: &str,
        image: &Image,
        sampler: Option<TextureSampler>,
    ) -> Result<Self> {
        let sampler = sampler.unwrap_or_default();
        let mip_levels = sampler.mip_levels(image.width, image.height);
        let desc = TextureDesc {
            label: label.to_string(),
            width: image.width,
            height: image.height,
            mip_levels,
            sampler: sampler.desc(),
        };
        let handle = ctx.backend_mut().create_texture(&desc, &image.pixels)?;
        Ok(Self {
            gpu: Owned::new(handle, ctx.releaser()),
            width: image.width,
            height: image.height,
            mip_levels,
            sampler,
        })
    }

    pub fn handle(&self) -> TextureHandle {
        self.gpu.handle()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    pub fn sampler(&self) -> &TextureSampler {
        &self.sampler
    }
}
