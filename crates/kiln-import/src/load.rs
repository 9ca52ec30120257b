//! Buffer and image loading from files, data URIs and buffer views

use crate::document::Document;
use base64::Engine;
use kiln_core::{KilnError, Result};
use kiln_render::Image;
use std::path::Path;

const DATA_PREFIX: &str = "data:";

/// Decode a `data:<mime>;base64,<payload>` URI; `None` for anything else
fn decode_data_uri(uri: &str) -> Option<Result<Vec<u8>>> {
    let rest = uri.strip_prefix(DATA_PREFIX)?;
    let decoded = match rest.split_once(";base64,") {
        Some((_, payload)) => base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| KilnError::FormatError(format!("invalid base64 data URI: {}", e))),
        None => Err(KilnError::NotSupported("data URIs without base64 encoding".into())),
    };
    Some(decoded)
}

/// Bytes behind `uri`, read relative to `base_dir` unless it is a data URI
fn read_uri(uri: &str, base_dir: &Path) -> Result<Vec<u8>> {
    if let Some(decoded) = decode_data_uri(uri) {
        return decoded;
    }
    let path = base_dir.join(uri);
    std::fs::read(&path).map_err(|e| KilnError::read(path.display().to_string(), e))
}

/// Load every buffer, trimmed to its declared length
pub fn load_buffers(doc: &Document, base_dir: &Path) -> Result<Vec<Vec<u8>>> {
    let mut buffers = Vec::with_capacity(doc.buffers.len());
    for (i, buffer) in doc.buffers.iter().enumerate() {
        let uri = buffer
            .uri
            .as_deref()
            .ok_or_else(|| KilnError::FormatError(format!("buffers[{}] has no uri", i)))?;
        let mut bytes = read_uri(uri, base_dir)?;
        if bytes.len() < buffer.byte_length {
            return Err(KilnError::FormatError(format!(
                "buffers[{}] declares {} bytes but {} holds {}",
                i,
                buffer.byte_length,
                if uri.starts_with(DATA_PREFIX) { "its data URI" } else { uri },
                bytes.len()
            )));
        }
        bytes.truncate(buffer.byte_length);
        log::debug!("Loaded buffers[{}] ({} bytes)", i, bytes.len());
        buffers.push(bytes);
    }
    Ok(buffers)
}

/// Byte range of a buffer view inside the loaded buffers
pub fn view_bytes<'a>(doc: &Document, buffers: &'a [Vec<u8>], view: usize) -> Result<&'a [u8]> {
    let from = format!("bufferViews[{}]", view);
    let def = crate::validate::lookup(&doc.buffer_views, "bufferViews", view, &from)?;
    let buffer = crate::validate::lookup(buffers, "buffers", def.buffer, &from)?;
    def.byte_offset
        .checked_add(def.byte_length)
        .and_then(|end| buffer.get(def.byte_offset..end))
        .ok_or_else(|| KilnError::FormatError(format!("{} lies outside buffers[{}]", from, def.buffer)))
}

/// Decode the images that textures use; unused images stay `None`
pub fn load_images(doc: &Document, buffers: &[Vec<u8>], base_dir: &Path) -> Result<Vec<Option<Image>>> {
    let mut images: Vec<Option<Image>> = vec![None; doc.images.len()];
    for texture in &doc.textures {
        let Some(source) = texture.source else {
            continue;
        };
        let Some(slot) = images.get_mut(source) else {
            continue;
        };
        if slot.is_some() {
            continue;
        }

        let def = &doc.images[source];
        let label = format!("images[{}]", source);
        let image = match (&def.uri, def.buffer_view) {
            (Some(uri), _) if uri.starts_with(DATA_PREFIX) => {
                let bytes = read_uri(uri, base_dir)?;
                Image::decode(&bytes, &label)?
            }
            (Some(uri), _) => Image::open(&base_dir.join(uri))?,
            (None, Some(view)) => Image::decode(view_bytes(doc, buffers, view)?, &label)?,
            (None, None) => {
                return Err(KilnError::FormatError(format!("{} has no uri or bufferView", label)));
            }
        };
        log::debug!("Decoded {} ({}x{})", label, image.width, image.height);
        *slot = Some(image);
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("kiln-load-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn document(value: serde_json::Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_data_uri() {
        let payload = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3, 4]);
        let uri = format!("data:application/octet-stream;base64,{}", payload);
        let doc = document(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"uri": uri, "byteLength": 3}]
        }));
        let buffers = load_buffers(&doc, Path::new(".")).unwrap();
        assert_eq!(buffers, vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_relative_file_and_short_file() {
        let dir = temp_dir();
        std::fs::write(dir.join("geometry.bin"), [7u8; 16]).unwrap();

        let doc = document(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"uri": "geometry.bin", "byteLength": 16}]
        }));
        assert_eq!(load_buffers(&doc, &dir).unwrap()[0].len(), 16);

        let doc = document(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"uri": "geometry.bin", "byteLength": 32}]
        }));
        assert!(matches!(load_buffers(&doc, &dir), Err(KilnError::FormatError(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let doc = document(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"uri": "does-not-exist.bin", "byteLength": 4}]
        }));
        let err = load_buffers(&doc, &temp_dir()).unwrap_err();
        assert!(matches!(err, KilnError::ReadError { path, .. } if path.ends_with("does-not-exist.bin")));
    }

    #[test]
    fn test_view_range_overflow() {
        let doc = document(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"uri": "unused.bin", "byteLength": 4}],
            "bufferViews": [{"buffer": 0, "byteOffset": u64::MAX, "byteLength": 2}]
        }));
        let buffers = vec![vec![0u8; 4]];
        assert!(matches!(view_bytes(&doc, &buffers, 0), Err(KilnError::FormatError(_))));
    }

    #[test]
    fn test_non_base64_data_uri() {
        let doc = document(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"uri": "data:text/plain,hello", "byteLength": 5}]
        }));
        assert!(matches!(load_buffers(&doc, Path::new(".")), Err(KilnError::NotSupported(_))));
    }

    #[test]
    fn test_only_textured_images_are_decoded() {
        let doc = document(json!({
            "asset": {"version": "2.0"},
            "images": [{"uri": "missing.png"}]
        }));
        let images = load_images(&doc, &[], Path::new(".")).unwrap();
        assert_eq!(images, vec![None]);

        let doc = document(json!({
            "asset": {"version": "2.0"},
            "images": [{"uri": "missing.png"}],
            "textures": [{"source": 0}]
        }));
        assert!(matches!(
            load_images(&doc, &[], &temp_dir()),
            Err(KilnError::ReadError { .. })
        ));
    }
}
