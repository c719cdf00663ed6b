//! Artifact Serializer
//!
//! `TigerStyle`: Pure functions, no side effects.
//!
//! Turns one generated image plus its infotext into a storage-ready
//! [`StorageRecord`]: PNG-encoded bytes and a JSON-encoded metadata map.
//! Serialization never touches a connection.

use std::io::Cursor;

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};

use crate::error::{StoreError, StoreResult};
use crate::metadata::{parse_infotext, ParsedMetadata};

// =============================================================================
// StorageRecord
// =============================================================================

/// The unit written to a backend.
///
/// The graph sink replaces `image_png` with a content hash at write time;
/// every other sink stores both fields directly.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageRecord {
    /// JSON-encoded metadata map
    pub metadata_json: String,
    /// PNG-encoded image bytes
    pub image_png: Bytes,
}

impl StorageRecord {
    /// Size of the image payload in bytes.
    #[must_use]
    pub fn image_len(&self) -> usize {
        self.image_png.len()
    }
}

// =============================================================================
// Serialization
// =============================================================================

/// Encode an image as PNG.
///
/// # Errors
/// `StoreError::Serialization` when the encoder rejects the image.
pub fn encode_png(image: &DynamicImage) -> StoreResult<Bytes> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| StoreError::serialization(format!("png encoding failed: {e}")))?;

    let bytes = Bytes::from(buffer.into_inner());

    // Postcondition: PNG signature
    assert!(
        bytes.starts_with(&[0x89, b'P', b'N', b'G']),
        "encoder must produce a png stream"
    );

    Ok(bytes)
}

/// Serialize one image with its parsed infotext (preferred path).
///
/// # Errors
/// `StoreError::Serialization` when the infotext is malformed or the image
/// cannot be encoded.
pub fn serialize(image: &DynamicImage, info_text: &str) -> StoreResult<StorageRecord> {
    let metadata = parse_infotext(info_text)?;
    serialize_with_metadata(image, &metadata)
}

/// Serialize one image with an already-built metadata map (legacy path).
///
/// # Errors
/// `StoreError::Serialization` when encoding fails.
pub fn serialize_with_metadata(
    image: &DynamicImage,
    metadata: &ParsedMetadata,
) -> StoreResult<StorageRecord> {
    Ok(StorageRecord {
        metadata_json: metadata.to_json()?,
        image_png: encode_png(image)?,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const INFOTEXT: &str = "a lighthouse\nSteps: 20, Sampler: Euler a, CFG scale: 7, \
                            Seed: 42, Size: 64x64, Model hash: abc, Model: m";

    fn tiny_image() -> DynamicImage {
        let mut img = image::RgbaImage::new(2, 2);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 1, image::Rgba([0, 0, 255, 255]));
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn test_serialize_produces_png_and_json() {
        let record = serialize(&tiny_image(), INFOTEXT).unwrap();

        assert!(record.image_png.starts_with(&[0x89, b'P', b'N', b'G']));
        let json: serde_json::Value = serde_json::from_str(&record.metadata_json).unwrap();
        assert_eq!(json["seed"], 42);
        assert_eq!(json["prompt"], "a lighthouse");
    }

    #[test]
    fn test_serialize_is_deterministic() {
        let a = serialize(&tiny_image(), INFOTEXT).unwrap();
        let b = serialize(&tiny_image(), INFOTEXT).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_png_roundtrip_preserves_pixels() {
        let original = tiny_image();
        let record = serialize(&original, INFOTEXT).unwrap();

        let decoded = image::load_from_memory(&record.image_png).unwrap();
        assert_eq!(decoded.to_rgba8().as_raw(), original.to_rgba8().as_raw());
    }

    #[test]
    fn test_malformed_infotext_fails() {
        let err = serialize(&tiny_image(), "no parameters here").unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }
}
