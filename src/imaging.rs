//! Canonical image encoding
//!
//! Clipboard images arrive in whatever format the source application
//! offered. Decoding and re-encoding them as RGBA8 PNG gives one byte
//! representation per picture, so hashing the result deduplicates images
//! that were copied through different encodings.

use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Decode any supported image format and re-encode it as RGBA8 PNG
/// Returns None if the bytes are not a decodable image
pub fn canonical_png(bytes: &[u8]) -> Option<Vec<u8>> {
    let decoded = match image::load_from_memory(bytes) {
        Ok(decoded) => decoded,
        Err(e) => {
            log::debug!("Clipboard image not decodable ({} bytes): {}", bytes.len(), e);
            return None;
        }
    };

    let rgba = DynamicImage::ImageRgba8(decoded.to_rgba8());
    let mut png = Vec::new();
    if let Err(e) = rgba.write_to(&mut Cursor::new(&mut png), ImageFormat::Png) {
        log::warn!("Failed to re-encode clipboard image as PNG: {}", e);
        return None;
    }

    Some(png)
}

/// Width and height of an encoded image, without decoding pixel data
pub fn dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
