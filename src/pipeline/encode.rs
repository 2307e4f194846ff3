//! Bitmap encoding and payload decoding.
//!
//! Rendered pages are encoded as JPEG (lossy, quality from config) or PNG
//! (lossless). JPEG has no alpha channel, so bitmaps are flattened to RGB
//! before encoding. Backend page lists arrive as base64, optionally wrapped
//! in a `data:` URI; [`decode_base64`] accepts both.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

/// Target encoding of a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// Lossy.
    #[default]
    Jpeg,
    /// Lossless.
    Png,
}

impl ImageKind {
    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }

    /// Parse the `format` parameter value (`jpeg`, `jpg`, `png`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            _ => None,
        }
    }
}

/// Encode a rendered page.
pub fn encode_bitmap(
    img: &DynamicImage,
    kind: ImageKind,
    jpeg_quality: u8,
) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    match kind {
        ImageKind::Png => {
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        }
        ImageKind::Jpeg => {
            let rgb = img.to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality.clamp(1, 100));
            rgb.write_with_encoder(encoder)?;
        }
    }
    debug!(
        "Encoded {}x{} bitmap → {} bytes {:?}",
        img.width(),
        img.height(),
        buf.len(),
        kind
    );
    Ok(buf)
}

/// Decode a base64 payload, stripping a `data:<mime>;base64,` prefix if present.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let body = match payload.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload,
    };
    let cleaned: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(cleaned)
}

/// What a decoded payload turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sniffed {
    Pdf,
    Image(ImageFormat),
    Unknown,
}

impl Sniffed {
    pub fn is_image(self) -> bool {
        matches!(self, Sniffed::Image(_))
    }

    /// File extension for an entry of this kind.
    pub fn extension(self) -> &'static str {
        match self {
            Sniffed::Pdf => "pdf",
            Sniffed::Image(f) => f.extensions_str().first().copied().unwrap_or("img"),
            Sniffed::Unknown => "bin",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Sniffed::Pdf => "application/pdf",
            Sniffed::Image(f) => f.to_mime_type(),
            Sniffed::Unknown => "application/octet-stream",
        }
    }
}

/// Identify bytes by their magic number.
pub fn sniff(bytes: &[u8]) -> Sniffed {
    if bytes.starts_with(b"%PDF") {
        return Sniffed::Pdf;
    }
    match image::guess_format(bytes) {
        Ok(f) => Sniffed::Image(f),
        Err(_) => Sniffed::Unknown,
    }
}

/// `true` when `name` has an image extension.
pub fn is_image_name(name: &str) -> bool {
    ImageFormat::from_path(name).is_ok()
}
