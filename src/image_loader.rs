//! # Photo Loading
//!
//! Resolves photo sources (data URIs, file paths, raw base64) into image
//! data the PDF writer can embed. JPEG bytes pass through untouched and are
//! embedded with DCTDecode. PNG and WebP are decoded to RGB with a separate
//! alpha channel for the SMask.
//!
//! A photo that fails to load is not an export failure. The writer draws a
//! grey placeholder in its cell and the failure is reported alongside the
//! document.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

use thiserror::Error;

use crate::render::{ElementContent, Frame};

/// Why a photo could not be loaded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImageError {
    #[error("invalid data URI: missing comma")]
    InvalidDataUri,
    #[error("base64 decode error: {0}")]
    Base64(String),
    #[error("failed to read image file '{path}': {reason}")]
    Io { path: String, reason: String },
    #[error("file path images are not available here: '{0}'")]
    FileAccessUnavailable(String),
    #[error("image data too short")]
    TooShort,
    #[error("unsupported image format (expected JPEG, PNG or WebP)")]
    Unsupported,
    #[error("failed to decode image: {0}")]
    Decode(String),
}

/// A loaded image ready for embedding.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub pixel_data: ImagePixelData,
    pub width_px: u32,
    pub height_px: u32,
}

/// Pixel data in a form the PDF writer consumes directly.
#[derive(Debug, Clone)]
pub enum ImagePixelData {
    /// Raw JPEG bytes, embedded as-is.
    Jpeg {
        data: Vec<u8>,
        color_space: JpegColorSpace,
    },
    Decoded {
        /// width * height * 3 bytes (RGB)
        rgb: Vec<u8>,
        /// width * height bytes of alpha. None if fully opaque.
        alpha: Option<Vec<u8>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegColorSpace {
    DeviceRGB,
    DeviceGray,
}

/// Every distinct photo source in a set of frames, loaded once.
#[derive(Debug, Default)]
pub struct ImageCache {
    entries: BTreeMap<String, Result<Arc<LoadedImage>, ImageError>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the photos referenced by `frames`.
    pub fn for_frames(frames: &[Frame]) -> Self {
        let mut cache = Self::new();
        for element in frames.iter().flat_map(|f| &f.elements) {
            if let ElementContent::Photo { src, .. } = &element.content {
                cache.load(src);
            }
        }
        cache
    }

    /// Load `src` unless it is already cached.
    pub fn load(&mut self, src: &str) {
        if self.entries.contains_key(src) {
            return;
        }
        let result = load_image(src).map(Arc::new);
        if let Err(e) = &result {
            log::warn!("photo could not be loaded, using a placeholder: {}", e);
        }
        self.entries.insert(src.to_string(), result);
    }

    pub fn get(&self, src: &str) -> Option<&LoadedImage> {
        match self.entries.get(src) {
            Some(Ok(image)) => Some(image.as_ref()),
            _ => None,
        }
    }

    pub fn error(&self, src: &str) -> Option<&ImageError> {
        match self.entries.get(src) {
            Some(Err(e)) => Some(e),
            _ => None,
        }
    }
}

/// Load an image from a source string.
///
/// Supported `src` formats:
/// - `data:image/...;base64,...` data URIs
/// - File paths starting with `/`, `./` or `../`
/// - Raw base64-encoded image data
pub fn load_image(src: &str) -> Result<LoadedImage, ImageError> {
    let raw_bytes = read_source_bytes(src)?;
    decode_image_bytes(&raw_bytes)
}

/// Resolve the source string to raw image bytes.
fn read_source_bytes(src: &str) -> Result<Vec<u8>, ImageError> {
    if src.starts_with("data:image/") {
        let comma_pos = src.find(',').ok_or(ImageError::InvalidDataUri)?;
        return base64_decode(&src[comma_pos + 1..]);
    }

    // Only explicit path prefixes: base64 text can contain '/'
    if src.starts_with('/') || src.starts_with("./") || src.starts_with("../") {
        #[cfg(not(target_arch = "wasm32"))]
        {
            return std::fs::read(src).map_err(|e| ImageError::Io {
                path: src.to_string(),
                reason: e.to_string(),
            });
        }
        #[cfg(target_arch = "wasm32")]
        {
            return Err(ImageError::FileAccessUnavailable(src.to_string()));
        }
    }

    base64_decode(src)
}

fn base64_decode(input: &str) -> Result<Vec<u8>, ImageError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(input.trim())
        .map_err(|e| ImageError::Base64(e.to_string()))
}

/// Detect the format from magic bytes and decode accordingly.
fn decode_image_bytes(data: &[u8]) -> Result<LoadedImage, ImageError> {
    if data.len() < 4 {
        return Err(ImageError::TooShort);
    }

    if is_jpeg(data) {
        decode_jpeg(data)
    } else if is_png(data) || is_webp(data) {
        decode_to_rgb(data)
    } else {
        Err(ImageError::Unsupported)
    }
}

fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8
}

fn is_png(data: &[u8]) -> bool {
    data.len() >= 4 && data[0] == 0x89 && data[1] == 0x50 && data[2] == 0x4E && data[3] == 0x47
}

fn is_webp(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

/// JPEG: read dimensions and color space without decoding pixels.
fn decode_jpeg(data: &[u8]) -> Result<LoadedImage, ImageError> {
    let reader = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageError::Decode(e.to_string()))?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ImageError::Decode(e.to_string()))?;

    let color_space = detect_jpeg_color_space(data);

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Jpeg {
            data: data.to_vec(),
            color_space,
        },
        width_px: width,
        height_px: height,
    })
}

/// Read the component count from the SOF segment.
fn detect_jpeg_color_space(data: &[u8]) -> JpegColorSpace {
    let mut i = 2; // skip SOI marker (FF D8)
    while i + 1 < data.len() {
        if data[i] != 0xFF {
            break;
        }
        let marker = data[i + 1];
        // SOF markers: C0-C3, C5-C7, C9-CB, CD-CF
        let is_sof = matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF);
        if is_sof {
            // SOF segment: length(2) + precision(1) + height(2) + width(2) + num_components(1)
            if i + 9 < data.len() {
                let num_components = data[i + 9];
                return if num_components == 1 {
                    JpegColorSpace::DeviceGray
                } else {
                    JpegColorSpace::DeviceRGB
                };
            }
        }
        // Skip to next marker
        if i + 3 < data.len() {
            let seg_len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
            i += 2 + seg_len;
        } else {
            break;
        }
    }
    JpegColorSpace::DeviceRGB
}

/// PNG and WebP: decode to RGBA, split into RGB + alpha.
fn decode_to_rgb(data: &[u8]) -> Result<LoadedImage, ImageError> {
    let img = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| ImageError::Decode(e.to_string()))?;

    let rgba = img.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();

    let pixel_count = (width * height) as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    let mut has_transparency = false;

    for pixel in rgba.pixels() {
        rgb.push(pixel[0]);
        rgb.push(pixel[1]);
        rgb.push(pixel[2]);
        let a = pixel[3];
        alpha.push(a);
        if a != 255 {
            has_transparency = true;
        }
    }

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Decoded {
            rgb,
            alpha: if has_transparency { Some(alpha) } else { None },
        },
        width_px: width,
        height_px: height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_jpeg() {
        assert!(is_jpeg(&[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(!is_jpeg(&[0x89, 0x50, 0x4E, 0x47]));
        assert!(!is_jpeg(&[0xFF]));
    }

    #[test]
    fn test_is_png() {
        assert!(is_png(&[0x89, 0x50, 0x4E, 0x47]));
        assert!(!is_png(&[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(!is_png(&[0x89, 0x50]));
    }

    #[test]
    fn test_is_webp() {
        assert!(is_webp(b"RIFF\x10\x00\x00\x00WEBPVP8 "));
        assert!(!is_webp(b"RIFF\x10\x00\x00\x00WAVE"));
    }

    #[test]
    fn test_invalid_data_uri() {
        assert_eq!(
            load_image("data:image/png;base64").unwrap_err(),
            ImageError::InvalidDataUri
        );
    }

    #[test]
    fn test_too_short_data() {
        assert_eq!(
            decode_image_bytes(&[0x00, 0x01]).unwrap_err(),
            ImageError::TooShort
        );
    }

    #[test]
    fn test_unsupported_format() {
        assert_eq!(
            decode_image_bytes(&[0x00, 0x01, 0x02, 0x03, 0x04]).unwrap_err(),
            ImageError::Unsupported
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            load_image("./no/such/site-photo.jpg"),
            Err(ImageError::Io { .. })
        ));
    }

    #[test]
    fn test_cache_loads_each_source_once() {
        let mut cache = ImageCache::new();
        cache.load("not base64 at all!");
        cache.load("not base64 at all!");
        assert_eq!(cache.entries.len(), 1);
        assert!(cache.get("not base64 at all!").is_none());
        assert!(matches!(
            cache.error("not base64 at all!"),
            Some(ImageError::Base64(_))
        ));
    }

    #[test]
    fn test_decode_minimal_png() {
        let mut img = image::RgbaImage::new(1, 1);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));

        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), 1, 1, image::ColorType::Rgba8)
            .unwrap();

        let loaded = decode_image_bytes(&buf).unwrap();
        assert_eq!(loaded.width_px, 1);
        assert_eq!(loaded.height_px, 1);
        match &loaded.pixel_data {
            ImagePixelData::Decoded { rgb, alpha } => {
                assert_eq!(rgb, &[255, 0, 0]);
                assert!(alpha.is_none(), "Fully opaque should have no alpha");
            }
            _ => panic!("PNG should decode to pixels"),
        }
    }

    #[test]
    fn test_decode_png_with_alpha() {
        let mut img = image::RgbaImage::new(1, 1);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 128]));

        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), 1, 1, image::ColorType::Rgba8)
            .unwrap();

        let loaded = decode_image_bytes(&buf).unwrap();
        match &loaded.pixel_data {
            ImagePixelData::Decoded { rgb, alpha } => {
                assert_eq!(rgb, &[255, 0, 0]);
                assert_eq!(alpha.as_ref().unwrap(), &[128]);
            }
            _ => panic!("PNG should decode to pixels"),
        }
    }

    #[test]
    fn test_decode_minimal_jpeg() {
        let img = image::RgbImage::from_fn(2, 2, |_, _| image::Rgb([0, 128, 255]));

        let mut buf = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), 2, 2, image::ColorType::Rgb8)
            .unwrap();

        let loaded = decode_image_bytes(&buf).unwrap();
        assert_eq!(loaded.width_px, 2);
        assert_eq!(loaded.height_px, 2);
        match &loaded.pixel_data {
            ImagePixelData::Jpeg { data, color_space } => {
                assert!(data.starts_with(&[0xFF, 0xD8]));
                assert!(matches!(color_space, JpegColorSpace::DeviceRGB));
            }
            _ => panic!("JPEG should stay as Jpeg variant"),
        }
    }

    #[test]
    fn test_base64_data_uri() {
        let mut img = image::RgbaImage::new(1, 1);
        img.put_pixel(0, 0, image::Rgba([0, 255, 0, 255]));

        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), 1, 1, image::ColorType::Rgba8)
            .unwrap();

        use base64::Engine;
        let b64 = base64::engine::general_purpose::STANDARD.encode(&buf);
        let data_uri = format!("data:image/png;base64,{}", b64);

        let loaded = load_image(&data_uri).unwrap();
        assert_eq!(loaded.width_px, 1);
        assert_eq!(loaded.height_px, 1);
    }
}
