use std::fs;
use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};

use crate::error::IoError;

pub const JPEG_QUALITY: u8 = 92;

pub fn decode(path: &Path) -> Result<RgbaImage, IoError> {
    let img = image::open(path).map_err(|source| IoError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_rgba8())
}

pub fn encode_png_fast(img: &RgbaImage) -> Result<Vec<u8>, IoError> {
    let mut buffer = Vec::new();
    let cursor = Cursor::new(&mut buffer);
    let encoder = PngEncoder::new_with_quality(cursor, CompressionType::Fast, FilterType::NoFilter);
    encoder
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(IoError::Encode)?;
    Ok(buffer)
}

/// JPEG has no alpha; the image is flattened to RGB first.
pub fn encode_jpeg(img: &RgbaImage, quality: u8) -> Result<Vec<u8>, IoError> {
    let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(IoError::Encode)?;
    Ok(buffer)
}

/// Writes `img` in the format named by the extension (PNG unless it is
/// `.jpg`/`.jpeg`), creating parent directories as needed.
pub fn save(img: &RgbaImage, path: &Path) -> Result<(), IoError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let bytes = match ext.as_str() {
        "jpg" | "jpeg" => encode_jpeg(img, JPEG_QUALITY)?,
        _ => encode_png_fast(img)?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| IoError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, &bytes).map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })
}
