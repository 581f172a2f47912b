//! Output format resolution and per-format encoder settings.
//!
//! Resolution order for a derivative's format:
//!
//! 1. the explicit override (the configured output format),
//! 2. the format implied by the destination's extension,
//! 3. the format the source was decoded from.
//!
//! JPEG settings are fixed (quality 85, optimized Huffman tables,
//! progressive scans). WebP uses the caller's quality at maximum compression
//! effort with inexact transparent pixels. PNG and GIF use encoder defaults.

use super::backend::BackendError;
use super::params::{EncodeFormat, EncodeParams, Quality};
use image::DynamicImage;
use std::path::Path;

pub const JPEG_QUALITY: u8 = 85;
pub const WEBP_METHOD: i32 = 6;

/// Resolve the output format for `target` and the encoder settings to use.
pub fn select_encoding(
    source_format: Option<EncodeFormat>,
    target: &Path,
    forced: Option<EncodeFormat>,
    webp_quality: Quality,
) -> Result<(EncodeFormat, EncodeParams), BackendError> {
    let format = forced
        .or_else(|| EncodeFormat::from_path(target))
        .or(source_format)
        .ok_or_else(|| BackendError::UnsupportedFormat(target.to_path_buf()))?;

    Ok((format, encode_params(format, webp_quality)))
}

/// Encoder settings for a resolved format.
pub fn encode_params(format: EncodeFormat, webp_quality: Quality) -> EncodeParams {
    match format {
        EncodeFormat::Jpeg => EncodeParams::Jpeg {
            quality: JPEG_QUALITY,
            optimize: true,
            progressive: true,
        },
        EncodeFormat::WebP => EncodeParams::WebP {
            quality: webp_quality.value() as f32,
            method: WEBP_METHOD,
            exact: false,
        },
        EncodeFormat::Png => EncodeParams::Png,
        EncodeFormat::Gif => EncodeParams::Gif,
    }
}

/// Convert the pixel buffer into a color mode the encoder accepts.
///
/// JPEG has no alpha or 16-bit path: anything other than 8-bit RGB or
/// grayscale is flattened to RGB8 (alpha is dropped). Other formats pass
/// through untouched.
pub fn prepare_for_encoding(img: DynamicImage, format: EncodeFormat) -> DynamicImage {
    match (format, img) {
        (EncodeFormat::Jpeg, img @ (DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_))) => {
            img
        }
        (EncodeFormat::Jpeg, img) => DynamicImage::ImageRgb8(img.to_rgb8()),
        (_, img) => img,
    }
}
