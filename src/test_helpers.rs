//! Shared test utilities for the gallery-shrink test suite.
//!
//! Synthesizes small real images on disk so the codec paths run without
//! checked-in fixtures, plus a few filesystem shortcuts.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! create_test_jpeg(&tmp.path().join("album/photo.jpg"), 2000, 1500);
//! touch(&tmp.path().join("lowres/stale.webp"));
//!
//! assert_eq!(file_names(&tmp.path().join("album")), ["photo.jpg"]);
//! ```

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::path::Path;

// =========================================================================
// Filesystem shortcuts
// =========================================================================

/// Create an empty file, creating parent directories as needed.
pub fn touch(path: &Path) {
    ensure_parent(path);
    std::fs::write(path, b"").unwrap();
}

/// Sorted names of the regular files directly inside `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("cannot list {}: {e}", dir.display()))
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().unwrap().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
}

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

/// Write an RGB JPEG with a gradient fill.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    gradient(width, height)
        .save_with_format(path, ImageFormat::Jpeg)
        .unwrap();
}

/// Write an RGB PNG with a gradient fill.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    gradient(width, height)
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

/// Write an RGBA PNG whose alpha varies across the width.
pub fn create_test_rgba_png(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    RgbaImage::from_fn(width, height, |x, _| {
        Rgba([200, 40, 40, (x * 255 / width.max(1)) as u8])
    })
    .save_with_format(path, ImageFormat::Png)
    .unwrap();
}

/// Write an RGBA GIF with a gradient fill.
pub fn create_test_gif(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    DynamicImage::ImageRgb8(gradient(width, height))
        .to_rgba8()
        .save_with_format(path, ImageFormat::Gif)
        .unwrap();
}

/// Write a lossy WebP with a gradient fill through libwebp.
pub fn create_test_webp(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    let rgb = gradient(width, height);
    let encoded = webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode(80.0);
    std::fs::write(path, &*encoded).unwrap();
}

/// Keep only the first two thirds of a file, as a cut-off download would.
fn truncate(path: &Path) {
    let bytes = std::fs::read(path).unwrap();
    std::fs::write(path, &bytes[..bytes.len() * 2 / 3]).unwrap();
}

/// Write a JPEG and then cut it short, leaving a file that stops mid-scan.
pub fn create_truncated_jpeg(path: &Path, width: u32, height: u32) {
    create_test_jpeg(path, width, height);
    truncate(path);
}

/// Write a PNG and then cut it short inside its image data.
pub fn create_truncated_png(path: &Path, width: u32, height: u32) {
    create_test_png(path, width, height);
    truncate(path);
}

/// Write a GIF and then cut it short inside its frame data.
pub fn create_truncated_gif(path: &Path, width: u32, height: u32) {
    create_test_gif(path, width, height);
    truncate(path);
}

/// Write a WebP and then cut it short inside its bitstream.
pub fn create_truncated_webp(path: &Path, width: u32, height: u32) {
    create_test_webp(path, width, height);
    truncate(path);
}
