//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides which derivatives to create) and the
//! [`backend`](super::backend) (which does the actual pixel work). This
//! separation allows swapping backends (e.g. for testing with a mock) without
//! changing operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`EncodeFormat`]: The four output codecs and their fixed extension table.
//! - [`EncodeParams`]: Codec-specific encoder settings chosen by
//!   [`select_encoding`](super::encoding::select_encoding).
//! - [`ResizeParams`]: Everything needed to write one derivative: source, output
//!   path, target dimensions, forced format, quality.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Output codecs the pipeline can write.
///
/// Input extensions map onto these through a fixed, case-insensitive table:
///
/// | Extension | Format |
/// |---|---|
/// | `.jpg`, `.jpeg` | [`Jpeg`](Self::Jpeg) |
/// | `.png` | [`Png`](Self::Png) |
/// | `.gif` | [`Gif`](Self::Gif) |
/// | `.webp` | [`WebP`](Self::WebP) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeFormat {
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    Gif,
    #[serde(rename = "webp")]
    WebP,
}

/// Every extension the pipeline reads, lowercase, without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

impl EncodeFormat {
    /// Look up a format by file extension (no dot, any case).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Format implied by a path's extension, if it is one of ours.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Map a decoder-reported format onto ours.
    pub fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::Gif => Some(Self::Gif),
            image::ImageFormat::WebP => Some(Self::WebP),
            _ => None,
        }
    }

    /// Extension written for derivatives in this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }
}

impl fmt::Display for EncodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Gif => "GIF",
            Self::WebP => "WEBP",
        };
        f.write_str(name)
    }
}

/// Returns true if the path carries one of the supported image extensions.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
}

/// Encoder settings for one output format.
///
/// JPEG settings are fixed; WebP carries the caller's quality. PNG and GIF use
/// encoder defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EncodeParams {
    Jpeg {
        quality: u8,
        optimize: bool,
        progressive: bool,
    },
    WebP {
        quality: f32,
        /// libwebp effort level, 0 (fast) to 6 (slowest, smallest).
        method: i32,
        /// Keep RGB values under fully transparent pixels.
        exact: bool,
    },
    Png,
    Gif,
}

/// Parameters for one resize-and-encode operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Forced output format. `None` lets the output extension decide.
    pub format: Option<EncodeFormat>,
    pub quality: Quality,
}
