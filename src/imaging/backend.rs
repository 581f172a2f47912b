//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: identify (full decode → dimensions) and resize (decode, resample,
//! encode, write).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate with libwebp and mozjpeg encoders.

use super::params::ResizeParams;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("Failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
    #[error("Unsupported format for {0}")]
    UnsupportedFormat(PathBuf),
}

/// Pixel dimensions of an image. Both axes are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` so a single backend can be shared across rayon workers.
pub trait ImageBackend: Sync {
    /// Decode the image and report its native dimensions.
    ///
    /// Truncated files are decoded best-effort rather than rejected.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Produce one derivative: decode `source`, resample to the requested
    /// size (skipped when it already matches), encode and write `output`.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}
