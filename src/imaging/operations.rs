//! High-level image operations.
//!
//! These functions combine calculations with backend execution. They take
//! configuration, compute parameters, and call the backend.
//!
//! For every source image two derivatives are produced:
//!
//! ```text
//! album/
//! ├── lowres/
//! │   └── dawn.webp      # thumbnail (fixed width or height)
//! └── dawn.webp          # capped original, replaces dawn.jpg
//! ```

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{SizingDirective, calculate_scaled_size};
use super::params::{EncodeFormat, Quality, ResizeParams};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// How the two derivatives of a source image are sized and encoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivativeConfig {
    /// Bound for the thumbnail written into the thumbnail directory.
    pub thumbnail: SizingDirective,
    /// Bound for the high-resolution copy that replaces the source.
    pub original: SizingDirective,
    /// Output format for both derivatives.
    pub format: EncodeFormat,
    /// Lossy quality (used by WebP; JPEG quality is fixed).
    pub quality: Quality,
}

impl Default for DerivativeConfig {
    fn default() -> Self {
        Self {
            thumbnail: SizingDirective::TargetWidth(300),
            original: SizingDirective::ShortestSide(1000),
            format: EncodeFormat::WebP,
            quality: Quality::default(),
        }
    }
}

/// What was written for one source image.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Derivatives {
    pub source: PathBuf,
    pub source_size: Dimensions,
    pub thumbnail: PathBuf,
    pub thumbnail_size: Dimensions,
    /// The capped original (replaces `source`).
    pub output: PathBuf,
    pub output_size: Dimensions,
    /// Whether `source` was deleted after `output` was written.
    pub source_removed: bool,
}

/// Both resize operations for one image, computed but not executed.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivativePlan {
    pub thumbnail: ResizeParams,
    pub original: ResizeParams,
}

/// `<thumbnail_dir>/<stem>.<ext>` for the configured output format.
pub fn thumbnail_path(source: &Path, thumbnail_dir: &Path, format: EncodeFormat) -> PathBuf {
    let mut name = source
        .file_stem()
        .unwrap_or(source.as_os_str())
        .to_os_string();
    name.push(".");
    name.push(format.extension());
    thumbnail_dir.join(name)
}

/// The source path with its extension swapped for the output format's.
pub fn replacement_path(source: &Path, format: EncodeFormat) -> PathBuf {
    source.with_extension(format.extension())
}

/// Plan the thumbnail and capped-original operations without executing them.
pub fn plan_derivatives(
    source: &Path,
    source_size: Dimensions,
    thumbnail_dir: &Path,
    config: &DerivativeConfig,
) -> DerivativePlan {
    let thumb = calculate_scaled_size(source_size.width, source_size.height, config.thumbnail);
    let capped = calculate_scaled_size(source_size.width, source_size.height, config.original);

    let params = |output: PathBuf, size: Dimensions| ResizeParams {
        source: source.to_path_buf(),
        output,
        width: size.width,
        height: size.height,
        format: Some(config.format),
        quality: config.quality,
    };

    DerivativePlan {
        thumbnail: params(thumbnail_path(source, thumbnail_dir, config.format), thumb),
        original: params(replacement_path(source, config.format), capped),
    }
}

/// Create the thumbnail and the capped original for `source`, then remove
/// `source` if the capped original was written under a different name.
///
/// Re-running on an already converted file is safe: the destination equals
/// the source, so nothing is deleted.
pub fn create_derivatives(
    backend: &impl ImageBackend,
    source: &Path,
    thumbnail_dir: &Path,
    config: &DerivativeConfig,
) -> Result<Derivatives> {
    if source.file_stem().is_none() {
        return Err(BackendError::UnsupportedFormat(source.to_path_buf()));
    }

    let source_size = backend.identify(source)?;
    let plan = plan_derivatives(source, source_size, thumbnail_dir, config);

    backend.resize(&plan.thumbnail)?;
    backend.resize(&plan.original)?;

    let output = plan.original.output;
    let source_removed = if output != source && source.exists() && !same_file(source, &output) {
        std::fs::remove_file(source)?;
        true
    } else {
        false
    };
    debug!(
        source = %source.display(),
        output = %output.display(),
        source_removed,
        "derivatives written"
    );

    Ok(Derivatives {
        source: source.to_path_buf(),
        source_size,
        thumbnail: plan.thumbnail.output,
        thumbnail_size: Dimensions {
            width: plan.thumbnail.width,
            height: plan.thumbnail.height,
        },
        output,
        output_size: Dimensions {
            width: plan.original.width,
            height: plan.original.height,
        },
        source_removed,
    })
}

/// Whether two paths name the same file on disk.
///
/// Guards case-insensitive filesystems, where `a.WEBP` and `a.webp` differ
/// as paths but deleting one deletes the freshly written other.
#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}
