//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! Scaling never enlarges: if the constrained axis already fits, the input
//! dimensions come back unchanged. Rounding is "nearest, ties away from zero"
//! (`f64::round`), and every computed axis is clamped to at least 1 px.

use super::backend::Dimensions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizingError {
    #[error("specify exactly one of target_height, target_width or shortest_side (got {0})")]
    FieldCount(usize),
    #[error("{0} must be a positive number of pixels")]
    Zero(&'static str),
}

/// How a derivative is bounded. Exactly one policy applies per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingDirective {
    /// Cap the height; width follows the aspect ratio.
    TargetHeight(u32),
    /// Cap the width; height follows the aspect ratio.
    TargetWidth(u32),
    /// Cap `min(width, height)`; both axes are rounded independently.
    ShortestSide(u32),
}

/// Loose form of a [`SizingDirective`] as it appears in `config.toml`.
///
/// ```toml
/// [thumbnails]
/// target_width = 300
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SizingOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortest_side: Option<u32>,
}

impl TryFrom<SizingOptions> for SizingDirective {
    type Error = SizingError;

    fn try_from(opts: SizingOptions) -> Result<Self, Self::Error> {
        let set = [opts.target_height, opts.target_width, opts.shortest_side]
            .iter()
            .filter(|v| v.is_some())
            .count();
        if set != 1 {
            return Err(SizingError::FieldCount(set));
        }

        match (opts.target_height, opts.target_width, opts.shortest_side) {
            (Some(0), _, _) => Err(SizingError::Zero("target_height")),
            (_, Some(0), _) => Err(SizingError::Zero("target_width")),
            (_, _, Some(0)) => Err(SizingError::Zero("shortest_side")),
            (Some(h), _, _) => Ok(Self::TargetHeight(h)),
            (_, Some(w), _) => Ok(Self::TargetWidth(w)),
            (_, _, Some(s)) => Ok(Self::ShortestSide(s)),
            (None, None, None) => Err(SizingError::FieldCount(0)),
        }
    }
}

impl From<SizingDirective> for SizingOptions {
    fn from(directive: SizingDirective) -> Self {
        match directive {
            SizingDirective::TargetHeight(h) => Self {
                target_height: Some(h),
                ..Self::default()
            },
            SizingDirective::TargetWidth(w) => Self {
                target_width: Some(w),
                ..Self::default()
            },
            SizingDirective::ShortestSide(s) => Self {
                shortest_side: Some(s),
                ..Self::default()
            },
        }
    }
}

fn scale_axis(value: u32, ratio: f64) -> u32 {
    ((value as f64 * ratio).round() as u32).max(1)
}

/// Calculate the size of a derivative under one sizing directive.
///
/// # Examples
/// ```
/// # use gallery_shrink::imaging::{Dimensions, SizingDirective, calculate_scaled_size};
/// // 4000x3000 capped to a 1000px shortest side
/// let d = calculate_scaled_size(4000, 3000, SizingDirective::ShortestSide(1000));
/// assert_eq!(d, Dimensions { width: 1333, height: 1000 });
///
/// // Already small enough: unchanged
/// let d = calculate_scaled_size(200, 100, SizingDirective::TargetWidth(300));
/// assert_eq!(d, Dimensions { width: 200, height: 100 });
/// ```
pub fn calculate_scaled_size(width: u32, height: u32, directive: SizingDirective) -> Dimensions {
    let unchanged = Dimensions { width, height };

    match directive {
        SizingDirective::TargetHeight(target) => {
            if height <= target {
                return unchanged;
            }
            let ratio = target as f64 / height as f64;
            Dimensions {
                width: scale_axis(width, ratio),
                height: target,
            }
        }
        SizingDirective::TargetWidth(target) => {
            if width <= target {
                return unchanged;
            }
            let ratio = target as f64 / width as f64;
            Dimensions {
                width: target,
                height: scale_axis(height, ratio),
            }
        }
        SizingDirective::ShortestSide(target) => {
            let shortest = width.min(height);
            if shortest <= target {
                return unchanged;
            }
            let ratio = target as f64 / shortest as f64;
            Dimensions {
                width: scale_axis(width, ratio),
                height: scale_axis(height, ratio),
            }
        }
    }
}
