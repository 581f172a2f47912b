//! Image processing: sizing math, format selection, and the codec backend.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | full decode via `image::ImageReader`, tolerant per-codec fallback |
//! | **Resize** | `resize_exact` with Lanczos3 |
//! | **Encode** | libwebp (`webp`), mozjpeg, `image` for PNG/GIF |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Encoding**: Output format resolution and encoder settings
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod encoding;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{SizingDirective, SizingError, SizingOptions, calculate_scaled_size};
pub use encoding::{encode_params, prepare_for_encoding, select_encoding};
pub use operations::{
    DerivativeConfig, DerivativePlan, Derivatives, create_derivatives,
    plan_derivatives, replacement_path, thumbnail_path,
};
pub use params::{
    EncodeFormat, EncodeParams, Quality, ResizeParams, SUPPORTED_EXTENSIONS, is_supported_image,
};
pub use rust_backend::RustBackend;
