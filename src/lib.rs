//! # gallery-shrink
//!
//! Batch-convert image galleries into web-sized derivatives. For every source
//! image two files are written: a small thumbnail in a `lowres/` directory,
//! and a size-capped copy that replaces the original in place. Both are
//! re-encoded as WebP by default.
//!
//! Two layouts are supported out of the box:
//!
//! ```text
//! Albums (recursive)               Screenshots (flat)
//! pics/                            shots/
//! ├── 2023/                        ├── lowres/
//! │   ├── lowres/                  │   ├── login.webp   # 300 px tall
//! │   │   └── fjord.webp  # 300 w  │   └── editor.webp
//! │   └── fjord.webp               ├── login.webp
//! └── 2024/...                     └── editor.webp
//! ```
//!
//! In both, the replaced original is capped at a shortest side of 1000 px.
//!
//! # Pipeline
//!
//! ```text
//! 1. Config    config.toml   →  GalleryConfig    (preset defaults + overrides)
//! 2. Scan      gallery root  →  image paths      (sorted, thumbnail dirs pruned)
//! 3. Process   image paths   →  derivatives      (decode → resize → encode → write)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `config.toml` loading, preset defaults, merging, validation |
//! | [`scan`] | Walks the gallery root and yields supported image paths |
//! | [`imaging`] | Sizing math, output format selection, codec backend, derivative builder |
//! | [`process`] | Drives a run: prepares thumbnail directories, builds every image, reports progress |
//! | [`output`] | CLI output formatting for progress events, summaries, and dry runs |
//!
//! # Design Decisions
//!
//! ## Thumbnails Are a Cache
//!
//! Thumbnail directories are rebuilt from scratch on every run: each one is
//! emptied of regular files before any image is processed. Deleted or renamed
//! sources therefore never leave orphaned thumbnails behind.
//!
//! ## Reruns Are Safe
//!
//! After a run every source is a `.webp` whose capped copy has the same path,
//! so the next run re-encodes it in place and deletes nothing.
//!
//! ## Codec Behind a Trait
//!
//! All pixel work goes through [`imaging::ImageBackend`]. The production
//! [`imaging::RustBackend`] uses the `image` crate for decoding and
//! resampling, libwebp for WebP and mozjpeg for JPEG. Driver tests swap in a
//! mock that only records calls.

pub mod config;
pub mod imaging;
pub mod output;
pub mod process;
pub mod scan;

#[cfg(test)]
pub(crate) mod test_helpers;
