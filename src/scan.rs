//! Source image discovery.
//!
//! Walks a gallery root and yields every image with a supported extension
//! (`.jpg`, `.jpeg`, `.png`, `.gif`, `.webp`, any case). Two modes:
//!
//! ```text
//! Flat (screenshots)                Recursive (albums)
//! shots/                            pics/
//! ├── a.png        ✓                ├── 2023/
//! ├── b.JPG        ✓                │   ├── lowres/      ✗ pruned
//! ├── notes.txt    ✗                │   │   └── x.webp
//! └── old/         ✗ not entered    │   └── y.jpg        ✓
//!     └── c.png                     └── z.png            ✓
//! ```
//!
//! ## Ordering
//!
//! Entries within one directory are yielded sorted by file name. In recursive
//! mode the walk is depth-first, so a subdirectory's files appear at the
//! position of the subdirectory's name among its siblings.
//!
//! ## Exclusions
//!
//! In recursive mode any directory whose lowercased name is in the skip set
//! is pruned: never entered, nothing below it yielded. This keeps generated
//! thumbnail directories out of the next run's input.
//!
//! The returned iterator is lazy and reads the filesystem as it goes; calling
//! [`iter_image_paths`] again starts a fresh walk over the current state.

use crate::imaging::is_supported_image;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to read directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Lazily enumerate image files under `root`.
///
/// `skip_dirs` is matched case-insensitively against directory names and only
/// applies when `recursive` is set.
pub fn iter_image_paths<S: AsRef<str>>(
    root: &Path,
    recursive: bool,
    skip_dirs: &[S],
) -> impl Iterator<Item = Result<PathBuf, ScanError>> + use<S> {
    let skip: HashSet<String> = skip_dirs
        .iter()
        .map(|name| name.as_ref().to_lowercase())
        .collect();

    let walker = WalkDir::new(root).min_depth(1).sort_by_file_name();
    let walker = if recursive {
        walker
    } else {
        walker.max_depth(1)
    };

    walker
        .into_iter()
        .filter_entry(move |entry| !is_skipped(entry, &skip))
        .filter_map(|entry| match entry {
            Ok(entry) => {
                let path = entry.into_path();
                (!path.is_dir() && is_supported_image(&path)).then_some(Ok(path))
            }
            Err(e) => Some(Err(ScanError::from(e))),
        })
}

/// Collect every image under `root` up front.
pub fn collect_image_paths<S: AsRef<str>>(
    root: &Path,
    recursive: bool,
    skip_dirs: &[S],
) -> Result<Vec<PathBuf>, ScanError> {
    iter_image_paths(root, recursive, skip_dirs).collect()
}

fn is_skipped(entry: &DirEntry, skip: &HashSet<String>) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && skip.contains(&entry.file_name().to_string_lossy().to_lowercase())
}
