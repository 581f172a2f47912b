//! Gallery processing driver.
//!
//! Takes a gallery root and a resolved [`GalleryConfig`], and for every source
//! image writes a thumbnail and replaces the original with a size-capped copy.
//!
//! ## Run Order
//!
//! 1. Missing root → [`ProcessError::MissingRoot`], nothing touched.
//! 2. Thumbnail directories are prepared: created if absent, and every regular
//!    file directly inside deleted. A flat layout prepares `root/<thumb_dir>`
//!    before enumeration; a recursive layout prepares `<dir>/<thumb_dir>` for
//!    each directory holding at least one source image, once, before any image
//!    is built.
//! 3. Images are built in enumeration order, one [`ProcessEvent`] each.
//!
//! ## Output Structure
//!
//! ```text
//! pics/                          pics/
//! ├── 2023/                      ├── 2023/
//! │   ├── fjord.jpg      ──►     │   ├── lowres/
//! │   └── glacier.png            │   │   ├── fjord.webp     # thumbnail
//! └── cover.gif                  │   │   └── glacier.webp
//!                                │   ├── fjord.webp         # capped original
//!                                │   └── glacier.webp
//!                                ├── lowres/
//!                                │   └── cover.webp
//!                                └── cover.webp
//! ```
//!
//! ## Parallel Processing
//!
//! With `processing.max_processes` above one, images run on a dedicated
//! [rayon](https://docs.rs/rayon) pool. Images that would write the same
//! capped original (`a.jpg` and `a.png`) are grouped onto one worker and run
//! in enumeration order, so their writes never interleave.

use crate::config::{GalleryConfig, LayoutConfig, effective_threads};
use crate::imaging::{
    BackendError, DerivativeConfig, DerivativePlan, Derivatives, Dimensions, ImageBackend,
    RustBackend, create_derivatives, plan_derivatives, replacement_path,
};
use crate::scan::{ScanError, collect_image_paths};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Expected directory {} does not exist.", .0.display())]
    MissingRoot(PathBuf),
    #[error("Failed to process {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
}

/// Where sources live and where their thumbnails go.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryLayout {
    pub root: PathBuf,
    /// Thumbnail directory name (a single path component).
    pub thumbnail_dir: String,
    pub recursive: bool,
    /// Directory names pruned from a recursive walk, any case.
    pub exclude_dirs: Vec<String>,
}

impl GalleryLayout {
    pub fn new(root: &Path, config: &LayoutConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            thumbnail_dir: config.thumbnail_dir.clone(),
            recursive: config.recursive,
            exclude_dirs: config.exclude_dirs.clone(),
        }
    }

    /// Thumbnail directory for one source image.
    pub fn thumbnail_dir_for(&self, source: &Path) -> PathBuf {
        if self.recursive {
            source
                .parent()
                .unwrap_or(&self.root)
                .join(&self.thumbnail_dir)
        } else {
            self.root.join(&self.thumbnail_dir)
        }
    }

    /// All source images, in enumeration order.
    pub fn image_paths(&self) -> Result<Vec<PathBuf>, ScanError> {
        collect_image_paths(&self.root, self.recursive, &self.exclude_dirs)
    }

    /// Thumbnail directories for `images`, each once, in first-seen order.
    pub fn thumbnail_dirs(&self, images: &[PathBuf]) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        images
            .iter()
            .map(|source| self.thumbnail_dir_for(source))
            .filter(|dir| seen.insert(dir.clone()))
            .collect()
    }
}

/// Progress events emitted while a gallery is processed.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// Enumeration finished; `image_count` images will be built.
    Started { root: PathBuf, image_count: usize },
    /// Enumeration found nothing to do.
    NoImages,
    /// One image done. `path` is the capped original relative to the root.
    ImageProcessed {
        path: PathBuf,
        derivatives: Derivatives,
    },
    /// One image failed and was left in place. `path` is relative to the root.
    ImageFailed { path: PathBuf, error: String },
}

/// An image that could not be converted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageFailure {
    pub source: PathBuf,
    pub error: String,
}

/// Result of a processing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessSummary {
    pub root: PathBuf,
    /// Number of source images enumerated.
    pub found: usize,
    /// Thumbnail directories prepared during the run.
    pub thumbnail_dirs: Vec<PathBuf>,
    /// Converted images, in enumeration order.
    pub processed: Vec<Derivatives>,
    /// Images that failed, in enumeration order.
    pub failures: Vec<ImageFailure>,
}

impl ProcessSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One image's planned derivatives, computed without writing anything.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedImage {
    pub source: PathBuf,
    pub source_size: Dimensions,
    pub plan: DerivativePlan,
}

/// Dry-run result for a gallery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckReport {
    pub root: PathBuf,
    /// Thumbnail directories a run would prepare.
    pub thumbnail_dirs: Vec<PathBuf>,
    pub planned: Vec<PlannedImage>,
    /// Images that could not be decoded.
    pub failures: Vec<ImageFailure>,
}

/// Process a gallery with the production backend.
pub fn process(
    config: &GalleryConfig,
    root: &Path,
    events: Option<Sender<ProcessEvent>>,
) -> Result<ProcessSummary, ProcessError> {
    let backend = RustBackend::new();
    process_with_backend(&backend, config, root, events)
}

/// Process a gallery using a specific backend (allows testing with mock).
pub fn process_with_backend(
    backend: &impl ImageBackend,
    config: &GalleryConfig,
    root: &Path,
    events: Option<Sender<ProcessEvent>>,
) -> Result<ProcessSummary, ProcessError> {
    if !root.is_dir() {
        return Err(ProcessError::MissingRoot(root.to_path_buf()));
    }
    config.validate()?;
    let derivative_config = config.derivative_config()?;
    let layout = GalleryLayout::new(root, &config.layout);
    info!(root = %root.display(), recursive = layout.recursive, "processing gallery");

    let mut summary = ProcessSummary {
        root: root.to_path_buf(),
        ..ProcessSummary::default()
    };

    // A flat layout gets its thumbnail directory before the walk, so it
    // exists even when the walk finds nothing.
    if !layout.recursive {
        let dir = layout.root.join(&layout.thumbnail_dir);
        prepare_thumbnail_dir(&dir)?;
        summary.thumbnail_dirs.push(dir);
    }

    let images = layout.image_paths()?;
    summary.found = images.len();

    if layout.recursive {
        for dir in layout.thumbnail_dirs(&images) {
            prepare_thumbnail_dir(&dir)?;
            summary.thumbnail_dirs.push(dir);
        }
    }

    if images.is_empty() {
        emit(&events, ProcessEvent::NoImages);
        return Ok(summary);
    }
    emit(
        &events,
        ProcessEvent::Started {
            root: root.to_path_buf(),
            image_count: images.len(),
        },
    );

    let threads = effective_threads(&config.processing);
    let fail_fast = config.processing.fail_fast;
    let outcomes = if threads > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()?;
        pool.install(|| {
            build_grouped(backend, &layout, &images, &derivative_config, fail_fast, &events)
        })
    } else {
        build_sequential(backend, &layout, &images, &derivative_config, fail_fast, &events)
    };

    for (source, outcome) in outcomes {
        match outcome {
            Ok(derivatives) => summary.processed.push(derivatives),
            Err(source_err) if fail_fast => {
                return Err(ProcessError::Image {
                    path: source,
                    source: source_err,
                });
            }
            Err(e) => summary.failures.push(ImageFailure {
                source,
                error: e.to_string(),
            }),
        }
    }

    info!(
        processed = summary.processed.len(),
        failed = summary.failures.len(),
        "gallery done"
    );
    Ok(summary)
}

type Outcome = (PathBuf, Result<Derivatives, BackendError>);

fn build_sequential(
    backend: &impl ImageBackend,
    layout: &GalleryLayout,
    images: &[PathBuf],
    config: &DerivativeConfig,
    fail_fast: bool,
    events: &Option<Sender<ProcessEvent>>,
) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(images.len());
    for source in images {
        let outcome = build_one(backend, layout, source, config, fail_fast, events);
        let failed = outcome.is_err();
        outcomes.push((source.clone(), outcome));
        if failed && fail_fast {
            break;
        }
    }
    outcomes
}

fn build_grouped(
    backend: &impl ImageBackend,
    layout: &GalleryLayout,
    images: &[PathBuf],
    config: &DerivativeConfig,
    fail_fast: bool,
    events: &Option<Sender<ProcessEvent>>,
) -> Vec<Outcome> {
    let halted = AtomicBool::new(false);
    let mut indexed: Vec<(usize, Outcome)> = group_by_destination(images, config)
        .into_par_iter()
        .map_with(events.clone(), |events, group| {
            let mut done = Vec::with_capacity(group.len());
            for index in group {
                if fail_fast && halted.load(Ordering::Relaxed) {
                    break;
                }
                let source = &images[index];
                let outcome = build_one(backend, layout, source, config, fail_fast, events);
                if outcome.is_err() {
                    halted.store(true, Ordering::Relaxed);
                }
                done.push((index, (source.clone(), outcome)));
            }
            done
        })
        .flatten()
        .collect();

    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, outcome)| outcome).collect()
}

/// Indices of `images` grouped by capped-original destination. Groups keep
/// enumeration order internally and are ordered by their first member.
fn group_by_destination(images: &[PathBuf], config: &DerivativeConfig) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut by_destination: HashMap<PathBuf, usize> = HashMap::new();
    for (index, source) in images.iter().enumerate() {
        let destination = replacement_path(source, config.format);
        match by_destination.get(&destination) {
            Some(&group) => groups[group].push(index),
            None => {
                by_destination.insert(destination, groups.len());
                groups.push(vec![index]);
            }
        }
    }
    groups
}

fn build_one(
    backend: &impl ImageBackend,
    layout: &GalleryLayout,
    source: &Path,
    config: &DerivativeConfig,
    fail_fast: bool,
    events: &Option<Sender<ProcessEvent>>,
) -> Result<Derivatives, BackendError> {
    let thumbnail_dir = layout.thumbnail_dir_for(source);
    match create_derivatives(backend, source, &thumbnail_dir, config) {
        Ok(derivatives) => {
            emit(
                events,
                ProcessEvent::ImageProcessed {
                    path: relative_to(&derivatives.output, &layout.root),
                    derivatives: derivatives.clone(),
                },
            );
            Ok(derivatives)
        }
        Err(e) => {
            debug!(source = %source.display(), error = %e, "image failed");
            if !fail_fast {
                emit(
                    events,
                    ProcessEvent::ImageFailed {
                        path: relative_to(source, &layout.root),
                        error: e.to_string(),
                    },
                );
            }
            Err(e)
        }
    }
}

/// Plan every image's derivatives without writing anything.
///
/// Sources are fully decoded so the reported sizes are exact. Thumbnail
/// directories are listed, not created.
pub fn check_with_backend(
    backend: &impl ImageBackend,
    config: &GalleryConfig,
    root: &Path,
) -> Result<CheckReport, ProcessError> {
    if !root.is_dir() {
        return Err(ProcessError::MissingRoot(root.to_path_buf()));
    }
    config.validate()?;
    let derivative_config = config.derivative_config()?;
    let layout = GalleryLayout::new(root, &config.layout);
    let images = layout.image_paths()?;

    let thumbnail_dirs = if layout.recursive {
        layout.thumbnail_dirs(&images)
    } else {
        vec![layout.root.join(&layout.thumbnail_dir)]
    };

    let mut report = CheckReport {
        root: root.to_path_buf(),
        thumbnail_dirs,
        ..CheckReport::default()
    };
    for source in images {
        match backend.identify(&source) {
            Ok(size) => {
                let plan = plan_derivatives(
                    &source,
                    size,
                    &layout.thumbnail_dir_for(&source),
                    &derivative_config,
                );
                report.planned.push(PlannedImage {
                    source,
                    source_size: size,
                    plan,
                });
            }
            Err(e) => report.failures.push(ImageFailure {
                source,
                error: e.to_string(),
            }),
        }
    }
    Ok(report)
}

/// Dry run with the production backend.
pub fn check(config: &GalleryConfig, root: &Path) -> Result<CheckReport, ProcessError> {
    check_with_backend(&RustBackend::new(), config, root)
}

/// Create `dir` if needed and delete every regular file directly inside it.
///
/// Subdirectories and their contents are left alone. Returns the number of
/// files removed.
pub fn prepare_thumbnail_dir(dir: &Path) -> std::io::Result<usize> {
    std::fs::create_dir_all(dir)?;
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    debug!(dir = %dir.display(), removed, "thumbnail directory prepared");
    Ok(removed)
}

/// `path` relative to `root`, or `path` unchanged when it lies elsewhere.
pub fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

fn emit(events: &Option<Sender<ProcessEvent>>, event: ProcessEvent) {
    if let Some(tx) = events {
        tx.send(event).ok();
    }
}
