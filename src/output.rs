//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Process
//!
//! Progress goes to stdout, one line per converted image, with paths shown
//! relative to the gallery root:
//!
//! ```text
//! Found 3 images in shots
//! Processed a.webp
//! Processed c.webp
//! Converted 2 of 3 images (1 failed)
//! ```
//!
//! Failures go to stderr as they happen:
//!
//! ```text
//! Failed b.jpg: Failed to decode shots/b.jpg: ...
//! ```
//!
//! An empty gallery prints `No source images found.` and nothing else.
//!
//! ## Check
//!
//! ```text
//! Thumbnail directories
//!     2023/lowres/
//! Images
//!     001 2023/fjord.jpg (4000x3000)
//!         thumbnail → 2023/lowres/fjord.webp (300x225)
//!         original → 2023/fjord.webp (1333x1000)
//! Planned 1 image
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure and do no I/O.

use crate::imaging::Dimensions;
use crate::process::{CheckReport, ProcessEvent, ProcessSummary, relative_to};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 image`, `3 images`.
fn count(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

fn size(d: Dimensions) -> String {
    format!("{}x{}", d.width, d.height)
}

/// Display a path relative to `root` with forward slashes.
fn display_rel(path: &Path, root: &Path) -> String {
    relative_to(path, root)
        .to_string_lossy()
        .replace('\\', "/")
}

// ============================================================================
// Process output
// ============================================================================

/// Format a single process progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { root, image_count } => {
            vec![format!(
                "Found {} in {}",
                count(*image_count, "image"),
                root.display()
            )]
        }
        ProcessEvent::NoImages => vec!["No source images found.".to_string()],
        ProcessEvent::ImageProcessed { path, .. } => {
            vec![format!("Processed {}", path.to_string_lossy().replace('\\', "/"))]
        }
        ProcessEvent::ImageFailed { path, error } => {
            vec![format!(
                "Failed {}: {}",
                path.to_string_lossy().replace('\\', "/"),
                error
            )]
        }
    }
}

/// Whether an event's lines belong on stderr.
pub fn is_error_event(event: &ProcessEvent) -> bool {
    matches!(event, ProcessEvent::ImageFailed { .. })
}

/// Format the closing summary of a run. Empty for a run that found nothing,
/// since the `NoImages` event already said so.
pub fn format_summary(summary: &ProcessSummary) -> Vec<String> {
    if summary.found == 0 {
        return Vec::new();
    }
    let mut line = format!(
        "Converted {} of {}",
        summary.processed.len(),
        count(summary.found, "image")
    );
    if !summary.failures.is_empty() {
        line.push_str(&format!(" ({} failed)", summary.failures.len()));
    }
    vec![line]
}

/// Print the run summary to stdout.
pub fn print_summary(summary: &ProcessSummary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format a dry-run report: directories to prepare, then every image with
/// its planned derivative paths and sizes.
pub fn format_check_report(report: &CheckReport) -> Vec<String> {
    let root = report.root.as_path();
    let mut lines = Vec::new();

    lines.push("Thumbnail directories".to_string());
    for dir in &report.thumbnail_dirs {
        lines.push(format!("{}{}/", indent(1), display_rel(dir, root)));
    }

    if report.planned.is_empty() && report.failures.is_empty() {
        lines.push("No source images found.".to_string());
        return lines;
    }

    if !report.planned.is_empty() {
        lines.push("Images".to_string());
        for (i, image) in report.planned.iter().enumerate() {
            lines.push(format!(
                "{}{} {} ({})",
                indent(1),
                format_index(i + 1),
                display_rel(&image.source, root),
                size(image.source_size)
            ));
            for (label, params) in [
                ("thumbnail", &image.plan.thumbnail),
                ("original", &image.plan.original),
            ] {
                lines.push(format!(
                    "{}{} \u{2192} {} ({}x{})",
                    indent(2),
                    label,
                    display_rel(&params.output, root),
                    params.width,
                    params.height
                ));
            }
        }
    }

    if !report.failures.is_empty() {
        lines.push("Failed".to_string());
        for failure in &report.failures {
            lines.push(format!(
                "{}{}: {}",
                indent(1),
                display_rel(&failure.source, root),
                failure.error
            ));
        }
    }

    let mut total = format!("Planned {}", count(report.planned.len(), "image"));
    if !report.failures.is_empty() {
        total.push_str(&format!(", {} unreadable", report.failures.len()));
    }
    lines.push(total);
    lines
}

/// Print a dry-run report to stdout.
pub fn print_check_report(report: &CheckReport) {
    for line in format_check_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{DerivativeConfig, Derivatives, plan_derivatives};
    use crate::process::{ImageFailure, PlannedImage};
    use std::path::PathBuf;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    fn derivatives(output: &str) -> Derivatives {
        Derivatives {
            source: PathBuf::from("/g/a.jpg"),
            source_size: dims(10, 10),
            thumbnail: PathBuf::from("/g/lowres/a.webp"),
            thumbnail_size: dims(10, 10),
            output: PathBuf::from(output),
            output_size: dims(10, 10),
            source_removed: true,
        }
    }

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn count_pluralizes() {
        assert_eq!(count(0, "image"), "0 images");
        assert_eq!(count(1, "image"), "1 image");
        assert_eq!(count(2, "image"), "2 images");
    }

    #[test]
    fn processed_line_uses_relative_path() {
        let event = ProcessEvent::ImageProcessed {
            path: PathBuf::from("2023/fjord.webp"),
            derivatives: derivatives("/g/2023/fjord.webp"),
        };
        assert_eq!(format_process_event(&event), ["Processed 2023/fjord.webp"]);
        assert!(!is_error_event(&event));
    }

    #[test]
    fn no_images_line() {
        assert_eq!(
            format_process_event(&ProcessEvent::NoImages),
            ["No source images found."]
        );
    }

    #[test]
    fn started_line() {
        let event = ProcessEvent::Started {
            root: PathBuf::from("shots"),
            image_count: 3,
        };
        assert_eq!(format_process_event(&event), ["Found 3 images in shots"]);
    }

    #[test]
    fn failed_line_goes_to_stderr() {
        let event = ProcessEvent::ImageFailed {
            path: PathBuf::from("b.jpg"),
            error: "boom".to_string(),
        };
        assert_eq!(format_process_event(&event), ["Failed b.jpg: boom"]);
        assert!(is_error_event(&event));
    }

    #[test]
    fn summary_empty_run_is_silent() {
        assert!(format_summary(&ProcessSummary::default()).is_empty());
    }

    #[test]
    fn summary_counts() {
        let mut summary = ProcessSummary {
            root: PathBuf::from("/g"),
            found: 3,
            processed: vec![derivatives("/g/a.webp"), derivatives("/g/c.webp")],
            ..ProcessSummary::default()
        };
        assert_eq!(format_summary(&summary), ["Converted 2 of 3 images"]);

        summary.failures.push(ImageFailure {
            source: PathBuf::from("/g/b.jpg"),
            error: "boom".to_string(),
        });
        assert_eq!(
            format_summary(&summary),
            ["Converted 2 of 3 images (1 failed)"]
        );
    }

    #[test]
    fn check_report_lists_plans() {
        let root = PathBuf::from("/g");
        let source = root.join("2023/fjord.jpg");
        let plan = plan_derivatives(
            &source,
            dims(4000, 3000),
            &root.join("2023/lowres"),
            &DerivativeConfig::default(),
        );
        let report = CheckReport {
            root: root.clone(),
            thumbnail_dirs: vec![root.join("2023/lowres")],
            planned: vec![PlannedImage {
                source,
                source_size: dims(4000, 3000),
                plan,
            }],
            failures: vec![ImageFailure {
                source: root.join("2023/broken.png"),
                error: "bad data".to_string(),
            }],
        };

        assert_eq!(
            format_check_report(&report),
            [
                "Thumbnail directories",
                "    2023/lowres/",
                "Images",
                "    001 2023/fjord.jpg (4000x3000)",
                "        thumbnail \u{2192} 2023/lowres/fjord.webp (300x225)",
                "        original \u{2192} 2023/fjord.webp (1333x1000)",
                "Failed",
                "    2023/broken.png: bad data",
                "Planned 1 image, 1 unreadable",
            ]
        );
    }

    #[test]
    fn check_report_empty_gallery() {
        let report = CheckReport {
            root: PathBuf::from("/g"),
            thumbnail_dirs: vec![PathBuf::from("/g/lowres")],
            ..CheckReport::default()
        };
        assert_eq!(
            format_check_report(&report),
            ["Thumbnail directories", "    lowres/", "No source images found."]
        );
    }
}
