//! Gallery configuration module.
//!
//! Handles loading, validating, and merging `config.toml` files. Each run
//! starts from the stock defaults of a layout preset ([`Preset::Albums`] or
//! [`Preset::Screenshots`]); a `config.toml` in the gallery root (or one
//! named with `--config`) overrides any subset of them.
//!
//! ## Config File Location
//!
//! ```text
//! pics/
//! ├── config.toml              # Optional, overrides the preset defaults
//! ├── 2023-iceland/
//! │   ├── lowres/              # Generated thumbnails
//! │   └── waterfall.jpg
//! └── ...
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - albums defaults shown below
//!
//! [layout]
//! thumbnail_dir = "lowres"      # Thumbnail directory name
//! recursive = true              # Walk subdirectories
//! exclude_dirs = ["lowres"]     # Directory names never entered (any case)
//!
//! [thumbnails]                  # Exactly one of the three keys
//! target_width = 300            # or target_height / shortest_side
//!
//! [originals]
//! shortest_side = 1000
//!
//! [output]
//! format = "webp"               # jpeg | png | gif | webp
//! quality = 90                  # WebP quality (1-100)
//!
//! [processing]
//! max_processes = 1             # Parallel workers, 0 = all cores
//! fail_fast = false             # Stop at the first failing image
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [output]
//! quality = 80
//! ```
//!
//! Sizing sections are the exception: a `[thumbnails]` or `[originals]`
//! table replaces the preset's directive as a whole, so switching from
//! `target_width` to `target_height` does not leave both set.
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{
    DerivativeConfig, EncodeFormat, Quality, SizingDirective, SizingError, SizingOptions,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// File name looked up in the gallery root.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Sections whose overlay replaces the base table instead of merging into it.
const REPLACED_SECTIONS: &[&str] = &["thumbnails", "originals"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Invalid [{section}] sizing: {source}")]
    Sizing {
        section: &'static str,
        #[source]
        source: SizingError,
    },
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Which gallery shape the stock defaults describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// Nested photo albums: recursive, fixed-width thumbnails.
    #[default]
    Albums,
    /// One flat folder of screenshots: fixed-height thumbnails.
    Screenshots,
}

impl Preset {
    pub fn name(self) -> &'static str {
        match self {
            Preset::Albums => "albums",
            Preset::Screenshots => "screenshots",
        }
    }
}

/// Gallery configuration loaded from `config.toml`.
///
/// Every field has a preset default. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Directory traversal and thumbnail placement.
    pub layout: LayoutConfig,
    /// Sizing directive for thumbnails.
    pub thumbnails: SizingOptions,
    /// Sizing directive for the capped original that replaces each source.
    pub originals: SizingOptions,
    /// Output encoding for both derivatives.
    pub output: OutputConfig,
    /// Parallelism and failure handling.
    pub processing: ProcessingConfig,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self::for_preset(Preset::Albums)
    }
}

impl GalleryConfig {
    /// Stock defaults for a preset.
    pub fn for_preset(preset: Preset) -> Self {
        match preset {
            Preset::Albums => Self {
                layout: LayoutConfig::default(),
                thumbnails: SizingDirective::TargetWidth(300).into(),
                originals: SizingDirective::ShortestSide(1000).into(),
                output: OutputConfig::default(),
                processing: ProcessingConfig::default(),
            },
            Preset::Screenshots => Self {
                layout: LayoutConfig {
                    recursive: false,
                    exclude_dirs: Vec::new(),
                    ..LayoutConfig::default()
                },
                thumbnails: SizingDirective::TargetHeight(300).into(),
                originals: SizingDirective::ShortestSide(1000).into(),
                output: OutputConfig::default(),
                processing: ProcessingConfig::default(),
            },
        }
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.derivative_config()?;

        if !(1..=100).contains(&self.output.quality) {
            return Err(ConfigError::Validation("output.quality must be 1-100".into()));
        }

        let thumb_dir = self.layout.thumbnail_dir.as_str();
        if thumb_dir.is_empty() || thumb_dir == "." || thumb_dir == ".." {
            return Err(ConfigError::Validation(
                "layout.thumbnail_dir must be a directory name".into(),
            ));
        }
        if thumb_dir.contains(['/', '\\']) {
            return Err(ConfigError::Validation(format!(
                "layout.thumbnail_dir must not contain a path separator: {thumb_dir:?}"
            )));
        }
        if self.layout.recursive && !self.layout.excludes(thumb_dir) {
            return Err(ConfigError::Validation(format!(
                "layout.exclude_dirs must include {thumb_dir:?} when layout.recursive is set"
            )));
        }
        Ok(())
    }

    /// Typed sizing and encoding settings for the derivative builder.
    pub fn derivative_config(&self) -> Result<DerivativeConfig, ConfigError> {
        let thumbnail = SizingDirective::try_from(self.thumbnails).map_err(|source| {
            ConfigError::Sizing {
                section: "thumbnails",
                source,
            }
        })?;
        let original = SizingDirective::try_from(self.originals).map_err(|source| {
            ConfigError::Sizing {
                section: "originals",
                source,
            }
        })?;
        Ok(DerivativeConfig {
            thumbnail,
            original,
            format: self.output.format,
            quality: Quality::new(self.output.quality),
        })
    }
}

/// Directory traversal and thumbnail placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Name of the thumbnail directory. In a recursive layout one is created
    /// inside every directory that holds images; otherwise one under the root.
    pub thumbnail_dir: String,
    /// Walk subdirectories instead of only the root's direct children.
    pub recursive: bool,
    /// Directory names never entered during a recursive walk (case-insensitive).
    pub exclude_dirs: Vec<String>,
}

impl LayoutConfig {
    /// Whether `name` is in the exclusion list, ignoring case.
    pub fn excludes(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.exclude_dirs.iter().any(|d| d.to_lowercase() == name)
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            thumbnail_dir: "lowres".to_string(),
            recursive: true,
            exclude_dirs: vec!["lowres".to_string()],
        }
    }
}

/// Output encoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Format of both derivatives.
    pub format: EncodeFormat,
    /// WebP encoding quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: EncodeFormat::WebP,
            quality: 90,
        }
    }
}

/// Parallel processing and failure settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// `1` processes images one at a time; `0` uses every CPU core.
    /// Values larger than the core count are clamped down.
    pub max_processes: usize,
    /// Abort the run at the first image that fails instead of reporting it
    /// and moving on.
    pub fail_fast: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processes: 1,
            fail_fast: false,
        }
    }
}

/// Resolve the effective thread count from config.
///
/// - `0` → use all available cores
/// - `n` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    match config.max_processes {
        0 => cores,
        n => n.min(cores),
    }
}

/// Returns the stock defaults of a preset as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value(preset: Preset) -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(GalleryConfig::for_preset(preset))?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge a user config over stock defaults.
///
/// Like [`merge_toml`], except sizing sections present in the overlay
/// replace the base section instead of merging field by field.
pub fn merge_config(base: toml::Value, overlay: toml::Value) -> toml::Value {
    let base = match (base, &overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for section in REPLACED_SECTIONS {
                if overlay_table.contains_key(*section) {
                    base_table.remove(*section);
                }
            }
            toml::Value::Table(base_table)
        }
        (base, _) => base,
    };
    merge_toml(base, overlay)
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(config_path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<GalleryConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_config(base, ov),
        None => base,
    };
    let config: GalleryConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config for a gallery.
///
/// Reads `explicit` when given (it must exist), otherwise `config.toml` in
/// `root` if present. Merges user values on top of the preset's stock
/// defaults, rejects unknown keys, and validates the result.
pub fn load_config(
    root: &Path,
    preset: Preset,
    explicit: Option<&Path>,
) -> Result<GalleryConfig, ConfigError> {
    let overlay = match explicit {
        Some(path) => Some(
            load_raw_config(path)?.ok_or_else(|| ConfigError::NotFound(path.to_path_buf()))?,
        ),
        None => load_raw_config(&root.join(CONFIG_FILE_NAME))?,
    };
    debug!(
        preset = preset.name(),
        overrides = overlay.is_some(),
        "resolving config"
    );
    resolve_config(stock_defaults_value(preset)?, overlay)
}

/// Returns a fully-commented stock `config.toml` for a preset.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml(preset: Preset) -> &'static str {
    match preset {
        Preset::Albums => STOCK_ALBUMS,
        Preset::Screenshots => STOCK_SCREENSHOTS,
    }
}

const STOCK_ALBUMS: &str = r##"# gallery-shrink configuration (albums)
# =====================================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults for `gallery-shrink albums`.
#
# Place this file in the gallery root as config.toml.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Layout
# ---------------------------------------------------------------------------
[layout]
# Thumbnail directory, created next to the images of every album.
# Its contents are deleted at the start of each run.
thumbnail_dir = "lowres"

# Walk nested album directories.
recursive = true

# Directory names never entered (case-insensitive).
# Must include thumbnail_dir, or thumbnails would be reprocessed as sources.
exclude_dirs = ["lowres"]

# ---------------------------------------------------------------------------
# Sizing
# ---------------------------------------------------------------------------
# Each section takes exactly one of:
#   target_width  = N   scale so the width is at most N
#   target_height = N   scale so the height is at most N
#   shortest_side = N   scale so the shorter side is at most N
# Images are never enlarged. A section set here replaces the default as a whole.

[thumbnails]
target_width = 300

# The high-resolution copy that replaces each source image.
[originals]
shortest_side = 1000

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Format of both derivatives: "jpeg", "png", "gif" or "webp".
format = "webp"

# WebP encoding quality (1 = worst, 100 = best). JPEG always uses 85.
quality = 90

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Parallel image-processing workers. 0 = one per CPU core.
max_processes = 1

# Stop at the first image that fails instead of reporting it and continuing.
fail_fast = false
"##;

const STOCK_SCREENSHOTS: &str = r##"# gallery-shrink configuration (screenshots)
# ==========================================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults for `gallery-shrink screenshots`.
#
# Place this file in the gallery root as config.toml.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Layout
# ---------------------------------------------------------------------------
[layout]
# Thumbnail directory, created under the root.
# Its contents are deleted at the start of each run.
thumbnail_dir = "lowres"

# Only the root's direct children are processed.
recursive = false

# Directory names never entered (case-insensitive). Only used when
# recursive = true, in which case it must include thumbnail_dir.
exclude_dirs = []

# ---------------------------------------------------------------------------
# Sizing
# ---------------------------------------------------------------------------
# Each section takes exactly one of:
#   target_width  = N   scale so the width is at most N
#   target_height = N   scale so the height is at most N
#   shortest_side = N   scale so the shorter side is at most N
# Images are never enlarged. A section set here replaces the default as a whole.

[thumbnails]
target_height = 300

# The high-resolution copy that replaces each source image.
[originals]
shortest_side = 1000

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Format of both derivatives: "jpeg", "png", "gif" or "webp".
format = "webp"

# WebP encoding quality (1 = worst, 100 = best). JPEG always uses 85.
quality = 90

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Parallel image-processing workers. 0 = one per CPU core.
max_processes = 1

# Stop at the first image that fails instead of reporting it and continuing.
fail_fast = false
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn albums_defaults() {
        let config = GalleryConfig::for_preset(Preset::Albums);
        assert_eq!(config.layout.thumbnail_dir, "lowres");
        assert!(config.layout.recursive);
        assert_eq!(config.layout.exclude_dirs, vec!["lowres"]);
        assert_eq!(config.thumbnails.target_width, Some(300));
        assert_eq!(config.originals.shortest_side, Some(1000));
        assert_eq!(config.output.format, EncodeFormat::WebP);
        assert_eq!(config.output.quality, 90);
        assert_eq!(config.processing.max_processes, 1);
        assert!(!config.processing.fail_fast);
    }

    #[test]
    fn screenshots_defaults() {
        let config = GalleryConfig::for_preset(Preset::Screenshots);
        assert!(!config.layout.recursive);
        assert_eq!(config.thumbnails.target_height, Some(300));
        assert_eq!(config.thumbnails.target_width, None);
        assert_eq!(config.originals.shortest_side, Some(1000));
    }

    #[test]
    fn default_is_albums() {
        assert_eq!(
            GalleryConfig::default(),
            GalleryConfig::for_preset(Preset::Albums)
        );
    }

    #[test]
    fn both_presets_validate() {
        GalleryConfig::for_preset(Preset::Albums).validate().unwrap();
        GalleryConfig::for_preset(Preset::Screenshots)
            .validate()
            .unwrap();
    }

    #[test]
    fn derivative_config_matches_albums_preset() {
        let dc = GalleryConfig::default().derivative_config().unwrap();
        assert_eq!(dc, DerivativeConfig::default());
    }

    #[test]
    fn parse_partial_config() {
        let config: GalleryConfig = toml::from_str(
            r#"
[output]
quality = 75
"#,
        )
        .unwrap();
        assert_eq!(config.output.quality, 75);
        assert_eq!(config.output.format, EncodeFormat::WebP);
        assert_eq!(config.layout.thumbnail_dir, "lowres");
    }

    #[test]
    fn parse_format_names() {
        for (name, expected) in [
            ("jpeg", EncodeFormat::Jpeg),
            ("jpg", EncodeFormat::Jpeg),
            ("png", EncodeFormat::Png),
            ("gif", EncodeFormat::Gif),
            ("webp", EncodeFormat::WebP),
        ] {
            let config: GalleryConfig =
                toml::from_str(&format!("[output]\nformat = \"{name}\"\n")).unwrap();
            assert_eq!(config.output.format, expected, "format {name}");
        }
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_preset_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path(), Preset::Screenshots, None).unwrap();
        assert_eq!(config, GalleryConfig::for_preset(Preset::Screenshots));
    }

    #[test]
    fn load_config_reads_root_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"
[output]
quality = 70

[processing]
fail_fast = true
"#,
        )
        .unwrap();

        let config = load_config(tmp.path(), Preset::Albums, None).unwrap();
        assert_eq!(config.output.quality, 70);
        assert!(config.processing.fail_fast);
        assert_eq!(config.processing.max_processes, 1);
        assert!(config.layout.recursive);
    }

    #[test]
    fn load_config_explicit_path_wins() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[output]\nquality = 10\n",
        )
        .unwrap();
        let other = tmp.path().join("other.toml");
        fs::write(&other, "[output]\nquality = 55\n").unwrap();

        let config = load_config(tmp.path(), Preset::Albums, Some(&other)).unwrap();
        assert_eq!(config.output.quality, 55);
    }

    #[test]
    fn load_config_explicit_path_must_exist() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing.toml");
        let result = load_config(tmp.path(), Preset::Albums, Some(&missing));
        assert!(matches!(result, Err(ConfigError::NotFound(p)) if p == missing));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "this is not [valid toml").unwrap();
        let result = load_config(tmp.path(), Preset::Albums, None);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[output]\nqualty = 80\n",
        )
        .unwrap();
        let result = load_config(tmp.path(), Preset::Albums, None);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<GalleryConfig, _> = toml::from_str("[colors]\nbackground = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_sizing_key_rejected() {
        let result: Result<GalleryConfig, _> = toml::from_str("[thumbnails]\nmax_width = 300\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // Sizing section replacement
    // =========================================================================

    #[test]
    fn sizing_section_replaces_preset_directive() {
        let overlay: toml::Value = toml::from_str("[thumbnails]\ntarget_height = 200\n").unwrap();
        let config =
            resolve_config(stock_defaults_value(Preset::Albums).unwrap(), Some(overlay)).unwrap();
        assert_eq!(config.thumbnails.target_height, Some(200));
        assert_eq!(config.thumbnails.target_width, None);
        // Untouched section keeps the preset value.
        assert_eq!(config.originals.shortest_side, Some(1000));
    }

    #[test]
    fn sizing_with_two_fields_rejected() {
        let overlay: toml::Value =
            toml::from_str("[originals]\nshortest_side = 800\ntarget_width = 1200\n").unwrap();
        let result = resolve_config(stock_defaults_value(Preset::Albums).unwrap(), Some(overlay));
        assert!(matches!(
            result,
            Err(ConfigError::Sizing {
                section: "originals",
                source: SizingError::FieldCount(2)
            })
        ));
    }

    #[test]
    fn empty_sizing_section_rejected() {
        let overlay: toml::Value = toml::from_str("[thumbnails]\n").unwrap();
        let result = resolve_config(stock_defaults_value(Preset::Albums).unwrap(), Some(overlay));
        assert!(matches!(
            result,
            Err(ConfigError::Sizing {
                section: "thumbnails",
                source: SizingError::FieldCount(0)
            })
        ));
    }

    #[test]
    fn zero_sizing_value_rejected() {
        let overlay: toml::Value = toml::from_str("[thumbnails]\ntarget_width = 0\n").unwrap();
        let result = resolve_config(stock_defaults_value(Preset::Albums).unwrap(), Some(overlay));
        assert!(matches!(
            result,
            Err(ConfigError::Sizing {
                source: SizingError::Zero(_),
                ..
            })
        ));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_quality_bounds() {
        let mut config = GalleryConfig::default();
        config.output.quality = 1;
        assert!(config.validate().is_ok());
        config.output.quality = 100;
        assert!(config.validate().is_ok());
        config.output.quality = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.output.quality = 101;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_thumbnail_dir_name() {
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            let mut config = GalleryConfig::for_preset(Preset::Screenshots);
            config.layout.thumbnail_dir = bad.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn validate_recursive_requires_thumbnail_exclusion() {
        let mut config = GalleryConfig::default();
        config.layout.thumbnail_dir = "thumbs".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("exclude_dirs"));

        config.layout.exclude_dirs.push("THUMBS".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn flat_layout_needs_no_exclusion() {
        let mut config = GalleryConfig::for_preset(Preset::Screenshots);
        config.layout.thumbnail_dir = "small".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[layout]\nexclude_dirs = []\n",
        )
        .unwrap();
        let result = load_config(tmp.path(), Preset::Albums, None);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Processing
    // =========================================================================

    #[test]
    fn effective_threads_zero_means_all_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: 0,
            fail_fast: false,
        };
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: 99999,
            fail_fast: false,
        };
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_default_is_sequential() {
        assert_eq!(effective_threads(&ProcessingConfig::default()), 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("quality = 90").unwrap();
        let overlay: toml::Value = toml::from_str("quality = 70").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("quality").unwrap().as_integer(), Some(70));
    }

    #[test]
    fn merge_toml_preserves_base_keys() {
        let base: toml::Value =
            toml::from_str("[output]\nformat = \"webp\"\nquality = 90\n").unwrap();
        let overlay: toml::Value = toml::from_str("[output]\nquality = 60\n").unwrap();
        let merged = merge_toml(base, overlay);
        let output = merged.get("output").unwrap();
        assert_eq!(output.get("format").unwrap().as_str(), Some("webp"));
        assert_eq!(output.get("quality").unwrap().as_integer(), Some(60));
    }

    #[test]
    fn merge_config_replaces_sizing_but_merges_others() {
        let base: toml::Value = toml::from_str(
            "[thumbnails]\ntarget_width = 300\n[output]\nformat = \"webp\"\nquality = 90\n",
        )
        .unwrap();
        let overlay: toml::Value =
            toml::from_str("[thumbnails]\nshortest_side = 50\n[output]\nquality = 60\n").unwrap();
        let merged = merge_config(base, overlay);
        let thumbs = merged.get("thumbnails").unwrap().as_table().unwrap();
        assert_eq!(thumbs.len(), 1);
        assert_eq!(thumbs.get("shortest_side").unwrap().as_integer(), Some(50));
        let output = merged.get("output").unwrap();
        assert_eq!(output.get("format").unwrap().as_str(), Some("webp"));
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        for preset in [Preset::Albums, Preset::Screenshots] {
            let parsed: GalleryConfig = toml::from_str(stock_config_toml(preset)).unwrap();
            assert_eq!(
                parsed,
                GalleryConfig::for_preset(preset),
                "{} stock file",
                preset.name()
            );
        }
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        for preset in [Preset::Albums, Preset::Screenshots] {
            let toml = stock_config_toml(preset);
            for section in [
                "[layout]",
                "[thumbnails]",
                "[originals]",
                "[output]",
                "[processing]",
            ] {
                assert!(toml.contains(section), "missing {section}");
            }
        }
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value(Preset::Albums).unwrap();
        let table = value.as_table().unwrap();
        for key in ["layout", "thumbnails", "originals", "output", "processing"] {
            assert!(table.contains_key(key), "missing {key}");
        }
    }
}
