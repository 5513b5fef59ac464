//! Run configuration.
//!
//! Handles loading, validating, and merging a `config.toml` placed in the
//! photo directory. Stock defaults are the base layer; the user file only
//! needs the keys it wants to override.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [images]
//! extensions = ["jpg", "jpeg", "png", "heic", "heif"]  # Accepted as photos
//! convert = ["heic", "heif"]                          # Converted to JPEG first
//!
//! [map]
//! icon_href = "http://maps.google.com/mapfiles/kml/shapes/donut.png"
//! icon_scale = 1.2
//! image_width = 400         # Width of the photo in the placemark balloon
//!
//! [output]
//! copy_buckets = true       # Copy files into per-bucket folders
//! report_suffix = "_report" # images.kmz -> images_report.csv
//! geotagged_dir = "files_geo"
//! non_geotagged_dir = "files_nongeo"
//! non_image_dir = "files_nonimg"
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file looked up in the source directory.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Run configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Which files count as photos and which need conversion.
    pub images: ImagesConfig,
    /// Map document styling.
    pub map: MapConfig,
    /// Report naming and bucket folders.
    pub output: OutputConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl RunConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "images.extensions must not be empty".into(),
            ));
        }
        if let Some(ext) = self
            .images
            .convert
            .iter()
            .find(|c| !self.images.is_supported(c))
        {
            return Err(ConfigError::Validation(format!(
                "images.convert entry '{ext}' is not listed in images.extensions"
            )));
        }
        if self.map.image_width == 0 {
            return Err(ConfigError::Validation(
                "map.image_width must be non-zero".into(),
            ));
        }
        if !(self.map.icon_scale.is_finite() && self.map.icon_scale > 0.0) {
            return Err(ConfigError::Validation(
                "map.icon_scale must be a positive number".into(),
            ));
        }
        let dirs = self.output.bucket_dirs();
        if dirs.iter().any(|d| d.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "output bucket folder names must not be empty".into(),
            ));
        }
        if dirs[0] == dirs[1] || dirs[0] == dirs[2] || dirs[1] == dirs[2] {
            return Err(ConfigError::Validation(
                "output bucket folder names must be distinct".into(),
            ));
        }
        Ok(())
    }
}

/// Which extensions are photos, and which of those need format conversion.
///
/// Extensions are compared case-insensitively and may be written with or
/// without a leading dot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub extensions: Vec<String>,
    pub convert: Vec<String>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            extensions: ["jpg", "jpeg", "png", "heic", "heif"]
                .map(String::from)
                .to_vec(),
            convert: ["heic", "heif"].map(String::from).to_vec(),
        }
    }
}

fn normalize_ext(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn list_contains(list: &[String], ext: &str) -> bool {
    let ext = normalize_ext(ext);
    list.iter().any(|e| normalize_ext(e) == ext)
}

impl ImagesConfig {
    pub fn is_supported(&self, ext: &str) -> bool {
        list_contains(&self.extensions, ext)
    }

    pub fn needs_conversion(&self, ext: &str) -> bool {
        self.is_supported(ext) && list_contains(&self.convert, ext)
    }
}

/// Map document styling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapConfig {
    /// Marker icon shared by every placemark. Referenced, never bundled.
    pub icon_href: String,
    pub icon_scale: f64,
    /// Pixel width of the photo shown in the placemark balloon.
    pub image_width: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            icon_href: "http://maps.google.com/mapfiles/kml/shapes/donut.png".to_string(),
            icon_scale: 1.2,
            image_width: 400,
        }
    }
}

/// Report naming and the per-bucket copy folders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Copy every file into the folder of its bucket next to the archive.
    pub copy_buckets: bool,
    /// Appended to the archive stem to name the CSV report.
    pub report_suffix: String,
    pub geotagged_dir: String,
    pub non_geotagged_dir: String,
    pub non_image_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            copy_buckets: true,
            report_suffix: "_report".to_string(),
            geotagged_dir: "files_geo".to_string(),
            non_geotagged_dir: "files_nongeo".to_string(),
            non_image_dir: "files_nonimg".to_string(),
        }
    }
}

impl OutputConfig {
    /// Bucket folder names in Geotagged, NonGeotagged, NonImage order.
    pub fn bucket_dirs(&self) -> [&str; 3] {
        [
            &self.geotagged_dir,
            &self.non_geotagged_dir,
            &self.non_image_dir,
        ]
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel metadata/conversion workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, never below one
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Loading
// =============================================================================
//
// There are exactly two layers: the built-in defaults and an optional
// `config.toml` in the photo folder. The file is merged as a TOML table
// before deserializing, so `deny_unknown_fields` sees the user's keys and
// a partial `[map]` section keeps the other `[map]` defaults.

/// Built-in defaults as a TOML table, the layer `config.toml` is merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(RunConfig::default())?)
}

/// Overlay `user` onto `defaults`. Sections merge key by key; any other
/// value from `user` wins outright.
pub fn merge_toml(defaults: toml::Value, user: toml::Value) -> toml::Value {
    match (defaults, user) {
        (toml::Value::Table(mut table), toml::Value::Table(user_table)) => {
            for (key, value) in user_table {
                let value = match table.remove(&key) {
                    Some(default) => merge_toml(default, value),
                    None => value,
                };
                table.insert(key, value);
            }
            toml::Value::Table(table)
        }
        (_, user) => user,
    }
}

/// Parse `<photo dir>/config.toml`, or `None` when the folder has none.
pub fn load_raw_config(photo_dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let path = photo_dir.join(CONFIG_FILENAME);
    if !path.is_file() {
        return Ok(None);
    }
    Ok(Some(toml::from_str(&fs::read_to_string(&path)?)?))
}

/// Turn the merged layers into a validated [`RunConfig`].
pub fn resolve_config(
    defaults: toml::Value,
    user: Option<toml::Value>,
) -> Result<RunConfig, ConfigError> {
    let merged = match user {
        Some(user) => merge_toml(defaults, user),
        None => defaults,
    };
    let config: RunConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// The run configuration for a photo folder.
pub fn load_config(photo_dir: &Path) -> Result<RunConfig, ConfigError> {
    resolve_config(stock_defaults_value()?, load_raw_config(photo_dir)?)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# photomark configuration
# =======================
# Place this file as config.toml inside the photo directory.
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Which files are photos
# ---------------------------------------------------------------------------
[images]
# Extensions treated as photos (case-insensitive). Everything else is
# reported as NON_IMAGE.
extensions = ["jpg", "jpeg", "png", "heic", "heif"]

# Photo extensions that are converted to JPEG before use. Conversion runs
# `magick`, falling back to `ffmpeg`. A failed conversion reports the file
# as NON_IMAGE.
convert = ["heic", "heif"]

# ---------------------------------------------------------------------------
# Map document
# ---------------------------------------------------------------------------
[map]
# Marker icon used by every placemark.
icon_href = "http://maps.google.com/mapfiles/kml/shapes/donut.png"
icon_scale = 1.2

# Width in pixels of the photo shown in the placemark balloon.
image_width = 400

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Copy every file into a folder for its bucket, next to the KMZ.
copy_buckets = true

# The CSV report is named <kmz stem><report_suffix>.csv
report_suffix = "_report"

geotagged_dir = "files_geo"
non_geotagged_dir = "files_nongeo"
non_image_dir = "files_nonimg"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel metadata/conversion workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
