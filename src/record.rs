//! Record building: one discovered file in, one [`PhotoRecord`] out.
//!
//! This is where raw collaborator output is normalized into the shape the rest
//! of the pipeline relies on:
//!
//! - Extensions are matched case-insensitively against the allow-list.
//!   Unsupported files skip metadata extraction entirely.
//! - Files that need conversion go through the [`FormatConverter`]. On success
//!   the record points at the converted artifact; metadata is carried forward
//!   by reading it from the original. On failure the record is kept with no
//!   metadata and [`FileKind::ConversionFailed`].
//! - An extraction failure is read as "no metadata".
//! - A lone latitude or longitude, or an out-of-range pair, is dropped.
//! - Altitude without a position is dropped.
//!
//! None of these conditions is fatal. Each one is logged with a `warn!` so
//! the run leaves a trail of data-quality notes.

use crate::config::ImagesConfig;
use crate::convert::FormatConverter;
use crate::metadata::{ExtractedMetadata, MetadataExtractor};
use crate::scan::DiscoveredFile;
use crate::types::{FileKind, PhotoRecord, Position};
use log::{debug, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The collaborators and settings a record is built with.
pub struct RecordBuilder<'a, E: MetadataExtractor, C: FormatConverter> {
    pub images: &'a ImagesConfig,
    pub extractor: &'a E,
    pub converter: &'a C,
    /// Where converted files are written. Each file converts into its own
    /// numbered subdirectory so equal stems never share a target.
    pub work_dir: &'a Path,
}

impl<E: MetadataExtractor, C: FormatConverter> RecordBuilder<'_, E, C> {
    /// Normalize one discovered file. `index` is its position in discovery
    /// order and keys the conversion subdirectory.
    pub fn build(&self, index: usize, file: &DiscoveredFile) -> PhotoRecord {
        let original_name = file_name(&file.path);
        let ext = file.extension();

        if !self.images.is_supported(&ext) {
            debug!("{original_name}: unsupported extension, not an image");
            return bare_record(file, original_name, FileKind::Unsupported);
        }

        let source_path = if self.images.needs_conversion(&ext) {
            let target_dir = self.work_dir.join(index.to_string());
            match self.converter.convert(&file.path, &target_dir) {
                Ok(converted) => converted,
                Err(e) => {
                    warn!("{original_name}: {e}; reporting as non-image");
                    return bare_record(file, original_name, FileKind::ConversionFailed);
                }
            }
        } else {
            file.path.clone()
        };

        // Converted files may have lost their tags, so always read the original.
        let metadata = match self.extractor.extract(&file.path) {
            Ok(m) => m,
            Err(e) => {
                warn!("{original_name}: metadata unavailable ({e}); treating as no GPS");
                ExtractedMetadata::default()
            }
        };

        let (position, altitude) = normalize_location(&original_name, &metadata);

        PhotoRecord {
            display_name: file_name(&source_path),
            source_path,
            original_path: file.path.clone(),
            position,
            altitude,
            captured_at: metadata.captured_at,
            modified_at: file.modified_at,
            kind: FileKind::Image,
        }
    }
}

fn bare_record(file: &DiscoveredFile, display_name: String, kind: FileKind) -> PhotoRecord {
    PhotoRecord {
        source_path: file.path.clone(),
        original_path: file.path.clone(),
        display_name,
        position: None,
        altitude: None,
        captured_at: None,
        modified_at: file.modified_at,
        kind,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Pair latitude/longitude into a [`Position`] and decide whether the
/// altitude survives.
fn normalize_location(name: &str, metadata: &ExtractedMetadata) -> (Option<Position>, Option<f64>) {
    let position = match (metadata.latitude, metadata.longitude) {
        (Some(lat), Some(lon)) => {
            let position = Position::new(lat, lon);
            if position.is_none() {
                warn!("{name}: GPS position ({lat}, {lon}) out of range; ignoring it");
            }
            position
        }
        (Some(_), None) | (None, Some(_)) => {
            warn!("{name}: GPS has only one of latitude/longitude; ignoring it");
            None
        }
        (None, None) => None,
    };

    let altitude = match (position, metadata.altitude) {
        (Some(_), Some(alt)) if alt.is_finite() => Some(alt),
        (None, Some(alt)) => {
            warn!("{name}: altitude {alt} without a GPS position; dropping it");
            None
        }
        _ => None,
    };

    (position, altitude)
}

/// Make display names unique across the batch.
///
/// Display names double as archive asset names, so two files called
/// `IMG_0001.jpg` in different subfolders (or `a.heic` converted next to an
/// existing `a.jpg`) would collide. Later duplicates, in discovery order, get
/// a `-2`, `-3`, … suffix before the extension. Comparison is
/// case-insensitive since archives are commonly unpacked on case-insensitive
/// filesystems.
pub fn dedupe_display_names(records: &mut [PhotoRecord]) {
    let mut taken: HashSet<String> = records
        .iter()
        .map(|r| r.display_name.to_lowercase())
        .collect();
    let mut seen: HashSet<String> = HashSet::new();

    for record in records.iter_mut() {
        let key = record.display_name.to_lowercase();
        if seen.insert(key) {
            continue;
        }
        let path = PathBuf::from(&record.display_name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut n = 2;
        let mut renamed = format!("{stem}-{n}{ext}");
        while taken.contains(&renamed.to_lowercase()) {
            n += 1;
            renamed = format!("{stem}-{n}{ext}");
        }

        warn!(
            "{}: name already used by another file; listed as {renamed}",
            record.original_path.display()
        );
        taken.insert(renamed.to_lowercase());
        seen.insert(renamed.to_lowercase());
        record.display_name = renamed;
    }
}
