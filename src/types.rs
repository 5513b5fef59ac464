//! Shared types used across all pipeline stages.
//!
//! A [`PhotoRecord`] is built once per discovered file and never mutated
//! afterwards. The classifier, the sequencer, and both output builders only
//! ever read it.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::PathBuf;

/// A point on the globe in decimal degrees.
///
/// Latitude and longitude travel together so a record can never carry one
/// without the other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    /// Build a position, rejecting non-finite or out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }
}

/// What the upstream stages learned about the file itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Extension is on the allow-list and the file is usable as-is
    /// (or after a successful conversion).
    Image,
    /// Extension is not on the allow-list.
    Unsupported,
    /// The file needed format conversion and the converter failed.
    ConversionFailed,
}

/// One input file after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoRecord {
    /// File the outputs are built from. Points at the converted artifact
    /// when a conversion happened.
    pub source_path: PathBuf,
    /// File as discovered in the source directory.
    pub original_path: PathBuf,
    /// Filename shown in the report and used as the archive asset name.
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Meters; only kept when `position` is present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<NaiveDateTime>,
    /// Ordering fallback only, never reported as a capture time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<NaiveDateTime>,
    pub kind: FileKind,
}

impl PhotoRecord {
    /// Capture time if known, else the file modification time.
    pub fn effective_timestamp(&self) -> Option<NaiveDateTime> {
        self.captured_at.or(self.modified_at)
    }
}

/// The three mutually exclusive buckets every record lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Geotagged,
    NonGeotagged,
    NonImage,
}

impl Classification {
    /// Bucket priority used when numbering report rows.
    pub const ALL: [Classification; 3] = [
        Classification::Geotagged,
        Classification::NonGeotagged,
        Classification::NonImage,
    ];

    /// Value of the `status` column in the report.
    pub fn status(self) -> &'static str {
        match self {
            Classification::Geotagged => "OK",
            Classification::NonGeotagged => "NO_GPS",
            Classification::NonImage => "NON_IMAGE",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Classification::Geotagged => "Geotagged",
            Classification::NonGeotagged => "Without GPS",
            Classification::NonImage => "Non-image",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn position_accepts_valid_range() {
        assert!(Position::new(12.1, 77.1).is_some());
        assert!(Position::new(-90.0, 180.0).is_some());
    }

    #[test]
    fn position_rejects_out_of_range_and_nan() {
        assert!(Position::new(91.0, 0.0).is_none());
        assert!(Position::new(0.0, -180.5).is_none());
        assert!(Position::new(f64::NAN, 0.0).is_none());
        assert!(Position::new(0.0, f64::INFINITY).is_none());
    }

    #[test]
    fn effective_timestamp_prefers_capture_time() {
        let record = PhotoRecord {
            source_path: "a.jpg".into(),
            original_path: "a.jpg".into(),
            display_name: "a.jpg".into(),
            position: None,
            altitude: None,
            captured_at: Some(at(1)),
            modified_at: Some(at(9)),
            kind: FileKind::Image,
        };
        assert_eq!(record.effective_timestamp(), Some(at(1)));

        let fallback = PhotoRecord {
            captured_at: None,
            ..record
        };
        assert_eq!(fallback.effective_timestamp(), Some(at(9)));
    }

    #[test]
    fn status_values_match_report_contract() {
        assert_eq!(Classification::Geotagged.status(), "OK");
        assert_eq!(Classification::NonGeotagged.status(), "NO_GPS");
        assert_eq!(Classification::NonImage.status(), "NON_IMAGE");
    }
}
