//! Photo metadata extraction.
//!
//! The pipeline only needs four values per photo: latitude, longitude,
//! altitude, and capture time. The [`MetadataExtractor`] trait is the seam
//! between the pipeline and whatever reads them; the production
//! implementation is [`ExifExtractor`].
//!
//! ## EXIF field mapping
//!
//! | Value | Tags |
//! |---|---|
//! | latitude | `GPSLatitude` (deg/min/sec rationals) + `GPSLatitudeRef` (`S` negates) |
//! | longitude | `GPSLongitude` + `GPSLongitudeRef` (`W` negates) |
//! | altitude | `GPSAltitude` + `GPSAltitudeRef` (`1` = below sea level) |
//! | capture time | `DateTimeOriginal`, else `DateTime` |
//!
//! Each value is extracted independently; a photo with a broken altitude tag
//! still yields its position. Deciding what a partial result *means*
//! (latitude without longitude, altitude without a position) is left to the
//! record builder.

use chrono::{NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Metadata unreadable: {0}")]
    Unreadable(String),
}

/// Raw values read from one file. Every field is optional and independent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedMetadata {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub captured_at: Option<NaiveDateTime>,
}

/// Reads GPS position and capture time from a photo.
///
/// Implementations must be `Sync`: records are built on a rayon pool.
pub trait MetadataExtractor: Sync {
    fn extract(&self, path: &Path) -> Result<ExtractedMetadata, MetadataError>;
}

/// Extractor backed by the `kamadak-exif` crate.
///
/// Reads JPEG, PNG, TIFF, WebP, and HEIF containers. A file without an EXIF
/// block is an error, which the record builder treats as "no metadata".
#[derive(Debug, Default)]
pub struct ExifExtractor;

impl ExifExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataExtractor for ExifExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedMetadata, MetadataError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let exif = exif::Reader::new()
            .read_from_container(&mut reader)
            .map_err(|e| MetadataError::Unreadable(format!("{}: {e}", path.display())))?;

        Ok(ExtractedMetadata {
            latitude: signed_coordinate(
                &exif,
                exif::Tag::GPSLatitude,
                exif::Tag::GPSLatitudeRef,
                'S',
            ),
            longitude: signed_coordinate(
                &exif,
                exif::Tag::GPSLongitude,
                exif::Tag::GPSLongitudeRef,
                'W',
            ),
            altitude: altitude(&exif),
            captured_at: capture_time(&exif),
        })
    }
}

/// Read a deg/min/sec coordinate and apply its hemisphere reference.
///
/// A missing reference tag is read as the positive hemisphere.
fn signed_coordinate(
    exif: &exif::Exif,
    value_tag: exif::Tag,
    ref_tag: exif::Tag,
    negative_ref: char,
) -> Option<f64> {
    let field = exif.get_field(value_tag, exif::In::PRIMARY)?;
    let magnitude = dms_to_degrees(&field.value)?;
    let negative = exif
        .get_field(ref_tag, exif::In::PRIMARY)
        .is_some_and(|r| r.display_value().to_string().contains(negative_ref));
    Some(if negative { -magnitude } else { magnitude })
}

/// Convert EXIF degree/minute/second rationals to decimal degrees.
fn dms_to_degrees(value: &exif::Value) -> Option<f64> {
    match value {
        exif::Value::Rational(r) if r.len() >= 3 => {
            let degrees = r[0].to_f64();
            let minutes = r[1].to_f64();
            let seconds = r[2].to_f64();
            let total = degrees + minutes / 60.0 + seconds / 3600.0;
            total.is_finite().then_some(total)
        }
        // Some writers store a single decimal-degree rational.
        exif::Value::Rational(r) if r.len() == 1 => {
            let total = r[0].to_f64();
            total.is_finite().then_some(total)
        }
        _ => None,
    }
}

fn altitude(exif: &exif::Exif) -> Option<f64> {
    let field = exif.get_field(exif::Tag::GPSAltitude, exif::In::PRIMARY)?;
    let meters = match &field.value {
        exif::Value::Rational(r) if !r.is_empty() => r[0].to_f64(),
        _ => return None,
    };
    if !meters.is_finite() {
        return None;
    }
    let below_sea_level = exif
        .get_field(exif::Tag::GPSAltitudeRef, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        == Some(1);
    Some(if below_sea_level { -meters } else { meters })
}

fn capture_time(exif: &exif::Exif) -> Option<NaiveDateTime> {
    [exif::Tag::DateTimeOriginal, exif::Tag::DateTime]
        .into_iter()
        .filter_map(|tag| exif.get_field(tag, exif::In::PRIMARY))
        .find_map(|field| match &field.value {
            exif::Value::Ascii(parts) => parts
                .first()
                .and_then(|bytes| parse_datetime(&String::from_utf8_lossy(bytes))),
            _ => None,
        })
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y:%m:%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const DATE_FORMATS: &[&str] = &["%Y:%m:%d", "%Y-%m-%d"];

/// Parse an EXIF-style timestamp.
///
/// Accepts the EXIF form (`2024:05:01 14:30:00`), ISO-8601 variants, and
/// date-only values (read as midnight). Trailing NULs and whitespace, common
/// in camera-written ASCII fields, are ignored. Returns `None` for blank or
/// zeroed values such as `0000:00:00 00:00:00`.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if s.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
