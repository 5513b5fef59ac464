//! Shared test utilities: record constructors and timestamp shorthands.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let batch = OrderedBatch::sequence(vec![
//!     geo_record("a.jpg", 12.1, 77.1, Some("2024-05-01 10:00:00")),
//!     no_gps_record("b.jpg", None),
//!     non_image_record("c.mov"),
//! ]);
//! assert_eq!(batch.len(), 3);
//! ```

use chrono::NaiveDateTime;

use crate::scan::DiscoveredFile;
use crate::types::{FileKind, PhotoRecord, Position};

/// Parse `YYYY-MM-DD HH:MM:SS`.
pub fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

pub fn discovered(path: &str, modified: Option<&str>) -> DiscoveredFile {
    DiscoveredFile {
        path: path.into(),
        modified_at: modified.map(ts),
    }
}

fn base(name: &str, kind: FileKind) -> PhotoRecord {
    PhotoRecord {
        source_path: format!("/photos/{name}").into(),
        original_path: format!("/photos/{name}").into(),
        display_name: name.to_string(),
        position: None,
        altitude: None,
        captured_at: None,
        modified_at: None,
        kind,
    }
}

/// Image with a position and optional capture time.
pub fn geo_record(name: &str, lat: f64, lon: f64, captured: Option<&str>) -> PhotoRecord {
    PhotoRecord {
        position: Some(Position::new(lat, lon).unwrap()),
        captured_at: captured.map(ts),
        ..base(name, FileKind::Image)
    }
}

/// Image without GPS.
pub fn no_gps_record(name: &str, captured: Option<&str>) -> PhotoRecord {
    PhotoRecord {
        captured_at: captured.map(ts),
        ..base(name, FileKind::Image)
    }
}

/// File with an unsupported extension.
pub fn non_image_record(name: &str) -> PhotoRecord {
    base(name, FileKind::Unsupported)
}

/// Display names of a slice of records, in order.
pub fn names<'a>(records: impl IntoIterator<Item = &'a PhotoRecord>) -> Vec<&'a str> {
    records
        .into_iter()
        .map(|r| r.display_name.as_str())
        .collect()
}
