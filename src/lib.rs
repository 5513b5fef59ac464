//! # Photomark
//!
//! Turns a folder of photos into a map and a QA report. Every photo with GPS
//! coordinates becomes a placemark in a KMZ archive that Google Earth and
//! similar viewers open directly; every input file, photo or not, gets one
//! row in a CSV report saying what was found.
//!
//! # Architecture: One Pass, One Immutable Batch
//!
//! ```text
//! 1. Discover   photos/          →  files            (sorted recursive walk)
//! 2. Record     file             →  PhotoRecord      (EXIF, HEIC conversion; parallel)
//! 3. Sequence   records          →  OrderedBatch     (classify, sort, number)
//! 4. Emit       OrderedBatch     →  images.kmz, images_report.csv, bucket folders
//! ```
//!
//! The [`sequence::OrderedBatch`] is built once and handed by shared reference
//! to the map and report builders, so the two outputs always agree on numbering
//! and file names.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Recursive, deterministic file discovery |
//! | [`metadata`] | GPS and capture-time extraction behind the `MetadataExtractor` trait |
//! | [`convert`] | HEIC/HEIF → JPEG behind the `FormatConverter` trait |
//! | [`record`] | Normalizes one discovered file into a [`types::PhotoRecord`] |
//! | [`classify`] | Geotagged / without GPS / non-image |
//! | [`sequence`] | Chronological ordering and report numbering |
//! | [`kml`] | Placemark numbering and KML rendering |
//! | [`report`] | CSV report rows and writer |
//! | [`archive`] | KMZ (zip) packaging |
//! | [`pipeline`] | Wires the stages together and writes outputs atomically |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`types`] | Shared record and bucket types |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Numbering vs. Emission Order
//!
//! Placemarks are labelled `p1`..`pN` oldest first, and written newest first so
//! the latest photo heads the viewer's list. Both orders are accessors on
//! [`kml::MapDocument`] over one chronological list; labels never change when
//! the list is reversed.
//!
//! ## Failures Are Rows, Not Errors
//!
//! An unreadable EXIF block, a failed HEIC conversion or a half-present GPS
//! pair never stops a run. The file still gets a report row (as `NO_GPS` or
//! `NON_IMAGE`) and a warning in the log. Only problems with the run as a
//! whole (missing source directory, invalid config, unwritable output) are
//! fatal.
//!
//! ## External Tools at the Edges
//!
//! EXIF is read in-process with `kamadak-exif`. HEIC decoding is left to
//! ImageMagick or ffmpeg, which already handle it well; the tool only ever
//! needs them when HEIC files are present.

pub mod archive;
pub mod classify;
pub mod config;
pub mod convert;
pub mod kml;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod scan;
pub mod sequence;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
