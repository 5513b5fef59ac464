//! CLI output formatting.
//!
//! Output is per-photo and grouped by bucket. Each photo leads with its report
//! sequence number and the name it appears under in the outputs; where the
//! file came from is shown as an indented `Source:` line when it differs from
//! that name.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Geotagged (2)
//! 001 IMG_0002.jpg  2024-05-01T09:12:00  12.971600, 77.594600
//!     Source: day1/IMG_0002.HEIC
//! 002 IMG_0001.jpg  2024-05-01T10:40:00  12.972100, 77.595100
//!
//! Without GPS (1)
//! 003 IMG_0003.jpg  2024-05-02T08:00:00
//!
//! Non-image (1)
//! 004 clip.mov
//! ```
//!
//! ## Build
//!
//! ```text
//! Map:    images.kmz (2 placemarks)
//! Report: ./images_report.csv (4 rows)
//! Copied: files_geo/ 2, files_nongeo/ 1, files_nonimg/ 1
//!
//! 2 geotagged, 1 without GPS, 1 non-image
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::pipeline::BuildSummary;
use crate::sequence::{BatchCounts, OrderedBatch, SequencedRecord};
use crate::types::Classification;
use std::path::Path;

/// Format a 1-based sequence number as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// One photo line: index, name, then whatever is known of time and place.
///
/// ```text
/// 001 IMG_0001.jpg  2024-05-01T10:40:00  12.972100, 77.594600
/// 003 clip.mov
/// ```
fn entry_line(entry: &SequencedRecord) -> String {
    let record = &entry.record;
    let mut line = format!("{} {}", format_index(entry.slno), record.display_name);
    if let Some(t) = record.captured_at {
        line.push_str(&format!("  {}", t.format("%Y-%m-%dT%H:%M:%S")));
    }
    if let Some(p) = record.position {
        line.push_str(&format!("  {:.6}, {:.6}", p.latitude, p.longitude));
    }
    line
}

/// Path of the discovered file relative to the source root, when that tells
/// the reader something the display name does not.
fn source_line(entry: &SequencedRecord, source_root: &Path) -> Option<String> {
    let record = &entry.record;
    let relative = record
        .original_path
        .strip_prefix(source_root)
        .unwrap_or(&record.original_path);
    let relative = relative.to_string_lossy().replace('\\', "/");
    (relative != record.display_name).then(|| format!("{}Source: {}", indent(1), relative))
}

/// `2 geotagged, 1 without GPS, 1 non-image`
pub fn format_counts(counts: &BatchCounts) -> String {
    format!(
        "{} geotagged, {} without GPS, {} non-image",
        counts.geotagged, counts.non_geotagged, counts.non_image
    )
}

// ============================================================================
// Scan output
// ============================================================================

/// Format the classified batch, one section per non-empty bucket.
pub fn format_scan_output(batch: &OrderedBatch, source_root: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    for classification in Classification::ALL {
        let entries = batch.bucket(classification);
        if entries.is_empty() {
            continue;
        }
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(format!("{} ({})", classification.label(), entries.len()));
        for entry in entries {
            lines.push(entry_line(entry));
            lines.extend(source_line(entry, source_root));
        }
    }

    if lines.is_empty() {
        lines.push(format!("No files found in {}", source_root.display()));
    } else {
        lines.push(String::new());
        lines.push(format_counts(&batch.counts()));
    }
    lines
}

pub fn print_scan_output(batch: &OrderedBatch, source_root: &Path) {
    for line in format_scan_output(batch, source_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Build output
// ============================================================================

/// Format what a build wrote.
pub fn format_build_output(summary: &BuildSummary) -> Vec<String> {
    let counts = &summary.counts;
    let mut lines = vec![
        format!(
            "Map:    {} ({} placemarks)",
            summary.paths.kmz.display(),
            counts.geotagged
        ),
        format!(
            "Report: {} ({} rows)",
            summary.paths.report.display(),
            counts.total()
        ),
    ];

    if !summary.buckets.is_empty() {
        let parts: Vec<String> = summary
            .buckets
            .iter()
            .map(|b| {
                let name = b
                    .dir
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                if b.failed > 0 {
                    format!("{name}/ {} ({} failed)", b.copied, b.failed)
                } else {
                    format!("{name}/ {}", b.copied)
                }
            })
            .collect();
        lines.push(format!("Copied: {}", parts.join(", ")));
    }

    lines.push(String::new());
    lines.push(format_counts(counts));
    lines
}

pub fn print_build_output(summary: &BuildSummary) {
    for line in format_build_output(summary) {
        println!("{}", line);
    }
}
