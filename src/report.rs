//! QA report: one CSV row per input file.
//!
//! Rows come straight from the [`OrderedBatch`], so `slno` and `filename`
//! agree with the map document. Columns:
//!
//! | Column | Value |
//! |---|---|
//! | `slno` | Report sequence number, 1..N |
//! | `filename` | Display name (converted name for converted files) |
//! | `datetime` | Capture time, ISO-8601; empty when unknown |
//! | `lat`, `long` | Decimal degrees, geotagged rows only |
//! | `status` | `OK`, `NO_GPS` or `NON_IMAGE` |
//!
//! The file modification time orders records but is never reported here.

use crate::sequence::OrderedBatch;
use crate::types::Classification;
use serde::Serialize;
use std::io::Write;
use thiserror::Error;

pub const HEADER: [&str; 6] = ["slno", "filename", "datetime", "lat", "long", "status"];

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub slno: usize,
    pub filename: String,
    pub datetime: Option<String>,
    pub lat: Option<f64>,
    pub long: Option<f64>,
    pub status: &'static str,
}

/// One row per entry, ascending `slno`.
pub fn build_report(batch: &OrderedBatch) -> Vec<ReportRow> {
    batch
        .entries()
        .iter()
        .map(|entry| {
            let record = &entry.record;
            let position = match entry.classification {
                Classification::Geotagged => record.position,
                _ => None,
            };
            ReportRow {
                slno: entry.slno,
                filename: record.display_name.clone(),
                datetime: record
                    .captured_at
                    .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string()),
                lat: position.map(|p| p.latitude),
                long: position.map(|p| p.longitude),
                status: entry.classification.status(),
            }
        })
        .collect()
}

/// Write the header and rows as CSV. The header is written even when there
/// are no rows.
pub fn write_csv<W: Write>(rows: &[ReportRow], writer: W) -> Result<(), ReportError> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(HEADER)?;
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}
