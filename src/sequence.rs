//! Chronological sequencing.
//!
//! Turns the unordered list of records into an [`OrderedBatch`]: the single
//! immutable value both output builders read from. Ordering rules:
//!
//! 1. Records are partitioned into the three buckets, preserving discovery
//!    order within each.
//! 2. Geotagged records are stably sorted by effective timestamp (capture time,
//!    else file modification time). Equal timestamps keep discovery order.
//!    A record with neither timestamp sorts after every timestamped one.
//! 3. Report numbers (`slno`) run 1..N across Geotagged, then NonGeotagged,
//!    then NonImage.

use crate::classify::classify;
use crate::types::{Classification, PhotoRecord};
use chrono::NaiveDateTime;
use serde::Serialize;

/// A record with its bucket and report number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequencedRecord {
    pub slno: usize,
    pub classification: Classification,
    pub record: PhotoRecord,
}

/// Number of records in each bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounts {
    pub geotagged: usize,
    pub non_geotagged: usize,
    pub non_image: usize,
}

impl BatchCounts {
    pub fn total(&self) -> usize {
        self.geotagged + self.non_geotagged + self.non_image
    }

    pub fn get(&self, classification: Classification) -> usize {
        match classification {
            Classification::Geotagged => self.geotagged,
            Classification::NonGeotagged => self.non_geotagged,
            Classification::NonImage => self.non_image,
        }
    }
}

/// All records of a run, classified and numbered. Built once, then only read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderedBatch {
    counts: BatchCounts,
    entries: Vec<SequencedRecord>,
}

impl OrderedBatch {
    /// Classify, order and number `records` (given in discovery order).
    pub fn sequence(records: Vec<PhotoRecord>) -> Self {
        let mut geotagged = Vec::new();
        let mut non_geotagged = Vec::new();
        let mut non_image = Vec::new();

        for record in records {
            match classify(&record) {
                Classification::Geotagged => geotagged.push(record),
                Classification::NonGeotagged => non_geotagged.push(record),
                Classification::NonImage => non_image.push(record),
            }
        }

        // `sort_by_key` is stable.
        geotagged.sort_by_key(chronological_key);

        let counts = BatchCounts {
            geotagged: geotagged.len(),
            non_geotagged: non_geotagged.len(),
            non_image: non_image.len(),
        };

        let entries = [
            (Classification::Geotagged, geotagged),
            (Classification::NonGeotagged, non_geotagged),
            (Classification::NonImage, non_image),
        ]
        .into_iter()
        .flat_map(|(classification, bucket)| {
            bucket.into_iter().map(move |record| (classification, record))
        })
        .enumerate()
        .map(|(i, (classification, record))| SequencedRecord {
            slno: i + 1,
            classification,
            record,
        })
        .collect();

        Self { counts, entries }
    }

    /// Every entry in `slno` order.
    pub fn entries(&self) -> &[SequencedRecord] {
        &self.entries
    }

    /// Geotagged entries, oldest first.
    pub fn geotagged(&self) -> &[SequencedRecord] {
        &self.entries[..self.counts.geotagged]
    }

    /// Images without GPS, in discovery order.
    pub fn non_geotagged(&self) -> &[SequencedRecord] {
        let start = self.counts.geotagged;
        &self.entries[start..start + self.counts.non_geotagged]
    }

    /// Non-images, in discovery order.
    pub fn non_image(&self) -> &[SequencedRecord] {
        &self.entries[self.counts.geotagged + self.counts.non_geotagged..]
    }

    pub fn bucket(&self, classification: Classification) -> &[SequencedRecord] {
        match classification {
            Classification::Geotagged => self.geotagged(),
            Classification::NonGeotagged => self.non_geotagged(),
            Classification::NonImage => self.non_image(),
        }
    }

    pub fn counts(&self) -> BatchCounts {
        self.counts
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Missing timestamps sort last: `(true, None)` is greater than any
/// `(false, Some(_))`.
fn chronological_key(record: &PhotoRecord) -> (bool, Option<NaiveDateTime>) {
    let ts = record.effective_timestamp();
    (ts.is_none(), ts)
}
