//! Bucket assignment.
//!
//! Every record lands in exactly one [`Classification`]. Non-images
//! short-circuit: a file that is not a usable image is `NonImage` no matter
//! what metadata it carries.

use crate::types::{Classification, FileKind, PhotoRecord};

pub fn classify(record: &PhotoRecord) -> Classification {
    match record.kind {
        FileKind::Unsupported | FileKind::ConversionFailed => Classification::NonImage,
        FileKind::Image if record.position.is_some() => Classification::Geotagged,
        FileKind::Image => Classification::NonGeotagged,
    }
}
