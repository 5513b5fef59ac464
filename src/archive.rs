//! KMZ packaging.
//!
//! A KMZ is a zip archive whose first entry is `doc.kml`; the photos the
//! placemarks reference sit under `files/`. Entries are deflate-compressed.

use crate::kml::asset_path;
use std::fs::File;
use std::io::{Seek, Write};
use std::path::PathBuf;
use thiserror::Error;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

pub const KML_ENTRY: &str = "doc.kml";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Cannot read photo {path}: {source}")]
    Asset {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A photo to embed, stored as `files/<name>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub name: String,
    pub source: PathBuf,
}

/// Write `kml` and every asset into a zip archive on `writer`.
///
/// Returns the writer once the archive's central directory is written.
pub fn write_kmz<W: Write + Seek>(
    writer: W,
    kml: &str,
    assets: &[Asset],
) -> Result<W, ArchiveError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = zip::ZipWriter::new(writer);

    zip.start_file(KML_ENTRY, options)?;
    zip.write_all(kml.as_bytes())?;

    for asset in assets {
        let mut file = File::open(&asset.source).map_err(|source| ArchiveError::Asset {
            path: asset.source.clone(),
            source,
        })?;
        zip.start_file(asset_path(&asset.name), options)?;
        std::io::copy(&mut file, &mut zip).map_err(|source| ArchiveError::Asset {
            path: asset.source.clone(),
            source,
        })?;
    }

    Ok(zip.finish()?)
}
