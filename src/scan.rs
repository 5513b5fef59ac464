//! Filesystem discovery.
//!
//! Walks the photo directory recursively and returns every candidate file in
//! a deterministic order. Discovery order is what the report falls back to
//! for files without GPS, so it must not depend on the filesystem's native
//! directory order: entries are sorted by file name at every level.
//!
//! ## Skipped entries
//!
//! - Hidden files and directories (leading `.`)
//! - The run's own `config.toml` at the root
//! - Bucket folders at the root (`files_geo/`, …) left behind by an earlier
//!   run that wrote its output into the photo directory
//!
//! An entry that cannot be read (dangling or looping symlink, unreadable
//! subdirectory) is logged and skipped. Only an unreadable root is fatal.
//!
//! Nothing is classified here; an unsupported file is still discovered and
//! ends up in the NON_IMAGE bucket downstream.

use crate::config::{CONFIG_FILENAME, OutputConfig};
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Source directory not found: {0}")]
    SourceNotFound(PathBuf),
}

/// A file found in the source directory, before any metadata is read.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Modification time in UTC, if the filesystem reports one.
    pub modified_at: Option<NaiveDateTime>,
}

impl DiscoveredFile {
    /// Lower-cased extension without the dot, empty when there is none.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

/// Discover all candidate files under `root`.
pub fn discover(root: &Path, output: &OutputConfig) -> Result<Vec<DiscoveredFile>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::SourceNotFound(root.to_path_buf()));
    }

    let excluded_dirs = output.bucket_dirs();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e, &excluded_dirs));

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // The root itself failing means there is nothing to scan.
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                warn!("skipping {path}: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let modified_at = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(|t| DateTime::<Utc>::from(t).naive_utc());
        files.push(DiscoveredFile {
            path: entry.into_path(),
            modified_at,
        });
    }

    debug!("discovered {} files under {}", files.len(), root.display());
    Ok(files)
}

fn is_skipped(entry: &DirEntry, excluded_dirs: &[&str]) -> bool {
    // The root itself is never skipped, even when it is a dot-directory.
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }
    if entry.depth() == 1 {
        if entry.file_type().is_dir() {
            return excluded_dirs.iter().any(|d| *d == name);
        }
        return name == CONFIG_FILENAME;
    }
    false
}
