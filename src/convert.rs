//! Format conversion for photos viewers cannot display (HEIC/HEIF).
//!
//! The [`FormatConverter`] trait is the seam; the pipeline never cares how a
//! conversion happens, only whether it produced a file. The production
//! implementation is [`CommandConverter`], which shells out:
//!
//! | Step | Command |
//! |---|---|
//! | Convert | `magick <src> <out>.jpg`, falling back to `ffmpeg -y -i <src> <out>.jpg` |
//! | Carry metadata | `exiftool -overwrite_original -tagsFromFile <src> <out>.jpg` (best effort) |
//!
//! Converted files are written into a caller-provided work directory. The
//! source file is only ever read.

use log::debug;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Conversion of {path} failed: {reason}")]
    Failed { path: PathBuf, reason: String },
}

/// Converts one photo into a format map viewers can display.
///
/// Implementations must be `Sync`: records are built on a rayon pool.
pub trait FormatConverter: Sync {
    /// Convert `source` into a new file under `work_dir` and return its path.
    fn convert(&self, source: &Path, work_dir: &Path) -> Result<PathBuf, ConvertError>;
}

/// Target path for a converted file: same stem, `.jpg` extension.
pub fn converted_path(source: &Path, work_dir: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "converted".to_string());
    work_dir.join(format!("{stem}.jpg"))
}

/// Converter that runs ImageMagick or ffmpeg, then copies tags with exiftool.
#[derive(Debug, Default)]
pub struct CommandConverter;

impl CommandConverter {
    pub fn new() -> Self {
        Self
    }
}

impl FormatConverter for CommandConverter {
    fn convert(&self, source: &Path, work_dir: &Path) -> Result<PathBuf, ConvertError> {
        std::fs::create_dir_all(work_dir)?;
        let output = converted_path(source, work_dir);

        let magick = run(Command::new("magick").arg(source).arg(&output));
        if let Err(magick_err) = magick {
            debug!("magick failed for {}: {magick_err}", source.display());
            run(Command::new("ffmpeg")
                .arg("-y")
                .arg("-loglevel")
                .arg("error")
                .arg("-i")
                .arg(source)
                .arg(&output))
            .map_err(|ffmpeg_err| ConvertError::Failed {
                path: source.to_path_buf(),
                reason: format!("magick: {magick_err}; ffmpeg: {ffmpeg_err}"),
            })?;
        }

        if !output.is_file() {
            return Err(ConvertError::Failed {
                path: source.to_path_buf(),
                reason: "converter reported success but wrote no file".to_string(),
            });
        }

        // Metadata carry-over is cosmetic for the embedded copy; the pipeline
        // reads GPS and capture time from the original regardless.
        if let Err(e) = run(Command::new("exiftool")
            .arg("-overwrite_original")
            .arg("-tagsFromFile")
            .arg(source)
            .arg(&output))
        {
            debug!("exiftool tag copy skipped for {}: {e}", output.display());
        }

        Ok(output)
    }
}

/// Run a command to completion, turning spawn errors and non-zero exits into
/// a short message.
fn run(command: &mut Command) -> Result<(), String> {
    let out = command.output().map_err(|e| e.to_string())?;
    if out.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
        Err(if stderr.is_empty() {
            format!("exited with {}", out.status)
        } else {
            stderr
        })
    }
}
