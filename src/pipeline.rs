//! End-to-end run: discover → build records → sequence → write outputs.
//!
//! ```text
//! source dir ──discover──▶ files ──RecordBuilder (rayon)──▶ records
//!                                                            │
//!                                                 OrderedBatch::sequence
//!                                                            │
//!                         ┌──────────────────────────────────┼───────────────────┐
//!                         ▼                                  ▼                   ▼
//!               MapDocument + render_kml               build_report         bucket copies
//!                         │                                  │              (optional)
//!                    <stem>.kmz                      <stem>_report.csv
//! ```
//!
//! Records are built in parallel, but `par_iter().collect()` keeps discovery
//! order, so the outputs never depend on which worker finished first.
//!
//! Both output files are staged in temporary files in the output directory
//! and renamed into place only after both are complete and the bucket folders
//! exist. A failed run leaves no truncated archive or report behind, and never
//! a fresh archive next to a missing or stale report.
//!
//! [`build`] and [`scan_batch`] use the production collaborators;
//! [`build_with`] and [`scan_batch_with`] take any implementation, which is
//! how the tests run without exiftool or ImageMagick.

use crate::archive::{self, Asset, ArchiveError};
use crate::config::{ConfigError, RunConfig};
use crate::convert::{CommandConverter, FormatConverter};
use crate::kml::{self, KmlError, MapDocument};
use crate::metadata::{ExifExtractor, MetadataExtractor};
use crate::record::{RecordBuilder, dedupe_display_names};
use crate::report::{self, ReportError};
use crate::scan::{self, ScanError};
use crate::sequence::{BatchCounts, OrderedBatch};
use crate::types::Classification;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("KML error: {0}")]
    Kml(#[from] KmlError),
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Output path {0} is a directory, expected a .kmz file name")]
    OutputIsDirectory(PathBuf),
}

/// Where a run writes its files.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub dir: PathBuf,
    pub kmz: PathBuf,
    pub report: PathBuf,
    /// Archive file stem; also the KML document name.
    pub stem: String,
}

impl OutputPaths {
    /// Derive the report path and document name from the archive path.
    pub fn new(kmz: &Path, report_suffix: &str) -> Self {
        let dir = match kmz.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = kmz
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "images".to_string());
        let report = dir.join(format!("{stem}{report_suffix}.csv"));
        Self {
            dir,
            kmz: kmz.to_path_buf(),
            report,
            stem,
        }
    }
}

/// Result of copying one bucket's files.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketCopy {
    pub classification: Classification,
    pub dir: PathBuf,
    pub copied: usize,
    pub failed: usize,
}

/// What a build produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSummary {
    pub counts: BatchCounts,
    pub paths: OutputPaths,
    /// Empty when bucket copies are disabled.
    pub buckets: Vec<BucketCopy>,
}

/// Discover and classify without writing anything.
pub fn scan_batch(source: &Path, config: &RunConfig) -> Result<OrderedBatch, BuildError> {
    let work_dir = TempDir::new()?;
    scan_batch_with(
        &ExifExtractor::new(),
        &CommandConverter::new(),
        source,
        config,
        work_dir.path(),
    )
}

/// Discover, build records with the given collaborators, and sequence them.
///
/// Converted files are written into `work_dir`, which must outlive any use of
/// the returned batch's `source_path`s.
pub fn scan_batch_with(
    extractor: &impl MetadataExtractor,
    converter: &impl FormatConverter,
    source: &Path,
    config: &RunConfig,
    work_dir: &Path,
) -> Result<OrderedBatch, BuildError> {
    let files = scan::discover(source, &config.output)?;
    info!("found {} files in {}", files.len(), source.display());

    let builder = RecordBuilder {
        images: &config.images,
        extractor,
        converter,
        work_dir,
    };
    let mut records: Vec<_> = files
        .par_iter()
        .enumerate()
        .map(|(i, f)| builder.build(i, f))
        .collect();
    dedupe_display_names(&mut records);

    let batch = OrderedBatch::sequence(records);
    let counts = batch.counts();
    info!(
        "{} geotagged, {} without GPS, {} non-image",
        counts.geotagged, counts.non_geotagged, counts.non_image
    );
    Ok(batch)
}

/// Full run with the production collaborators.
pub fn build(
    source: &Path,
    output: &Path,
    config: &RunConfig,
) -> Result<BuildSummary, BuildError> {
    build_with(
        &ExifExtractor::new(),
        &CommandConverter::new(),
        source,
        output,
        config,
    )
}

/// Full run with the given collaborators.
pub fn build_with(
    extractor: &impl MetadataExtractor,
    converter: &impl FormatConverter,
    source: &Path,
    output: &Path,
    config: &RunConfig,
) -> Result<BuildSummary, BuildError> {
    let paths = OutputPaths::new(output, &config.output.report_suffix);
    prepare_output_dir(&paths)?;

    // Converted files live here until the archive and bucket copies are done.
    let work_dir = TempDir::new()?;
    let batch = scan_batch_with(extractor, converter, source, config, work_dir.path())?;

    let document = MapDocument::from_batch(&batch, &paths.stem);
    let kml = kml::render_kml(&document, &config.map)?;
    let assets: Vec<Asset> = batch
        .geotagged()
        .iter()
        .map(|entry| Asset {
            name: entry.record.display_name.clone(),
            source: entry.record.source_path.clone(),
        })
        .collect();
    let kmz_file = stage(&paths.dir, |file| {
        archive::write_kmz(file, &kml, &assets)?;
        Ok(())
    })?;

    let rows = report::build_report(&batch);
    let report_file = stage(&paths.dir, |file| {
        report::write_csv(&rows, file)?;
        Ok(())
    })?;

    // Every fallible step that is not a per-file copy happens before either
    // output is committed.
    let bucket_dirs = if config.output.copy_buckets {
        create_bucket_dirs(&paths.dir, &config.output.bucket_dirs())?
    } else {
        Vec::new()
    };

    // The archive goes last: a run never leaves a map without its report.
    commit(report_file, &paths.report)?;
    info!("wrote {} with {} rows", paths.report.display(), rows.len());
    commit(kmz_file, &paths.kmz)?;
    info!(
        "wrote {} with {} placemarks",
        paths.kmz.display(),
        document.len()
    );

    let buckets = copy_buckets(&batch, bucket_dirs);

    Ok(BuildSummary {
        counts: batch.counts(),
        paths,
        buckets,
    })
}

/// Create the output directory and make sure the archive path is usable
/// before any work starts.
fn prepare_output_dir(paths: &OutputPaths) -> Result<(), BuildError> {
    std::fs::create_dir_all(&paths.dir).map_err(|source| BuildError::OutputDir {
        path: paths.dir.clone(),
        source,
    })?;
    if paths.kmz.is_dir() {
        return Err(BuildError::OutputIsDirectory(paths.kmz.clone()));
    }
    if paths.kmz.extension().is_none_or(|e| !e.eq_ignore_ascii_case("kmz")) {
        warn!(
            "{} does not end in .kmz; map viewers may not recognize it",
            paths.kmz.display()
        );
    }
    Ok(())
}

/// Write a complete output into a temporary file in `dir`.
fn stage(
    dir: &Path,
    write: impl FnOnce(&mut File) -> Result<(), BuildError>,
) -> Result<NamedTempFile, BuildError> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// Rename a staged output onto `dest`.
fn commit(staged: NamedTempFile, dest: &Path) -> Result<(), BuildError> {
    staged.persist(dest).map_err(|e| BuildError::Io(e.error))?;
    Ok(())
}

/// Create the bucket folders under `out_dir`, in `Classification::ALL` order.
fn create_bucket_dirs(
    out_dir: &Path,
    dir_names: &[&str; 3],
) -> Result<Vec<(Classification, PathBuf)>, BuildError> {
    Classification::ALL
        .into_iter()
        .zip(dir_names)
        .map(|(classification, name)| {
            let dir = out_dir.join(name);
            std::fs::create_dir_all(&dir).map_err(|source| BuildError::OutputDir {
                path: dir.clone(),
                source,
            })?;
            Ok((classification, dir))
        })
        .collect()
}

/// Copy every record's file into its bucket folder. Failures are logged and
/// counted, never fatal.
fn copy_buckets(batch: &OrderedBatch, dirs: Vec<(Classification, PathBuf)>) -> Vec<BucketCopy> {
    dirs.into_iter()
        .map(|(classification, dir)| {
            let mut copy = BucketCopy {
                classification,
                dir,
                copied: 0,
                failed: 0,
            };
            for entry in batch.bucket(classification) {
                let record = &entry.record;
                let dest = copy.dir.join(&record.display_name);
                match std::fs::copy(&record.source_path, &dest) {
                    Ok(_) => {
                        debug!("copied {} -> {}", record.source_path.display(), dest.display());
                        copy.copied += 1;
                    }
                    Err(e) => {
                        warn!(
                            "could not copy {} into {}: {e}",
                            record.source_path.display(),
                            copy.dir.display()
                        );
                        copy.failed += 1;
                    }
                }
            }
            copy
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::tests::MockConverter;
    use crate::metadata::ExtractedMetadata;
    use crate::metadata::tests::MockExtractor;
    use crate::test_helpers::ts;
    use std::fs;
    use std::io::Read;

    fn geo(lat: f64, lon: f64, captured: &str) -> ExtractedMetadata {
        ExtractedMetadata {
            latitude: Some(lat),
            longitude: Some(lon),
            altitude: None,
            captured_at: Some(ts(captured)),
        }
    }

    /// Source dir with a.jpg (GPS), b.jpg (no GPS), notes.txt.
    fn setup_source() -> (TempDir, MockExtractor) {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("photos");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.jpg"), b"photo a").unwrap();
        fs::write(src.join("b.jpg"), b"photo b").unwrap();
        fs::write(src.join("notes.txt"), b"notes").unwrap();
        let extractor = MockExtractor::new().with("a.jpg", geo(12.0, 77.0, "2024-05-01 10:00:00"));
        (tmp, extractor)
    }

    fn read_zip_entry(path: &Path, name: &str) -> String {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut s = String::new();
        entry.read_to_string(&mut s).unwrap();
        s
    }

    // =========================================================================
    // OutputPaths tests
    // =========================================================================

    #[test]
    fn output_paths_from_bare_file_name() {
        let paths = OutputPaths::new(Path::new("images.kmz"), "_report");
        assert_eq!(paths.dir, PathBuf::from("."));
        assert_eq!(paths.stem, "images");
        assert_eq!(paths.report, PathBuf::from("./images_report.csv"));
    }

    #[test]
    fn output_paths_in_subdirectory() {
        let paths = OutputPaths::new(Path::new("out/trip.kmz"), "_qa");
        assert_eq!(paths.dir, PathBuf::from("out"));
        assert_eq!(paths.kmz, PathBuf::from("out/trip.kmz"));
        assert_eq!(paths.report, PathBuf::from("out/trip_qa.csv"));
    }

    // =========================================================================
    // build_with() tests
    // =========================================================================

    #[test]
    fn build_writes_kmz_report_and_buckets() {
        let (tmp, extractor) = setup_source();
        let out = tmp.path().join("out/images.kmz");

        let summary = build_with(
            &extractor,
            &MockConverter::new(),
            &tmp.path().join("photos"),
            &out,
            &RunConfig::default(),
        )
        .unwrap();

        assert_eq!(
            summary.counts,
            BatchCounts {
                geotagged: 1,
                non_geotagged: 1,
                non_image: 1
            }
        );

        let kml = read_zip_entry(&out, "doc.kml");
        assert!(kml.contains("<name>images</name>"));
        assert!(kml.contains("<name>p1</name>"));
        assert_eq!(read_zip_entry(&out, "files/a.jpg"), "photo a");

        let csv = fs::read_to_string(tmp.path().join("out/images_report.csv")).unwrap();
        assert_eq!(
            csv,
            "slno,filename,datetime,lat,long,status\n\
             1,a.jpg,2024-05-01T10:00:00,12.0,77.0,OK\n\
             2,b.jpg,,,,NO_GPS\n\
             3,notes.txt,,,,NON_IMAGE\n"
        );

        let out_dir = tmp.path().join("out");
        assert!(out_dir.join("files_geo/a.jpg").exists());
        assert!(out_dir.join("files_nongeo/b.jpg").exists());
        assert!(out_dir.join("files_nonimg/notes.txt").exists());
        assert_eq!(summary.buckets.len(), 3);
        assert!(summary.buckets.iter().all(|b| b.copied == 1 && b.failed == 0));
    }

    #[test]
    fn build_without_bucket_copies() {
        let (tmp, extractor) = setup_source();
        let out = tmp.path().join("out/images.kmz");
        let mut config = RunConfig::default();
        config.output.copy_buckets = false;

        let summary = build_with(
            &extractor,
            &MockConverter::new(),
            &tmp.path().join("photos"),
            &out,
            &config,
        )
        .unwrap();

        assert!(summary.buckets.is_empty());
        assert!(!tmp.path().join("out/files_geo").exists());
    }

    #[test]
    fn converted_photo_is_embedded_under_new_name() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("photos");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("IMG_1.HEIC"), b"heic").unwrap();
        let extractor =
            MockExtractor::new().with("IMG_1.HEIC", geo(1.0, 2.0, "2024-05-01 10:00:00"));
        let out = tmp.path().join("images.kmz");

        build_with(&extractor, &MockConverter::new(), &src, &out, &RunConfig::default()).unwrap();

        assert_eq!(read_zip_entry(&out, "files/IMG_1.jpg"), "converted");
        assert!(src.join("IMG_1.HEIC").exists());
        assert!(tmp.path().join("files_geo/IMG_1.jpg").exists());
    }

    #[test]
    fn failed_conversion_lands_in_non_image_bucket() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("photos");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("bad.heic"), b"heic").unwrap();
        let out = tmp.path().join("images.kmz");

        let summary = build_with(
            &MockExtractor::new(),
            &MockConverter::new().failing_on("bad.heic"),
            &src,
            &out,
            &RunConfig::default(),
        )
        .unwrap();

        assert_eq!(summary.counts.non_image, 1);
        assert!(tmp.path().join("files_nonimg/bad.heic").exists());
        let csv = fs::read_to_string(tmp.path().join("images_report.csv")).unwrap();
        assert!(csv.contains("1,bad.heic,,,,NON_IMAGE"));
    }

    #[test]
    fn empty_source_still_writes_outputs() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("photos");
        fs::create_dir_all(&src).unwrap();
        let out = tmp.path().join("images.kmz");

        let summary = build_with(
            &MockExtractor::new(),
            &MockConverter::new(),
            &src,
            &out,
            &RunConfig::default(),
        )
        .unwrap();

        assert_eq!(summary.counts.total(), 0);
        assert!(!read_zip_entry(&out, "doc.kml").contains("<Placemark>"));
        assert_eq!(
            fs::read_to_string(tmp.path().join("images_report.csv")).unwrap(),
            "slno,filename,datetime,lat,long,status\n"
        );
    }

    #[test]
    fn missing_source_is_fatal_and_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("images.kmz");

        let result = build_with(
            &MockExtractor::new(),
            &MockConverter::new(),
            &tmp.path().join("nope"),
            &out,
            &RunConfig::default(),
        );

        assert!(matches!(result, Err(BuildError::Scan(ScanError::SourceNotFound(_)))));
        assert!(!out.exists());
        assert!(!tmp.path().join("images_report.csv").exists());
    }

    #[test]
    fn unwritable_report_leaves_no_archive() {
        let (tmp, extractor) = setup_source();
        let out_dir = tmp.path().join("out");
        fs::create_dir_all(out_dir.join("images_report.csv")).unwrap();

        let result = build_with(
            &extractor,
            &MockConverter::new(),
            &tmp.path().join("photos"),
            &out_dir.join("images.kmz"),
            &RunConfig::default(),
        );

        assert!(result.is_err());
        assert!(!out_dir.join("images.kmz").exists());
        assert!(out_dir.join("images_report.csv").is_dir());
    }

    #[test]
    fn unwritable_bucket_folder_leaves_no_outputs() {
        let (tmp, extractor) = setup_source();
        let out_dir = tmp.path().join("out");
        fs::create_dir_all(&out_dir).unwrap();
        fs::write(out_dir.join("files_geo"), b"in the way").unwrap();

        let result = build_with(
            &extractor,
            &MockConverter::new(),
            &tmp.path().join("photos"),
            &out_dir.join("images.kmz"),
            &RunConfig::default(),
        );

        assert!(matches!(result, Err(BuildError::OutputDir { .. })));
        assert!(!out_dir.join("images.kmz").exists());
        assert!(!out_dir.join("images_report.csv").exists());
    }

    #[test]
    fn failed_run_keeps_previous_outputs() {
        let (tmp, extractor) = setup_source();
        let out_dir = tmp.path().join("out");
        fs::create_dir_all(&out_dir).unwrap();
        fs::write(out_dir.join("images.kmz"), b"previous map").unwrap();
        fs::write(out_dir.join("files_nonimg"), b"in the way").unwrap();

        let result = build_with(
            &extractor,
            &MockConverter::new(),
            &tmp.path().join("photos"),
            &out_dir.join("images.kmz"),
            &RunConfig::default(),
        );

        assert!(result.is_err());
        assert_eq!(fs::read(out_dir.join("images.kmz")).unwrap(), b"previous map");
        // No staged temp files are left behind.
        let leftovers: Vec<_> = fs::read_dir(&out_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.starts_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn same_stem_conversions_embed_both_photos() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("photos");
        fs::create_dir_all(src.join("day1")).unwrap();
        fs::create_dir_all(src.join("day2")).unwrap();
        fs::write(src.join("day1/IMG_1.HEIC"), b"heic").unwrap();
        fs::write(src.join("day2/IMG_1.HEIC"), b"heic").unwrap();
        let extractor =
            MockExtractor::new().with("IMG_1.HEIC", geo(1.0, 2.0, "2024-05-01 10:00:00"));
        let work = TempDir::new().unwrap();

        let batch = scan_batch_with(
            &extractor,
            &MockConverter::new(),
            &src,
            &RunConfig::default(),
            work.path(),
        )
        .unwrap();

        let geotagged = batch.geotagged();
        assert_eq!(geotagged.len(), 2);
        assert_eq!(geotagged[0].record.display_name, "IMG_1.jpg");
        assert_eq!(geotagged[1].record.display_name, "IMG_1-2.jpg");
        assert_ne!(geotagged[0].record.source_path, geotagged[1].record.source_path);
    }

    #[test]
    fn output_path_that_is_a_directory_is_rejected() {
        let (tmp, extractor) = setup_source();
        let out = tmp.path().join("taken.kmz");
        fs::create_dir_all(&out).unwrap();

        let result = build_with(
            &extractor,
            &MockConverter::new(),
            &tmp.path().join("photos"),
            &out,
            &RunConfig::default(),
        );
        assert!(matches!(result, Err(BuildError::OutputIsDirectory(_))));
    }

    #[test]
    fn extraction_failure_is_not_fatal() {
        let (tmp, _) = setup_source();
        let extractor = MockExtractor::new().failing_on("a.jpg");

        let summary = build_with(
            &extractor,
            &MockConverter::new(),
            &tmp.path().join("photos"),
            &tmp.path().join("images.kmz"),
            &RunConfig::default(),
        )
        .unwrap();
        assert_eq!(summary.counts.geotagged, 0);
        assert_eq!(summary.counts.non_geotagged, 2);
    }

    // =========================================================================
    // scan_batch_with() tests
    // =========================================================================

    #[test]
    fn scan_batch_orders_and_dedupes() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("photos");
        fs::create_dir_all(src.join("day1")).unwrap();
        fs::create_dir_all(src.join("day2")).unwrap();
        fs::write(src.join("day1/x.jpg"), b"1").unwrap();
        fs::write(src.join("day2/x.jpg"), b"2").unwrap();
        // Both files are named x.jpg, so the mock gives them the same metadata.
        let extractor = MockExtractor::new().with("x.jpg", geo(1.0, 1.0, "2024-05-01 10:00:00"));
        let work = TempDir::new().unwrap();

        let batch = scan_batch_with(
            &extractor,
            &MockConverter::new(),
            &src,
            &RunConfig::default(),
            work.path(),
        )
        .unwrap();

        let names: Vec<&str> = batch
            .geotagged()
            .iter()
            .map(|e| e.record.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["x.jpg", "x-2.jpg"]);
        assert!(batch.geotagged()[1].record.original_path.ends_with("day2/x.jpg"));
    }
}
