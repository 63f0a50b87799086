//! Job file discovery and per-layer file naming.

use std::fs;
use std::path::{Path, PathBuf};

use crate::console::Console;
use crate::error::{AppError, Result};

/// Substring that marks the first layer's file.
pub const FIRST_LAYER_TOKEN: &str = "1.";

/// Result of scanning a job directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobScan {
    /// Number of files carrying the job-file marker.
    pub layer_count: u32,
    /// First accepted file whose name contains `1.`.
    pub first_layer: Option<PathBuf>,
    /// Files skipped for lacking the marker.
    pub rejected: Vec<PathBuf>,
}

impl JobScan {
    /// First-layer file, or a `FileFormat` error when none was found.
    pub fn require_first_layer(&self) -> Result<&Path> {
        self.first_layer.as_deref().ok_or_else(|| {
            AppError::file_format(format!(
                "no first-layer job file among {} layer files",
                self.layer_count
            ))
        })
    }
}

/// Scan `dir` for job files.
///
/// Entries are visited in name order. Subdirectories are ignored, files
/// without `marker` in their name are reported and skipped, and an entry
/// that cannot be inspected is logged without aborting the scan.
///
/// # Errors
/// Returns `AppError::Io` if the directory itself cannot be read.
pub fn scan(dir: &Path, marker: &str, console: &Console) -> Result<JobScan> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        match entry {
            Ok(entry) => entries.push(entry.path()),
            Err(e) => console.error(format!("Error: {e}...")),
        }
    }
    entries.sort();

    let mut result = JobScan::default();
    for path in entries {
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => continue,
            Err(e) => {
                console.error(format!("Error: {e}..."));
                continue;
            }
        }

        console.info(format!("Processing file {}...", path.display()));
        let name = file_name(&path);

        if !name.contains(marker) {
            console.error(format!("Invalid file format: {}...", path.display()));
            result.rejected.push(path);
            continue;
        }

        result.layer_count += 1;
        if result.first_layer.is_none() && name.contains(FIRST_LAYER_TOKEN) {
            console.info(format!("Loaded file {}...", path.display()));
            result.first_layer = Some(path);
        }
    }

    console.info(format!("Total number of layers: {}", result.layer_count));
    Ok(result)
}

/// Check that `path` names a job file.
///
/// # Errors
/// Returns `AppError::FileFormat` when the marker is missing from the path.
pub fn validate_job_file(path: &Path, marker: &str) -> Result<()> {
    if path.to_string_lossy().contains(marker) {
        Ok(())
    } else {
        Err(AppError::file_format(format!(
            "{} is not a .{marker} file",
            path.display()
        )))
    }
}

/// Job file for `layer`, derived from the first layer's file.
///
/// Layer 1 is the base file itself. For later layers the trailing digits of
/// the file stem are replaced by the layer number (or the number is appended
/// when the stem has none); the extension is kept.
pub fn layer_file_path(base: &Path, layer: u32) -> PathBuf {
    if layer <= 1 {
        return base.to_path_buf();
    }

    let stem = base.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let prefix = stem.trim_end_matches(|c: char| c.is_ascii_digit());

    let mut name = format!("{prefix}{layer}");
    if let Some(ext) = base.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    base.with_file_name(name)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
