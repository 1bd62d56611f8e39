//! File intake: validation of user-selected files and item creation.
//!
//! The rules are all-or-nothing at the batch level: too many files or too
//! many total bytes rejects everything, while per-file problems (wrong type,
//! too large) only drop that file. Callers refuse to submit when any error
//! was reported.

use crate::errors::{HeicJpgError, Result};
use crate::item::ConversionItem;
use serde::{Deserialize, Serialize};
use shared_utils::common_utils::{has_extension, strip_extension};
use shared_utils::{FileSize, HEIC_EXTENSIONS};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakePolicy {
    pub max_files: usize,
    pub max_file_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self {
            max_files: 10,
            max_file_bytes: 50 * FileSize::MB,
            max_total_bytes: 200 * FileSize::MB,
        }
    }
}

/// A file that passed the per-file checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedFile {
    pub path: PathBuf,
    pub display_name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeReport {
    pub accepted: Vec<AcceptedFile>,
    pub errors: Vec<String>,
}

impl IntakeReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.accepted.iter().map(|f| f.size_bytes).sum()
    }
}

/// `IMG_0001.HEIC` → `IMG_0001`. Other extensions are kept.
pub fn strip_heic_extension(name: &str) -> &str {
    strip_extension(name, HEIC_EXTENSIONS)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn too_many_files(max: usize, selected: usize) -> String {
    format!("Maximum {} files allowed. Selected {} files.", max, selected)
}

impl IntakePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_files(mut self, n: usize) -> Self {
        self.max_files = n;
        self
    }

    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    pub fn with_max_total_bytes(mut self, bytes: u64) -> Self {
        self.max_total_bytes = bytes;
        self
    }

    /// Check files whose sizes are already known.
    pub fn validate_sized(&self, files: &[(PathBuf, u64)]) -> IntakeReport {
        let mut report = IntakeReport::default();

        if files.len() > self.max_files {
            report.errors.push(too_many_files(self.max_files, files.len()));
            return report;
        }

        for (path, size) in files {
            let name = file_name(path);

            if !has_extension(path, HEIC_EXTENSIONS) {
                report
                    .errors
                    .push(format!("{}: Only HEIC and HEIF files are supported.", name));
                continue;
            }

            if *size > self.max_file_bytes {
                report.errors.push(format!(
                    "{}: File too large ({}MB). Maximum {}MB per file.",
                    name,
                    FileSize::new(*size).rounded_mb(),
                    FileSize::new(self.max_file_bytes).rounded_mb()
                ));
                continue;
            }

            report.accepted.push(AcceptedFile {
                path: path.clone(),
                display_name: strip_heic_extension(&name).to_string(),
                size_bytes: *size,
            });
        }

        let total = report.total_bytes();
        if total > self.max_total_bytes {
            report.errors.push(format!(
                "Total files too large ({}MB). Maximum {}MB total.",
                FileSize::new(total).rounded_mb(),
                FileSize::new(self.max_total_bytes).rounded_mb()
            ));
            report.accepted.clear();
        }

        report
    }

    /// Stat each path and check it. Unreadable paths are reported per file.
    pub fn validate(&self, paths: &[PathBuf]) -> IntakeReport {
        if paths.len() > self.max_files {
            let report = IntakeReport {
                accepted: Vec::new(),
                errors: vec![too_many_files(self.max_files, paths.len())],
            };
            warn!(selected = paths.len(), max = self.max_files, "Intake rejected selection");
            return report;
        }

        let mut unreadable = Vec::new();
        let mut sized = Vec::with_capacity(paths.len());

        for path in paths {
            match std::fs::metadata(path) {
                Ok(meta) if meta.is_file() => sized.push((path.clone(), meta.len())),
                Ok(_) => unreadable.push(format!("{}: Not a regular file.", file_name(path))),
                Err(e) => unreadable.push(format!("{}: {}", file_name(path), e)),
            }
        }

        let mut report = self.validate_sized(&sized);
        report.errors.splice(0..0, unreadable);

        for error in &report.errors {
            warn!(error = %error, "Intake rejected file");
        }
        report
    }
}

/// Read accepted files into fresh `Waiting` items, in order.
pub fn load_items(report: &IntakeReport) -> Result<Vec<ConversionItem>> {
    report
        .accepted
        .iter()
        .map(|file| {
            let bytes = std::fs::read(&file.path).map_err(|source| HeicJpgError::Read {
                path: file.path.clone(),
                source,
            })?;
            let item = ConversionItem::new(file.display_name.clone(), bytes);
            debug!(id = %item.id(), name = item.display_name(), bytes = item.size_bytes(), "Loaded item");
            Ok(item)
        })
        .collect()
}
