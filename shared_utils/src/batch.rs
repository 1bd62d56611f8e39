//! Batch Processing Module
//!
//! Input collection and batch result bookkeeping shared by the tools.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const HEIC_EXTENSIONS: &[&str] = &["heic", "heif"];

pub fn collect_files(dir: &Path, extensions: &[&str], recursive: bool) -> Vec<PathBuf> {
    let walker = if recursive {
        WalkDir::new(dir).follow_links(true)
    } else {
        WalkDir::new(dir).max_depth(1)
    };

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !crate::common_utils::is_hidden_file(e.path()))
        .filter(|e| crate::common_utils::has_extension(e.path(), extensions))
        .map(|e| e.path().to_path_buf())
        .collect();

    files.sort();
    files
}

/// Expand command-line inputs.
///
/// Directories contribute their files matching `extensions`; explicit
/// files are kept as given so later validation can report on them.
/// Duplicates are dropped, first occurrence wins.
pub fn collect_inputs(inputs: &[PathBuf], extensions: &[&str], recursive: bool) -> Vec<PathBuf> {
    let mut seen = std::collections::HashSet::new();
    let mut files = Vec::new();

    for input in inputs {
        let expanded = if input.is_dir() {
            collect_files(input, extensions, recursive)
        } else {
            vec![input.clone()]
        };

        for path in expanded {
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }

    files
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<(PathBuf, String)>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            errors: Vec::new(),
        }
    }

    pub fn success(&mut self) {
        self.total += 1;
        self.succeeded += 1;
    }

    pub fn fail(&mut self, path: PathBuf, error: String) {
        self.total += 1;
        self.failed += 1;
        self.errors.push((path, error));
    }

    pub fn skip(&mut self) {
        self.total += 1;
        self.skipped += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.succeeded as f64 / self.total as f64) * 100.0
        }
    }
}

impl Default for BatchResult {
    fn default() -> Self {
        Self::new()
    }
}
