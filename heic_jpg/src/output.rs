//! Writing converted JPGs to disk.

use crate::errors::{HeicJpgError, Result};
use crate::item::{ConversionItem, ItemId, ItemStatus};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where one `Done` item went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFile {
    pub item: ItemId,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OutputSummary {
    pub written: Vec<OutputFile>,
    /// Destinations that already existed and were left alone.
    pub skipped: Vec<OutputFile>,
    pub bytes_written: u64,
}

impl OutputSummary {
    pub fn is_empty(&self) -> bool {
        self.written.is_empty() && self.skipped.is_empty()
    }

    pub fn was_skipped(&self, id: ItemId) -> bool {
        self.skipped.iter().any(|file| file.item == id)
    }
}

/// `<stem>.jpg`, or `<stem> (n).jpg` when an earlier item in the same batch
/// already claimed that name. Names are compared case-insensitively.
fn unique_file_name(stem: &str, claimed: &mut HashSet<String>) -> String {
    let mut name = format!("{}.jpg", stem);
    let mut n = 1;
    while !claimed.insert(name.to_lowercase()) {
        name = format!("{} ({}).jpg", stem, n);
        n += 1;
    }
    name
}

/// Write every `Done` item to `<dir>/<display_name>.jpg`. Items sharing a
/// display name get numbered names so none overwrites another.
pub fn write_outputs(items: &[ConversionItem], dir: &Path, overwrite: bool) -> Result<OutputSummary> {
    std::fs::create_dir_all(dir).map_err(|source| HeicJpgError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut summary = OutputSummary::default();
    let mut claimed = HashSet::new();

    for item in items.iter().filter(|i| i.status() == ItemStatus::Done) {
        let Some(jpeg) = item.output() else {
            continue;
        };
        let path = dir.join(unique_file_name(item.display_name(), &mut claimed));
        let file = OutputFile {
            item: item.id(),
            path,
        };

        if file.path.exists() && !overwrite {
            debug!(path = %file.path.display(), "Output exists, skipping");
            summary.skipped.push(file);
            continue;
        }

        std::fs::write(&file.path, jpeg.as_ref()).map_err(|source| HeicJpgError::Write {
            path: file.path.clone(),
            source,
        })?;
        summary.bytes_written += jpeg.len() as u64;
        summary.written.push(file);
    }

    info!(
        written = summary.written.len(),
        skipped = summary.skipped.len(),
        bytes = summary.bytes_written,
        dir = %dir.display(),
        "Outputs written"
    );
    Ok(summary)
}
