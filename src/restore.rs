//! Reversing an organize run from its move record.
//!
//! Restoring replays a [`MoveRecord`] in order, moving each entry back to the
//! target directory under its original name. Unlike organizing it is
//! best-effort: a failed entry is logged and collected, and the loop goes on.
//! Entries whose organized path no longer exists are skipped, which makes a
//! second restore of the same record a no-op.
//!
//! Afterwards each touched category folder loses its marker and is removed
//! if empty. The category label stored in the record decides which folder is
//! cleaned, whatever the current configuration says.

use crate::error::{MoveError, RecordFormatError};
use crate::file_category::is_plain_folder_name;
use crate::fs_ops::{move_entry, resolve_collision};
use crate::marker::{FolderMarker, platform_marker};
use crate::record::{MoveRecord, MoveRecordEntry};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A category folder left in place because it still holds entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedDir {
    pub path: PathBuf,
    pub remaining: Vec<OsString>,
}

/// Outcome of one restore run.
#[derive(Debug, Default)]
pub struct RestoreSummary {
    pub restored_count: usize,
    /// Category labels that had at least one entry restored, in first-seen order.
    pub categories_touched: Vec<String>,
    /// Entries whose organized path no longer exists.
    pub skipped: usize,
    pub failed: Vec<MoveError>,
    pub removed_dirs: Vec<PathBuf>,
    pub retained_dirs: Vec<RetainedDir>,
}

impl RestoreSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Restorer<'a> {
    marker: &'a dyn FolderMarker,
}

impl<'a> Restorer<'a> {
    pub fn new(marker: &'a dyn FolderMarker) -> Self {
        Self { marker }
    }

    /// Loads the record at `path` and restores it into `target`.
    ///
    /// # Errors
    ///
    /// Returns a `RecordFormatError` if the record cannot be read or is
    /// malformed. The filesystem is untouched in that case.
    pub fn restore_from_file(
        &self,
        path: &Path,
        target: &Path,
    ) -> Result<RestoreSummary, RecordFormatError> {
        let record = MoveRecord::load(path)?;
        Ok(self.restore(&record, target))
    }

    /// Moves every recorded entry back into `target`, then cleans up the
    /// category folders that were touched.
    pub fn restore(&self, record: &MoveRecord, target: &Path) -> RestoreSummary {
        let mut summary = RestoreSummary::default();

        tracing::info!(
            dir = %target.display(),
            entries = record.len(),
            batch = %record.timestamp,
            "restoring"
        );

        for entry in &record.files {
            match self.restore_entry(entry, target) {
                Ok(Some(destination)) => {
                    tracing::info!(
                        from = %entry.new_path.display(),
                        to = %destination.display(),
                        "restored"
                    );
                    summary.restored_count += 1;
                    if !summary.categories_touched.contains(&entry.category) {
                        summary.categories_touched.push(entry.category.clone());
                    }
                }
                Ok(None) => {
                    tracing::debug!(path = %entry.new_path.display(), "already gone, skipping");
                    summary.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "could not restore entry");
                    summary.failed.push(e);
                }
            }
        }

        let touched = summary.categories_touched.clone();
        for label in &touched {
            self.clean_category_dir(target, label, &mut summary);
        }

        summary
    }

    /// Returns the destination, or `None` when there is nothing to move.
    fn restore_entry(
        &self,
        entry: &MoveRecordEntry,
        target: &Path,
    ) -> Result<Option<PathBuf>, MoveError> {
        let Ok(metadata) = fs::symlink_metadata(&entry.new_path) else {
            return Ok(None);
        };
        // Validated when the record was parsed.
        let Some(name) = entry.original_path.file_name() else {
            return Ok(None);
        };

        let is_dir = metadata.is_dir();
        let destination = resolve_collision(&target.join(name), is_dir);
        move_entry(&entry.new_path, &destination).map_err(|source| MoveError::Move {
            from: entry.new_path.clone(),
            to: destination.clone(),
            source,
        })?;
        Ok(Some(destination))
    }

    fn clean_category_dir(&self, target: &Path, label: &str, summary: &mut RestoreSummary) {
        if !is_plain_folder_name(label) {
            tracing::warn!(category = %label, "category is not a plain folder name, leaving it alone");
            return;
        }

        let dir = target.join(label);
        if !dir.is_dir() {
            return;
        }

        if let Err(e) = self.marker.unmark(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "could not remove folder marker");
        }

        match remaining_entries(&dir) {
            Ok(remaining) if remaining.is_empty() => match fs::remove_dir(&dir) {
                Ok(()) => {
                    tracing::info!(dir = %dir.display(), "removed empty category folder");
                    summary.removed_dirs.push(dir);
                }
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "could not remove category folder");
                }
            },
            Ok(remaining) => {
                tracing::info!(
                    dir = %dir.display(),
                    remaining = remaining.len(),
                    "category folder not empty, keeping it"
                );
                summary.retained_dirs.push(RetainedDir {
                    path: dir,
                    remaining,
                });
            }
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "could not list category folder");
            }
        }
    }
}

fn remaining_entries(dir: &Path) -> io::Result<Vec<OsString>> {
    let mut names = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<io::Result<Vec<_>>>()?;
    names.sort();
    Ok(names)
}

/// Restores `record` into `target` with the platform's folder marker.
pub fn restore(record: &MoveRecord, target: &Path) -> RestoreSummary {
    let marker = platform_marker();
    Restorer::new(marker.as_ref()).restore(record, target)
}
