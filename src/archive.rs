//! Zip snapshots of the target directory.
//!
//! The archiver enumerates first and writes second, so the progress callback
//! knows the total before the first entry is compressed. Per-file failures
//! are logged and collected; only failing to create or finalize the archive
//! itself is an error.

use crate::config::SkipConfig;
use crate::error::ArchiveError;
use crate::record::BATCH_TIMESTAMP_FORMAT;
use crate::skip::{SkipMode, SkipPolicy};
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;
use zip::result::{ZipError, ZipResult};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Working folder of earlier releases. Never archived.
pub const WORKSPACE_DIR_NAME: &str = "桌面整理";

/// Entries at or above this size need zip64 headers.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// `desktop_backup_<timestamp>.zip`
pub fn default_archive_name(now: DateTime<Local>) -> String {
    format!("desktop_backup_{}.zip", now.format(BATCH_TIMESTAMP_FORMAT))
}

/// A file that could not be added to the archive.
#[derive(Debug)]
pub struct FailedEntry {
    pub path: PathBuf,
    pub source: ZipError,
}

#[derive(Debug, Default)]
pub struct ArchiveSummary {
    pub files_written: usize,
    /// Files selected for the archive after skip rules were applied.
    pub enumerated: usize,
    pub failed: Vec<FailedEntry>,
}

/// A file selected for archiving and its name inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ArchiveItem {
    path: PathBuf,
    name: String,
}

pub struct Archiver {
    policy: SkipPolicy,
}

impl Archiver {
    pub fn new(config: &SkipConfig) -> Self {
        Self {
            policy: SkipPolicy::new(config),
        }
    }

    /// Writes the eligible contents of `target` to a new zip at `destination`.
    ///
    /// `on_progress(done, total)` is called once with `done == 0` before
    /// writing starts and once after every attempted file, including failed
    /// ones.
    ///
    /// # Errors
    ///
    /// * `ArchiveError::TargetUnreadable` - `target` could not be listed
    /// * `ArchiveError::Create` - the archive file could not be created
    /// * `ArchiveError::Finish` - the central directory could not be written
    pub fn archive<F>(
        &self,
        target: &Path,
        destination: &Path,
        mut on_progress: F,
    ) -> Result<ArchiveSummary, ArchiveError>
    where
        F: FnMut(usize, usize),
    {
        let items = self.collect(target, destination)?;
        let total = items.len();

        let file = File::create(destination).map_err(|source| ArchiveError::Create {
            path: destination.to_path_buf(),
            source,
        })?;
        let mut zip = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut summary = ArchiveSummary {
            enumerated: total,
            ..ArchiveSummary::default()
        };

        tracing::info!(
            dir = %target.display(),
            archive = %destination.display(),
            files = total,
            "archiving"
        );
        on_progress(0, total);

        for (index, item) in items.into_iter().enumerate() {
            match add_file(&mut zip, &item, options) {
                Ok(()) => {
                    tracing::info!(file = %item.name, "archived");
                    summary.files_written += 1;
                }
                Err(source) => {
                    tracing::warn!(path = %item.path.display(), error = %source, "could not archive file");
                    summary.failed.push(FailedEntry {
                        path: item.path,
                        source,
                    });
                }
            }
            on_progress(index + 1, total);
        }

        zip.finish().map_err(|source| ArchiveError::Finish {
            path: destination.to_path_buf(),
            source,
        })?;

        Ok(summary)
    }

    /// Lists the files to archive, in name order.
    fn collect(&self, target: &Path, destination: &Path) -> Result<Vec<ArchiveItem>, ArchiveError> {
        let unreadable = |source: io::Error| ArchiveError::TargetUnreadable {
            path: target.to_path_buf(),
            source,
        };
        let target = std::path::absolute(target).map_err(unreadable)?;
        let destination = std::path::absolute(destination).unwrap_or_else(|_| destination.to_path_buf());

        let mut children = fs::read_dir(&target)
            .map_err(unreadable)?
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(dir = %target.display(), error = %e, "skipping unreadable entry");
                    None
                }
            })
            .collect::<Vec<_>>();
        children.sort_by_key(|entry| entry.file_name());

        let mut items = Vec::new();
        for child in children {
            let name = child.file_name();
            let path = child.path();

            if name == WORKSPACE_DIR_NAME || path == destination {
                continue;
            }
            if self.policy.should_skip(&path, SkipMode::Backup) {
                tracing::debug!(path = %path.display(), "skipped by policy");
                continue;
            }

            if path.is_dir() {
                self.collect_tree(&target, &path, &destination, &mut items);
            } else {
                items.push(ArchiveItem {
                    name: name.to_string_lossy().into_owned(),
                    path,
                });
            }
        }
        Ok(items)
    }

    fn collect_tree(
        &self,
        target: &Path,
        dir: &Path,
        destination: &Path,
        items: &mut Vec<ArchiveItem>,
    ) {
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_dir() || entry.path() == destination {
                continue;
            }
            if self.policy.should_skip(entry.path(), SkipMode::Backup) {
                tracing::debug!(path = %entry.path().display(), "skipped by policy");
                continue;
            }
            if let Some(name) = archive_name(target, entry.path()) {
                items.push(ArchiveItem {
                    path: entry.into_path(),
                    name,
                });
            }
        }
    }
}

/// `path` relative to `target`, joined with `/`.
fn archive_name(target: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(target).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

fn add_file(
    zip: &mut ZipWriter<File>,
    item: &ArchiveItem,
    options: SimpleFileOptions,
) -> ZipResult<()> {
    let mut source = File::open(&item.path)?;
    let len = source.metadata()?.len();

    zip.start_file(item.name.as_str(), options.large_file(len >= ZIP64_THRESHOLD))?;
    if let Err(e) = io::copy(&mut source, zip) {
        zip.abort_file()?;
        return Err(e.into());
    }
    Ok(())
}

/// Archives `target` into `destination` using `config`'s backup rules.
pub fn archive<F>(
    target: &Path,
    destination: &Path,
    config: &SkipConfig,
    on_progress: F,
) -> Result<ArchiveSummary, ArchiveError>
where
    F: FnMut(usize, usize),
{
    Archiver::new(config).archive(target, destination, on_progress)
}
