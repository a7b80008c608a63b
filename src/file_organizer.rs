//! Organizing a directory into category subdirectories.
//!
//! This module walks the direct children of a target directory, classifies
//! each eligible entry, creates category directories on demand and moves the
//! entries into them with collision-safe names. Every move is recorded in a
//! [`MoveRecord`] so the run can be reversed later.
//!
//! Organizing is fail-fast: the first failed move stops the batch and the
//! moves made so far are returned inside [`OrganizeError::Interrupted`].
//! Nothing is rolled back.

use crate::config::AppConfig;
use crate::error::{MoveError, OrganizeError};
use crate::fs_ops::{move_entry, resolve_collision};
use crate::marker::{FolderMarker, platform_marker};
use crate::record::MoveRecord;
use crate::skip::{SkipMode, SkipPolicy};
use chrono::{DateTime, Local};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// An entry that would be moved, as computed by [`Organizer::plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    /// Absolute path of the entry.
    pub source: PathBuf,
    /// The entry's name inside the target directory.
    pub name: OsString,
    /// Destination category label.
    pub category: String,
    pub is_dir: bool,
}

/// Moves the top-level entries of a directory into category folders.
///
/// The organizer borrows a configuration snapshot for its whole lifetime and
/// never changes it. It has no internal locking: callers must not run two
/// operations against the same directory at once.
pub struct Organizer<'a> {
    config: &'a AppConfig,
    policy: SkipPolicy,
    marker: &'a dyn FolderMarker,
}

impl<'a> Organizer<'a> {
    pub fn new(config: &'a AppConfig, marker: &'a dyn FolderMarker) -> Self {
        Self {
            config,
            policy: SkipPolicy::new(&config.skip),
            marker,
        }
    }

    /// Lists what [`organize`](Self::organize) would move, without touching
    /// the filesystem.
    ///
    /// Entries named like a category, and entries rejected by the skip
    /// policy, are left out. The plan is sorted by name.
    ///
    /// # Errors
    ///
    /// Returns `OrganizeError::TargetUnreadable` if the directory cannot be
    /// listed.
    pub fn plan(&self, target: &Path) -> Result<Vec<PlannedMove>, OrganizeError> {
        let unreadable = |source: io::Error| OrganizeError::TargetUnreadable {
            path: target.to_path_buf(),
            source,
        };
        let target = std::path::absolute(target).map_err(unreadable)?;
        let entries = fs::read_dir(&target).map_err(unreadable)?;

        let mut planned = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(dir = %target.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            let name = entry.file_name();
            let path = entry.path();

            if self
                .config
                .categories
                .is_category_label(&name.to_string_lossy())
            {
                tracing::debug!(path = %path.display(), "skipping category folder");
                continue;
            }

            if self.policy.should_skip(&path, SkipMode::Organize) {
                tracing::debug!(path = %path.display(), "skipped by policy");
                continue;
            }

            let is_dir = fs::metadata(&path).is_ok_and(|m| m.is_dir());
            let category = self.config.classify(&path, is_dir).to_string();

            planned.push(PlannedMove {
                source: path,
                name,
                category,
                is_dir,
            });
        }

        planned.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(planned)
    }

    /// Organizes `target` using the current local time as the batch id.
    pub fn organize(&self, target: &Path) -> Result<MoveRecord, OrganizeError> {
        self.organize_at(target, Local::now())
    }

    /// Organizes `target`, stamping every record entry with `now`.
    ///
    /// # Errors
    ///
    /// * `OrganizeError::TargetUnreadable` - the directory could not be
    ///   listed; nothing was moved
    /// * `OrganizeError::Interrupted` - a category directory could not be
    ///   created or an entry could not be moved; the partial record lists
    ///   every entry moved before the failure
    pub fn organize_at(
        &self,
        target: &Path,
        now: DateTime<Local>,
    ) -> Result<MoveRecord, OrganizeError> {
        let plan = self.plan(target)?;
        let mut record = MoveRecord::begin(now);

        tracing::info!(
            dir = %target.display(),
            entries = plan.len(),
            batch = %record.timestamp,
            "organizing"
        );

        for planned in plan {
            if let Err(source) = self.move_planned(&planned, &mut record) {
                tracing::warn!(
                    moved = record.len(),
                    error = %source,
                    "organizing stopped"
                );
                return Err(OrganizeError::Interrupted {
                    partial: record,
                    source,
                });
            }
        }

        Ok(record)
    }

    fn move_planned(
        &self,
        planned: &PlannedMove,
        record: &mut MoveRecord,
    ) -> Result<(), MoveError> {
        let target = planned
            .source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let category_dir = target.join(&planned.category);
        self.ensure_category_dir(&category_dir, &planned.category)?;

        let destination = resolve_collision(&category_dir.join(&planned.name), planned.is_dir);
        move_entry(&planned.source, &destination).map_err(|source| MoveError::Move {
            from: planned.source.clone(),
            to: destination.clone(),
            source,
        })?;

        tracing::info!(
            from = %planned.source.display(),
            to = %destination.display(),
            category = %planned.category,
            "moved"
        );
        record.push(planned.source.clone(), destination, &planned.category);
        Ok(())
    }

    /// Creates the category directory if needed and tags new ones.
    fn ensure_category_dir(&self, dir: &Path, label: &str) -> Result<(), MoveError> {
        if dir.is_dir() {
            return Ok(());
        }

        fs::create_dir(dir).map_err(|source| MoveError::CategoryDir {
            path: dir.to_path_buf(),
            source,
        })?;

        if let Some(rule) = self.config.categories.get(label)
            && let Err(e) = self.marker.mark(dir, rule)
        {
            tracing::warn!(dir = %dir.display(), error = %e, "could not write folder marker");
        }
        Ok(())
    }
}

/// Organizes `target` with the platform's folder marker.
pub fn organize(target: &Path, config: &AppConfig) -> Result<MoveRecord, OrganizeError> {
    let marker = platform_marker();
    Organizer::new(config, marker.as_ref()).organize(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_category::CategoryRule;
    use crate::marker::NoMarker;
    use std::fs;
    use tempfile::TempDir;

    struct FailingMarker;

    impl FolderMarker for FailingMarker {
        fn mark(&self, _folder: &Path, _rule: &CategoryRule) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "marker refused"))
        }

        fn unmark(&self, _folder: &Path) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "marker refused"))
        }
    }

    #[test]
    fn test_organize_creates_category_directories() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::write(base_path.join("report.pdf"), "pdf").unwrap();
        fs::write(base_path.join("photo.jpg"), "jpg").unwrap();
        fs::create_dir(base_path.join("notes")).unwrap();

        let config = AppConfig::default();
        let record = Organizer::new(&config, &NoMarker)
            .organize(base_path)
            .expect("Organize failed");

        assert_eq!(record.len(), 2);
        assert!(base_path.join("Documents").join("report.pdf").exists());
        assert!(base_path.join("Pictures").join("photo.jpg").exists());
        assert!(base_path.join("notes").is_dir());
        assert!(!base_path.join("report.pdf").exists());
    }

    #[test]
    fn test_organize_empty_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = AppConfig::default();

        let record = Organizer::new(&config, &NoMarker)
            .organize(temp_dir.path())
            .expect("Organize failed");

        assert!(record.is_empty());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_organize_uses_existing_directory_and_renames() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::create_dir(base_path.join("Documents")).unwrap();
        fs::write(base_path.join("Documents").join("a.txt"), "old").unwrap();
        fs::write(base_path.join("a.txt"), "new").unwrap();

        let config = AppConfig::default();
        let record = Organizer::new(&config, &NoMarker)
            .organize(base_path)
            .expect("Organize failed");

        let renamed = base_path.join("Documents").join("a_1.txt");
        assert_eq!(record.files[0].new_path, renamed);
        assert_eq!(fs::read_to_string(renamed).unwrap(), "new");
        assert_eq!(
            fs::read_to_string(base_path.join("Documents").join("a.txt")).unwrap(),
            "old"
        );
    }

    #[test]
    fn test_organize_skips_category_named_entries() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::create_dir(base_path.join("Pictures")).unwrap();

        let mut config = AppConfig::default();
        config.skip.include_folders_in_organize = true;

        let record = Organizer::new(&config, &NoMarker)
            .organize(base_path)
            .expect("Organize failed");

        assert!(record.is_empty());
        assert!(!base_path.join("Folders").exists());
    }

    #[test]
    fn test_organize_moves_folders_when_enabled() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::create_dir(base_path.join("project")).unwrap();
        fs::write(base_path.join("project").join("main.rs"), "fn main() {}").unwrap();

        let mut config = AppConfig::default();
        config.skip.include_folders_in_organize = true;

        let record = Organizer::new(&config, &NoMarker)
            .organize(base_path)
            .expect("Organize failed");

        assert_eq!(record.files[0].category, "Folders");
        assert!(base_path.join("Folders").join("project").join("main.rs").exists());
    }

    #[test]
    fn test_plan_does_not_touch_filesystem() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::write(base_path.join("b.mp3"), "b").unwrap();
        fs::write(base_path.join("a.zip"), "a").unwrap();
        fs::write(base_path.join("link.lnk"), "l").unwrap();

        let config = AppConfig::default();
        let plan = Organizer::new(&config, &NoMarker)
            .plan(base_path)
            .expect("Plan failed");

        let summary: Vec<(&str, &str)> = plan
            .iter()
            .map(|p| (p.name.to_str().unwrap(), p.category.as_str()))
            .collect();
        assert_eq!(summary, vec![("a.zip", "Archives"), ("b.mp3", "Music")]);
        assert_eq!(fs::read_dir(base_path).unwrap().count(), 3);
    }

    #[test]
    fn test_failing_marker_does_not_block_organize() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::write(base_path.join("report.pdf"), "pdf").unwrap();

        let config = AppConfig::default();
        let record = Organizer::new(&config, &FailingMarker)
            .organize(base_path)
            .expect("Organize failed");

        assert_eq!(record.len(), 1);
        assert!(base_path.join("Documents").join("report.pdf").exists());
    }

    #[test]
    fn test_category_dir_blocked_by_file_interrupts() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::write(base_path.join("a.mp3"), "a").unwrap();
        fs::write(base_path.join("b.pdf"), "b").unwrap();

        // A plain file occupies the name of the Documents folder. Its name
        // matches a label, so it is never organized itself.
        fs::write(base_path.join("Documents"), "not a folder").unwrap();

        let config = AppConfig::default();
        let result = Organizer::new(&config, &NoMarker).organize(base_path);

        let Err(error) = result else {
            panic!("expected organize to stop");
        };
        let partial = error.partial_record().expect("partial record");
        // a.mp3 sorts first and was moved before b.pdf failed.
        assert_eq!(partial.len(), 1);
        assert_eq!(partial.files[0].category, "Music");
        assert!(base_path.join("Music").join("a.mp3").exists());
        assert!(base_path.join("b.pdf").exists());
    }

    #[test]
    fn test_organize_invalid_base_path() {
        let config = AppConfig::default();
        let result = Organizer::new(&config, &NoMarker).organize(Path::new("/non/existent/path"));
        assert!(matches!(
            result,
            Err(OrganizeError::TargetUnreadable { .. })
        ));
    }
}
