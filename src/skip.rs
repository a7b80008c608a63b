//! Exclusion rules for organizing and backing up.
//!
//! Checks are performed in this order, with early termination:
//! 1. Directories: skipped unless the mode's include-folders flag is set
//! 2. Excluded extension: skipped
//! 3. Excluded name pattern: skipped
//! 4. Size strictly above the limit: skipped
//! 5. Default: kept
//!
//! A failed `stat` never propagates. An entry whose metadata cannot be read is
//! treated as a file and passes the size check.

use crate::config::SkipConfig;
use crate::file_category::extension_of;
use glob::Pattern;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Which operation is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipMode {
    Organize,
    Backup,
}

/// Compiled form of [`SkipConfig`], built once per operation.
#[derive(Debug, Clone)]
pub struct SkipPolicy {
    excluded_extensions: HashSet<String>,
    excluded_patterns: Vec<Pattern>,
    max_file_size_mb: f64,
    include_folders_in_organize: bool,
    include_folders_in_backup: bool,
}

impl SkipPolicy {
    /// Compiles the policy. Invalid glob patterns are dropped with a warning;
    /// configuration loading rejects them before they get here.
    pub fn new(config: &SkipConfig) -> Self {
        let excluded_patterns = config
            .excluded_patterns
            .iter()
            .filter_map(|pattern| match Pattern::new(pattern) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();

        Self {
            excluded_extensions: config
                .excluded_extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            excluded_patterns,
            max_file_size_mb: config.max_file_size_mb,
            include_folders_in_organize: config.include_folders_in_organize,
            include_folders_in_backup: config.include_folders_in_backup,
        }
    }

    /// Whether `path` is left out of the given operation.
    pub fn should_skip(&self, path: &Path, mode: SkipMode) -> bool {
        let metadata = fs::metadata(path).ok();

        if metadata.as_ref().is_some_and(|m| m.is_dir()) {
            return !self.includes_folders(mode);
        }

        if self.is_excluded_extension(path) || self.matches_excluded_pattern(path) {
            return true;
        }

        metadata.is_some_and(|m| self.exceeds_size_limit(m.len()))
    }

    pub fn includes_folders(&self, mode: SkipMode) -> bool {
        match mode {
            SkipMode::Organize => self.include_folders_in_organize,
            SkipMode::Backup => self.include_folders_in_backup,
        }
    }

    /// `true` when `bytes` is strictly above the configured limit.
    pub fn exceeds_size_limit(&self, bytes: u64) -> bool {
        bytes as f64 / BYTES_PER_MB > self.max_file_size_mb
    }

    fn is_excluded_extension(&self, path: &Path) -> bool {
        let extension = extension_of(path);
        !extension.is_empty() && self.excluded_extensions.contains(&extension)
    }

    fn matches_excluded_pattern(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy();
        self.excluded_patterns
            .iter()
            .any(|pattern| pattern.matches(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    const MB: u64 = 1024 * 1024;

    fn policy(max_mb: f64) -> SkipPolicy {
        SkipPolicy::new(&SkipConfig {
            max_file_size_mb: max_mb,
            ..SkipConfig::default()
        })
    }

    fn sized_file(dir: &Path, name: &str, len: u64) -> std::path::PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).expect("Failed to create file");
        file.set_len(len).expect("Failed to size file");
        path
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let at_limit = sized_file(temp_dir.path(), "at_limit.bin", 2 * MB);
        let above = sized_file(temp_dir.path(), "above.bin", 2 * MB + 1);

        let policy = policy(2.0);
        assert!(!policy.should_skip(&at_limit, SkipMode::Organize));
        assert!(policy.should_skip(&above, SkipMode::Organize));
        assert!(policy.should_skip(&above, SkipMode::Backup));
    }

    #[test]
    fn test_exceeds_size_limit_uses_binary_megabytes() {
        let policy = policy(1.0);
        assert!(!policy.exceeds_size_limit(MB));
        assert!(policy.exceeds_size_limit(MB + 1));
        assert!(!policy.exceeds_size_limit(1_000_001));
    }

    #[test]
    fn test_excluded_extensions() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let shortcut = sized_file(temp_dir.path(), "App.LNK", 10);
        let doc = sized_file(temp_dir.path(), "doc.txt", 10);

        let policy = policy(100.0);
        assert!(policy.should_skip(&shortcut, SkipMode::Organize));
        assert!(!policy.should_skip(&doc, SkipMode::Organize));
    }

    #[test]
    fn test_excluded_patterns() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let lock = sized_file(temp_dir.path(), "~$report.docx", 10);
        let report = sized_file(temp_dir.path(), "report.docx", 10);

        let policy = SkipPolicy::new(&SkipConfig {
            excluded_patterns: vec!["~$*".to_string()],
            ..SkipConfig::default()
        });
        assert!(policy.should_skip(&lock, SkipMode::Organize));
        assert!(!policy.should_skip(&report, SkipMode::Organize));
    }

    #[test]
    fn test_directories_follow_mode_flags() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let folder = temp_dir.path().join("notes");
        fs::create_dir(&folder).expect("Failed to create directory");

        let excluded = policy(100.0);
        assert!(excluded.should_skip(&folder, SkipMode::Organize));
        assert!(excluded.should_skip(&folder, SkipMode::Backup));

        let organize_only = SkipPolicy::new(&SkipConfig {
            include_folders_in_organize: true,
            ..SkipConfig::default()
        });
        assert!(!organize_only.should_skip(&folder, SkipMode::Organize));
        assert!(organize_only.should_skip(&folder, SkipMode::Backup));
    }

    #[test]
    fn test_directories_ignore_extension_rules() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let folder = temp_dir.path().join("links.lnk");
        fs::create_dir(&folder).expect("Failed to create directory");

        let policy = SkipPolicy::new(&SkipConfig {
            include_folders_in_organize: true,
            ..SkipConfig::default()
        });
        assert!(!policy.should_skip(&folder, SkipMode::Organize));
    }

    #[test]
    fn test_missing_entry_is_not_skipped_for_size() {
        let policy = policy(0.0);
        assert!(!policy.should_skip(Path::new("/non/existent/file.txt"), SkipMode::Organize));
        // Extension rules still apply when metadata is unavailable.
        assert!(policy.should_skip(Path::new("/non/existent/file.lnk"), SkipMode::Backup));
    }
}
