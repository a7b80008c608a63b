//! Command-line interface module for desktidy.
//!
//! This module handles all CLI-related functionality including:
//! - Command definitions (parsed by `clap` in the binary)
//! - Organization, dry runs and restoring from move records
//! - Desktop backups with a progress bar
//! - Category and configuration management
//!
//! Every command returns `Result<(), String>`; the binary prints the error.

use crate::archive::{Archiver, default_archive_name};
use crate::config::{APP_NAME, AppConfig, ConfigBundle, ConfigStore, LOCAL_CONFIG_FILE};
use crate::error::{ConfigError, OrganizeError};
use crate::file_category::{CategoryRule, infer_icon};
use crate::file_organizer::Organizer;
use crate::fs_ops::resolve_collision;
use crate::marker::{FolderMarker, NoMarker, platform_marker};
use crate::output::OutputFormatter;
use crate::record::MoveRecord;
use crate::restore::Restorer;
use chrono::Local;
use clap::Subcommand;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A CLI command to execute against the target directory.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Move files into category folders
    Organize {
        /// Show what would be moved without touching anything
        #[arg(long)]
        dry_run: bool,

        /// Where to save the move record
        #[arg(long, value_name = "FILE")]
        record: Option<PathBuf>,

        /// Do not tag new category folders
        #[arg(long)]
        no_marker: bool,
    },

    /// Undo an organize run from its move record
    Restore {
        /// Move record to replay (defaults to the last organize run)
        #[arg(long, value_name = "FILE")]
        record: Option<PathBuf>,
    },

    /// Write a zip snapshot of the directory
    Backup {
        /// Directory for the archive (defaults to the parent of the target)
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// List and edit categories
    #[command(subcommand)]
    Categories(CategoriesCommand),

    /// Show, change, export or import settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Clone, Subcommand)]
pub enum CategoriesCommand {
    List,

    Add {
        label: String,

        /// Extensions such as `.pdf` (the dot is optional)
        #[arg(long = "ext", num_args = 1.., conflicts_with = "folders")]
        extensions: Vec<String>,

        #[arg(long)]
        icon: Option<String>,

        /// Make this the category for folders
        #[arg(long)]
        folders: bool,
    },

    Edit {
        label: String,

        #[arg(long, value_name = "NEW_LABEL")]
        rename: Option<String>,

        /// Replaces the extension list
        #[arg(long = "ext", num_args = 1..)]
        extensions: Option<Vec<String>>,

        #[arg(long)]
        icon: Option<String>,
    },

    Remove { label: String },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigCommand {
    Show,

    Set {
        /// Files above this many MB are left alone
        #[arg(long)]
        max_size_mb: Option<f64>,

        /// Replaces the excluded extension list
        #[arg(long = "exclude", num_args = 1..)]
        excluded_extensions: Option<Vec<String>>,

        /// Replaces the excluded file name patterns
        #[arg(long = "exclude-pattern", num_args = 1..)]
        excluded_patterns: Option<Vec<String>>,

        #[arg(long, value_name = "BOOL")]
        folders_organize: Option<bool>,

        #[arg(long, value_name = "BOOL")]
        folders_backup: Option<bool>,
    },

    /// Write a portable settings bundle
    Export {
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Replace categories, exclusions and size limit from a bundle
    Import { file: PathBuf },
}

/// Where move records are kept.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub records_dir: PathBuf,
    pub last_record: PathBuf,
}

impl DataPaths {
    /// Paths under `root`, e.g. `<root>/records/` and `<root>/last_record.json`.
    pub fn under(root: &Path) -> Self {
        Self {
            records_dir: root.join("records"),
            last_record: root.join("last_record.json"),
        }
    }

    /// Paths under the platform's local data directory.
    pub fn locate() -> Result<Self, String> {
        dirs::data_local_dir()
            .map(|dir| Self::under(&dir.join(APP_NAME)))
            .ok_or_else(|| "Could not determine a data directory for move records".to_string())
    }
}

/// Runs a command with the default configuration search and data paths.
///
/// # Examples
///
/// ```no_run
/// use desktidy::cli::{Command, run_cli};
/// use std::path::Path;
///
/// let command = Command::Organize { dry_run: true, record: None, no_marker: false };
/// if let Err(e) = run_cli(command, Path::new("/home/me/Desktop")) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(command: Command, dir_path: &Path) -> Result<(), String> {
    run_cli_with_config(command, dir_path, None)
}

/// Runs a command with an optional explicit configuration file.
pub fn run_cli_with_config(
    command: Command,
    dir_path: &Path,
    config_path: Option<&Path>,
) -> Result<(), String> {
    run_cli_with_paths(command, dir_path, config_path, &DataPaths::locate()?)
}

/// Runs a command with explicit configuration and record locations.
pub fn run_cli_with_paths(
    command: Command,
    dir_path: &Path,
    config_path: Option<&Path>,
    paths: &DataPaths,
) -> Result<(), String> {
    match command {
        Command::Organize {
            dry_run: true, ..
        } => organize_dry_run(dir_path, config_path),
        Command::Organize {
            record, no_marker, ..
        } => organize_directory(dir_path, config_path, record.as_deref(), no_marker, paths),
        Command::Restore { record } => restore_directory(dir_path, record.as_deref(), paths),
        Command::Backup { output } => backup_directory(dir_path, config_path, output.as_deref()),
        Command::Categories(command) => run_categories(command, config_path),
        Command::Config(command) => run_config(command, config_path),
    }
}

fn load_config(config_path: Option<&Path>) -> Result<AppConfig, String> {
    AppConfig::load(config_path).map_err(|e| format!("Error loading configuration: {}", e))
}

/// The file that configuration changes are written to: the explicit path,
/// else a local `.desktidyrc.toml`, else the per-user store.
fn config_store(config_path: Option<&Path>) -> Result<ConfigStore, String> {
    if let Some(path) = config_path {
        return Ok(ConfigStore::new(path));
    }
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(ConfigStore::new(local));
    }
    ConfigStore::default_path()
        .map(ConfigStore::new)
        .ok_or_else(|| "Could not determine a configuration directory".to_string())
}

fn organize_dry_run(base_path: &Path, config_path: Option<&Path>) -> Result<(), String> {
    OutputFormatter::dry_run_notice(&format!("Analyzing contents of: {}", base_path.display()));

    let config = load_config(config_path)?;
    let plan = Organizer::new(&config, &NoMarker)
        .plan(base_path)
        .map_err(|e| e.to_string())?;

    if plan.is_empty() {
        OutputFormatter::info("Nothing to organize.");
        return Ok(());
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for planned in &plan {
        OutputFormatter::plain(&format!(
            " - {}\n   → Would move to {}/",
            planned.name.to_string_lossy(),
            planned.category
        ));
        *counts.entry(planned.category.as_str()).or_insert(0) += 1;
    }

    OutputFormatter::header("DRY RUN SUMMARY");
    for (category, count) in counts {
        OutputFormatter::plain(&format!("  {}: {}", category, count));
    }
    OutputFormatter::dry_run_notice(&format!("{} entries would be moved. Nothing was modified.", plan.len()));
    Ok(())
}

fn organize_directory(
    base_path: &Path,
    config_path: Option<&Path>,
    record_path: Option<&Path>,
    no_marker: bool,
    paths: &DataPaths,
) -> Result<(), String> {
    OutputFormatter::info(&format!("Organizing contents of: {}", base_path.display()));

    let config = load_config(config_path)?;
    let marker: Box<dyn FolderMarker> = if no_marker {
        Box::new(NoMarker)
    } else {
        platform_marker()
    };

    match Organizer::new(&config, marker.as_ref()).organize(base_path) {
        Ok(record) if record.is_empty() => {
            OutputFormatter::info("Nothing to organize.");
            Ok(())
        }
        Ok(record) => {
            let saved = save_record(&record, record_path, paths)?;
            OutputFormatter::summary_table(&record);
            OutputFormatter::success(&format!("Organized {} entries", record.len()));
            OutputFormatter::plain(&format!(
                "Move record saved to {}. Run 'desktidy restore' to undo.",
                saved.display()
            ));
            Ok(())
        }
        Err(OrganizeError::Interrupted { partial, source }) => {
            let mut message = format!(
                "Organizing stopped after {} entries: {}",
                partial.len(),
                source
            );
            if !partial.is_empty() {
                match save_record(&partial, record_path, paths) {
                    Ok(saved) => message.push_str(&format!(
                        "\nPartial move record saved to {}",
                        saved.display()
                    )),
                    Err(e) => message.push_str(&format!("\n{}", e)),
                }
            }
            Err(message)
        }
        Err(e) => Err(e.to_string()),
    }
}

/// Saves `record` to its own file and refreshes the last-record copy.
fn save_record(
    record: &MoveRecord,
    record_path: Option<&Path>,
    paths: &DataPaths,
) -> Result<PathBuf, String> {
    // Two runs in the same second share a timestamp; never overwrite a receipt.
    let path = match record_path {
        Some(path) => path.to_path_buf(),
        None => resolve_collision(&paths.records_dir.join(record.default_file_name()), false),
    };

    record
        .save(&path)
        .map_err(|e| format!("Could not save move record: {}", e))?;
    if let Err(e) = record.save(&paths.last_record) {
        OutputFormatter::warning(&format!("Could not update last move record: {}", e));
    }
    Ok(path)
}

fn restore_directory(
    base_path: &Path,
    record_path: Option<&Path>,
    paths: &DataPaths,
) -> Result<(), String> {
    let record_path = record_path.unwrap_or(paths.last_record.as_path());
    if !record_path.exists() {
        return Err(format!(
            "No move record found at {}. Pass --record to choose one.",
            record_path.display()
        ));
    }

    OutputFormatter::info(&format!(
        "Restoring {} from {}",
        base_path.display(),
        record_path.display()
    ));

    let marker = platform_marker();
    let summary = Restorer::new(marker.as_ref())
        .restore_from_file(record_path, base_path)
        .map_err(|e| e.to_string())?;

    OutputFormatter::restore_summary(&summary);
    if summary.is_clean() {
        OutputFormatter::success(&format!("Restored {} entries", summary.restored_count));
    } else {
        OutputFormatter::warning("Some entries could not be restored. Please review errors above.");
    }
    Ok(())
}

fn backup_directory(
    base_path: &Path,
    config_path: Option<&Path>,
    output_dir: Option<&Path>,
) -> Result<(), String> {
    let config = load_config(config_path)?;
    let output_dir = output_dir
        .or_else(|| base_path.parent())
        .unwrap_or(base_path);
    let destination = output_dir.join(default_archive_name(Local::now()));

    OutputFormatter::info(&format!(
        "Backing up {} to {}",
        base_path.display(),
        destination.display()
    ));

    let pb = OutputFormatter::create_progress_bar(0);
    let summary = Archiver::new(&config.skip)
        .archive(base_path, &destination, |done, total| {
            if done == 0 {
                pb.set_length(total as u64);
            } else {
                pb.set_position(done as u64);
            }
        })
        .map_err(|e| e.to_string())?;
    pb.finish_and_clear();

    for failure in &summary.failed {
        OutputFormatter::warning(&format!(
            "Skipped {}: {}",
            failure.path.display(),
            failure.source
        ));
    }
    OutputFormatter::success(&format!(
        "Backed up {} of {} files to {}",
        summary.files_written,
        summary.enumerated,
        destination.display()
    ));
    Ok(())
}

fn run_categories(command: CategoriesCommand, config_path: Option<&Path>) -> Result<(), String> {
    let (store, message) = match command {
        CategoriesCommand::List => {
            let config = load_config(config_path)?;
            OutputFormatter::categories_table(&config.categories);
            return Ok(());
        }
        CategoriesCommand::Add {
            label,
            extensions,
            icon,
            folders,
        } => {
            let icon = icon.unwrap_or_else(|| infer_icon(&label).to_string());
            let rule = if folders {
                CategoryRule::folders(&label, &icon)
            } else if extensions.is_empty() {
                return Err("A category needs at least one --ext, or --folders".to_string());
            } else {
                CategoryRule::new(&label, &extensions, &icon)
            };
            let store = config_store(config_path)?;
            store
                .update(|config| config.add_category(rule))
                .map_err(|e| e.to_string())?;
            (store, format!("Added category '{}'", label))
        }
        CategoriesCommand::Edit {
            label,
            rename,
            extensions,
            icon,
        } => {
            let store = config_store(config_path)?;
            store
                .update(|config| {
                    let current = config
                        .categories
                        .get(&label)
                        .cloned()
                        .ok_or_else(|| ConfigError::UnknownCategory(label.clone()))?;
                    let new_label = rename.as_deref().unwrap_or(&label);
                    let extensions = extensions.unwrap_or(current.extensions);
                    let icon = icon.unwrap_or(current.icon);
                    config.edit_category(&label, CategoryRule::new(new_label, &extensions, &icon))
                })
                .map_err(|e| e.to_string())?;
            (store, format!("Updated category '{}'", label))
        }
        CategoriesCommand::Remove { label } => {
            let store = config_store(config_path)?;
            store
                .update(|config| config.remove_category(&label).map(|_| ()))
                .map_err(|e| e.to_string())?;
            (store, format!("Removed category '{}'", label))
        }
    };

    OutputFormatter::success(&format!("{} ({})", message, store.path().display()));
    Ok(())
}

fn run_config(command: ConfigCommand, config_path: Option<&Path>) -> Result<(), String> {
    match command {
        ConfigCommand::Show => {
            let config = load_config(config_path)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| e.to_string())?;
            OutputFormatter::plain(&json);
            Ok(())
        }
        ConfigCommand::Set {
            max_size_mb,
            excluded_extensions,
            excluded_patterns,
            folders_organize,
            folders_backup,
        } => {
            let store = config_store(config_path)?;
            store
                .update(|config| {
                    if let Some(max) = max_size_mb {
                        config.skip.max_file_size_mb = max;
                    }
                    if let Some(extensions) = &excluded_extensions {
                        config.set_excluded_extensions(extensions);
                    }
                    if let Some(patterns) = excluded_patterns {
                        config.skip.excluded_patterns = patterns;
                    }
                    if let Some(flag) = folders_organize {
                        config.skip.include_folders_in_organize = flag;
                    }
                    if let Some(flag) = folders_backup {
                        config.skip.include_folders_in_backup = flag;
                    }
                    Ok(())
                })
                .map_err(|e| e.to_string())?;
            OutputFormatter::success(&format!("Settings saved to {}", store.path().display()));
            Ok(())
        }
        ConfigCommand::Export { output } => {
            let config = load_config(config_path)?;
            let json = ConfigBundle::export(&config)
                .to_json()
                .map_err(|e| e.to_string())?;
            match output {
                Some(path) => {
                    fs::write(&path, json)
                        .map_err(|e| format!("Could not write {}: {}", path.display(), e))?;
                    OutputFormatter::success(&format!("Settings exported to {}", path.display()));
                }
                None => OutputFormatter::plain(&json),
            }
            Ok(())
        }
        ConfigCommand::Import { file } => {
            let text = fs::read_to_string(&file)
                .map_err(|e| format!("Could not read {}: {}", file.display(), e))?;
            let bundle = ConfigBundle::parse(&text).map_err(|e| e.to_string())?;
            let store = config_store(config_path)?;
            store
                .update(|config| {
                    bundle.apply_to(config);
                    Ok(())
                })
                .map_err(|e| e.to_string())?;
            OutputFormatter::success(&format!("Settings imported into {}", store.path().display()));
            Ok(())
        }
    }
}
