//! desktidy - A desktop organization and backup utility
//!
//! This library sorts the top-level entries of a directory into category
//! folders by extension, records every move so the run can be restored, and
//! writes zip snapshots of the directory. Categories and skip rules are
//! configured through JSON or TOML files.

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod file_category;
pub mod file_organizer;
pub mod fs_ops;
pub mod marker;
pub mod output;
pub mod record;
pub mod restore;
pub mod skip;

pub use archive::{ArchiveSummary, Archiver};
pub use config::{AppConfig, ConfigBundle, ConfigStore, SkipConfig};
pub use error::{ArchiveError, ConfigError, MoveError, OrganizeError, RecordFormatError};
pub use file_category::{CategoryRule, CategorySet};
pub use file_organizer::{Organizer, PlannedMove};
pub use marker::FolderMarker;
pub use record::{MoveRecord, MoveRecordEntry};
pub use restore::{RestoreSummary, Restorer};
pub use skip::{SkipMode, SkipPolicy};

pub use cli::{Command, run_cli};
