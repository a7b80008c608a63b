//! Error types shared by the organizer, restorer, archiver and configuration.
//!
//! Organizing is fail-fast and hands back whatever was already moved inside
//! [`OrganizeError::Interrupted`]. Restoring and archiving never abort on a
//! single entry; their per-entry failures are collected in the summaries
//! instead of being raised here.

use crate::record::MoveRecord;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, validating or mutating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The document could not be parsed as JSON or TOML.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// An imported bundle lacks a required field.
    #[error("Configuration is missing required field '{0}'")]
    MissingField(&'static str),

    /// The category set breaks one of its invariants.
    #[error("Invalid category set: {0}")]
    InvalidCategories(String),

    #[error("Category '{0}' already exists")]
    DuplicateCategory(String),

    #[error("Category '{0}' does not exist")]
    UnknownCategory(String),

    /// The catch-all category can be edited but never removed.
    #[error("Category '{0}' is the catch-all and cannot be removed")]
    CatchAllProtected(String),

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidGlobPattern { pattern: String, reason: String },

    #[error("IO error on configuration file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A single filesystem move that did not happen.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("Failed to create category directory {}: {source}", .path.display())]
    CategoryDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors that stop an organize run.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The target directory could not be listed; nothing was touched.
    #[error("Cannot read directory {}: {source}", .path.display())]
    TargetUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A move failed part-way through the batch. Entries in `partial` were
    /// moved and stay moved.
    #[error("Organizing stopped after {} moved entries: {source}", .partial.files.len())]
    Interrupted {
        partial: MoveRecord,
        #[source]
        source: MoveError,
    },
}

impl OrganizeError {
    /// The entries that were moved before the run stopped, if any.
    pub fn partial_record(&self) -> Option<&MoveRecord> {
        match self {
            Self::Interrupted { partial, .. } => Some(partial),
            Self::TargetUnreadable { .. } => None,
        }
    }
}

/// A move record that cannot be trusted for restoring.
#[derive(Debug, Error)]
pub enum RecordFormatError {
    #[error("Failed to read move record {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write move record {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Move record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Move record has no 'files' list")]
    MissingFiles,

    #[error("Move record entry {index} is invalid: {reason}")]
    InvalidEntry { index: usize, reason: String },
}

/// Errors that prevent an archive from being produced at all.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot read directory {}: {source}", .path.display())]
    TargetUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot create archive {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to finalize archive {}: {source}", .path.display())]
    Finish {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}
