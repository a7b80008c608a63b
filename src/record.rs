//! The move record: a receipt of one organize run.
//!
//! ```json
//! {
//!   "timestamp": "20250101_120000",
//!   "datetime": "2025-01-01 12:00:00",
//!   "total_files": 1,
//!   "categories_created": ["Documents"],
//!   "files": [
//!     { "original": "/home/me/Desktop/a.pdf",
//!       "new": "/home/me/Desktop/Documents/a.pdf",
//!       "category": "Documents",
//!       "timestamp": "20250101_120000" }
//!   ]
//! }
//! ```
//!
//! Older receipts were a bare array of `files` entries; both shapes load.

use crate::error::RecordFormatError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Batch identifier format, shared by every entry of one run.
pub const BATCH_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Human-readable time of the run.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One entry that was moved into a category folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecordEntry {
    #[serde(rename = "original")]
    pub original_path: PathBuf,
    #[serde(rename = "new")]
    pub new_path: PathBuf,
    pub category: String,
    #[serde(default)]
    pub timestamp: String,
}

/// All moves of one organize run, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub datetime: String,
    #[serde(default)]
    pub total_files: usize,
    #[serde(default)]
    pub categories_created: Vec<String>,
    pub files: Vec<MoveRecordEntry>,
}

impl MoveRecord {
    /// Starts an empty record for a batch run at `now`.
    pub fn begin(now: DateTime<Local>) -> Self {
        Self {
            timestamp: now.format(BATCH_TIMESTAMP_FORMAT).to_string(),
            datetime: now.format(DATETIME_FORMAT).to_string(),
            total_files: 0,
            categories_created: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Appends a move, keeping `total_files` and `categories_created` current.
    pub fn push(&mut self, original_path: PathBuf, new_path: PathBuf, category: &str) {
        if !self.categories_created.iter().any(|c| c == category) {
            self.categories_created.push(category.to_string());
        }
        self.files.push(MoveRecordEntry {
            original_path,
            new_path,
            category: category.to_string(),
            timestamp: self.timestamp.clone(),
        });
        self.total_files = self.files.len();
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Parses either record shape and checks every entry.
    pub fn from_json_str(text: &str) -> Result<Self, RecordFormatError> {
        let document: Value = serde_json::from_str(text)?;

        let mut record = match document {
            Value::Array(items) => Self::from_legacy(parse_entries(items)?),
            Value::Object(mut fields) => {
                let Some(Value::Array(items)) = fields.remove("files") else {
                    return Err(RecordFormatError::MissingFiles);
                };
                let files = parse_entries(items)?;
                fields.insert("files".to_string(), Value::Array(Vec::new()));
                let mut record: Self = serde_json::from_value(Value::Object(fields))?;
                record.files = files;
                record
            }
            _ => return Err(RecordFormatError::MissingFiles),
        };

        if record.total_files == 0 {
            record.total_files = record.files.len();
        }
        Ok(record)
    }

    /// Builds batch metadata for a bare list of entries.
    fn from_legacy(files: Vec<MoveRecordEntry>) -> Self {
        let timestamp = files
            .first()
            .map(|entry| entry.timestamp.clone())
            .unwrap_or_default();
        let mut categories_created: Vec<String> = Vec::new();
        for entry in &files {
            if !categories_created.contains(&entry.category) {
                categories_created.push(entry.category.clone());
            }
        }

        Self {
            timestamp,
            datetime: String::new(),
            total_files: files.len(),
            categories_created,
            files,
        }
    }

    pub fn to_json(&self) -> Result<String, RecordFormatError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads and validates a record file.
    pub fn load(path: &Path) -> Result<Self, RecordFormatError> {
        let text = fs::read_to_string(path).map_err(|source| RecordFormatError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Writes the record, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), RecordFormatError> {
        let json = self.to_json()?;
        let write_error = |source| RecordFormatError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        fs::write(path, json).map_err(write_error)
    }

    /// Default file name for this record, e.g. `organize_20250101_120000.json`.
    pub fn default_file_name(&self) -> String {
        format!("organize_{}.json", self.timestamp)
    }
}

/// Deserializes entries one by one so errors name the offending index.
fn parse_entries(items: Vec<Value>) -> Result<Vec<MoveRecordEntry>, RecordFormatError> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let entry: MoveRecordEntry = serde_json::from_value(item)
                .map_err(|e| RecordFormatError::InvalidEntry {
                    index,
                    reason: e.to_string(),
                })?;
            if entry.original_path.file_name().is_none() {
                return Err(RecordFormatError::InvalidEntry {
                    index,
                    reason: "'original' has no file name".to_string(),
                });
            }
            Ok(entry)
        })
        .collect()
}
