//! Configuration document, persistence and export bundles.
//!
//! The core never mutates configuration behind the caller's back: every
//! operation borrows an [`AppConfig`] snapshot. Changes go through the
//! category methods and [`ConfigStore::update`], which validates before it
//! writes anything.
//!
//! # Configuration File Format
//!
//! JSON (default) or TOML, chosen by the file extension:
//!
//! ```json
//! {
//!   "excluded_extensions": [".lnk", ".url"],
//!   "max_file_size_mb": 100,
//!   "include_folders_in_organize": false,
//!   "include_folders_in_backup": false,
//!   "categories": {
//!     "Documents": { "extensions": [".pdf", ".txt"], "icon": "📄" },
//!     "Folders":   { "extensions": ["__FOLDER__"], "icon": "📂" },
//!     "Others":    { "extensions": [], "icon": "📁" }
//!   }
//! }
//! ```
//!
//! Older documents that map each label straight to an extension list are
//! upgraded on load.

use crate::error::ConfigError;
use crate::file_category::{CategoryRule, CategorySet, normalize_extension};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Application name written into export bundles.
pub const APP_NAME: &str = "desktidy";

/// Export bundle format version.
pub const BUNDLE_VERSION: &str = "2.0";

/// Local override looked up in the current directory.
pub const LOCAL_CONFIG_FILE: &str = ".desktidyrc.toml";

/// Rules deciding which entries take part in organizing and backing up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipConfig {
    /// Extensions never organized or backed up, e.g. `.lnk`.
    #[serde(default = "default_excluded_extensions", alias = "excludedExtensions")]
    pub excluded_extensions: Vec<String>,

    /// Files strictly larger than this many MiB are skipped.
    #[serde(default = "default_max_file_size_mb", alias = "maxFileSizeMB")]
    pub max_file_size_mb: f64,

    #[serde(default, alias = "includeFoldersInOrganize")]
    pub include_folders_in_organize: bool,

    #[serde(default, alias = "includeFoldersInBackup")]
    pub include_folders_in_backup: bool,

    /// Glob patterns matched against entry names (e.g. `~$*`, `*.tmp`).
    #[serde(
        default,
        alias = "excludedPatterns",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub excluded_patterns: Vec<String>,
}

fn default_excluded_extensions() -> Vec<String> {
    vec![".lnk".to_string(), ".url".to_string()]
}

fn default_max_file_size_mb() -> f64 {
    100.0
}

impl Default for SkipConfig {
    fn default() -> Self {
        Self {
            excluded_extensions: default_excluded_extensions(),
            max_file_size_mb: default_max_file_size_mb(),
            include_folders_in_organize: false,
            include_folders_in_backup: false,
            excluded_patterns: Vec::new(),
        }
    }
}

/// The full configuration document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub skip: SkipConfig,

    #[serde(default)]
    pub categories: CategorySet,
}

impl AppConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.desktidyrc.toml` in the current directory
    /// 3. Look for `<config dir>/desktidy/config.json`
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but
    /// cannot be read, or if any file found is malformed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(user_config) = ConfigStore::default_path()
            && user_config.exists()
        {
            return Self::load_from_file(&user_config);
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific JSON or TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if is_toml(path) {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.normalized()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.normalized()
    }

    /// Writes the configuration as JSON or TOML depending on `path`.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = if is_toml(path) {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?
        } else {
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks the parts of the document the type system does not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = self.skip.max_file_size_mb;
        if !max.is_finite() || max < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "max_file_size_mb must be a non-negative number, got {}",
                max
            )));
        }

        for pattern in &self.skip.excluded_patterns {
            Pattern::new(pattern).map_err(|e| ConfigError::InvalidGlobPattern {
                pattern: pattern.clone(),
                reason: e.msg.to_string(),
            })?;
        }

        Ok(())
    }

    /// Normalises excluded extensions and validates the result.
    fn normalized(mut self) -> Result<Self, ConfigError> {
        self.skip.excluded_extensions = normalize_extensions(&self.skip.excluded_extensions);
        self.validate()?;
        Ok(self)
    }

    /// Replaces the excluded extension list, normalising each entry.
    pub fn set_excluded_extensions<S: AsRef<str>>(&mut self, extensions: &[S]) {
        self.skip.excluded_extensions = normalize_extensions(extensions);
    }

    pub fn add_category(&mut self, rule: CategoryRule) -> Result<(), ConfigError> {
        self.categories.add(rule)
    }

    pub fn edit_category(&mut self, label: &str, rule: CategoryRule) -> Result<(), ConfigError> {
        self.categories.edit(label, rule)
    }

    pub fn remove_category(&mut self, label: &str) -> Result<CategoryRule, ConfigError> {
        self.categories.remove(label)
    }

    /// Label for an entry under this configuration.
    pub fn classify(&self, path: &Path, is_dir: bool) -> &str {
        self.categories
            .classify(path, is_dir, self.skip.include_folders_in_organize)
    }
}

fn normalize_extensions<S: AsRef<str>>(extensions: &[S]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for ext in extensions.iter().filter_map(|ext| normalize_extension(ext.as_ref())) {
        if !normalized.contains(&ext) {
            normalized.push(ext);
        }
    }
    normalized
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

/// Read-modify-write persistence for the user's configuration file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/desktidy/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored configuration, or defaults when no file exists yet.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if self.path.exists() {
            AppConfig::load_from_file(&self.path)
        } else {
            Ok(AppConfig::default())
        }
    }

    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        config.validate()?;
        config.save_to_file(&self.path)
    }

    /// Loads, applies `change` to a copy, validates and saves it.
    ///
    /// Nothing is written when `change` or validation fails.
    pub fn update<F>(&self, change: F) -> Result<AppConfig, ConfigError>
    where
        F: FnOnce(&mut AppConfig) -> Result<(), ConfigError>,
    {
        let mut config = self.load()?;
        change(&mut config)?;
        config.skip.excluded_extensions = normalize_extensions(&config.skip.excluded_extensions);
        self.save(&config)?;
        Ok(config)
    }
}

/// Portable configuration snapshot for moving settings between machines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigBundle {
    #[serde(default)]
    pub app: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub timestamp: String,
    pub config: BundledConfig,
}

/// The subset of configuration carried by a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundledConfig {
    pub categories: CategorySet,
    #[serde(alias = "excludedExtensions")]
    pub excluded_extensions: Vec<String>,
    #[serde(alias = "maxFileSizeMB")]
    pub max_file_size_mb: f64,
}

impl ConfigBundle {
    /// Captures the exportable part of `config`.
    pub fn export(config: &AppConfig) -> Self {
        Self {
            app: APP_NAME.to_string(),
            version: BUNDLE_VERSION.to_string(),
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            config: BundledConfig {
                categories: config.categories.clone(),
                excluded_extensions: config.skip.excluded_extensions.clone(),
                max_file_size_mb: config.skip.max_file_size_mb,
            },
        }
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Parses and validates an exported bundle.
    ///
    /// # Errors
    ///
    /// `ConfigError::MissingField` when `config` or one of `categories`,
    /// `excluded_extensions`, `max_file_size_mb` is absent;
    /// `ConfigError::Invalid` for malformed JSON or values.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let document: Value =
            serde_json::from_str(text).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let config = document
            .get("config")
            .ok_or(ConfigError::MissingField("config"))?;
        let config = config
            .as_object()
            .ok_or_else(|| ConfigError::Invalid("'config' must be an object".to_string()))?;

        let required: [(&'static str, &str); 3] = [
            ("categories", "categories"),
            ("excluded_extensions", "excludedExtensions"),
            ("max_file_size_mb", "maxFileSizeMB"),
        ];
        for (field, alias) in required {
            if !config.contains_key(field) && !config.contains_key(alias) {
                return Err(ConfigError::MissingField(field));
            }
        }

        // Deserialize from the text so categories keep their document order.
        let bundle: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let max = bundle.config.max_file_size_mb;
        if !max.is_finite() || max < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "max_file_size_mb must be a non-negative number, got {}",
                max
            )));
        }

        Ok(bundle)
    }

    /// Overwrites the bundled fields of `config`; other settings are kept.
    pub fn apply_to(&self, config: &mut AppConfig) {
        config.categories = self.config.categories.clone();
        config.skip.excluded_extensions = normalize_extensions(&self.config.excluded_extensions);
        config.skip.max_file_size_mb = self.config.max_file_size_mb;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.skip.excluded_extensions, vec![".lnk", ".url"]);
        assert_eq!(config.skip.max_file_size_mb, 100.0);
        assert!(!config.skip.include_folders_in_organize);
        assert!(!config.skip.include_folders_in_backup);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip_through_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.skip.include_folders_in_backup = true;
        config.save_to_file(&path).expect("Failed to save config");

        let loaded = AppConfig::load_from_file(&path).expect("Failed to load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_toml_roundtrip_through_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.skip.excluded_patterns = vec!["~$*".to_string()];
        config.save_to_file(&path).expect("Failed to save config");

        let loaded = AppConfig::load_from_file(&path).expect("Failed to load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_toml_keeps_category_order() {
        let text = r#"
            max_file_size_mb = 10.0

            [categories.Zeta]
            extensions = [".z"]
            icon = "📦"

            [categories.Others]
            extensions = []
            icon = "📁"

            [categories.Alpha]
            extensions = [".a"]
            icon = "📄"
        "#;

        let config = AppConfig::from_toml_str(text).expect("Failed to parse TOML");
        let labels: Vec<&str> = config
            .categories
            .rules()
            .iter()
            .map(|rule| rule.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Zeta", "Others", "Alpha"]);
        assert_eq!(config.categories.catch_all().label, "Others");
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let result = AppConfig::load(Some(Path::new("/non/existent/config.json")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_missing_folder_flags_default_to_false() {
        let json = r#"{
            "excluded_extensions": [".lnk"],
            "max_file_size_mb": 50,
            "categories": { "Others": { "extensions": [], "icon": "📁" } }
        }"#;
        let config = AppConfig::from_json_str(json).unwrap();
        assert!(!config.skip.include_folders_in_organize);
        assert!(!config.skip.include_folders_in_backup);
        assert_eq!(config.skip.max_file_size_mb, 50.0);
    }

    #[test]
    fn test_camel_case_keys_are_accepted() {
        let json = r#"{
            "excludedExtensions": ["LNK"],
            "maxFileSizeMB": 5,
            "includeFoldersInOrganize": true,
            "includeFoldersInBackup": true,
            "categories": { "Others": { "extensions": [], "icon": "📁" } }
        }"#;
        let config = AppConfig::from_json_str(json).unwrap();
        assert_eq!(config.skip.excluded_extensions, vec![".lnk"]);
        assert!(config.skip.include_folders_in_organize);
        assert!(config.skip.include_folders_in_backup);
    }

    #[test]
    fn test_legacy_categories_are_upgraded() {
        let json = r#"{
            "excluded_extensions": [".lnk"],
            "max_file_size_mb": 100,
            "categories": {
                "文档": [".pdf", ".docx"],
                "Pictures": [".png"],
                "Misc": []
            }
        }"#;
        let config = AppConfig::from_json_str(json).unwrap();
        let docs = config.categories.get("文档").expect("category kept");
        assert_eq!(docs.icon, "📄");
        assert_eq!(config.categories.get("Pictures").unwrap().icon, "🖼️");
        assert_eq!(config.categories.catch_all().label, "Misc");
        assert_eq!(config.classify(Path::new("a.pdf"), false), "文档");
    }

    #[test]
    fn test_negative_size_is_rejected() {
        let json = r#"{ "max_file_size_mb": -1 }"#;
        assert!(AppConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_invalid_glob_pattern_is_rejected() {
        let json = r#"{ "excluded_patterns": ["[invalid"] }"#;
        assert!(matches!(
            AppConfig::from_json_str(json),
            Err(ConfigError::InvalidGlobPattern { .. })
        ));
    }

    #[test]
    fn test_store_load_missing_returns_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = ConfigStore::new(temp_dir.path().join("nested").join("config.json"));
        assert_eq!(store.load().unwrap(), AppConfig::default());
    }

    #[test]
    fn test_store_update_persists() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = ConfigStore::new(temp_dir.path().join("nested").join("config.json"));

        store
            .update(|config| {
                config.skip.max_file_size_mb = 10.0;
                config.add_category(CategoryRule::new("Code", [".rs"], "💻"))
            })
            .expect("Update failed");

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.skip.max_file_size_mb, 10.0);
        assert!(reloaded.categories.is_category_label("Code"));
    }

    #[test]
    fn test_store_failed_update_writes_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = ConfigStore::new(temp_dir.path().join("config.json"));
        store.save(&AppConfig::default()).unwrap();

        let result = store.update(|config| {
            config.skip.max_file_size_mb = 1.0;
            config.remove_category("Others").map(|_| ())
        });

        assert!(matches!(result, Err(ConfigError::CatchAllProtected(_))));
        assert_eq!(store.load().unwrap().skip.max_file_size_mb, 100.0);
    }

    #[test]
    fn test_bundle_export_import() {
        let mut source = AppConfig::default();
        source.skip.max_file_size_mb = 42.0;
        source
            .add_category(CategoryRule::new("Code", [".rs"], "💻"))
            .unwrap();

        let text = ConfigBundle::export(&source).to_json().unwrap();
        let bundle = ConfigBundle::parse(&text).unwrap();
        assert_eq!(bundle.app, APP_NAME);
        assert_eq!(bundle.version, BUNDLE_VERSION);

        let mut target = AppConfig::default();
        target.skip.include_folders_in_backup = true;
        bundle.apply_to(&mut target);

        assert_eq!(target.skip.max_file_size_mb, 42.0);
        assert!(target.categories.is_category_label("Code"));
        // Settings outside the bundle are untouched.
        assert!(target.skip.include_folders_in_backup);
    }

    #[test]
    fn test_bundle_import_keeps_category_order() {
        let source = AppConfig::default();
        let text = ConfigBundle::export(&source).to_json().unwrap();

        let mut target = AppConfig::default();
        let reversed = source.categories.rules().iter().rev().cloned().collect();
        target.categories = CategorySet::new(reversed).unwrap();
        ConfigBundle::parse(&text).unwrap().apply_to(&mut target);

        let labels = |config: &AppConfig| -> Vec<String> {
            config
                .categories
                .rules()
                .iter()
                .map(|rule| rule.label.clone())
                .collect()
        };
        assert_eq!(labels(&target), labels(&source));
        assert_eq!(target.categories, source.categories);
    }

    #[test]
    fn test_bundle_requires_config() {
        let result = ConfigBundle::parse(r#"{ "app": "desktidy" }"#);
        assert!(matches!(result, Err(ConfigError::MissingField("config"))));
    }

    #[test]
    fn test_bundle_requires_each_field() {
        let text = r#"{
            "config": {
                "categories": { "Others": { "extensions": [], "icon": "📁" } },
                "excluded_extensions": []
            }
        }"#;
        let result = ConfigBundle::parse(text);
        assert!(matches!(
            result,
            Err(ConfigError::MissingField("max_file_size_mb"))
        ));
    }

    #[test]
    fn test_bundle_rejects_bad_json() {
        assert!(matches!(
            ConfigBundle::parse("not json"),
            Err(ConfigError::Invalid(_))
        ));
    }
}
