/// Category rules and extension-based classification.
///
/// A [`CategorySet`] is an ordered list of [`CategoryRule`]s. Every set holds
/// exactly one catch-all rule (no extensions) and at most one folder rule
/// (the `__FOLDER__` marker). Extensions never appear in two rules, so the
/// first match in configuration order is also the only match.
///
/// # Examples
///
/// ```
/// use desktidy::file_category::CategorySet;
/// use std::path::Path;
///
/// let categories = CategorySet::default();
/// assert_eq!(categories.classify(Path::new("report.PDF"), false, false), "Documents");
/// assert_eq!(categories.classify(Path::new("data.xyz"), false, false), "Others");
/// ```
use crate::error::ConfigError;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path};

/// Extension list marker for the rule that receives whole directories.
pub const FOLDER_MARKER: &str = "__FOLDER__";

/// Icon used when none is given or none can be inferred.
pub const DEFAULT_ICON: &str = "📁";

/// Keyword table used to pick an icon for configurations that predate icons.
const ICON_KEYWORDS: &[(&[&str], &str)] = &[
    (&["document", "文档"], "📄"),
    (&["picture", "image", "photo", "图片"], "🖼️"),
    (&["video", "movie", "视频"], "🎬"),
    (&["music", "audio", "音频"], "🎵"),
    (&["archive", "compress", "压缩"], "📦"),
    (&["program", "application", "程序"], "💻"),
];

/// A named bucket of extensions. The label doubles as the directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    pub label: String,
    /// Lowercase, dot-prefixed extensions, or `[FOLDER_MARKER]`.
    pub extensions: Vec<String>,
    /// Display metadata only. Never used to identify a category.
    pub icon: String,
}

impl CategoryRule {
    /// Builds a rule, normalising every extension to `.ext` lowercase form.
    pub fn new<I, S>(label: &str, extensions: I, icon: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .filter_map(|ext| normalize_extension(ext.as_ref()))
            .collect();
        let icon = if icon.trim().is_empty() {
            DEFAULT_ICON.to_string()
        } else {
            icon.trim().to_string()
        };

        Self {
            label: label.trim().to_string(),
            extensions,
            icon,
        }
    }

    /// A rule that only receives directories.
    pub fn folders(label: &str, icon: &str) -> Self {
        Self::new(label, [FOLDER_MARKER], icon)
    }

    pub fn is_catch_all(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn is_folder_rule(&self) -> bool {
        self.extensions.iter().any(|ext| ext == FOLDER_MARKER)
    }

    /// Whether this rule claims the given `.ext` string.
    pub fn matches_extension(&self, extension: &str) -> bool {
        !extension.is_empty()
            && !self.is_folder_rule()
            && self.extensions.iter().any(|ext| ext == extension)
    }
}

/// Normalises a user-supplied extension to lowercase `.ext` form.
///
/// Returns `None` for blank input. The folder marker is kept verbatim.
///
/// ```
/// use desktidy::file_category::normalize_extension;
///
/// assert_eq!(normalize_extension(" PDF "), Some(".pdf".to_string()));
/// assert_eq!(normalize_extension(".Jpg"), Some(".jpg".to_string()));
/// assert_eq!(normalize_extension(""), None);
/// ```
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed == FOLDER_MARKER {
        return Some(FOLDER_MARKER.to_string());
    }

    let lower = trimmed.to_lowercase();
    if lower.starts_with('.') {
        Some(lower)
    } else {
        Some(format!(".{}", lower))
    }
}

/// The lowercase, dot-prefixed extension of a path, or `""` when it has none.
///
/// Dotfiles such as `.bashrc` have no extension.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Picks an icon for a label by keyword, falling back to [`DEFAULT_ICON`].
pub fn infer_icon(label: &str) -> &'static str {
    let lower = label.to_lowercase();
    ICON_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| lower.contains(keyword)))
        .map(|(_, icon)| *icon)
        .unwrap_or(DEFAULT_ICON)
}

/// An ordered, validated list of category rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySet {
    rules: Vec<CategoryRule>,
    catch_all: usize,
}

impl CategorySet {
    /// Validates `rules` and builds a set from them.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidCategories` when a label is empty, not a
    /// plain directory name, or repeated; when there is not exactly one
    /// catch-all; when there is more than one folder rule; or when an
    /// extension is claimed by two rules.
    pub fn new(rules: Vec<CategoryRule>) -> Result<Self, ConfigError> {
        let mut labels = HashSet::new();
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut catch_all = None;
        let mut folder_rules = 0;

        for (index, rule) in rules.iter().enumerate() {
            validate_label(&rule.label)?;
            if !labels.insert(rule.label.as_str()) {
                return Err(ConfigError::DuplicateCategory(rule.label.clone()));
            }

            if rule.is_catch_all() {
                if catch_all.is_some() {
                    return Err(ConfigError::InvalidCategories(format!(
                        "'{}' is a second catch-all category",
                        rule.label
                    )));
                }
                catch_all = Some(index);
                continue;
            }

            if rule.is_folder_rule() {
                if rule.extensions.len() != 1 {
                    return Err(ConfigError::InvalidCategories(format!(
                        "'{}' mixes {} with file extensions",
                        rule.label, FOLDER_MARKER
                    )));
                }
                folder_rules += 1;
                if folder_rules > 1 {
                    return Err(ConfigError::InvalidCategories(format!(
                        "'{}' is a second folder category",
                        rule.label
                    )));
                }
                continue;
            }

            for ext in &rule.extensions {
                if !claimed.insert(ext.as_str()) {
                    return Err(ConfigError::InvalidCategories(format!(
                        "extension '{}' is listed by more than one category",
                        ext
                    )));
                }
            }
        }

        let catch_all = catch_all.ok_or_else(|| {
            ConfigError::InvalidCategories("no catch-all category (empty extension list)".into())
        })?;

        Ok(Self { rules, catch_all })
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn get(&self, label: &str) -> Option<&CategoryRule> {
        self.rules.iter().find(|rule| rule.label == label)
    }

    /// Whether `name` is the label of any category, i.e. a category folder.
    pub fn is_category_label(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn catch_all(&self) -> &CategoryRule {
        &self.rules[self.catch_all]
    }

    pub fn folder_rule(&self) -> Option<&CategoryRule> {
        self.rules.iter().find(|rule| rule.is_folder_rule())
    }

    /// Maps an entry to exactly one category label.
    ///
    /// Directories go to the folder category when `include_folders` is set
    /// (or to the catch-all when no folder category exists). Everything else
    /// is matched by extension, falling back to the catch-all.
    pub fn classify(&self, path: &Path, is_dir: bool, include_folders: bool) -> &str {
        if is_dir && include_folders {
            return self
                .folder_rule()
                .unwrap_or_else(|| self.catch_all())
                .label
                .as_str();
        }

        let extension = extension_of(path);
        self.rules
            .iter()
            .find(|rule| rule.matches_extension(&extension))
            .unwrap_or_else(|| self.catch_all())
            .label
            .as_str()
    }

    /// Appends a new category.
    pub fn add(&mut self, rule: CategoryRule) -> Result<(), ConfigError> {
        if self.is_category_label(&rule.label) {
            return Err(ConfigError::DuplicateCategory(rule.label));
        }
        let mut rules = self.rules.clone();
        rules.push(rule);
        *self = Self::new(rules)?;
        Ok(())
    }

    /// Replaces the category `label` in place, keeping its position.
    ///
    /// The replacement may carry a different label (a rename).
    pub fn edit(&mut self, label: &str, rule: CategoryRule) -> Result<(), ConfigError> {
        let index = self
            .rules
            .iter()
            .position(|existing| existing.label == label)
            .ok_or_else(|| ConfigError::UnknownCategory(label.to_string()))?;

        let mut rules = self.rules.clone();
        rules[index] = rule;
        *self = Self::new(rules)?;
        Ok(())
    }

    /// Removes a category. The catch-all is protected.
    pub fn remove(&mut self, label: &str) -> Result<CategoryRule, ConfigError> {
        let index = self
            .rules
            .iter()
            .position(|existing| existing.label == label)
            .ok_or_else(|| ConfigError::UnknownCategory(label.to_string()))?;
        if index == self.catch_all {
            return Err(ConfigError::CatchAllProtected(label.to_string()));
        }

        let mut rules = self.rules.clone();
        let removed = rules.remove(index);
        *self = Self::new(rules)?;
        Ok(removed)
    }
}

/// Whether `label` names exactly one directory entry, with no separators.
pub fn is_plain_folder_name(label: &str) -> bool {
    let mut components = Path::new(label).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    single && !label.trim().is_empty() && !label.contains(['/', '\\'])
}

fn validate_label(label: &str) -> Result<(), ConfigError> {
    if !is_plain_folder_name(label) {
        return Err(ConfigError::InvalidCategories(format!(
            "'{}' is not usable as a folder name",
            label
        )));
    }
    Ok(())
}

impl Default for CategorySet {
    fn default() -> Self {
        let rules = vec![
            CategoryRule::new(
                "Documents",
                [".txt", ".doc", ".docx", ".pdf", ".xls", ".xlsx", ".ppt", ".pptx"],
                "📄",
            ),
            CategoryRule::new(
                "Pictures",
                [".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".ico"],
                "🖼️",
            ),
            CategoryRule::new(
                "Videos",
                [".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm"],
                "🎬",
            ),
            CategoryRule::new(
                "Music",
                [".mp3", ".wav", ".flac", ".aac", ".ogg", ".wma"],
                "🎵",
            ),
            CategoryRule::new("Archives", [".zip", ".rar", ".7z", ".tar", ".gz"], "📦"),
            CategoryRule::new("Programs", [".exe", ".msi", ".deb", ".dmg"], "💻"),
            CategoryRule::folders("Folders", "📂"),
            CategoryRule::new("Others", Vec::<String>::new(), "📁"),
        ];
        let catch_all = rules.len() - 1;
        Self { rules, catch_all }
    }
}

// On disk the set is a map from label to `{ extensions, icon }`, in rule order.

#[derive(Serialize)]
struct RuleBodyRef<'a> {
    extensions: &'a [String],
    icon: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleBody {
    Full {
        extensions: Vec<String>,
        #[serde(default)]
        icon: Option<String>,
    },
    /// Older documents stored a bare extension list per label.
    Legacy(Vec<String>),
}

impl Serialize for CategorySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rules.len()))?;
        for rule in &self.rules {
            map.serialize_entry(
                &rule.label,
                &RuleBodyRef {
                    extensions: &rule.extensions,
                    icon: &rule.icon,
                },
            )?;
        }
        map.end()
    }
}

struct CategorySetVisitor;

impl<'de> Visitor<'de> for CategorySetVisitor {
    type Value = CategorySet;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map from category label to its extensions")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut rules = Vec::new();
        let mut saw_legacy = false;

        while let Some((label, body)) = access.next_entry::<String, RuleBody>()? {
            let rule = match body {
                RuleBody::Full { extensions, icon } => {
                    let icon = icon.unwrap_or_else(|| infer_icon(&label).to_string());
                    CategoryRule::new(&label, extensions, &icon)
                }
                RuleBody::Legacy(extensions) => {
                    saw_legacy = true;
                    CategoryRule::new(&label, extensions, infer_icon(&label))
                }
            };
            rules.push(rule);
        }

        // Legacy documents relied on an implicit catch-all.
        if saw_legacy && !rules.iter().any(CategoryRule::is_catch_all) {
            let fallback = CategorySet::default().catch_all().clone();
            if !rules.iter().any(|rule| rule.label == fallback.label) {
                rules.push(fallback);
            }
        }

        CategorySet::new(rules).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for CategorySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(CategorySetVisitor)
    }
}
