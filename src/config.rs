//! Rules file loading: category overrides and file filters.
//!
//! A rules file is TOML with two optional sections. `[rules]` maps a key to a
//! category label; a key containing a glob metacharacter (`*`, `?`, `[`) is a
//! glob matched against file names, anything else is an extension. `[filters]`
//! controls which scanned files are left alone.
//!
//! ```toml
//! [rules]
//! psd = "Design"
//! ".MD" = "Notes"
//! "invoice_*.pdf" = "Invoices"
//!
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.tmp", "node_modules/**"]
//! extensions = ["bak", "tmp"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```
//!
//! Keys are applied in file order, so when two keys normalize to the same
//! extension the later one wins.

use crate::file_category::{Classifier, normalize_extension};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading a rules file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested rules file does not exist.
    #[error("rules file not found: {}", .0.display())]
    RulesNotFound(PathBuf),

    /// The rules file exists but could not be read.
    #[error("could not read rules file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML syntax or structure.
    #[error("invalid rules file {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },

    /// A rule value is not a usable category label.
    #[error("invalid category for rule '{key}': {reason}")]
    InvalidCategory { key: String, reason: String },

    /// Invalid glob pattern in a rule or filter.
    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidGlobPattern { pattern: String, reason: String },

    /// Invalid regex pattern in a filter.
    #[error("invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
}

/// Result type for rules loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// On-disk layout of a rules file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesFile {
    /// Extension or glob keys mapped to category labels, in file order.
    #[serde(default)]
    pub rules: toml::Table,

    /// Which scanned files to leave in place.
    #[serde(default)]
    pub filters: FilterRules,
}

/// Root-level filter rules configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to false.
    #[serde(default = "default_enable_hidden_files")]
    pub enable_hidden_files: bool,

    /// Rules for excluding files.
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

fn default_enable_hidden_files() -> bool {
    false
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: default_enable_hidden_files(),
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for excluding files from organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the path relative to the source directory.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude (e.g., "bak", "tmp").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IncludeRules {
    /// Glob patterns that override exclude rules.
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Everything a run needs from the rules file, ready to use.
#[derive(Default)]
pub struct RuleSet {
    pub classifier: Classifier,
    pub filters: CompiledFilters,
}

/// Loads the rule set for a run.
///
/// With no path the default table and default filters are returned. An
/// explicit path must exist and parse.
///
/// # Errors
///
/// Returns `ConfigError::RulesNotFound` if `path` is given but missing, and
/// any other `ConfigError` variant if the file cannot be read or is malformed.
pub fn load_rules(path: Option<&Path>) -> ConfigResult<RuleSet> {
    let Some(path) = path else {
        tracing::debug!("no rules file requested, using the default table");
        return Ok(RuleSet::default());
    };

    let rules_file = RulesFile::load(path)?;
    let rule_count = rules_file.rules.len();
    let rule_set = rules_file.compile()?;
    tracing::debug!(path = %path.display(), rules = rule_count, "loaded rules file");
    Ok(rule_set)
}

impl RulesFile {
    /// Reads and parses a rules file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::RulesNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content).map_err(|reason| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parses rules file content.
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Builds the classifier and filters described by this file.
    ///
    /// # Errors
    ///
    /// Returns an error for non-string or unusable category labels and for
    /// invalid glob or regex patterns.
    pub fn compile(self) -> ConfigResult<RuleSet> {
        let mut classifier = Classifier::default();

        for (key, value) in &self.rules {
            let label = value
                .as_str()
                .ok_or_else(|| ConfigError::InvalidCategory {
                    key: key.clone(),
                    reason: format!("expected a string, found {}", value.type_str()),
                })?;
            validate_label(key, label)?;

            if is_glob_key(key) {
                let pattern = Pattern::new(key).map_err(|e| ConfigError::InvalidGlobPattern {
                    pattern: key.clone(),
                    reason: e.to_string(),
                })?;
                classifier.add_glob_mapping(pattern, label);
            } else {
                if normalize_extension(key).is_empty() {
                    return Err(ConfigError::InvalidCategory {
                        key: key.clone(),
                        reason: "empty extension key".to_string(),
                    });
                }
                classifier.add_extension_mapping(key, label);
            }
        }

        Ok(RuleSet {
            classifier,
            filters: CompiledFilters::new(self.filters)?,
        })
    }
}

fn is_glob_key(key: &str) -> bool {
    key.contains(['*', '?', '['])
}

/// Category labels become folder names, so they must be a single path component.
fn validate_label(key: &str, label: &str) -> ConfigResult<()> {
    let reason = if label.trim().is_empty() {
        Some("category label is empty")
    } else if label == "." || label == ".." {
        Some("category label cannot be '.' or '..'")
    } else if label.contains(['/', '\\']) {
        Some("category label cannot contain a path separator")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigError::InvalidCategory {
            key: key.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Compiled, optimized filter structures for efficient file matching.
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    /// Create compiled filters from filter rules.
    ///
    /// # Errors
    ///
    /// Returns an error if any glob or regex patterns are invalid.
    pub fn new(rules: FilterRules) -> ConfigResult<Self> {
        let exclude_patterns = compile_globs(&rules.exclude.patterns)?;
        let include_patterns = compile_globs(&rules.include.patterns)?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.into_iter().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        })
    }

    /// Whether hidden files and directories are scanned.
    pub fn hidden_files_enabled(&self) -> bool {
        self.enable_hidden_files
    }

    /// Check if a file should be organized.
    ///
    /// `file_path` is relative to the source directory. Checks are performed in
    /// this order, with early termination:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Hidden file filter - if hidden and disabled, exclude
    /// 3. Exact filename match - if matched, exclude
    /// 4. File extension match - if matched, exclude
    /// 5. Glob pattern match - if matched, exclude
    /// 6. Regex pattern match - if matched, exclude
    /// 7. Default: include
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.matches_any(&self.include_patterns, file_path) {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = file_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self.matches_any(&self.exclude_patterns, file_path) {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }

    fn matches_any(&self, patterns: &[Pattern], file_path: &Path) -> bool {
        patterns.iter().any(|pattern| pattern.matches_path(file_path))
    }
}

impl Default for CompiledFilters {
    fn default() -> Self {
        Self {
            enable_hidden_files: default_enable_hidden_files(),
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }
}

fn compile_globs(patterns: &[String]) -> ConfigResult<Vec<Pattern>> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|e| ConfigError::InvalidGlobPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn compile(content: &str) -> ConfigResult<RuleSet> {
        RulesFile::parse(content)
            .expect("rules should parse")
            .compile()
    }

    fn filters(rules: FilterRules) -> CompiledFilters {
        CompiledFilters::new(rules).expect("filters should compile")
    }

    #[test]
    fn test_no_path_uses_defaults() {
        let rule_set = load_rules(None).expect("defaults should load");
        assert_eq!(rule_set.classifier.classify("jpg"), "Images");
        assert!(!rule_set.filters.hidden_files_enabled());
    }

    #[test]
    fn test_missing_explicit_path_is_not_found() {
        let result = load_rules(Some(Path::new("/non/existent/rules.toml")));
        assert!(matches!(result, Err(ConfigError::RulesNotFound(_))));
    }

    #[test]
    fn test_malformed_file_is_invalid() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("rules.toml");
        fs::write(&path, "[rules\npsd = ").expect("Failed to write rules");

        let result = load_rules(Some(&path));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_unknown_section_is_invalid() {
        assert!(RulesFile::parse("[categories]\npsd = \"Design\"\n").is_err());
    }

    #[test]
    fn test_rules_file_from_disk() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("rules.toml");
        fs::write(&path, "[rules]\npsd = \"Design\"\n").expect("Failed to write rules");

        let rule_set = load_rules(Some(&path)).expect("rules should load");
        assert_eq!(rule_set.classifier.classify("PSD"), "Design");
        assert_eq!(rule_set.classifier.classify("pdf"), "Documents");
    }

    #[test]
    fn test_extension_keys_are_normalized_and_last_wins() {
        let rule_set = compile("[rules]\nmd = \"Notes\"\n\".MD\" = \"Wiki\"\n").unwrap();
        assert_eq!(rule_set.classifier.classify("md"), "Wiki");
    }

    #[test]
    fn test_override_beats_default() {
        let rule_set = compile("[rules]\njpg = \"Photos\"\n").unwrap();
        assert_eq!(rule_set.classifier.classify("JPG"), "Photos");
        assert_eq!(rule_set.classifier.classify("png"), "Images");
    }

    #[test]
    fn test_glob_keys_become_glob_rules() {
        let rule_set = compile("[rules]\n\"invoice_*.pdf\" = \"Invoices\"\n").unwrap();
        assert_eq!(rule_set.classifier.glob_rule_count(), 1);
        assert_eq!(
            rule_set.classifier.classify_file("invoice_7.pdf", "pdf"),
            "Invoices"
        );
    }

    #[test]
    fn test_non_string_category_is_rejected() {
        let result = compile("[rules]\npsd = 3\n");
        assert!(matches!(result, Err(ConfigError::InvalidCategory { .. })));
    }

    #[test]
    fn test_path_like_category_is_rejected() {
        assert!(compile("[rules]\npsd = \"../escape\"\n").is_err());
        assert!(compile("[rules]\npsd = \"..\"\n").is_err());
        assert!(compile("[rules]\npsd = \"  \"\n").is_err());
    }

    #[test]
    fn test_empty_extension_key_is_rejected() {
        assert!(compile("[rules]\n\".\" = \"Dots\"\n").is_err());
    }

    #[test]
    fn test_invalid_glob_key_is_rejected() {
        let result = compile("[rules]\n\"[abc\" = \"Broken\"\n");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidGlobPattern { .. })
        ));
    }

    #[test]
    fn test_filters_section_is_loaded() {
        let rule_set = compile(
            "[filters]\nenable_hidden_files = true\n[filters.exclude]\nextensions = [\"tmp\"]\n",
        )
        .unwrap();
        assert!(rule_set.filters.hidden_files_enabled());
        assert!(!rule_set.filters.should_include(Path::new("scratch.TMP")));
        assert!(rule_set.filters.should_include(Path::new(".profile")));
    }

    #[test]
    fn test_hidden_file_excluded_by_default() {
        let compiled = CompiledFilters::default();
        assert!(!compiled.should_include(Path::new(".DS_Store")));
        assert!(compiled.should_include(Path::new("photo.jpg")));
    }

    #[test]
    fn test_exclude_exact_filename() {
        let compiled = filters(FilterRules {
            enable_hidden_files: true,
            exclude: ExcludeRules {
                filenames: vec!["Thumbs.db".to_string()],
                ..Default::default()
            },
            include: IncludeRules::default(),
        });

        assert!(!compiled.should_include(Path::new("Thumbs.db")));
        assert!(!compiled.should_include(Path::new("album/Thumbs.db")));
        assert!(compiled.should_include(Path::new("image.jpg")));
    }

    #[test]
    fn test_exclude_glob_patterns_use_relative_paths() {
        let compiled = filters(FilterRules {
            enable_hidden_files: true,
            exclude: ExcludeRules {
                patterns: vec!["**/node_modules/**".to_string(), "*.cache".to_string()],
                ..Default::default()
            },
            include: IncludeRules::default(),
        });

        assert!(!compiled.should_include(Path::new("node_modules/pkg/index.js")));
        assert!(!compiled.should_include(Path::new("web/node_modules/pkg/index.js")));
        assert!(!compiled.should_include(Path::new("file.cache")));
        assert!(compiled.should_include(Path::new("my_node_modules/index.js")));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let compiled = filters(FilterRules {
            enable_hidden_files: false,
            exclude: ExcludeRules::default(),
            include: IncludeRules {
                patterns: vec![".important".to_string()],
            },
        });

        assert!(compiled.should_include(Path::new(".important")));
        assert!(!compiled.should_include(Path::new(".other")));
    }

    #[test]
    fn test_exclude_regex() {
        let compiled = filters(FilterRules {
            enable_hidden_files: true,
            exclude: ExcludeRules {
                regex: vec![r"^~\$".to_string()],
                ..Default::default()
            },
            include: IncludeRules::default(),
        });

        assert!(!compiled.should_include(Path::new("~$budget.xlsx")));
        assert!(compiled.should_include(Path::new("budget.xlsx")));
    }

    #[test]
    fn test_invalid_regex_returns_error() {
        let result = CompiledFilters::new(FilterRules {
            enable_hidden_files: true,
            exclude: ExcludeRules {
                regex: vec!["[invalid(".to_string()],
                ..Default::default()
            },
            include: IncludeRules::default(),
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidRegexPattern { .. })
        ));
    }
}
