//! Configuration schema (tablerecon.toml)

use crate::report::StreamKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Warehouse connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Warehouse type (snowflake, ...)
    #[serde(rename = "type")]
    pub warehouse_type: String,

    /// Connection settings (warehouse-specific)
    #[serde(flatten)]
    pub settings: HashMap<String, String>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            warehouse_type: "snowflake".to_string(),
            settings: HashMap::new(),
        }
    }
}

impl WarehouseConfig {
    /// Look up a setting, falling back to an environment variable
    pub fn setting_or_env(&self, key: &str, env_var: &str) -> Option<String> {
        self.settings
            .get(key)
            .cloned()
            .or_else(|| std::env::var(env_var).ok())
    }
}

/// Which objects the catalog lister keeps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Namespaces never listed (administrative / default schemas)
    #[serde(default = "default_ignored_namespaces")]
    pub ignored_namespaces: Vec<String>,

    /// Objects dropped from both listings (glob patterns on `NAMESPACE.NAME`)
    #[serde(default)]
    pub skip_objects: Vec<String>,
}

fn default_ignored_namespaces() -> Vec<String> {
    vec!["INFORMATION_SCHEMA".to_string(), "PUBLIC".to_string()]
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            ignored_namespaces: default_ignored_namespaces(),
            skip_objects: Vec::new(),
        }
    }
}

impl CatalogConfig {
    /// Check if a namespace is in the ignore set (case-insensitive)
    pub fn is_namespace_ignored(&self, namespace: &str) -> bool {
        self.ignored_namespaces
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(namespace.trim()))
    }

    /// Check if an object key matches any skip pattern (case-insensitive)
    pub fn is_object_skipped(&self, key: &str) -> bool {
        let key = key.to_uppercase();
        self.skip_objects.iter().any(|pattern| {
            let pattern = pattern.to_uppercase();
            if pattern.contains('*') {
                glob_match(&pattern, &key)
            } else {
                pattern == key
            }
        })
    }
}

/// How the two directional queries of one object relate on failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectionPolicy {
    /// Both directions are always attempted and fail independently
    Independent,

    /// A failed left-minus-right query suppresses right-minus-left
    SkipReverseOnError,
}

impl Default for DirectionPolicy {
    fn default() -> Self {
        Self::Independent
    }
}

/// Content differ settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffConfig {
    #[serde(default)]
    pub direction_policy: DirectionPolicy,

    /// Number of sessions diffing objects in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Stop starting new objects after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_concurrency() -> usize {
    1
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            direction_policy: DirectionPolicy::default(),
            concurrency: default_concurrency(),
            timeout_secs: None,
        }
    }
}

/// Output artifact locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving all artifacts (created if missing)
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    #[serde(default = "default_only_in_left")]
    pub only_in_left: String,

    #[serde(default = "default_only_in_right")]
    pub only_in_right: String,

    #[serde(default = "default_mismatches")]
    pub mismatches: String,

    #[serde(default = "default_errors")]
    pub errors: String,

    /// JSON run report file name
    #[serde(default = "default_run_report")]
    pub run_report: String,

    /// Set to false to skip writing the run report
    #[serde(default = "default_write_run_report")]
    pub write_run_report: bool,
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_only_in_left() -> String {
    "obj_in_src_not_in_tgt.csv".to_string()
}

fn default_only_in_right() -> String {
    "obj_in_tgt_not_in_src.csv".to_string()
}

fn default_mismatches() -> String {
    "obj_in_src_&_tgt.csv".to_string()
}

fn default_errors() -> String {
    "exceptions.csv".to_string()
}

fn default_run_report() -> String {
    "run_report.json".to_string()
}

fn default_write_run_report() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            only_in_left: default_only_in_left(),
            only_in_right: default_only_in_right(),
            mismatches: default_mismatches(),
            errors: default_errors(),
            run_report: default_run_report(),
            write_run_report: default_write_run_report(),
        }
    }
}

impl OutputConfig {
    /// Artifact path for a stream
    pub fn path_for(&self, stream: StreamKind) -> PathBuf {
        let file_name = match stream {
            StreamKind::OnlyInLeft => &self.only_in_left,
            StreamKind::OnlyInRight => &self.only_in_right,
            StreamKind::Mismatches => &self.mismatches,
            StreamKind::Errors => &self.errors,
        };
        self.directory.join(file_name)
    }

    /// Run report path, `None` when the report is disabled
    pub fn run_report_path(&self) -> Option<PathBuf> {
        self.write_run_report.then(|| self.directory.join(&self.run_report))
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Warehouse connection configuration
    #[serde(default)]
    pub warehouse: Option<WarehouseConfig>,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub diff: DiffConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        // Relative output directories resolve against the config file
        if config.output.directory.is_relative() {
            if let Some(parent) = path.parent() {
                config.output.directory = parent.join(&config.output.directory);
            }
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.diff.concurrency == 0 {
            return Err(ConfigError::Invalid("diff.concurrency must be at least 1".to_string()));
        }
        if self.diff.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("diff.timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

/// Simple glob matching (supports a single * wildcard)
fn glob_match(pattern: &str, text: &str) -> bool {
    if pattern == "*" || pattern == "**" {
        return true;
    }

    if let Some(star_pos) = pattern.find('*') {
        let prefix = &pattern[..star_pos];
        let suffix = &pattern[star_pos + 1..];

        text.len() >= prefix.len() + suffix.len()
            && text.starts_with(prefix)
            && text.ends_with(suffix)
    } else {
        pattern == text
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
