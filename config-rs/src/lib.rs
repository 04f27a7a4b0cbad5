//! config-rs/lib.rs
//! Project configuration for great_expectations
//! Reads `great_expectations.toml` and resolves the effective usage statistics
//! settings, with environment overrides applied last.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use usage_statistics::{ContextIdentity, UsageStatisticsSettings, DEFAULT_USAGE_STATISTICS_URL};
use uuid::Uuid;

/// Default project file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "great_expectations.toml";

/// Overrides the project file location
pub const CONFIG_PATH_ENV: &str = "GE_CONFIG_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(String),

    #[error("Configuration file already exists: {0}")]
    AlreadyExists(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// `[anonymous_usage_statistics]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnonymousUsageStatisticsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_context_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_statistics_url: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Default for AnonymousUsageStatisticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_context_id: None,
            usage_statistics_url: None,
        }
    }
}

/// A datasource, store or data docs site entry
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ComponentConfig {
    pub class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    /// Free-form keys, passed through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

/// One step of a validation operator's `action_list`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ActionConfig {
    pub name: String,
    pub action: ComponentConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ValidationOperatorConfig {
    pub class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(default)]
    pub action_list: Vec<ActionConfig>,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub anonymous_usage_statistics: AnonymousUsageStatisticsConfig,
    #[serde(default)]
    pub datasources: BTreeMap<String, ComponentConfig>,
    #[serde(default)]
    pub stores: BTreeMap<String, ComponentConfig>,
    #[serde(default)]
    pub validation_operators: BTreeMap<String, ValidationOperatorConfig>,
    #[serde(default)]
    pub data_docs_sites: BTreeMap<String, ComponentConfig>,
    /// Id generated for this run when none is configured
    #[serde(skip)]
    generated_id: OnceCell<Uuid>,
}

/// Project file path: explicit argument, then `GE_CONFIG_PATH`, then the default
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
}

impl ProjectConfig {
    /// A fresh project with its own installation id
    pub fn new_project() -> Self {
        Self {
            anonymous_usage_statistics: AnonymousUsageStatisticsConfig {
                data_context_id: Some(Uuid::new_v4()),
                ..AnonymousUsageStatisticsConfig::default()
            },
            ..Self::default()
        }
    }

    /// Loads `.env` first, then the project file. A missing file yields the
    /// defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        if !path.exists() {
            tracing::debug!(path = %path.display(), "No project configuration found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        Self::parse(&contents).map_err(|message| ConfigError::ParseError {
            path: path.display().to_string(),
            message,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| e.to_string())
    }

    /// Writes the project file; refuses to overwrite an existing one
    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.display().to_string()));
        }
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// Installation id from the file, or one generated on first use and
    /// kept for the lifetime of this config
    pub fn data_context_id(&self) -> Uuid {
        if let Some(id) = self.anonymous_usage_statistics.data_context_id {
            return id;
        }
        *self.generated_id.get_or_init(|| {
            tracing::debug!("No data_context_id configured, generating one for this run");
            Uuid::new_v4()
        })
    }

    /// Effective settings: file values, then `GE_USAGE_STATISTICS_URL` and
    /// `GE_USAGE_STATS`
    pub fn usage_statistics_settings(&self, library_version: &str) -> UsageStatisticsSettings {
        let section = &self.anonymous_usage_statistics;
        let url = section
            .usage_statistics_url
            .clone()
            .unwrap_or_else(|| DEFAULT_USAGE_STATISTICS_URL.to_string());

        UsageStatisticsSettings::new(ContextIdentity::new(self.data_context_id()), library_version)
            .with_url(url)
            .with_enabled(section.enabled)
            .with_env()
    }
}
