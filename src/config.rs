use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for subsync
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Location of the subscription manifest
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,

    /// GitHub authentication and organization settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Update behavior settings
    #[serde(default)]
    pub update: UpdateConfig,

    /// Review listing settings
    #[serde(default)]
    pub review: ReviewConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// Authentication method
    #[serde(default = "default_auth_method")]
    pub auth_method: String, // "auto", "gh_cli", "token"

    /// GitHub username (auto-detected if null)
    pub username: Option<String>,

    /// Organization whose repositories are managed
    pub organization: Option<String>,

    /// API base URL, for GitHub Enterprise
    pub api_url: Option<String>,

    /// Repositories requested per page when listing the organization
    #[serde(default = "default_page_size")]
    pub page_size: u8,
}

/// What `update` does when a remote mutation fails
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failed record
    #[default]
    Abort,
    /// Attempt every record and report failures at the end
    Continue,
}

/// Update configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct UpdateConfig {
    #[serde(default)]
    pub on_error: FailurePolicy,
}

/// Review listing configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReviewConfig {
    /// Send the listing through a pager when stdout is a terminal
    #[serde(default = "default_true")]
    pub paginate: bool,

    /// Pager command (falls back to $PAGER, then less)
    pub pager: Option<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String, // "compact", "pretty"

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
}

// Default value functions
fn default_manifest_path() -> String {
    "subscriptions.json".to_string()
}
fn default_auth_method() -> String {
    "auto".to_string()
}
fn default_page_size() -> u8 {
    100
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

// Default implementations
impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            auth_method: default_auth_method(),
            username: None,
            organization: None,
            api_url: None,
            page_size: default_page_size(),
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            paginate: default_true(),
            pager: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let config = Self::default();

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            config.save(&config_path)?;

            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("subsync").join("config.yml"))
    }

    /// Expand environment variables and `~` in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.manifest_path = shellexpand::full(&self.manifest_path)
            .context("Failed to expand manifest_path")?
            .into_owned();

        Ok(())
    }

    /// Manifest location as a path
    pub fn manifest_path(&self) -> PathBuf {
        PathBuf::from(&self.manifest_path)
    }

    /// Page size clamped to what the GraphQL API accepts
    pub fn page_size(&self) -> u8 {
        self.github.page_size.clamp(1, 100)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest_path: default_manifest_path(),
            github: GitHubConfig::default(),
            update: UpdateConfig::default(),
            review: ReviewConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
