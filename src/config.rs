use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for windmill-git-sync
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Working directory that holds the mirrored repository
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: String,

    /// Windmill export settings
    #[serde(default)]
    pub windmill: WindmillConfig,

    /// Git defaults used when a request omits them
    #[serde(default)]
    pub git: GitConfig,

    /// HTTP trigger listener
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Windmill export configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WindmillConfig {
    /// Base URL of the Windmill server
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Export CLI executable
    #[serde(default = "default_cli")]
    pub cli: String,

    /// Workspace synced when a request does not name one
    #[serde(default = "default_workspace")]
    pub default_workspace: String,
}

/// Git defaults
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitConfig {
    /// Git executable
    #[serde(default = "default_git_binary")]
    pub binary: String,

    /// Branch pushed to when a request does not name one
    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// Commit author name
    #[serde(default = "default_user_name")]
    pub user_name: String,

    /// Commit author email
    #[serde(default = "default_user_email")]
    pub user_email: String,
}

/// HTTP listener configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Socket address to bind
    #[serde(default = "default_listen")]
    pub listen: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String, // "compact", "full", "pretty"
}

// Default value functions
fn default_workspace_dir() -> String {
    "/workspace".to_string()
}
fn default_base_url() -> String {
    "http://windmill_server:8000".to_string()
}
fn default_cli() -> String {
    "wmill".to_string()
}
fn default_workspace() -> String {
    "admins".to_string()
}
fn default_git_binary() -> String {
    "git".to_string()
}
fn default_branch() -> String {
    "main".to_string()
}
fn default_user_name() -> String {
    "Windmill Git Sync".to_string()
}
fn default_user_email() -> String {
    "windmill@example.com".to_string()
}
fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

// Default implementations
impl Default for WindmillConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cli: default_cli(),
            default_workspace: default_workspace(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
            default_branch: default_branch(),
            user_name: default_user_name(),
            user_email: default_user_email(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: default_workspace_dir(),
            windmill: WindmillConfig::default(),
            git: GitConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Environment variables that override configured defaults
const ENV_OVERRIDES: &[&str] = &[
    "WINDMILL_BASE_URL",
    "WORKSPACE_DIR",
    "GIT_BRANCH",
    "GIT_USER_NAME",
    "GIT_USER_EMAIL",
    "SYNC_LISTEN_ADDR",
];

impl Config {
    /// Load configuration from the default location, falling back to defaults
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            tracing::debug!("No configuration at {:?}, using defaults", config_path);
            let mut config = Self::default();
            config.apply_env_overrides();
            config.expand_paths()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.apply_env_overrides();

        // Expand environment variables in paths
        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("windmill-git-sync").join("config.yml"))
    }

    /// Apply process environment on top of file values
    pub fn apply_env_overrides(&mut self) {
        for key in ENV_OVERRIDES {
            let Ok(value) = std::env::var(key) else {
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }

            match *key {
                "WINDMILL_BASE_URL" => self.windmill.base_url = value,
                "WORKSPACE_DIR" => self.workspace_dir = value,
                "GIT_BRANCH" => self.git.default_branch = value,
                "GIT_USER_NAME" => self.git.user_name = value,
                "GIT_USER_EMAIL" => self.git.user_email = value,
                "SYNC_LISTEN_ADDR" => self.server.listen = value,
                _ => {}
            }
        }
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.workspace_dir = shellexpand::full(&self.workspace_dir)
            .context("Failed to expand workspace_dir path")?
            .into_owned();

        Ok(())
    }

    /// The working directory as a path
    pub fn workspace_path(&self) -> PathBuf {
        PathBuf::from(&self.workspace_dir)
    }
}
