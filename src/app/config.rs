use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_TOKEN_ENV, ENV_PREFIX, ERROR_DISMISS_SECS,
    HTTP_REQUEST_TIMEOUT_SECS, MAX_UPLOAD_BYTES, NEW_CONVERSATION_TITLE, TITLE_MAX_CHARS,
    UPLOAD_CHUNK_BYTES, UPLOAD_TIMEOUT_SECS,
};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// REST API connection
    #[serde(default)]
    pub api: ApiConfig,

    /// Conversation session behaviour
    #[serde(default)]
    pub session: SessionConfig,

    /// File attachment limits
    #[serde(default)]
    pub upload: UploadConfig,
}

/// REST API connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Root URL all endpoints hang off
    pub base_url: String,
    /// Environment variable holding the bearer token
    pub token_env: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            request_timeout_secs: HTTP_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Bearer token from the configured environment variable, if set
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Conversation session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds before a surfaced error clears itself
    pub error_dismiss_secs: u64,
    /// Title the API gives conversations before the first message
    pub new_conversation_title: String,
    /// Longest title derived from a first message, ellipsis included
    pub title_max_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            error_dismiss_secs: ERROR_DISMISS_SECS,
            new_conversation_title: NEW_CONVERSATION_TITLE.to_string(),
            title_max_chars: TITLE_MAX_CHARS,
        }
    }
}

impl SessionConfig {
    pub fn error_dismiss(&self) -> Duration {
        Duration::from_secs(self.error_dismiss_secs)
    }
}

/// File attachment settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Largest accepted file in bytes
    pub max_file_size: u64,
    /// Upload request timeout in seconds
    pub timeout_secs: u64,
    /// Body chunk size used for progress reporting
    pub chunk_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: MAX_UPLOAD_BYTES,
            timeout_secs: UPLOAD_TIMEOUT_SECS,
            chunk_size: UPLOAD_CHUNK_BYTES,
        }
    }
}

impl UploadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Load configuration from multiple sources
pub fn load_config() -> Result<Config> {
    load_config_with(None)
}

/// Load configuration, layering an explicit file over the global and local ones
pub fn load_config_with(explicit: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    // Add global config if it exists
    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join("config.toml");
        if global_config.exists() {
            figment = figment.merge(Toml::file(&global_config));
        }
    }

    // Add local config if it exists
    let local_config = PathBuf::from(".taxchat/config.toml");
    if local_config.exists() {
        figment = figment.merge(Toml::file(&local_config));
    }

    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        figment = figment.merge(Toml::file(path));
    }

    // Add environment variables (TAXCHAT_API__BASE_URL, ...)
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    figment
        .extract()
        .context("Failed to load configuration")
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "taxchat") {
        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;
        Ok(config_dir.to_path_buf())
    } else {
        // Fallback to home directory
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        let config_dir = PathBuf::from(home).join(".config").join("taxchat");
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = if let Some(p) = path {
        p
    } else {
        get_config_dir()?.join("config.toml")
    };

    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Create a default configuration file if it doesn't exist
pub fn init_config() -> Result<PathBuf> {
    let config_file = get_config_dir()?.join("config.toml");

    if !config_file.exists() {
        save_config(&Config::default(), Some(config_file.clone()))?;
    }

    Ok(config_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.session.error_dismiss(), Duration::from_secs(7));
        assert_eq!(config.session.new_conversation_title, "New Conversation");
        assert_eq!(config.session.title_max_chars, 50);
        assert_eq!(config.upload.max_file_size, 50 * 1024 * 1024);
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("taxchat.toml");
        std::fs::write(
            &path,
            r#"
[api]
base_url = "https://tax.example.com/api"

[session]
error_dismiss_secs = 3
"#,
        )
        .unwrap();

        let config = load_config_with(Some(&path)).unwrap();
        assert_eq!(config.api.base_url, "https://tax.example.com/api");
        assert_eq!(config.session.error_dismiss_secs, 3);
        // Untouched keys keep their defaults
        assert_eq!(config.session.title_max_chars, 50);
        assert_eq!(config.api.token_env, "TAXCHAT_TOKEN");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_config_with(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.upload.chunk_size = 1024;

        save_config(&config, Some(path.clone())).unwrap();
        let loaded: Config = toml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(loaded, config);
    }
}
