//! Configuration loading
//!
//! Every setting resolves in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! The Gemini API key has no compiled default; startup fails with a
//! configuration error when no tier provides it.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://meterscan.db?mode=rwc";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_IMAGES_DIR: &str = "./temp";

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "METERSCAN_CONFIG";

/// Optional settings read from `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub database_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: Option<String>,
    pub gemini_model: Option<String>,
    pub images_dir: Option<PathBuf>,
    pub public_base_url: Option<String>,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub database_url: Option<String>,
    pub images_dir: Option<PathBuf>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub database_url: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub images_dir: PathBuf,
    /// Base of the URLs handed back for stored images
    pub public_base_url: String,
}

impl ServiceConfig {
    /// Resolve configuration from CLI, environment, TOML and defaults
    pub fn resolve(cli: CliOverrides) -> Result<Self> {
        let toml_config = match config_file_path() {
            Some(path) => load_toml_config(&path)?,
            None => {
                debug!("No config file found, using environment and defaults");
                TomlConfig::default()
            }
        };
        Self::resolve_with(cli, toml_config)
    }

    /// Resolve against an already loaded TOML config
    pub fn resolve_with(cli: CliOverrides, toml_config: TomlConfig) -> Result<Self> {
        let port = match cli.port {
            Some(port) => port,
            None => match env_value("PORT") {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| Error::Config(format!("PORT is not a valid port: {}", raw)))?,
                None => toml_config.port.unwrap_or(DEFAULT_PORT),
            },
        };

        let database_url = cli
            .database_url
            .or_else(|| env_value("DATABASE_URL"))
            .or(toml_config.database_url)
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let gemini_api_key = env_value("GEMINI_API_KEY")
            .or(toml_config.gemini_api_key.filter(|key| is_valid_key(key)))
            .ok_or_else(|| {
                Error::Config(
                    "Gemini API key not configured. Please configure using one of:\n\
                     1. Environment: GEMINI_API_KEY=your-key-here\n\
                     2. TOML config: ~/.config/meterscan/config.toml (gemini_api_key = \"your-key\")"
                        .to_string(),
                )
            })?;

        let gemini_base_url = env_value("GEMINI_BASE_URL")
            .or(toml_config.gemini_base_url)
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string());

        let gemini_model = env_value("GEMINI_MODEL")
            .or(toml_config.gemini_model)
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        let images_dir = cli
            .images_dir
            .or_else(|| env_value("METERSCAN_IMAGES_DIR").map(PathBuf::from))
            .or(toml_config.images_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGES_DIR));

        let public_base_url = env_value("METERSCAN_PUBLIC_URL")
            .or(toml_config.public_base_url)
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        Ok(Self {
            port,
            database_url,
            gemini_api_key,
            gemini_base_url: gemini_base_url.trim_end_matches('/').to_string(),
            gemini_model,
            images_dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Read a TOML config file. A missing file yields defaults.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found: {} (using defaults)", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;
    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Locate the config file: `METERSCAN_CONFIG` first, then the
/// per-user config directory.
fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = env_value(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    dirs::config_dir()
        .map(|d| d.join("meterscan").join("config.toml"))
        .filter(|p| p.exists())
}

/// Non-blank environment variable
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| is_valid_key(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   \t"));
    }

    #[test]
    fn test_toml_config_partial() {
        let config: TomlConfig = toml::from_str("port = 8080\ngemini_model = \"m\"").unwrap();
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.gemini_model.as_deref(), Some("m"));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_missing_config_file_yields_defaults() {
        let config = load_toml_config(Path::new("/nonexistent/meterscan/config.toml")).unwrap();
        assert_eq!(config, TomlConfig::default());
    }
}
