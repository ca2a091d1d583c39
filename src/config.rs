use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::cache::default_cache_path;
use crate::catalog::{DEFAULT_API_URL, DEFAULT_CHUNK_SIZE};
use crate::domain::Compatibility;
use crate::error::DownloaderError;

pub const CONFIG_FILE_NAME: &str = "modrinth-dl.json";
pub const TOKEN_ENV: &str = "MODRINTH_TOKEN";

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub game_version: Option<String>,
    #[serde(default)]
    pub loader: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub cache_file: Option<String>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub api_url: Option<String>,
}

/// Values given on the command line; each one wins over the config file.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub token: Option<String>,
    pub game_version: Option<String>,
    pub loader: Option<String>,
    pub destination: Option<String>,
    pub cache_file: Option<String>,
    pub chunk_size: Option<usize>,
    pub api_url: Option<String>,
    pub no_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheSetting {
    File(Utf8PathBuf),
    Memory,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub token: String,
    pub compatibility: Compatibility,
    pub destination: Utf8PathBuf,
    pub cache: CacheSetting,
    pub chunk_size: usize,
    pub api_url: String,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, DownloaderError> {
        let config = Self::load(path)?;
        let env_token = std::env::var(TOKEN_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());
        Self::resolve_config(config, overrides, env_token)
    }

    /// An explicit path must exist; the default file in the working directory is optional.
    pub fn load(path: Option<&str>) -> Result<Config, DownloaderError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE_NAME),
        };
        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| DownloaderError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| DownloaderError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
        env_token: Option<String>,
    ) -> Result<ResolvedConfig, DownloaderError> {
        let token = overrides
            .token
            .or(env_token)
            .or(config.token)
            .ok_or_else(|| DownloaderError::MissingSetting(format!("token (or {TOKEN_ENV})")))?;
        let game_version = overrides
            .game_version
            .or(config.game_version)
            .ok_or_else(|| DownloaderError::MissingSetting("game version".to_string()))?;
        let loader = overrides
            .loader
            .or(config.loader)
            .ok_or_else(|| DownloaderError::MissingSetting("loader".to_string()))?;

        let destination = Utf8PathBuf::from(
            overrides
                .destination
                .or(config.destination)
                .unwrap_or_else(|| "download".to_string()),
        );
        if destination.as_std_path().exists() && !destination.as_std_path().is_dir() {
            return Err(DownloaderError::Filesystem(format!(
                "{destination} is not a directory"
            )));
        }

        let cache = if overrides.no_cache {
            CacheSetting::Memory
        } else {
            match overrides.cache_file.or(config.cache_file) {
                Some(path) => CacheSetting::File(Utf8PathBuf::from(path)),
                None => CacheSetting::File(default_cache_path()?),
            }
        };

        let chunk_size = overrides
            .chunk_size
            .or(config.chunk_size)
            .unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(DownloaderError::ConfigParse(
                "chunk_size must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            token,
            compatibility: Compatibility::new(game_version.trim(), loader.trim()),
            destination,
            cache,
            chunk_size,
            api_url: overrides
                .api_url
                .or(config.api_url)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        })
    }
}
