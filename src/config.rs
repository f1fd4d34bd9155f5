use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::net::Endpoints;

pub const DEFAULT_PRIMARY_URL: &str = "ws://35.202.61.130:8080";
pub const DEFAULT_FALLBACK_URL: &str = "ws://localhost:8080";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub primary_url: String,
    /// Tried once if the primary server can't be reached.
    pub fallback_url: Option<String>,
    /// Skips the username screen when set.
    pub username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_url: DEFAULT_PRIMARY_URL.to_string(),
            fallback_url: Some(DEFAULT_FALLBACK_URL.to_string()),
            username: None,
        }
    }
}

/// Values given on the command line; each one wins over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub primary_url: Option<String>,
    pub fallback_url: Option<String>,
    pub no_fallback: bool,
    pub username: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from(".config"));

        config_dir.join("llmchatroom").join("config.toml")
    }

    /// Load from an explicit path, or from the default location if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::read(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::read(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.primary_url {
            self.primary_url = url;
        }
        if let Some(url) = overrides.fallback_url {
            self.fallback_url = Some(url);
        }
        if overrides.no_fallback {
            self.fallback_url = None;
        }
        if let Some(name) = overrides.username {
            self.username = Some(name);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url(&self.primary_url)?;
        if let Some(url) = &self.fallback_url {
            validate_url(url)?;
        }
        Ok(())
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(&self.primary_url, self.fallback_url.as_deref())
    }
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl(url.to_string()))
    }
}
