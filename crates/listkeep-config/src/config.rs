//! Configuration management.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default identity provider base URL (override at compile time via LISTKEEP_AUTH_URL).
pub const DEFAULT_AUTH_URL: &str = match option_env!("LISTKEEP_AUTH_URL") {
    Some(url) => url,
    None => "https://identitytoolkit.googleapis.com",
};

/// Default token refresh base URL (override at compile time via LISTKEEP_TOKEN_URL).
pub const DEFAULT_TOKEN_URL: &str = match option_env!("LISTKEEP_TOKEN_URL") {
    Some(url) => url,
    None => "https://securetoken.googleapis.com",
};

/// Default realtime database URL (override at compile time via LISTKEEP_DATABASE_URL).
pub const DEFAULT_DATABASE_URL: &str = match option_env!("LISTKEEP_DATABASE_URL") {
    Some(url) => url,
    None => "https://listkeep-default-rtdb.firebaseio.com",
};

/// Default public web API key (override at compile time via LISTKEEP_API_KEY).
pub const DEFAULT_API_KEY: &str = match option_env!("LISTKEEP_API_KEY") {
    Some(key) => key,
    None => "listkeep-public-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Backend endpoints and runtime settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Identity provider base URL.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// Token refresh base URL.
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Realtime database URL.
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Public web API key sent with identity requests.
    #[serde(default = "default_api_key")]
    pub api_key: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_api_key() -> String {
    DEFAULT_API_KEY.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            database_url: default_database_url(),
            api_key: default_api_key(),
        }
    }
}

impl Config {
    /// Load configuration from the config file (if any), then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Apply `LISTKEEP_LOG_LEVEL`, `LISTKEEP_API_KEY` and
    /// `LISTKEEP_DATABASE_URL` overrides. Blank values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(log_level) = read("LISTKEEP_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(api_key) = read("LISTKEEP_API_KEY") {
            self.api_key = api_key;
        }
        if let Some(database_url) = read("LISTKEEP_DATABASE_URL") {
            self.database_url = database_url;
        }
    }

    /// Check that every endpoint parses and the API key is set.
    pub fn validate(&self) -> CoreResult<()> {
        self.auth_url()?;
        self.token_url()?;
        self.database_url()?;
        if self.api_key.trim().is_empty() {
            return Err(CoreError::Config("api_key must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn auth_url(&self) -> CoreResult<Url> {
        Url::parse(&self.auth_url).map_err(CoreError::from)
    }

    pub fn token_url(&self) -> CoreResult<Url> {
        Url::parse(&self.token_url).map_err(CoreError::from)
    }

    pub fn database_url(&self) -> CoreResult<Url> {
        Url::parse(&self.database_url).map_err(CoreError::from)
    }
}
