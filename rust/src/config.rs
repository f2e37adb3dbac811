//! Configuration file discovery, loading and environment overlay.
//!
//! Files are looked up in this order and the first one found wins:
//! an explicit path, `$XDG_CONFIG_HOME/twitch-integration/config.toml`, then
//! `./twitch-integration.toml`. `TWITCH_*` environment variables override
//! whatever the file provides.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::auth::{AuthError, CredentialProvider, RefreshingCredentials, StaticCredentials};
use crate::helix::HELIX_BASE_URL;
use crate::stream::client::EVENTSUB_ENDPOINT;

const CONFIG_DIR_NAME: &str = "twitch-integration";
const LOCAL_CONFIG_FILE: &str = "twitch-integration.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid setting {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Where the loaded values came from.
#[derive(Clone, Debug, Default)]
pub struct ConfigSources {
    pub file: Option<PathBuf>,
    /// Environment variables that overrode file values.
    pub env_overrides: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub client_id: String,
    pub client_secret: Option<SecretString>,
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Broadcaster whose channel events are subscribed to.
    pub login_name: String,
    /// Chat reader; defaults to the broadcaster.
    pub viewer_login: Option<String>,
    pub websocket_url: String,
    pub api_base_url: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            login_name: String::new(),
            viewer_login: None,
            websocket_url: EVENTSUB_ENDPOINT.to_string(),
            api_base_url: HELIX_BASE_URL.to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub watchdog_interval_secs: u64,
    pub update_interval_ms: u64,
    pub handshake_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            watchdog_interval_secs: 1,
            update_interval_ms: 1000,
            handshake_timeout_secs: 10,
        }
    }
}

impl RuntimeConfig {
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

/// Complete runtime configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    pub credentials: CredentialsConfig,
    pub stream: StreamConfig,
    pub runtime: RuntimeConfig,
}

impl IntegrationConfig {
    /// Loads the first discovered file, applies the process environment and
    /// validates the result.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = match discover_config_file(explicit) {
            Some(path) => {
                let config = Self::from_file(&path)?;
                sources.file = Some(path);
                config
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| env::var(key).ok(), &mut sources);
        config.validate()?;
        Ok((config, sources))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents, path)
    }

    fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|err: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Overrides file values with `TWITCH_*` variables resolved by `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F, sources: &mut ConfigSources)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut take = |key: &str| {
            let value = lookup(key).filter(|value| !value.is_empty())?;
            sources.env_overrides.push(key.to_string());
            Some(value)
        };

        if let Some(v) = take("TWITCH_CLIENT_ID") {
            self.credentials.client_id = v;
        }
        if let Some(v) = take("TWITCH_CLIENT_SECRET") {
            self.credentials.client_secret = Some(SecretString::new(v));
        }
        if let Some(v) = take("TWITCH_ACCESS_TOKEN") {
            self.credentials.access_token = Some(SecretString::new(v));
        }
        if let Some(v) = take("TWITCH_REFRESH_TOKEN") {
            self.credentials.refresh_token = Some(SecretString::new(v));
        }
        if let Some(v) = take("TWITCH_LOGIN_NAME") {
            self.stream.login_name = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.credentials.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("credentials.client_id"));
        }
        if !is_present(&self.credentials.access_token) {
            return Err(ConfigError::Missing("credentials.access_token"));
        }
        if is_present(&self.credentials.refresh_token) && !is_present(&self.credentials.client_secret)
        {
            return Err(ConfigError::Missing("credentials.client_secret"));
        }
        if self.stream.login_name.trim().is_empty() {
            return Err(ConfigError::Missing("stream.login_name"));
        }
        if self.runtime.watchdog_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "runtime.watchdog_interval_secs",
                message: "must be positive".to_string(),
            });
        }
        if self.runtime.update_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "runtime.update_interval_ms",
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Chat reader login, falling back to the broadcaster.
    pub fn viewer_login(&self) -> &str {
        self.stream
            .viewer_login
            .as_deref()
            .filter(|login| !login.trim().is_empty())
            .unwrap_or(&self.stream.login_name)
    }

    /// Refreshing credentials when a refresh token and client secret are
    /// configured, otherwise a fixed access token.
    pub fn credential_provider(&self) -> Result<Arc<dyn CredentialProvider>, AuthError> {
        let credentials = &self.credentials;
        let access_token = credentials
            .access_token
            .clone()
            .ok_or(AuthError::RefreshUnavailable("no access token configured"))?;

        match (&credentials.refresh_token, &credentials.client_secret) {
            (Some(refresh_token), Some(client_secret)) => Ok(Arc::new(RefreshingCredentials::new(
                credentials.client_id.clone(),
                client_secret.clone(),
                access_token,
                refresh_token.clone(),
            )?)),
            _ => Ok(Arc::new(StaticCredentials::new(
                access_token,
                credentials.client_id.clone(),
            ))),
        }
    }
}

fn is_present(secret: &Option<SecretString>) -> bool {
    secret
        .as_ref()
        .is_some_and(|secret| !secret.expose_secret().trim().is_empty())
}

/// Returns the config file to load, if any.
pub fn discover_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Some(dirs) = directories::BaseDirs::new() {
        let user = dirs.config_dir().join(CONFIG_DIR_NAME).join("config.toml");
        if user.exists() {
            return Some(user);
        }
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    local.exists().then_some(local)
}
