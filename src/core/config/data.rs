use crate::api::ApiSettings;
use crate::core::config::io::ConfigError;
use crate::core::constants::{
    API_BASE_URL_ENV, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TOKEN_CHECK_INTERVAL,
};
use crate::core::storage::StorageBackend;
use crate::utils::url::{is_http_url, normalize_base_url};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub token_check_interval_secs: Option<u64>,
    pub storage: Option<StorageBackend>,
}

/// Keys accepted by `parlor set` and `parlor unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ApiBaseUrl,
    RequestTimeout,
    TokenCheckInterval,
    Storage,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 4] = [
        ConfigKey::ApiBaseUrl,
        ConfigKey::RequestTimeout,
        ConfigKey::TokenCheckInterval,
        ConfigKey::Storage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::ApiBaseUrl => "api-base-url",
            ConfigKey::RequestTimeout => "request-timeout",
            ConfigKey::TokenCheckInterval => "token-check-interval",
            ConfigKey::Storage => "storage",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == key)
    }

    pub fn known_keys() -> String {
        Self::ALL
            .iter()
            .map(|key| key.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Config {
    /// The API base URL: the environment wins over the file.
    pub fn resolve_base_url(&self, env_override: Option<String>) -> Result<String, ConfigError> {
        env_override
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.api_base_url.clone())
            .map(|url| normalize_base_url(&url))
            .ok_or(ConfigError::MissingBaseUrl)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn token_check_interval(&self) -> Duration {
        self.token_check_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_CHECK_INTERVAL)
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.storage.unwrap_or_default()
    }

    /// Gateway settings from this config and the process environment.
    pub fn api_settings(&self) -> Result<ApiSettings, ConfigError> {
        let env_override = std::env::var(API_BASE_URL_ENV).ok();
        Ok(ApiSettings {
            base_url: self.resolve_base_url(env_override)?,
            timeout: self.request_timeout(),
        })
    }

    pub fn set_value(&mut self, key: ConfigKey, value: &str) -> Result<(), String> {
        let value = value.trim();
        match key {
            ConfigKey::ApiBaseUrl => {
                if !is_http_url(value) {
                    return Err(format!("Not an http(s) URL: {value}"));
                }
                self.api_base_url = Some(normalize_base_url(value));
            }
            ConfigKey::RequestTimeout => {
                self.request_timeout_secs = Some(parse_positive_secs(value)?);
            }
            ConfigKey::TokenCheckInterval => {
                self.token_check_interval_secs = Some(parse_positive_secs(value)?);
            }
            ConfigKey::Storage => {
                let backend = StorageBackend::parse(value).ok_or_else(|| {
                    format!("Unknown storage backend '{value}' (expected file, keyring, or memory)")
                })?;
                self.storage = Some(backend);
            }
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::ApiBaseUrl => self.api_base_url = None,
            ConfigKey::RequestTimeout => self.request_timeout_secs = None,
            ConfigKey::TokenCheckInterval => self.token_check_interval_secs = None,
            ConfigKey::Storage => self.storage = None,
        }
    }
}

fn parse_positive_secs(value: &str) -> Result<u64, String> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(format!("Expected a positive number of seconds, got '{value}'")),
    }
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
