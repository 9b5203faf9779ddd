//! Process configuration, read once at startup.

use url::Url;

use crate::error::ConfigError;

pub const UPSTREAM_URL_VAR: &str = "ORIGINAL_ICS_URL";
pub const PORT_VAR: &str = "PORT";
pub const DEFAULT_PORT: u16 = 8000;

/// Settings for the proxy. Immutable after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Feed that gets fetched and rewritten on every request
    pub upstream_url: Url,
    /// Port the HTTP endpoint listens on
    pub port: u16,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is read first if it exists;
    /// variables already set in the environment win over the file.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup(UPSTREAM_URL_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingVar(UPSTREAM_URL_VAR))?;

        let upstream_url = Url::parse(&raw_url).map_err(|source| ConfigError::InvalidUrl {
            var: UPSTREAM_URL_VAR,
            source,
        })?;

        let port = match lookup(PORT_VAR).map(|v| v.trim().to_string()) {
            Some(value) if !value.is_empty() => value
                .parse::<u16>()
                .map_err(|source| ConfigError::InvalidPort { value, source })?,
            _ => DEFAULT_PORT,
        };

        Ok(Config { upstream_url, port })
    }
}
