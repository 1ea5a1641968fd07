//! Client configuration and environment loading

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::secret::{SigningIdentity, DEFAULT_SECRET_LIFETIME};

/// Apple's token validation endpoint
pub const VALIDATION_URL: &str = "https://appleid.apple.com/auth/token";
pub const CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const ACCEPT: &str = "application/json";
/// Apple rejects token requests without a user agent
pub const USER_AGENT: &str = "apple-signin";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for a [`ValidationClient`](crate::ValidationClient), fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub validation_url: String,
    /// Deadline for a single token request, including reading the response
    pub timeout: Duration,
    /// Lifetime of the client secret signed for each request
    pub secret_lifetime: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            validation_url: VALIDATION_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            secret_lifetime: DEFAULT_SECRET_LIFETIME,
        }
    }
}

impl ClientConfig {
    pub fn with_validation_url(mut self, url: impl Into<String>) -> Self {
        self.validation_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_secret_lifetime(mut self, lifetime: Duration) -> Self {
        self.secret_lifetime = lifetime;
        self
    }

    /// Defaults overridden by `APPLE_SIGN_IN_VALIDATION_URL`, `APPLE_SIGN_IN_TIMEOUT_SECS`
    /// and `APPLE_SIGN_IN_SECRET_LIFETIME_SECS` when set
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("APPLE_SIGN_IN_VALIDATION_URL") {
            config.validation_url = url;
        }
        if let Some(secs) = lookup("APPLE_SIGN_IN_TIMEOUT_SECS") {
            config.timeout = parse_secs("APPLE_SIGN_IN_TIMEOUT_SECS", secs)?;
        }
        if let Some(secs) = lookup("APPLE_SIGN_IN_SECRET_LIFETIME_SECS") {
            config.secret_lifetime = parse_secs("APPLE_SIGN_IN_SECRET_LIFETIME_SECS", secs)?;
        }

        Ok(config)
    }
}

fn parse_secs(name: &'static str, value: String) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(_) => Err(ConfigError::InvalidVar { name, value }),
    }
}

fn require<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

impl SigningIdentity {
    /// Load the identity from `APPLE_SIGN_IN_TEAM_ID`, `APPLE_SIGN_IN_CLIENT_ID`,
    /// `APPLE_SIGN_IN_KEY_ID` and the `.p8` file at `APPLE_SIGN_IN_SECRET_PATH`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let team_id = require(&lookup, "APPLE_SIGN_IN_TEAM_ID")?;
        let client_id = require(&lookup, "APPLE_SIGN_IN_CLIENT_ID")?;
        let key_id = require(&lookup, "APPLE_SIGN_IN_KEY_ID")?;
        let path = PathBuf::from(require(&lookup, "APPLE_SIGN_IN_SECRET_PATH")?);

        let private_key =
            std::fs::read(&path).map_err(|source| ConfigError::ReadKey { path, source })?;

        Ok(Self::new(team_id, client_id, key_id, private_key))
    }
}
