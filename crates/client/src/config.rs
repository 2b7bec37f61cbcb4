//! Configuration for the REST client
//!
//! [`RestServiceConfig`] is the partial, user-facing form where every field is
//! optional. [`ClientConfig`] holds the resolved values the client reads on
//! every request.

use crate::Result;
use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "REST_CLIENT";

/// Backend holding the authentication token between requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TokenStorage {
    /// Cookie jar, with expiry and secure attribute
    Cookie,
    /// Key/value local storage
    LocalStorage,
    /// Any other value. Token operations fail with [`ClientError::InvalidStorageKind`].
    Unknown(String),
}

impl From<String> for TokenStorage {
    fn from(value: String) -> Self {
        match value.as_str() {
            "cookie" => Self::Cookie,
            "localStorage" => Self::LocalStorage,
            _ => Self::Unknown(value),
        }
    }
}

impl From<&str> for TokenStorage {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<TokenStorage> for String {
    fn from(value: TokenStorage) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TokenStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cookie => f.write_str("cookie"),
            Self::LocalStorage => f.write_str("localStorage"),
            Self::Unknown(other) => f.write_str(other),
        }
    }
}

/// Partial client configuration
///
/// Only the fields that are set override the current configuration when
/// passed to [`RestClient::configure`](crate::RestClient::configure).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestServiceConfig {
    /// Prepended to every request path
    #[serde(alias = "endPoint")]
    pub end_point: Option<String>,
    /// Serve requests from static `.json` fixtures
    #[serde(alias = "mockData")]
    pub mock_data: Option<bool>,
    /// `cookie` or `localStorage`
    #[serde(alias = "tokenStorage")]
    pub token_storage: Option<TokenStorage>,
    /// Key under which the token is stored
    #[serde(alias = "tokenName")]
    pub token_name: Option<String>,
    /// Mark the token cookie as secure
    #[serde(alias = "secureCookie")]
    pub secure_cookie: Option<bool>,
    /// Token cookie lifetime in minutes
    #[serde(alias = "cookieExpires")]
    pub cookie_expires: Option<i64>,
    /// Path of the authorization endpoint
    #[serde(alias = "authUri")]
    pub auth_uri: Option<String>,
    /// Path of the token validation endpoint
    #[serde(alias = "validationTokenUri")]
    pub validation_token_uri: Option<String>,
}

impl RestServiceConfig {
    /// Load configuration from file, with `REST_CLIENT_*` environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load configuration from `REST_CLIENT_*` environment variables only
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables cannot be parsed
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn end_point(mut self, end_point: impl Into<String>) -> Self {
        self.end_point = Some(end_point.into());
        self
    }

    pub fn mock_data(mut self, enabled: bool) -> Self {
        self.mock_data = Some(enabled);
        self
    }

    pub fn token_storage(mut self, storage: impl Into<TokenStorage>) -> Self {
        self.token_storage = Some(storage.into());
        self
    }

    pub fn token_name(mut self, name: impl Into<String>) -> Self {
        self.token_name = Some(name.into());
        self
    }

    pub fn secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = Some(secure);
        self
    }

    pub fn cookie_expires(mut self, minutes: i64) -> Self {
        self.cookie_expires = Some(minutes);
        self
    }

    pub fn auth_uri(mut self, uri: impl Into<String>) -> Self {
        self.auth_uri = Some(uri.into());
        self
    }

    pub fn validation_token_uri(mut self, uri: impl Into<String>) -> Self {
        self.validation_token_uri = Some(uri.into());
        self
    }
}

/// Resolved client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub end_point: String,
    pub mock_data: bool,
    pub token_storage: TokenStorage,
    pub token_name: String,
    pub secure_cookie: bool,
    /// Minutes added to the current time when the token cookie is written
    pub cookie_expires: i64,
    pub auth_uri: String,
    pub validation_token_uri: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            end_point: String::new(),
            mock_data: false,
            token_storage: TokenStorage::Cookie,
            token_name: "AuthToken".to_string(),
            secure_cookie: false,
            cookie_expires: 1440 * 7,
            auth_uri: "/authorize".to_string(),
            validation_token_uri: "/validate-token".to_string(),
        }
    }
}

impl ClientConfig {
    /// Return a copy with every set field of `overrides` applied
    pub fn merged(&self, overrides: &RestServiceConfig) -> Self {
        let mut next = self.clone();
        if let Some(end_point) = &overrides.end_point {
            next.end_point.clone_from(end_point);
        }
        if let Some(mock_data) = overrides.mock_data {
            next.mock_data = mock_data;
        }
        if let Some(storage) = &overrides.token_storage {
            next.token_storage = storage.clone();
        }
        if let Some(name) = &overrides.token_name {
            next.token_name.clone_from(name);
        }
        if let Some(secure) = overrides.secure_cookie {
            next.secure_cookie = secure;
        }
        if let Some(minutes) = overrides.cookie_expires {
            next.cookie_expires = minutes;
        }
        if let Some(uri) = &overrides.auth_uri {
            next.auth_uri.clone_from(uri);
        }
        if let Some(uri) = &overrides.validation_token_uri {
            next.validation_token_uri.clone_from(uri);
        }
        next
    }

    /// Check the configuration for values that make token operations fail
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidStorageKind`] for an unknown token storage
    /// and [`ClientError::Configuration`] for a negative cookie lifetime.
    pub fn validate(&self) -> Result<()> {
        if let TokenStorage::Unknown(kind) = &self.token_storage {
            return Err(ClientError::InvalidStorageKind(kind.clone()));
        }
        if self.cookie_expires < 0 {
            return Err(ClientError::Configuration(format!(
                "cookie_expires must not be negative, got {}",
                self.cookie_expires
            )));
        }
        Ok(())
    }
}
