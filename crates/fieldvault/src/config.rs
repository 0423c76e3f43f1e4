//! Configuration loading and validation.
//!
//! All values are read from environment variables at startup. A missing or
//! malformed root secret is fatal before any record is processed.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use thiserror::Error;

use crate::crypto::kdf::{RootSecret, MIN_ROOT_SECRET_LEN};

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The environment could not be read or deserialised.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("ROOT_SECRET is required and must not be empty")]
    MissingRootSecret,

    /// The root secret is not base64url or decodes to too few bytes.
    #[error("ROOT_SECRET is malformed: {0}")]
    MalformedRootSecret(String),
}

/// Validated fieldvault configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Base64url-encoded root secret, at least 32 bytes once decoded. **Required.**
    #[serde(default)]
    pub root_secret: String,

    /// Optional path to a YAML or JSON file of record schemas.
    #[serde(default)]
    pub schema_path: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the root secret is absent or malformed, or if any
    /// variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;

        let c: Config = cfg.try_deserialize()?;

        c.validate()?;
        Ok(c)
    }

    /// Decode the root secret.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRootSecret`] or
    /// [`ConfigError::MalformedRootSecret`].
    pub fn root_secret(&self) -> Result<RootSecret, ConfigError> {
        let encoded = self.root_secret.trim();
        if encoded.is_empty() {
            return Err(ConfigError::MissingRootSecret);
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|_| ConfigError::MalformedRootSecret("not valid base64url".into()))?;
        RootSecret::new(bytes).map_err(|_| {
            ConfigError::MalformedRootSecret(format!(
                "must decode to at least {MIN_ROOT_SECRET_LEN} bytes"
            ))
        })
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<(), ConfigError> {
        self.root_secret().map(drop)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("root_secret", &"[REDACTED]")
            .field("schema_path", &self.schema_path)
            .field("log_level", &self.log_level)
            .finish()
    }
}
