//! Conversions from module errors into [`VaultError`].

use fieldvault_common::VaultError;

use crate::config::ConfigError;
use crate::schema::ClassificationError;

impl From<ClassificationError> for VaultError {
    fn from(e: ClassificationError) -> Self {
        VaultError::Classification(e.to_string())
    }
}

impl From<ConfigError> for VaultError {
    fn from(e: ConfigError) -> Self {
        VaultError::Configuration(e.to_string())
    }
}
