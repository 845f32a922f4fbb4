//! Configuration trait.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{BridgeError, Result};
use crate::{LoggingConfig, ZenohConfig};

/// Trait for the bridge's top-level configuration.
///
/// Gives the runner access to the common sections and provides
/// [`load`](Self::load), which parses a JSON5 file and validates it.
pub trait BridgeConfig: Sized + DeserializeOwned {
    fn zenoh(&self) -> &ZenohConfig;

    fn logging(&self) -> &LoggingConfig;

    /// Key expression prefix every published key starts with.
    fn key_prefix(&self) -> &str;

    /// Bus service name published values are grouped under.
    fn service_name(&self) -> String;

    /// Called by [`load`](Self::load) after parsing.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Load and validate configuration from a JSON5 file.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }
}
