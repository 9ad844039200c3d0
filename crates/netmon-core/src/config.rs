//! Configuration management for netmon services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`NETMON__` prefix, `__` separated)
//! 2. Config file (`netmon.toml` by default)
//! 3. Defaults

use serde::de::DeserializeOwned;

use crate::error::{NetmonError, Result};

/// Environment variable prefix shared by all sections.
pub const ENV_PREFIX: &str = "NETMON";

/// Build the layered configuration source for a file prefix.
pub fn layered(file_prefix: &str) -> Result<config::Config> {
    config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| NetmonError::Config(e.to_string()))
}

/// Deserialize one section, falling back to defaults when it is absent.
///
/// A section that is present but does not deserialize is an error rather
/// than a silent fallback.
pub fn section<T>(cfg: &config::Config, name: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match cfg.get::<T>(name) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => {
            tracing::debug!(section = name, "Config section absent, using defaults");
            Ok(T::default())
        }
        Err(e) => Err(NetmonError::Config(format!("[{name}]: {e}"))),
    }
}
