//! Configuration loading.
//!
//! Settings come from an optional `config/default.toml` and from environment
//! variables prefixed with `CATALOG_`, using `__` between nesting levels
//! (`CATALOG_BROKER__URI`, `CATALOG_STORE__PATH`, ...). The broker URI and the
//! store path have no defaults: without them the service cannot start.

mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    BrokerSettings, DEFAULT_LOG_LEVEL, DEFAULT_REQUEST_TIMEOUT_MS, LoggingSettings, Settings,
    StoreSettings,
};

const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Loads the configuration from the default file and environment variables.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(DEFAULT_CONFIG_FILE)
}

/// Same as [`load_config`] but reads the file source from `file` (without
/// extension). The file is optional.
pub fn load_config_from(file: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(file).required(false))
        .add_source(
            Environment::with_prefix("CATALOG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    let broker = partial.broker.as_ref();
    let uri = broker
        .and_then(|b| b.uri.clone())
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| ConfigError::NotFound("broker.uri".to_string()))?;
    let path = partial
        .store
        .as_ref()
        .and_then(|s| s.path.clone())
        .filter(|path| !path.is_empty())
        .ok_or_else(|| ConfigError::NotFound("store.path".to_string()))?;

    Ok(Settings {
        broker: BrokerSettings {
            uri,
            request_timeout_ms: broker
                .and_then(|b| b.request_timeout_ms)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        },
        store: StoreSettings { path },
        logging: LoggingSettings {
            level: partial
                .logging
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        },
    })
}

#[cfg(test)]
mod tests;
