use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

use crate::errors::CoreError;

const CONFIG_DIR: &str = "config";
const DEFAULT_STORE_NAMESPACE: &str = "glassworks";
const DEFAULT_EVENT_CAPACITY: usize = 256;

fn default_store_namespace() -> String {
    DEFAULT_STORE_NAMESPACE.to_string()
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

fn default_vat_rate() -> Decimal {
    Decimal::from(25)
}

#[derive(Clone, Debug, Deserialize)]
pub struct StoreConfig {
    /// Table-name prefix on the remote store.
    #[serde(default = "default_store_namespace")]
    pub namespace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: default_store_namespace(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct PricingConfig {
    /// VAT percentage applied when a document carries none of its own.
    #[serde(default = "default_vat_rate")]
    pub default_vat_rate: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default_vat_rate: default_vat_rate(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct EventConfig {
    #[serde(default = "default_event_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_event_capacity(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub events: EventConfig,
}

impl AppConfig {
    /// Layered load: optional `config/default` file, then `GLASSWORKS_*`
    /// environment overrides (`GLASSWORKS_PRICING__DEFAULT_VAT_RATE=21`).
    pub fn load() -> Result<Self, CoreError> {
        let mut builder = Config::builder();
        let default_file = Path::new(CONFIG_DIR).join("default");
        if default_file.with_extension("toml").exists() {
            builder = builder.add_source(File::from(default_file));
        }
        builder = builder.add_source(Environment::with_prefix("GLASSWORKS").separator("__"));

        let config = builder
            .build()
            .map_err(|e| CoreError::Configuration(format!("failed to load config: {e}")))?;
        config
            .try_deserialize()
            .map_err(|e| CoreError::Configuration(format!("invalid config: {e}")))
    }
}
