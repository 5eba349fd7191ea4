use serde::{Deserialize, Serialize};
use std::path::Path;
use std::fs;
use anyhow::{Context, Result};

use crate::json::JsonDecodeOptions;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub json: JsonConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Log level for the ldap_controls target (e.g. "debug"). Overridden by --debug.
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonConfig {
    /// Reject unrecognized fields inside value-json.
    #[serde(default)]
    pub strict: bool,
    /// Reject unrecognized top-level fields of a control object. Off by default.
    #[serde(default)]
    pub strict_top_level: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Регистрировать встроенные декодеры при старте (default true).
    #[serde(default = "default_register_defaults")]
    pub register_defaults: bool,
}

fn default_register_defaults() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            register_defaults: true,
        }
    }
}

impl From<&JsonConfig> for JsonDecodeOptions {
    fn from(config: &JsonConfig) -> Self {
        Self {
            strict: config.strict,
            strict_top_level: config.strict_top_level,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_str(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    pub fn json_options(&self) -> JsonDecodeOptions {
        JsonDecodeOptions::from(&self.json)
    }
}
