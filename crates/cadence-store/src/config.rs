use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default registry resource name.
pub const DEFAULT_REGISTRY: &str = "cadence:default:repeat";

/// Store configuration (`cadence.toml` + `CADENCE_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file path. `None` opens an in-memory database, useful for
    /// tests and ephemeral queues.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Registry resource name this store is scoped to.
    /// Override with env var: CADENCE_REGISTRY=cadence:reports:repeat
    #[serde(default = "default_registry")]
    pub registry: String,
}

fn default_registry() -> String {
    DEFAULT_REGISTRY.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            registry: default_registry(),
        }
    }
}

impl StoreConfig {
    /// Load from `cadence.toml` in the working directory, with `CADENCE_*`
    /// environment variables taking precedence.
    pub fn load() -> Result<Self> {
        let config = Figment::new()
            .merge(Toml::file("cadence.toml"))
            .merge(Env::prefixed("CADENCE_"))
            .extract()?;
        Ok(config)
    }
}
