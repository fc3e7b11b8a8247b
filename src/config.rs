use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{Error, Result},
    index_admin::merge_settings,
};

pub const DEFAULT_HOST: &str = "http://localhost:9200";

/// Engine client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub hosts: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hosts: vec![DEFAULT_HOST.to_string()],
        }
    }
}

/// Index creation settings: one default document plus per-index overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicesConfig {
    pub default: Value,
    pub overrides: BTreeMap<String, Value>,
}

impl IndicesConfig {
    /// The override document for `name`, or null when there is none.
    pub fn override_for(&self, name: &str) -> &Value {
        self.overrides.get(name).unwrap_or(&Value::Null)
    }

    /// Default settings deep-merged with the override for `name`.
    pub fn settings_for(&self, name: &str) -> Value {
        merge_settings(&self.default, self.override_for(name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub soft_delete: bool,
    pub indices: IndicesConfig,
}

impl Config {
    /// Load configuration from, in order of priority:
    /// 1. An explicit path (from --config)
    /// 2. The SEARCHBRIDGE_CONFIG environment variable
    /// 3. The XDG config file (~/.config/searchbridge/config.json)
    ///
    /// The first two must exist. A missing XDG file yields the defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(val) = std::env::var("SEARCHBRIDGE_CONFIG") {
            return Self::load(Path::new(&val));
        }

        let path = xdg::BaseDirectories::with_prefix("searchbridge")
            .get_config_home()
            .map(|dir| dir.join("config.json"))
            .ok_or_else(|| {
                Error::Config(
                    "could not determine XDG config home directory".into(),
                )
            })?;
        if path.exists() {
            Self::load(&path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load a config file that must exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigFile(PathBuf::from(path)));
        }
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text).map_err(|e| {
            Error::Config(format!("{}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn index_settings(&self, name: &str) -> Value {
        self.indices.settings_for(name)
    }
}
