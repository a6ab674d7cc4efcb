//! Configuration provider seam.
//!
//! The host application owns configuration; the engine reads and writes one
//! value through it: the active scheduling model identifier. A JSON-file
//! implementation is provided for hosts without their own settings plumbing.

use anyhow::{Context, Result};
use log::error;
use serde_json::Value;
use std::{collections::HashMap, fs, path::PathBuf, sync::RwLock};

use crate::error::EngineError;

/// Scoped key of the single configuration value the engine manages.
pub const ACTIVE_MODEL_KEY: &str = "cadence.activeModel";

pub trait ConfigProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn update(&self, key: &str, value: Value) -> Result<(), EngineError>;

    fn active_model(&self) -> Option<String> {
        self.get(ACTIVE_MODEL_KEY)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    fn set_active_model(&self, model_id: &str) -> Result<(), EngineError> {
        self.update(ACTIVE_MODEL_KEY, Value::String(model_id.to_string()))
    }
}

/// File-backed provider: one pretty-printed JSON object of scoped keys.
pub struct JsonFileConfig {
    path: PathBuf,
    data: RwLock<HashMap<String, Value>>,
}

impl JsonFileConfig {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn persist(&self, data: &HashMap<String, Value>) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write settings to {}", self.path.display()))
    }
}

impl ConfigProvider for JsonFileConfig {
    fn get(&self, key: &str) -> Option<Value> {
        match self.data.read() {
            Ok(guard) => guard.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned(),
        }
    }

    fn update(&self, key: &str, value: Value) -> Result<(), EngineError> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(key.to_string(), value);
        self.persist(&guard).map_err(|err| {
            error!("settings persist failed: {err:#}");
            EngineError::Store(err.to_string())
        })
    }
}

/// In-memory provider for tests and embedding hosts that manage their own
/// persistence.
#[derive(Default)]
pub struct MemoryConfig {
    data: RwLock<HashMap<String, Value>>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigProvider for MemoryConfig {
    fn get(&self, key: &str) -> Option<Value> {
        match self.data.read() {
            Ok(guard) => guard.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned(),
        }
    }

    fn update(&self, key: &str, value: Value) -> Result<(), EngineError> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn active_model_round_trips() {
        let config = MemoryConfig::new();
        assert_eq!(config.active_model(), None);

        config.set_active_model("balanced").unwrap();
        assert_eq!(config.active_model(), Some("balanced".into()));
    }

    #[test]
    fn json_file_config_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        {
            let config = JsonFileConfig::new(path.clone()).unwrap();
            config
                .update("cadence.activeModel", json!("sustainedFlow"))
                .unwrap();
        }

        let reloaded = JsonFileConfig::new(path).unwrap();
        assert_eq!(reloaded.active_model(), Some("sustainedFlow".into()));
    }
}
