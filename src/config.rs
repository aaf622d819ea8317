use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::JsonFileStore;
use crate::engine::EngineSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default = "default_context_tick_ms")]
    pub context_tick_ms: i64,
    #[serde(default = "default_persist_debounce_ms")]
    pub persist_debounce_ms: i64,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_frame_interval_ms() -> u64 {
    16
}

fn default_context_tick_ms() -> i64 {
    1000
}

fn default_persist_debounce_ms() -> i64 {
    150
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Config {
    pub fn new(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.unwrap_or_else(Self::default_data_dir);

        std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        let config_path = data_dir.join("config.json");

        if config_path.exists() {
            let config_str =
                std::fs::read_to_string(&config_path).context("Failed to read config.json")?;

            if config_str.trim().is_empty() {
                warn!(path = %config_path.display(), "config file is empty, recreating defaults");
            } else {
                match serde_json::from_str::<Config>(&config_str) {
                    Ok(mut config) => {
                        config.data_dir = data_dir;
                        return Ok(config);
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to parse config.json, recreating defaults");
                    }
                }
            }
        }

        let config = Self::default_config(data_dir);
        config.save()?;
        Ok(config)
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("grump")
    }

    pub fn save(&self) -> Result<()> {
        let config_path = self.data_dir.join("config.json");
        let json_str = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, json_str).context("Failed to write config.json")?;
        Ok(())
    }

    fn default_config(data_dir: PathBuf) -> Self {
        Config {
            data_dir,
            seed: None,
            frame_interval_ms: default_frame_interval_ms(),
            context_tick_ms: default_context_tick_ms(),
            persist_debounce_ms: default_persist_debounce_ms(),
            log_filter: default_log_filter(),
        }
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    pub fn open_store(&self) -> Result<JsonFileStore> {
        JsonFileStore::new(self.store_dir()).context("Failed to open progression store")
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            seed: self.seed,
            context_tick_ms: self.context_tick_ms,
            persist_debounce_ms: self.persist_debounce_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("grump-config-{}-{}", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_new_writes_defaults() {
        let dir = create_test_dir("defaults");
        let config = Config::new(Some(dir.clone())).unwrap();

        assert_eq!(config.frame_interval_ms, 16);
        assert_eq!(config.context_tick_ms, 1000);
        assert_eq!(config.persist_debounce_ms, 150);
        assert_eq!(config.log_filter, "info");
        assert!(config.seed.is_none());
        assert!(dir.join("config.json").exists());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = create_test_dir("partial");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.json"), r#"{"seed": 42, "log_filter": "debug"}"#).unwrap();

        let config = Config::new(Some(dir.clone())).unwrap();
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.context_tick_ms, 1000);
        assert_eq!(config.data_dir, dir);
        assert_eq!(config.engine_settings().seed, Some(42));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_malformed_config_is_replaced() {
        let dir = create_test_dir("malformed");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.json"), "{ not json").unwrap();

        let config = Config::new(Some(dir.clone())).unwrap();
        assert_eq!(config.persist_debounce_ms, 150);

        let rewritten = std::fs::read_to_string(dir.join("config.json")).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&rewritten).is_ok());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_store_lives_under_data_dir() {
        let dir = create_test_dir("store");
        let config = Config::new(Some(dir.clone())).unwrap();
        assert_eq!(config.store_dir(), dir.join("store"));
        assert!(config.open_store().is_ok());
        assert!(dir.join("store").is_dir());

        std::fs::remove_dir_all(dir).ok();
    }
}
