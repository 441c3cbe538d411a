use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const DAY_SECS: u64 = 86_400;

/// Engine configuration, loadable from `~/.stringline.toml`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StatsConfig {
    /// Lazy mode: a refresh only persists an empty marker and defers the
    /// actual recomputation to the next read.
    pub lazy: bool,
    /// TTL of persisted stats records.
    pub cache_ttl_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            lazy: false,
            cache_ttl_secs: 30 * DAY_SECS,
        }
    }
}

thread_local! {
    static TEST_CONFIG_PATH: RefCell<Option<PathBuf>> = const { RefCell::new(None) };
}

#[cfg(test)]
pub fn set_test_config_path(path: PathBuf) {
    TEST_CONFIG_PATH.with(|p| *p.borrow_mut() = Some(path));
}

impl StatsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn config_path() -> Result<PathBuf> {
        #[cfg(test)]
        {
            if let Some(path) = TEST_CONFIG_PATH.with(|p| p.borrow().clone()) {
                return Ok(path);
            }
        }

        Ok(dirs::home_dir()
            .context("Could not find home directory")?
            .join(".stringline.toml"))
    }

    pub fn load() -> Result<Option<StatsConfig>> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: StatsConfig =
            toml::from_str(&content).context("Failed to parse config file")?;

        Ok(Some(config))
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_config() -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("tempdir");
        let config_path = dir.path().join(".stringline.toml");
        set_test_config_path(config_path.clone());
        (dir, config_path)
    }

    #[test]
    fn default_config_round_trip() {
        let (_dir, _path) = setup_test_config();

        assert!(StatsConfig::load().expect("load").is_none());

        let config = StatsConfig {
            lazy: true,
            cache_ttl_secs: 7 * DAY_SECS,
        };
        config.save().expect("save");

        let loaded = StatsConfig::load()
            .expect("load config")
            .expect("config should exist");

        assert!(loaded.lazy);
        assert_eq!(loaded.cache_ttl(), Duration::from_secs(7 * DAY_SECS));
    }

    #[test]
    fn defaults() {
        let config = StatsConfig::default();
        assert!(!config.lazy);
        assert_eq!(config.cache_ttl_secs, 30 * DAY_SECS);
    }
}
