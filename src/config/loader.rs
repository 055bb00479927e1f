use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding both the colors file and the key-value fallback.
    pub data_dir: PathBuf,
    pub colors_file: String,
    pub fallback_file: String,
    pub fallback_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("atg"),
            colors_file: "tab_group_colors.json".to_string(),
            fallback_file: "local_storage.json".to_string(),
            fallback_key: "advancedTabGroups_colors".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub save_interval_secs: u64,
    pub resweep_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            save_interval_secs: 30,
            resweep_delay_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs.max(1))
    }

    pub fn resweep_delay(&self) -> Duration {
        Duration::from_millis(self.resweep_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FaviconConfig {
    /// Pixels with alpha at or below this value are ignored.
    pub min_alpha: u8,
    /// Pixels whose channel sum is at or below this value are ignored.
    pub min_brightness: u16,
}

impl Default for FaviconConfig {
    fn default() -> Self {
        Self {
            min_alpha: 128,
            min_brightness: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderConfig {
    pub default_label: String,
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            default_label: "New Folder".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub timing: TimingConfig,
    pub favicon: FaviconConfig,
    pub folders: FolderConfig,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = config_path.unwrap_or_else(Self::default_config_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            let config: Config = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn default_config_path() -> PathBuf {
        if let Some(config_path) = std::env::var_os("ATG_CONFIG") {
            PathBuf::from(config_path)
        } else {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("atg")
                .join("config.yaml")
        }
    }

    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.storage.data_dir = data_dir;
        self
    }

    pub fn colors_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.colors_file)
    }

    pub fn fallback_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.fallback_file)
    }
}
