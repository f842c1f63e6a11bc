//! Configuration file support for Planday.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/planday/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub distribution: DistributionConfig,

    #[serde(default)]
    pub stats: StatsConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Exercise distribution parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Per-day minute budget
    #[serde(default = "default_daily_cap_minutes")]
    pub daily_cap_minutes: u32,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            daily_cap_minutes: default_daily_cap_minutes(),
        }
    }
}

/// Stats derivation parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Workout names recorded per date in the daily map
    #[serde(default = "default_slots_per_day")]
    pub slots_per_day: usize,

    /// Distinct completion dates feeding the recent-workouts list
    #[serde(default = "default_recent_dates")]
    pub recent_dates: usize,

    /// Length of the rolling window for weekly batch progress
    #[serde(default = "default_window_days")]
    pub window_days: i64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            slots_per_day: default_slots_per_day(),
            recent_dates: default_recent_dates(),
            window_days: default_window_days(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("planday")
}

fn default_daily_cap_minutes() -> u32 {
    80
}

fn default_slots_per_day() -> usize {
    2
}

fn default_recent_dates() -> usize {
    6
}

fn default_window_days() -> i64 {
    7
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("planday").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
