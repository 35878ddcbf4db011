//! Configuration file support for the taper planner.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/taper/config.toml`.

use crate::dose::Dose;
use crate::types::{FrequencyPreference, SpeedConfig};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub taper: TaperConfig,

    /// Tablet strength overrides per medication (mg)
    #[serde(default)]
    pub strengths: BTreeMap<String, Vec<Dose>>,

    #[serde(default)]
    pub speeds: SpeedsConfig,
}

/// Taper engine parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaperConfig {
    #[serde(default = "default_min_dose_mg")]
    pub min_dose_mg: f64,

    #[serde(default = "default_round_to_mg")]
    pub round_to_mg: f64,

    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    #[serde(default = "default_max_year")]
    pub max_year: i32,

    #[serde(default = "default_speed")]
    pub default_speed: String,

    #[serde(default)]
    pub default_frequency: FrequencyPreference,
}

impl Default for TaperConfig {
    fn default() -> Self {
        Self {
            min_dose_mg: default_min_dose_mg(),
            round_to_mg: default_round_to_mg(),
            max_steps: default_max_steps(),
            max_year: default_max_year(),
            default_speed: default_speed(),
            default_frequency: FrequencyPreference::default(),
        }
    }
}

/// Speed Ladder override
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct SpeedsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ladder: Option<Vec<SpeedConfig>>,
}

/// Numeric engine settings derived from [`TaperConfig`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    pub min_dose: Dose,
    pub round_to: Dose,
    pub max_steps: usize,
    pub max_year: i32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            min_dose: Dose::from_mg(default_min_dose_mg()),
            round_to: Dose::from_mg(default_round_to_mg()),
            max_steps: default_max_steps(),
            max_year: default_max_year(),
        }
    }
}

// Default value functions
fn default_min_dose_mg() -> f64 {
    0.5
}

fn default_round_to_mg() -> f64 {
    0.5
}

fn default_max_steps() -> usize {
    50
}

fn default_max_year() -> i32 {
    2100
}

fn default_speed() -> String {
    "standard".into()
}

impl TaperConfig {
    /// Validate and convert into engine settings
    pub fn engine_settings(&self) -> Result<EngineSettings> {
        let min_dose = Dose::from_mg(self.min_dose_mg);
        let round_to = Dose::from_mg(self.round_to_mg);

        if !self.min_dose_mg.is_finite() || !min_dose.is_positive() {
            return Err(Error::Config(format!(
                "min_dose_mg must be at least 0.01, got {}",
                self.min_dose_mg
            )));
        }
        if !self.round_to_mg.is_finite() || !round_to.is_positive() {
            return Err(Error::Config(format!(
                "round_to_mg must be at least 0.01, got {}",
                self.round_to_mg
            )));
        }
        if self.max_steps == 0 {
            return Err(Error::Config("max_steps must be positive".into()));
        }

        Ok(EngineSettings {
            min_dose,
            round_to,
            max_steps: self.max_steps,
            max_year: self.max_year,
        })
    }
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
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
    pub fn default_config_path() -> Result<PathBuf> {
        let base = match dirs::config_dir() {
            Some(dir) => dir,
            None => {
                let home = std::env::var("HOME")
                    .map_err(|_| Error::Config("HOME environment variable not set".into()))?;
                PathBuf::from(home).join(".config")
            }
        };
        Ok(base.join("taper").join("config.toml"))
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path()?;
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

    pub fn engine_settings(&self) -> Result<EngineSettings> {
        self.taper.engine_settings()
    }
}
