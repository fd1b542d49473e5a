//! Economy tuning loaded from `economy_config.json`.
//!
//! Every section has defaults, so a partial override file only needs the
//! keys it changes. Set `MILLWRIGHT_CONFIG` to a path to override the
//! builtin document.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::production::StationTuning;

pub const BUILTIN_ECONOMY_CONFIG: &str = include_str!("data/economy_config.json");

pub const CONFIG_PATH_ENV: &str = "MILLWRIGHT_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub needs: NeedsConfig,
    pub workers: WorkerConfig,
    pub production: ProductionConfig,
    pub construction: ConstructionConfig,
    pub alerts: AlertConfig,
}

/// Need decay and recovery. Levels run from 0 (content) to `max_level`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedsConfig {
    pub max_level: f32,
    pub hunger_per_second: f32,
    pub fatigue_per_second: f32,
    /// Fraction of `max_level` at which a civilian drops its work.
    pub seek_threshold: f32,
    /// Fraction of `max_level` at or below which a need counts as met.
    pub satisfied_threshold: f32,
    pub eat_seconds: f32,
    pub sleep_recovery_per_second: f32,
    pub rough_sleep_factor: f32,
}

impl Default for NeedsConfig {
    fn default() -> Self {
        Self {
            max_level: 100.0,
            hunger_per_second: 0.05,
            fatigue_per_second: 0.03,
            seek_threshold: 0.7,
            satisfied_threshold: 0.2,
            eat_seconds: 3.0,
            sleep_recovery_per_second: 1.5,
            rough_sleep_factor: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub carry_capacity: u32,
    pub move_speed: f32,
    pub stop_distance: f32,
    pub search_interval_seconds: f32,
    /// Build work contributed per second by one builder.
    pub build_rate: f32,
    /// How long a crafter may fail to reach its work point before giving up.
    pub work_point_stall_seconds: f32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            carry_capacity: 10,
            move_speed: 3.0,
            stop_distance: 0.75,
            search_interval_seconds: 0.5,
            build_rate: 1.0,
            work_point_stall_seconds: 25.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionConfig {
    pub absence_timeout_seconds: f32,
    pub upgrade_speed_per_level: f32,
    pub upgrade_workers_per_level: u32,
    pub max_upgrade_level: u32,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        let tuning = StationTuning::default();
        Self {
            absence_timeout_seconds: tuning.absence_timeout_seconds,
            upgrade_speed_per_level: tuning.upgrade_speed_per_level,
            upgrade_workers_per_level: tuning.upgrade_workers_per_level,
            max_upgrade_level: tuning.max_upgrade_level,
        }
    }
}

impl ProductionConfig {
    pub fn station_tuning(&self) -> StationTuning {
        StationTuning {
            absence_timeout_seconds: self.absence_timeout_seconds,
            upgrade_speed_per_level: self.upgrade_speed_per_level,
            upgrade_workers_per_level: self.upgrade_workers_per_level,
            max_upgrade_level: self.max_upgrade_level,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructionConfig {
    pub max_builders_per_site: u32,
    pub max_haulers_per_site: u32,
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            max_builders_per_site: 3,
            max_haulers_per_site: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Minimum seconds between two alerts of the same kind for one team.
    pub throttle_seconds: f32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            throttle_seconds: 10.0,
        }
    }
}

impl EconomyConfig {
    pub fn builtin() -> Self {
        serde_json::from_str(BUILTIN_ECONOMY_CONFIG).expect("builtin economy config should parse")
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = EconomyConfig::from_json_str(&contents)?;
        Ok(config)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse economy config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read economy config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Load the economy config from `MILLWRIGHT_CONFIG`, falling back to the
/// builtin document when the variable is unset or the file is unusable.
/// Returns the path actually used, if any.
pub fn load_config_from_env() -> (EconomyConfig, Option<PathBuf>) {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV).map(PathBuf::from) {
        match EconomyConfig::from_file(&path) {
            Ok(config) => {
                log::info!(target: "millwright::config", "economy config loaded from {}", path.display());
                return (config, Some(path));
            }
            Err(err) => {
                log::warn!(target: "millwright::config", "economy config load failed ({err}); using builtin");
            }
        }
    }
    log::info!(target: "millwright::config", "economy config loaded from builtin");
    (EconomyConfig::builtin(), None)
}
