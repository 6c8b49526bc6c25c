//! Tracker configuration
//!
//! Layered with figment, later layers winning:
//! 1. Built-in defaults
//! 2. Optional TOML file
//! 3. `BATTLE_TRACKER_*` environment variables (`__` separates nested keys,
//!    e.g. `BATTLE_TRACKER_LIMITS__MAX_TOTAL_COMBATANTS=60`)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::ledger::UNDO_CAPACITY;
use crate::roster::{MAX_ADD_QUANTITY, MAX_TOTAL_COMBATANTS};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "BATTLE_TRACKER_";

/// Hard limits on encounter size and numeric input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Combatants in the roster at once
    pub max_total_combatants: usize,
    /// Monsters added in one batch
    pub max_add_quantity: u32,
    /// Largest max HP a combatant may have
    pub max_hp: i32,
    /// Largest single HP or movement adjustment
    pub max_adjustment: u32,
    /// Removed combatants kept for undo
    pub undo_capacity: usize,
    /// Attacks a combatant may carry
    pub max_custom_weapons: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_total_combatants: MAX_TOTAL_COMBATANTS,
            max_add_quantity: MAX_ADD_QUANTITY,
            max_hp: 500,
            max_adjustment: 200,
            undo_capacity: UNDO_CAPACITY,
            max_custom_weapons: 8,
        }
    }
}

/// Optional reference data files; unset entries use the built-in data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    pub status_effects: Option<PathBuf>,
    pub monsters: Option<PathBuf>,
    pub names: Option<PathBuf>,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Dying and death saves instead of instant death at 0 HP
    pub death_saves_enabled: bool,
    /// Seed for a reproducible dice stream
    pub seed: Option<u64>,
    pub limits: Limits,
    pub data: DataPaths,
}

impl TrackerConfig {
    /// Defaults, then `file` if given, then the environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(TrackerConfig::default()));
        if let Some(path) = file {
            if !path.exists() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")
    }
}
