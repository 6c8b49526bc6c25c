//! Reference data
//!
//! Status effects, monster templates and name pools, parsed from JSON.
//! A built-in bundle ships with the binary; configured files replace the
//! status table and name pools, and add monsters to the built-in list.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, warn};

use crate::combat::StatusTable;
use crate::config::DataPaths;
use crate::roster::{MonsterTemplate, NameTable};

const BUILTIN_STATUS_EFFECTS: &str = include_str!("../../assets/status_effects.json");
const BUILTIN_MONSTERS: &str = include_str!("../../assets/monsters.json");
const BUILTIN_NAMES: &str = include_str!("../../assets/names.json");

/// Reference data loading errors
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {what}: {source}")]
    Json {
        what: String,
        source: serde_json::Error,
    },
}

/// Everything the encounter consults but never changes
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub statuses: StatusTable,
    pub monsters: Vec<MonsterTemplate>,
    pub names: NameTable,
}

impl ReferenceData {
    /// The bundle compiled into the binary
    pub fn builtin() -> Result<Self, DataError> {
        Ok(Self {
            statuses: parse::<StatusTable>(BUILTIN_STATUS_EFFECTS, "built-in status effects")?
                .normalized(),
            monsters: parse(BUILTIN_MONSTERS, "built-in monsters")?,
            names: parse(BUILTIN_NAMES, "built-in names")?,
        })
    }

    /// Built-in data overlaid with the configured files
    pub fn load(paths: &DataPaths) -> Result<Self, DataError> {
        let mut data = Self::builtin()?;

        if let Some(path) = &paths.status_effects {
            data.statuses = read::<StatusTable>(path)?.normalized();
            info!("Loaded {} status effects from {}", data.statuses.len(), path.display());
        }

        if let Some(path) = &paths.monsters {
            let loaded: Vec<MonsterTemplate> = read(path)?;
            let before = data.monsters.len();
            data.merge_monsters(loaded);
            info!(
                "Loaded {} monsters from {}",
                data.monsters.len() - before,
                path.display()
            );
        }

        if let Some(path) = &paths.names {
            data.names = read(path)?;
            info!("Loaded name pools for {} species from {}", data.names.len(), path.display());
        }

        Ok(data)
    }

    /// Append templates whose id is not already known
    pub fn merge_monsters(&mut self, templates: Vec<MonsterTemplate>) {
        for template in templates {
            if self.monsters.iter().any(|m| m.id == template.id) {
                warn!("Skipping duplicate monster template {}", template.id);
                continue;
            }
            self.monsters.push(template);
        }
    }

    /// Find a template by id, then by case-insensitive name
    pub fn monster(&self, key: &str) -> Option<&MonsterTemplate> {
        self.monsters
            .iter()
            .find(|m| m.id == key)
            .or_else(|| self.monsters.iter().find(|m| m.name.eq_ignore_ascii_case(key)))
    }
}

fn parse<T: DeserializeOwned>(json: &str, what: &str) -> Result<T, DataError> {
    serde_json::from_str(json).map_err(|source| DataError::Json {
        what: what.to_string(),
        source,
    })
}

fn read<T: DeserializeOwned>(path: &Path) -> Result<T, DataError> {
    let json = std::fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&json, &path.display().to_string())
}
