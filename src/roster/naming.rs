//! Unique monster names
//!
//! Names are drawn from per-species first/last pools. Every name handed
//! out is recorded in a [`UsedNames`] set owned by the encounter, so names
//! stay unique for the whole session, across batches.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::combat::DieSource;

/// Random draws before falling back to numbered template names
pub const UNIQUE_NAME_ATTEMPTS: usize = 100;

/// First and last names for one species
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamePool {
    #[serde(default)]
    pub first: Vec<String>,
    #[serde(default)]
    pub last: Vec<String>,
}

/// Name pools keyed by species
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameTable {
    pools: HashMap<String, NamePool>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, species: impl Into<String>, pool: NamePool) {
        self.pools.insert(species.into(), pool);
    }

    /// Pool for a species; exact match first, then case-insensitive
    pub fn get(&self, species: &str) -> Option<&NamePool> {
        self.pools.get(species).or_else(|| {
            self.pools
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(species))
                .map(|(_, pool)| pool)
        })
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

/// Names already handed out this session
#[derive(Debug, Clone, Default)]
pub struct UsedNames {
    names: HashSet<String>,
}

impl UsedNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Record a name; returns false if it was already taken
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn pick<'a>(list: &'a [String], source: &mut dyn DieSource) -> &'a str {
    let face = source.roll_die(list.len() as u32) as usize;
    &list[face.saturating_sub(1).min(list.len() - 1)]
}

/// Generate a session-unique name for a monster of `species`.
///
/// With no pool (or no first names) for the species the template name is
/// returned unchanged. Otherwise up to [`UNIQUE_NAME_ATTEMPTS`] random
/// "First Last" draws are tried, then "{template} 1", "{template} 2", ...
pub fn generate_unique_name(
    template_name: &str,
    species: &str,
    names: &NameTable,
    used: &mut UsedNames,
    source: &mut dyn DieSource,
) -> String {
    let pool = match names.get(species) {
        Some(pool) if !pool.first.is_empty() => pool,
        _ => {
            debug!("No name pool for species {:?}, using template name", species);
            return template_name.to_string();
        }
    };

    for _ in 0..UNIQUE_NAME_ATTEMPTS {
        let first = pick(&pool.first, source);
        let candidate = if pool.last.is_empty() {
            first.to_string()
        } else {
            format!("{} {}", first, pick(&pool.last, source))
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
    }

    debug!("Name pool for {:?} exhausted, numbering instead", species);
    let mut counter = 1u32;
    loop {
        let candidate = format!("{} {}", template_name, counter);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}
