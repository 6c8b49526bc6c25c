//! Status effect table
//!
//! Maps a status key ("poisoned", "grappled", ...) to a descriptor:
//! - Description and display color class
//! - Movement override (e.g. grappled -> 0 ft)
//! - Movement multiplier (e.g. prone -> half speed)
//!
//! The table is reference data: loaded once, consulted by the lifecycle
//! engine, never mutated by it. Unknown keys have no movement effect.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a status changes a combatant's movement
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MovementEffect {
    /// Base movement applies
    #[default]
    Unchanged,
    /// Movement is replaced with a fixed value
    Fixed(u32),
    /// Base movement is scaled, rounded down
    Scaled(f64),
}

impl MovementEffect {
    /// Movement in feet for a combatant whose base movement is `base`
    pub fn apply(&self, base: u32) -> u32 {
        match self {
            MovementEffect::Unchanged => base,
            MovementEffect::Fixed(feet) => *feet,
            MovementEffect::Scaled(factor) => (base as f64 * factor).floor().max(0.0) as u32,
        }
    }
}

/// Behavior descriptor for one status key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StatusEffectRecord", into = "StatusEffectRecord")]
pub struct StatusEffect {
    pub description: String,
    /// Display-only styling hint
    pub color_class: String,
    pub movement: MovementEffect,
}

impl StatusEffect {
    pub fn new(description: impl Into<String>, movement: MovementEffect) -> Self {
        Self {
            description: description.into(),
            color_class: String::new(),
            movement,
        }
    }
}

/// Wire shape: `{description, colorClass, movement?, movementMultiplier?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusEffectRecord {
    #[serde(default)]
    description: String,
    #[serde(default)]
    color_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    movement: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    movement_multiplier: Option<f64>,
}

impl From<StatusEffectRecord> for StatusEffect {
    fn from(record: StatusEffectRecord) -> Self {
        // An explicit override wins over a multiplier
        let movement = match (record.movement, record.movement_multiplier) {
            (Some(feet), _) => MovementEffect::Fixed(feet),
            (None, Some(factor)) => MovementEffect::Scaled(factor),
            (None, None) => MovementEffect::Unchanged,
        };
        Self {
            description: record.description,
            color_class: record.color_class,
            movement,
        }
    }
}

impl From<StatusEffect> for StatusEffectRecord {
    fn from(effect: StatusEffect) -> Self {
        let (movement, movement_multiplier) = match effect.movement {
            MovementEffect::Unchanged => (None, None),
            MovementEffect::Fixed(feet) => (Some(feet), None),
            MovementEffect::Scaled(factor) => (None, Some(factor)),
        };
        Self {
            description: effect.description,
            color_class: effect.color_class,
            movement,
            movement_multiplier,
        }
    }
}

/// Lookup from status key to effect descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusTable {
    effects: BTreeMap<String, StatusEffect>,
}

impl StatusTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry; keys are case-insensitive
    pub fn insert(&mut self, key: &str, effect: StatusEffect) {
        self.effects.insert(normalize_key(key), effect);
    }

    /// Look up a status key
    pub fn get(&self, key: &str) -> Option<&StatusEffect> {
        self.effects.get(&normalize_key(key))
    }

    /// Whether the key has an entry
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Movement for a combatant in status `key` with base movement `base`
    pub fn movement_for(&self, key: &str, base: u32) -> u32 {
        self.get(key)
            .map(|effect| effect.movement.apply(base))
            .unwrap_or(base)
    }

    /// All keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.effects.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Re-key after deserializing hand-written data
    pub(crate) fn normalized(self) -> Self {
        Self {
            effects: self
                .effects
                .into_iter()
                .map(|(key, effect)| (normalize_key(&key), effect))
                .collect(),
        }
    }
}

impl FromIterator<(String, StatusEffect)> for StatusTable {
    fn from_iter<I: IntoIterator<Item = (String, StatusEffect)>>(iter: I) -> Self {
        Self {
            effects: iter
                .into_iter()
                .map(|(key, effect)| (normalize_key(&key), effect))
                .collect(),
        }
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}
