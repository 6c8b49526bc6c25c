//! Encounter test harness
//!
//! - `TestEncounter` - an encounter over the built-in reference data with
//!   scripted dice, so every roll in a scenario is known up front
//!
//! # Example
//!
//! ```rust,ignore
//! let mut t = TestEncounter::new([12]);
//! let aria = t.player("Aria", 20);
//! t.set_hp(aria, 4).unwrap();
//! assert_eq!(t.get(aria).hp, 4);
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use battle_tracker::combat::{Combatant, CombatantId, LogKind, ScriptedDice};
use battle_tracker::config::TrackerConfig;
use battle_tracker::data::ReferenceData;
use battle_tracker::encounter::{Encounter, NewPlayer};
use battle_tracker::roster::BatchOptions;

/// Encounter wrapper with scenario helpers
pub struct TestEncounter {
    encounter: Encounter,
}

impl TestEncounter {
    /// Death saves off, dice replaying `faces`
    pub fn new(faces: impl Into<Vec<u32>>) -> Self {
        Self::with_config(TrackerConfig::default(), faces)
    }

    /// Death saves on, dice replaying `faces`
    pub fn with_death_saves(faces: impl Into<Vec<u32>>) -> Self {
        let config = TrackerConfig {
            death_saves_enabled: true,
            ..TrackerConfig::default()
        };
        Self::with_config(config, faces)
    }

    pub fn with_config(config: TrackerConfig, faces: impl Into<Vec<u32>>) -> Self {
        let data = ReferenceData::builtin().expect("built-in data parses");
        Self {
            encounter: Encounter::new(&config, data).with_dice(ScriptedDice::new(faces)),
        }
    }

    /// Add a player with a fixed initiative of 10, so no dice are drawn
    pub fn player(&mut self, name: &str, max_hp: i32) -> CombatantId {
        self.encounter
            .add_player(NewPlayer::new(name, max_hp).with_initiative(10))
            .expect("player added")
    }

    /// Add `n` monsters from `template` with default options
    pub fn monsters(&mut self, template: &str, n: u32) -> Vec<CombatantId> {
        self.encounter
            .add_monsters(template, &BatchOptions::default().with_quantity(n))
            .expect("monsters added")
    }

    /// Current record; panics if the combatant is gone
    pub fn get(&self, id: CombatantId) -> Arc<Combatant> {
        self.encounter.get(id).expect("combatant in roster")
    }

    /// Messages of every log entry of one kind
    pub fn messages(&self, kind: LogKind) -> Vec<String> {
        self.encounter
            .log()
            .of_kind(kind)
            .map(|e| e.message.clone())
            .collect()
    }

    /// Whether any entry about `id` has exactly this message
    pub fn logged(&self, id: CombatantId, message: &str) -> bool {
        self.encounter
            .log()
            .for_combatant(id)
            .any(|e| e.message == message)
    }
}

impl Deref for TestEncounter {
    type Target = Encounter;

    fn deref(&self) -> &Encounter {
        &self.encounter
    }
}

impl DerefMut for TestEncounter {
    fn deref_mut(&mut self) -> &mut Encounter {
        &mut self.encounter
    }
}
