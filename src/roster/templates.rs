//! Monster templates and batch construction
//!
//! A template is the stat block a batch of monsters is stamped from.
//! Batch options cover:
//! - Rolling HP per monster from the template's hit dice
//! - Knocking 0-3 points off AC
//! - Replacing the attack list with one random attack
//! - Random ability scores (8-15)
//! - One shared initiative roll for the whole batch
//! - Session-unique names from the species name pool

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::naming::{generate_unique_name, NameTable, UsedNames};
use crate::combat::{
    palette_color, parse_feet, roll_initiative, AbilityScores, Attack, Combatant,
    CombatantKind, DiceRoll, DieSource, InitiativeRoll, Item, Trait,
};

/// Upper bound on monsters added in one batch
pub const MAX_ADD_QUANTITY: u32 = 20;

/// Maximum AC knocked off by the randomize-AC option
const AC_JITTER: u32 = 3;

/// Stat block a monster batch is built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonsterTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub species: String,
    pub hp: i32,
    #[serde(default)]
    pub hp_dice: Option<String>,
    #[serde(default)]
    pub ac: i32,
    #[serde(default)]
    pub movement: String,
    #[serde(default)]
    pub initiative_bonus: i32,
    #[serde(flatten)]
    pub abilities: AbilityScores,
    #[serde(default = "default_proficiency")]
    pub proficiency_bonus: i32,
    #[serde(default)]
    pub skills: BTreeMap<String, String>,
    #[serde(default)]
    pub senses: Option<String>,
    #[serde(default)]
    pub languages: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub cr: Option<String>,
    #[serde(default)]
    pub xp: u64,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub actions: Vec<Attack>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub traits: Vec<Trait>,
}

fn default_proficiency() -> i32 {
    2
}

/// Challenge ratings show up both as "1/4" and as bare numbers
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

/// How to stamp out a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub quantity: u32,
    pub randomize_ac: bool,
    pub randomize_weapons: bool,
    pub randomize_stats: bool,
    pub shared_initiative: bool,
    pub unique_names: bool,
    pub roll_hp: bool,
    /// Initiative for a shared group; rolled once when absent
    pub initiative: Option<i32>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            quantity: 1,
            randomize_ac: false,
            randomize_weapons: false,
            randomize_stats: false,
            shared_initiative: false,
            unique_names: false,
            roll_hp: false,
            initiative: None,
        }
    }
}

impl BatchOptions {
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn shared(mut self, initiative: Option<i32>) -> Self {
        self.shared_initiative = true;
        self.initiative = initiative;
        self
    }
}

/// Monsters built from one template, not yet in the roster
#[derive(Debug, Clone)]
pub struct Batch {
    pub combatants: Vec<Combatant>,
    /// Roll made for a shared group when no initiative was given
    pub group_roll: Option<InitiativeRoll>,
}

/// Context a batch is built in
pub struct BatchContext<'a> {
    pub names: &'a NameTable,
    pub used_names: &'a mut UsedNames,
    pub source: &'a mut dyn DieSource,
    /// Palette slot of the first new monster
    pub first_color: usize,
    pub max_hp: i32,
}

/// Build `options.quantity` monsters from a template.
///
/// Capacity checks belong to the caller; this only constructs records.
pub fn build_batch(
    template: &MonsterTemplate,
    options: &BatchOptions,
    ctx: BatchContext<'_>,
) -> Batch {
    let BatchContext {
        names,
        used_names,
        source,
        first_color,
        max_hp,
    } = ctx;

    let group = options.shared_initiative.then(Uuid::new_v4);
    let mut group_roll = None;
    let shared_value = if options.shared_initiative {
        Some(options.initiative.unwrap_or_else(|| {
            let roll = roll_initiative(source, template.initiative_bonus);
            group_roll = Some(roll);
            roll.total
        }))
    } else {
        None
    };

    let combatants = (0..options.quantity as usize)
        .map(|i| {
            let hp = batch_hp(template, options.roll_hp, max_hp, source);
            let mut c = Combatant::new(template.name.clone(), CombatantKind::Monster, hp);

            c.name = if options.unique_names {
                generate_unique_name(&template.name, &template.species, names, used_names, source)
            } else {
                template.name.clone()
            };
            c.species = template.species.clone();
            c.color = palette_color(first_color + i);

            c.base_ac = template.ac;
            c.ac = if options.randomize_ac {
                let deduction = source.roll_die(AC_JITTER + 1) as i32 - 1;
                (template.ac - deduction).max(0)
            } else {
                template.ac
            };

            c.movement = template.movement.clone();
            c.current_movement = parse_feet(&template.movement);

            c.initiative_bonus = template.initiative_bonus;
            c.initiative = match shared_value {
                Some(value) => value,
                None => roll_initiative(source, template.initiative_bonus).total,
            };
            c.shared_initiative_id = group;

            c.abilities = if options.randomize_stats {
                random_abilities(source)
            } else {
                template.abilities
            };

            c.actions = if options.randomize_weapons {
                vec![random_attack(&template.actions, source)]
            } else {
                template
                    .actions
                    .iter()
                    .map(|a| Attack {
                        id: Uuid::new_v4().to_string(),
                        ..a.clone()
                    })
                    .collect()
            };
            c.items = template
                .items
                .iter()
                .map(|item| Item {
                    id: Uuid::new_v4().to_string(),
                    is_custom: options.randomize_weapons,
                    ..item.clone()
                })
                .collect();
            c.traits = template
                .traits
                .iter()
                .map(|t| Trait {
                    id: Uuid::new_v4().to_string(),
                    ..t.clone()
                })
                .collect();

            c.proficiency_bonus = template.proficiency_bonus;
            c.xp = template.xp;
            c.cr = template.cr.clone();
            c.hp_dice = template.hp_dice.clone();
            c.size = template.size.clone();
            c.senses = template.senses.clone();
            c.languages = template.languages.clone();
            c.skills = template.skills.clone();
            c
        })
        .collect();

    Batch {
        combatants,
        group_roll,
    }
}

fn batch_hp(template: &MonsterTemplate, roll_hp: bool, max_hp: i32, source: &mut dyn DieSource) -> i32 {
    let rolled = match (&template.hp_dice, roll_hp) {
        (Some(notation), true) => match notation.parse::<DiceRoll>() {
            Ok(dice) => Some(dice.roll(source)),
            Err(e) => {
                debug!("Template {} has unusable hit dice: {}", template.id, e);
                None
            }
        },
        _ => None,
    };
    rolled.unwrap_or(template.hp).clamp(1, max_hp.max(1))
}

fn random_abilities(source: &mut dyn DieSource) -> AbilityScores {
    let mut score = || 7 + source.roll_die(8) as i32;
    AbilityScores {
        strength: score(),
        dexterity: score(),
        constitution: score(),
        intelligence: score(),
        wisdom: score(),
        charisma: score(),
    }
}

fn random_attack(actions: &[Attack], source: &mut dyn DieSource) -> Attack {
    let picked = if actions.is_empty() {
        None
    } else {
        let i = source.roll_die(actions.len() as u32) as usize;
        actions.get(i.saturating_sub(1))
    };

    match picked {
        Some(a) => Attack {
            id: Uuid::new_v4().to_string(),
            name: a.name.clone(),
            dice: if a.dice.is_empty() {
                "1d4".to_string()
            } else {
                a.dice.clone()
            },
            damage_type: Some(
                a.damage_type
                    .clone()
                    .unwrap_or_else(|| "Bludgeoning".to_string()),
            ),
            to_hit_modifier: a.to_hit_modifier,
            is_custom: true,
        },
        None => Attack {
            id: Uuid::new_v4().to_string(),
            name: "Melee Attack".to_string(),
            dice: "1d4".to_string(),
            damage_type: Some("Bludgeoning".to_string()),
            to_hit_modifier: 0,
            is_custom: true,
        },
    }
}
