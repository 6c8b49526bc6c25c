//! Combatant record and its value types
//!
//! A combatant is owned by the roster and only changed through the
//! lifecycle, economy and initiative operations. Everything else refers to
//! it by [`CombatantId`].

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Stable identifier assigned at creation
pub type CombatantId = Uuid;

/// Display palette, assigned round-robin as combatants are added
pub const PALETTE: [&str; 12] = [
    "#FF0000", "#FF7F00", "#FFFF00", "#7FFF00", "#00FF00", "#00FF7F", "#00FFFF", "#007FFF",
    "#0000FF", "#7F00FF", "#FF00FF", "#FF007F",
];

/// Palette color for the n-th combatant
pub fn palette_color(index: usize) -> String {
    PALETTE[index % PALETTE.len()].to_string()
}

/// Player character or monster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombatantKind {
    Player,
    Monster,
}

/// Lifecycle status of a combatant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Default; needs no table entry
    #[default]
    Active,
    /// Dying (or forced unconscious at positive HP)
    Unconscious,
    /// Terminal
    Dead,
    /// Any other key from the status effect table
    Custom(String),
}

impl Status {
    /// Table key for this status
    pub fn key(&self) -> &str {
        match self {
            Status::Active => "active",
            Status::Unconscious => "unconscious",
            Status::Dead => "dead",
            Status::Custom(key) => key,
        }
    }

    /// Parse a key; anything not built in becomes a custom status
    pub fn from_key(key: &str) -> Status {
        let key = key.trim().to_lowercase();
        match key.as_str() {
            "active" => Status::Active,
            "unconscious" => Status::Unconscious,
            "dead" => Status::Dead,
            _ => Status::Custom(key),
        }
    }
}

impl FromStr for Status {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Status::from_key(s))
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        Ok(Status::from_key(&key))
    }
}

/// The six ability scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Ability {
    Str,
    Dex,
    Con,
    Int,
    Wis,
    Cha,
}

impl Ability {
    /// Get all abilities in sheet order
    pub fn all() -> &'static [Ability] {
        &[
            Ability::Str,
            Ability::Dex,
            Ability::Con,
            Ability::Int,
            Ability::Wis,
            Ability::Cha,
        ]
    }
}

impl FromStr for Ability {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "str" | "strength" => Ok(Ability::Str),
            "dex" | "dexterity" => Ok(Ability::Dex),
            "con" | "constitution" => Ok(Ability::Con),
            "int" | "intelligence" => Ok(Ability::Int),
            "wis" | "wisdom" => Ok(Ability::Wis),
            "cha" | "charisma" => Ok(Ability::Cha),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Ability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Ability::Str => "STR",
            Ability::Dex => "DEX",
            Ability::Con => "CON",
            Ability::Int => "INT",
            Ability::Wis => "WIS",
            Ability::Cha => "CHA",
        };
        f.write_str(s)
    }
}

/// Modifier for an ability score: floor((score - 10) / 2)
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Ability scores, serialized with the short sheet names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityScores {
    #[serde(rename = "str")]
    pub strength: i32,
    #[serde(rename = "dex")]
    pub dexterity: i32,
    #[serde(rename = "con")]
    pub constitution: i32,
    #[serde(rename = "int")]
    pub intelligence: i32,
    #[serde(rename = "wis")]
    pub wisdom: i32,
    #[serde(rename = "cha")]
    pub charisma: i32,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::uniform(10)
    }
}

impl AbilityScores {
    /// Every score set to `score`
    pub fn uniform(score: i32) -> Self {
        Self {
            strength: score,
            dexterity: score,
            constitution: score,
            intelligence: score,
            wisdom: score,
            charisma: score,
        }
    }

    pub fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Str => self.strength,
            Ability::Dex => self.dexterity,
            Ability::Con => self.constitution,
            Ability::Int => self.intelligence,
            Ability::Wis => self.wisdom,
            Ability::Cha => self.charisma,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        ability_modifier(self.get(ability))
    }
}

/// Result of the last ability check, shown until cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityRoll {
    pub ability: Ability,
    pub roll: u32,
    pub total: i32,
}

/// An attack entry (weapon or natural attack)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attack {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Damage notation, e.g. "1d6+2"; may be empty for named-only actions
    #[serde(default)]
    pub dice: String,
    #[serde(default)]
    pub damage_type: Option<String>,
    #[serde(default)]
    pub to_hit_modifier: i32,
    #[serde(default)]
    pub is_custom: bool,
}

/// Loot, armor, weapon or consumable carried by a combatant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ac: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub armor_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub is_custom: bool,
}

impl Item {
    /// Stackable quantity; zero counts as unquantified
    pub fn stack_quantity(&self) -> Option<u32> {
        self.quantity.filter(|q| *q > 0)
    }
}

/// Which part of the action economy a trait consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraitActivation {
    Action,
    BonusAction,
    Reaction,
    /// Free action or passive
    #[default]
    #[serde(other)]
    Free,
}

impl std::fmt::Display for TraitActivation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TraitActivation::Action => "Action",
            TraitActivation::BonusAction => "Bonus Action",
            TraitActivation::Reaction => "Reaction",
            TraitActivation::Free => "Free Action/Passive",
        };
        f.write_str(s)
    }
}

/// A special ability or feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trait {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub action_type: TraitActivation,
}

/// A participant in the encounter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub species: String,
    #[serde(rename = "type")]
    pub kind: CombatantKind,
    pub color: String,

    pub hp: i32,
    pub max_hp: i32,
    pub ac: i32,
    pub base_ac: i32,
    /// Base movement as written on the sheet, e.g. "30ft"
    pub movement: String,
    pub current_movement: u32,
    pub is_movement_dashed: bool,

    pub status: Status,
    pub is_dying: bool,
    pub death_successes: u8,
    pub death_failures: u8,
    /// `None` when not dying
    pub death_save_opportunities: Option<u32>,
    pub has_made_death_save_this_round: bool,

    pub removed_from_combat: bool,
    pub turn_completed: bool,
    pub action_used: bool,
    pub bonus_action_used: bool,
    pub dash_used: bool,
    pub reaction_used: bool,

    pub initiative: i32,
    /// Template initiative bonus for monsters; players use DEX
    pub initiative_bonus: i32,
    pub shared_initiative_id: Option<Uuid>,

    /// Detail panel pin; no effect on combat
    pub is_locked: bool,
    /// Renamed or hand-built rather than taken verbatim from a template
    pub is_custom: bool,

    pub actions: Vec<Attack>,
    pub items: Vec<Item>,
    pub traits: Vec<Trait>,
    pub last_ability_roll: Option<AbilityRoll>,

    #[serde(flatten)]
    pub abilities: AbilityScores,
    pub proficiency_bonus: i32,
    pub xp: u64,
    pub cr: Option<String>,

    pub hp_dice: Option<String>,
    pub size: Option<String>,
    pub senses: Option<String>,
    pub languages: Option<String>,
    pub skills: BTreeMap<String, String>,
}

impl Combatant {
    /// A fresh, combat-ready combatant with default sheet values
    pub fn new(name: impl Into<String>, kind: CombatantKind, max_hp: i32) -> Self {
        let max_hp = max_hp.max(1);
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            species: String::new(),
            kind,
            color: palette_color(0),
            hp: max_hp,
            max_hp,
            ac: 10,
            base_ac: 10,
            movement: String::new(),
            current_movement: 0,
            is_movement_dashed: false,
            status: Status::Active,
            is_dying: false,
            death_successes: 0,
            death_failures: 0,
            death_save_opportunities: None,
            has_made_death_save_this_round: false,
            removed_from_combat: false,
            turn_completed: false,
            action_used: false,
            bonus_action_used: false,
            dash_used: false,
            reaction_used: false,
            initiative: 0,
            initiative_bonus: 0,
            shared_initiative_id: None,
            is_locked: false,
            is_custom: false,
            actions: Vec::new(),
            items: Vec::new(),
            traits: Vec::new(),
            last_ability_roll: None,
            abilities: AbilityScores::default(),
            proficiency_bonus: 2,
            xp: 0,
            cr: None,
            hp_dice: None,
            size: None,
            senses: None,
            languages: None,
            skills: BTreeMap::new(),
        }
    }

    /// Set base movement in feet and restore current movement to it
    pub fn with_movement(mut self, feet: u32) -> Self {
        self.movement = format!("{}ft", feet);
        self.current_movement = feet;
        self
    }

    /// Base movement parsed from the "Nft" string
    pub fn base_movement(&self) -> u32 {
        parse_feet(&self.movement)
    }

    pub fn is_dead(&self) -> bool {
        self.status == Status::Dead
    }

    /// Dying with no way back: failures maxed or opportunities spent
    pub fn is_incapacitated(&self) -> bool {
        self.is_dying
            && (self.death_failures >= 3 || self.death_save_opportunities.is_some_and(|n| n == 0))
    }

    /// Sorts into the lower partition of the initiative order
    pub fn is_out_of_order(&self) -> bool {
        self.is_dead() || self.removed_from_combat || self.is_incapacitated()
    }

    /// Reset all death-save bookkeeping
    pub fn clear_dying(&mut self) {
        self.is_dying = false;
        self.death_successes = 0;
        self.death_failures = 0;
        self.death_save_opportunities = None;
        self.has_made_death_save_this_round = false;
    }

    /// Put the combatant in the terminal dead state
    pub fn mark_dead(&mut self) {
        self.status = Status::Dead;
        self.is_dying = true;
        self.death_failures = 3;
        self.death_save_opportunities = Some(0);
        self.turn_completed = true;
        self.last_ability_roll = None;
    }
}

/// Leading integer of a movement string: "30ft" -> 30, "25 ft." -> 25
pub fn parse_feet(movement: &str) -> u32 {
    let digits: String = movement
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}
