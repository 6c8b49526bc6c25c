//! Combat rules engine
//!
//! Implements tabletop combat bookkeeping with:
//! - Dice rolling (e.g., "2d6+3", critical damage)
//! - Status effects and their movement rules
//! - Hit points, dying and death saves
//! - Action economy and turn completion
//! - Initiative rolls and turn order
//! - The combat log

mod combatant;
mod dice;
mod economy;
mod effects;
mod initiative;
mod lifecycle;
mod log;

pub use combatant::{
    ability_modifier, palette_color, parse_feet, Ability, AbilityRoll, AbilityScores, Attack,
    Combatant, CombatantId, CombatantKind, Item, Status, Trait, TraitActivation, PALETTE,
};
pub use dice::{
    format_modifier, is_critical, is_fumble, max_of_die_type, parse_dice, roll_d20,
    roll_detailed, split_notation, DiceError, DiceRoll, DieSource, NotationParts, RollResult,
    ScriptedDice, MAX_DICE_COUNT, STANDARD_DICE,
};
pub use economy::{
    adjust_movement, apply_flag, end_dash, recompute_turn, reset_actions, set_movement,
    set_removed_from_combat, set_turn_completed, turn_is_spent, ActionFlag,
};
pub use effects::{MovementEffect, StatusEffect, StatusTable};
pub use initiative::{
    initiative_bonus, initiative_order, plan_rerolls, roll_initiative, InitiativeRoll,
};
pub use lifecycle::{
    apply_death_save, apply_hp, apply_round_attrition, apply_status, can_roll_death_save,
    check_hp_change, recompute_movement, DeathSaveOutcome, DEATH_SAVE_DC, DEATH_SAVE_OPPORTUNITIES,
    DEATH_SAVE_THRESHOLD,
};
pub use log::{CombatLog, HpChangeKind, LogEntry, LogKind};
