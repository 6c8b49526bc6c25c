//! Turn and action economy
//!
//! Four per-round flags (action, bonus action, dash, reaction) plus the
//! turn-completed marker. Taking the Action and Dashing are exclusive.
//! Every mutation here ends with [`recompute_turn`], which derives the
//! turn-completed flag from the flags, movement and lifecycle state.

use std::str::FromStr;

use super::combatant::Combatant;
use super::log::{CombatLog, LogEntry, LogKind};
use crate::error::EncounterError;

/// One of the four per-round action economy flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionFlag {
    Action,
    BonusAction,
    Dash,
    Reaction,
}

impl ActionFlag {
    pub fn all() -> &'static [ActionFlag] {
        &[
            ActionFlag::Action,
            ActionFlag::BonusAction,
            ActionFlag::Dash,
            ActionFlag::Reaction,
        ]
    }

    fn get(self, c: &Combatant) -> bool {
        match self {
            ActionFlag::Action => c.action_used,
            ActionFlag::BonusAction => c.bonus_action_used,
            ActionFlag::Dash => c.dash_used,
            ActionFlag::Reaction => c.reaction_used,
        }
    }

    fn slot(self, c: &mut Combatant) -> &mut bool {
        match self {
            ActionFlag::Action => &mut c.action_used,
            ActionFlag::BonusAction => &mut c.bonus_action_used,
            ActionFlag::Dash => &mut c.dash_used,
            ActionFlag::Reaction => &mut c.reaction_used,
        }
    }
}

impl FromStr for ActionFlag {
    type Err = EncounterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "action" => Ok(ActionFlag::Action),
            "bonus" | "bonus-action" | "bonus_action" => Ok(ActionFlag::BonusAction),
            "dash" => Ok(ActionFlag::Dash),
            "reaction" => Ok(ActionFlag::Reaction),
            other => Err(EncounterError::invalid(format!("unknown action flag: {}", other))),
        }
    }
}

impl std::fmt::Display for ActionFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionFlag::Action => "Action",
            ActionFlag::BonusAction => "Bonus Action",
            ActionFlag::Dash => "Dash",
            ActionFlag::Reaction => "Reaction",
        };
        f.write_str(s)
    }
}

/// Set or clear one action flag
pub fn apply_flag(
    c: &mut Combatant,
    flag: ActionFlag,
    value: bool,
    log: &mut CombatLog,
) -> Result<(), EncounterError> {
    if c.removed_from_combat && !value {
        return Err(EncounterError::illegal(format!(
            "{} is out of combat; return them before clearing {}",
            c.name, flag
        )));
    }
    if flag.get(c) == value {
        recompute_turn(c);
        return Ok(());
    }

    match (flag, value) {
        (ActionFlag::Action, true) => {
            if c.dash_used {
                end_dash(c, log);
            }
            c.action_used = true;
        }
        (ActionFlag::Dash, true) => {
            c.action_used = false;
            start_dash(c, log);
        }
        (ActionFlag::Dash, false) => end_dash(c, log),
        _ => *flag.slot(c) = value,
    }

    recompute_turn(c);
    Ok(())
}

fn start_dash(c: &mut Combatant, log: &mut CombatLog) {
    let base = c.base_movement();
    c.dash_used = true;
    c.is_movement_dashed = true;
    c.current_movement = base * 2;
    log.push(
        LogEntry::new(LogKind::MovementChange, "used Dash, movement doubled to:")
            .with_combatant(c.id)
            .with_value(c.current_movement)
            .with_details(format!("({}ft x 2)", base)),
    );
}

/// Clear the dash flag and put movement back to base
pub fn end_dash(c: &mut Combatant, log: &mut CombatLog) {
    let base = c.base_movement();
    c.dash_used = false;
    c.is_movement_dashed = false;
    c.current_movement = base;
    log.push(
        LogEntry::new(LogKind::MovementChange, "Dash ended, movement reset to:")
            .with_combatant(c.id)
            .with_value(base)
            .with_details(format!("({}ft)", base)),
    );
}

/// Whether the flags and movement add up to a finished turn
pub fn turn_is_spent(c: &Combatant) -> bool {
    ((c.action_used && c.reaction_used) || c.dash_used)
        && c.bonus_action_used
        && c.current_movement == 0
}

/// Derive the turn-completed flag.
///
/// - Out of combat: every flag set, turn complete
/// - Dying or dead: turn complete
/// - Otherwise: complete once the turn is spent; never un-completes
pub fn recompute_turn(c: &mut Combatant) {
    if c.removed_from_combat {
        c.action_used = true;
        c.bonus_action_used = true;
        c.dash_used = true;
        c.reaction_used = true;
        c.turn_completed = true;
    } else if c.is_dying || c.is_dead() {
        c.turn_completed = true;
    } else if turn_is_spent(c) {
        c.turn_completed = true;
    }
}

/// Mark the turn complete or open it again
pub fn set_turn_completed(c: &mut Combatant, completed: bool) -> Result<(), EncounterError> {
    if !completed && (c.removed_from_combat || c.is_dying || c.is_dead()) {
        return Err(EncounterError::illegal(format!(
            "{} cannot take a turn right now",
            c.name
        )));
    }
    c.turn_completed = completed;
    recompute_turn(c);
    Ok(())
}

/// Clear all four flags and reopen the turn
pub fn reset_actions(c: &mut Combatant, log: &mut CombatLog) -> Result<(), EncounterError> {
    if c.removed_from_combat {
        return Err(EncounterError::illegal(format!(
            "{} is out of combat",
            c.name
        )));
    }
    if c.dash_used {
        end_dash(c, log);
    }
    c.action_used = false;
    c.bonus_action_used = false;
    c.reaction_used = false;
    c.turn_completed = false;
    recompute_turn(c);
    Ok(())
}

/// Set current movement; negative values clamp to zero
pub fn set_movement(c: &mut Combatant, feet: i64, log: &mut CombatLog) {
    let feet = feet.clamp(0, u32::MAX as i64) as u32;
    if feet != c.current_movement {
        c.current_movement = feet;
        log.push(
            LogEntry::new(LogKind::MovementChange, "movement set to:")
                .with_combatant(c.id)
                .with_value(feet),
        );
    }
    recompute_turn(c);
}

/// Add (or with a negative delta, spend) movement
pub fn adjust_movement(c: &mut Combatant, delta: i32, log: &mut CombatLog) {
    let target = c.current_movement as i64 + delta as i64;
    set_movement(c, target, log);
}

/// Take a combatant out of the turn economy, or bring them back
pub fn set_removed_from_combat(c: &mut Combatant, removed: bool, log: &mut CombatLog) {
    if c.removed_from_combat == removed {
        return;
    }

    c.removed_from_combat = removed;
    if removed {
        log.push(LogEntry::info(c.id, "removed from combat."));
    } else {
        if c.is_movement_dashed {
            c.is_movement_dashed = false;
            c.current_movement = c.base_movement();
        }
        c.action_used = false;
        c.bonus_action_used = false;
        c.dash_used = false;
        c.reaction_used = false;
        c.turn_completed = false;
        log.push(LogEntry::info(c.id, "restored to combat."));
    }
    recompute_turn(c);
}
