//! Combatant lifecycle and death-save state machine
//!
//! States: active, custom (table-driven), unconscious (dying), dead.
//! Transitions are driven by:
//! - HP changes (dropping to 0, healing, instant death at -max HP)
//! - Explicit status changes
//! - Death save rolls
//! - Round advancement (missed death-save opportunities)
//!
//! Each function works on one combatant record and appends one log entry
//! per state change. Rejected requests return an error before touching
//! the record.

use super::combatant::{Combatant, Status};
use super::effects::StatusTable;
use super::log::{CombatLog, LogEntry, LogKind};
use crate::error::EncounterError;

/// Death-save opportunities granted when a combatant starts dying
pub const DEATH_SAVE_OPPORTUNITIES: u32 = 4;

/// Successes needed to stabilize, failures needed to die
pub const DEATH_SAVE_THRESHOLD: u8 = 3;

/// Minimum d20 face for a successful death save
pub const DEATH_SAVE_DC: u32 = 10;

/// Outcome of a single death save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathSaveOutcome {
    Success { successes: u8 },
    /// Third success: back up at 1 HP
    Stabilized,
    Failure { failures: u8 },
    CriticalFailure { failures: u8 },
    /// Third failure
    Died,
}

/// Fail if moving to `new_hp` would heal a dead combatant
pub fn check_hp_change(c: &Combatant, new_hp: i32) -> Result<(), EncounterError> {
    if c.is_dead() && new_hp > 0 && new_hp > c.hp {
        return Err(EncounterError::illegal(format!(
            "{} is dead and cannot be healed",
            c.name
        )));
    }
    Ok(())
}

/// Apply an absolute HP value.
///
/// HP is clamped to `-max_hp` first, then dying entry/exit is resolved,
/// then the instant-death threshold is checked. A dead combatant cannot
/// be healed back to positive HP; lowering a dead combatant's HP changes
/// nothing but the number.
pub fn apply_hp(
    c: &mut Combatant,
    new_hp: i32,
    death_saves_enabled: bool,
    log: &mut CombatLog,
) -> Result<(), EncounterError> {
    check_hp_change(c, new_hp)?;

    c.hp = new_hp.max(-c.max_hp);
    if c.is_dead() {
        c.last_ability_roll = None;
        return Ok(());
    }

    if !death_saves_enabled && c.hp <= 0 {
        if !c.is_dead() {
            c.death_successes = 0;
            c.has_made_death_save_this_round = false;
            c.mark_dead();
            log.push(LogEntry::info(
                c.id,
                "dropped to 0 HP and dies instantly (death saves disabled).",
            ));
        }
        return Ok(());
    }

    if death_saves_enabled && c.hp <= 0 && !c.is_dying {
        c.is_dying = true;
        c.death_successes = 0;
        c.death_failures = 0;
        c.death_save_opportunities = Some(DEATH_SAVE_OPPORTUNITIES);
        c.has_made_death_save_this_round = false;
        c.status = Status::Unconscious;
        c.turn_completed = true;
        log.push(LogEntry::info(
            c.id,
            "dropped to 0 HP and is now unconscious/dying.",
        ));
    } else if c.hp > 0 && c.is_dying {
        c.clear_dying();
        c.status = Status::Active;
        c.turn_completed = false;
        log.push(LogEntry::info(c.id, "is no longer dying and is now active."));
    } else if c.hp > 0 && c.status == Status::Unconscious {
        c.status = Status::Active;
        c.turn_completed = false;
        log.push(LogEntry::info(
            c.id,
            "is no longer unconscious and is now active.",
        ));
    }

    if c.is_dying && !c.is_dead() && c.hp <= -c.max_hp {
        c.mark_dead();
        log.push(LogEntry::info(c.id, "suffered instant death!"));
    }

    if c.is_dead() {
        c.last_ability_roll = None;
    }
    Ok(())
}

/// Apply an explicit status change, then recompute movement from the table
pub fn apply_status(
    c: &mut Combatant,
    status: Status,
    table: &StatusTable,
    log: &mut CombatLog,
) -> Result<(), EncounterError> {
    match &status {
        Status::Dead => {
            if !c.is_dead() {
                c.mark_dead();
                log.push(LogEntry::info(c.id, "was marked dead."));
            }
        }
        Status::Unconscious => {
            if c.is_dead() {
                return Err(EncounterError::illegal(format!(
                    "{} is dead; set them active at positive HP first",
                    c.name
                )));
            }
            if c.hp > 0 {
                c.clear_dying();
                c.turn_completed = true;
            }
            if c.status != Status::Unconscious {
                c.status = Status::Unconscious;
                log.push(LogEntry::info(c.id, "is now unconscious."));
            }
        }
        Status::Active => {
            if c.hp <= 0 {
                return Err(EncounterError::illegal(format!(
                    "cannot set {} active at {} HP",
                    c.name, c.hp
                )));
            }
            let was_dead = c.is_dead();
            c.clear_dying();
            c.status = Status::Active;
            c.turn_completed = false;
            let message = if was_dead {
                "was revived and is now active."
            } else {
                "is now active."
            };
            log.push(LogEntry::info(c.id, message));
        }
        Status::Custom(key) => {
            if c.is_dying {
                return Err(EncounterError::illegal(format!(
                    "{} is dying; only unconscious or dead apply",
                    c.name
                )));
            }
            c.status = status.clone();
            log.push(LogEntry::info(c.id, format!("is now {}.", key)));
        }
    }

    recompute_movement(c, table);
    Ok(())
}

/// Current movement from the status table: override, multiplier, or base
pub fn recompute_movement(c: &mut Combatant, table: &StatusTable) {
    c.current_movement = table.movement_for(c.status.key(), c.base_movement());
}

/// Whether a death save may be rolled right now
pub fn can_roll_death_save(c: &Combatant, death_saves_enabled: bool) -> bool {
    death_saves_enabled && c.is_dying && !c.is_dead() && !c.has_made_death_save_this_round
}

/// Resolve a death save with the given d20 face.
///
/// Callers check [`can_roll_death_save`] first.
pub fn apply_death_save(c: &mut Combatant, roll: u32, log: &mut CombatLog) -> DeathSaveOutcome {
    if let Some(remaining) = c.death_save_opportunities {
        c.death_save_opportunities = Some(remaining.saturating_sub(1));
    }

    let outcome = if roll >= DEATH_SAVE_DC {
        c.death_successes = (c.death_successes + 1).min(DEATH_SAVE_THRESHOLD);
        log.push(
            LogEntry::new(LogKind::DeathSave, "rolled a death save:")
                .with_combatant(c.id)
                .with_value(roll)
                .with_details(format!("Success! ({} successes)", c.death_successes)),
        );

        if c.death_successes >= DEATH_SAVE_THRESHOLD {
            c.hp = 1;
            c.clear_dying();
            c.status = Status::Active;
            c.turn_completed = false;
            log.push(LogEntry::info(c.id, "is stable and conscious at 1 HP!"));
            DeathSaveOutcome::Stabilized
        } else {
            DeathSaveOutcome::Success {
                successes: c.death_successes,
            }
        }
    } else {
        let critical = roll == 1;
        let step = if critical { 2 } else { 1 };
        c.death_failures = (c.death_failures + step).min(DEATH_SAVE_THRESHOLD);
        let label = if critical { "Critical Failure!" } else { "Failure!" };
        log.push(
            LogEntry::new(LogKind::DeathSave, "rolled a death save:")
                .with_combatant(c.id)
                .with_value(roll)
                .with_details(format!("{} ({} failures)", label, c.death_failures)),
        );

        if c.death_failures >= DEATH_SAVE_THRESHOLD {
            c.mark_dead();
            log.push(LogEntry::info(
                c.id,
                "suffered 3 death saving throw failures and dies!",
            ));
            DeathSaveOutcome::Died
        } else if critical {
            DeathSaveOutcome::CriticalFailure {
                failures: c.death_failures,
            }
        } else {
            DeathSaveOutcome::Failure {
                failures: c.death_failures,
            }
        }
    };

    c.has_made_death_save_this_round = true;
    outcome
}

/// Round-advance attrition for a dying combatant.
///
/// Must run before the per-round flags are reset, since it reads whether
/// a save was made during the round that is ending.
pub fn apply_round_attrition(c: &mut Combatant, log: &mut CombatLog) {
    if !c.is_dying || c.is_dead() {
        return;
    }

    if let Some(remaining) = c.death_save_opportunities {
        if remaining > 0 && !c.has_made_death_save_this_round {
            let remaining = remaining - 1;
            c.death_save_opportunities = Some(remaining);
            log.push(LogEntry::info(
                c.id,
                format!(
                    "missed a death save opportunity. Opportunities left: {}",
                    remaining
                ),
            ));
        }
    }

    if c.death_save_opportunities == Some(0) && c.death_failures < DEATH_SAVE_THRESHOLD {
        c.mark_dead();
        log.push(LogEntry::info(
            c.id,
            "ran out of death save opportunities and dies!",
        ));
    }
}
