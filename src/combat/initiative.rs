//! Initiative rolls and turn order
//!
//! - Players roll d20 + DEX modifier
//! - Monsters roll d20 + their template's initiative bonus
//! - Members of a shared-initiative group share one roll
//!
//! Display order puts everyone still in the fight first, then the dead,
//! removed and incapacitated, each partition by descending initiative.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use super::combatant::{Ability, Combatant, CombatantId, CombatantKind};
use super::dice::{roll_d20, DieSource};
use super::log::{CombatLog, LogEntry, LogKind};

/// A single initiative roll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitiativeRoll {
    pub d20: u32,
    pub bonus: i32,
    pub total: i32,
}

impl InitiativeRoll {
    /// "(14 + 2)" style breakdown
    pub fn breakdown(&self) -> String {
        format!("({} + {})", self.d20, self.bonus)
    }
}

/// Roll d20 + `bonus`
pub fn roll_initiative(source: &mut dyn DieSource, bonus: i32) -> InitiativeRoll {
    let d20 = roll_d20(source);
    InitiativeRoll {
        d20,
        bonus,
        total: d20 as i32 + bonus,
    }
}

/// Initiative modifier for a combatant
pub fn initiative_bonus(c: &Combatant) -> i32 {
    match c.kind {
        CombatantKind::Player => c.abilities.modifier(Ability::Dex),
        CombatantKind::Monster => c.initiative_bonus,
    }
}

/// Roll new initiative for everyone still fighting.
///
/// Returns the new values in roster order without applying them. Dead and
/// removed combatants keep their initiative. A shared group is rolled once,
/// by its first eligible member, and logged once.
pub fn plan_rerolls(
    roster: &[Arc<Combatant>],
    source: &mut dyn DieSource,
    log: &mut CombatLog,
) -> Vec<(CombatantId, i32)> {
    let mut group_rolls: HashMap<Uuid, i32> = HashMap::new();
    let mut planned = Vec::with_capacity(roster.len());

    for c in roster {
        if c.is_dead() || c.removed_from_combat {
            continue;
        }

        let total = match c.shared_initiative_id {
            Some(group) => match group_rolls.get(&group) {
                Some(total) => *total,
                None => {
                    let roll = roll_initiative(source, initiative_bonus(c));
                    log.push(
                        LogEntry::new(LogKind::InitiativeRoll, "(Group) rerolled initiative:")
                            .with_combatant(c.id)
                            .with_value(roll.total)
                            .with_details(roll.breakdown()),
                    );
                    group_rolls.insert(group, roll.total);
                    roll.total
                }
            },
            None => {
                let roll = roll_initiative(source, initiative_bonus(c));
                log.push(
                    LogEntry::new(LogKind::InitiativeRoll, "rerolled initiative:")
                        .with_combatant(c.id)
                        .with_value(roll.total)
                        .with_details(roll.breakdown()),
                );
                roll.total
            }
        };
        planned.push((c.id, total));
    }

    planned
}

/// Display order: fighting combatants first, then the rest
pub fn initiative_order(roster: &[Arc<Combatant>]) -> Vec<Arc<Combatant>> {
    let (mut fighting, mut out): (Vec<_>, Vec<_>) = roster
        .iter()
        .cloned()
        .partition(|c| !c.is_out_of_order());

    // sort_by is stable: ties keep roster order
    fighting.sort_by(|a, b| b.initiative.cmp(&a.initiative));
    out.sort_by(|a, b| b.initiative.cmp(&a.initiative));
    fighting.extend(out);
    fighting
}
