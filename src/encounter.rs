//! Encounter state and operations
//!
//! The [`Encounter`] owns the roster, the ledgers, the combat log and the
//! dice. Every operation either applies completely or is rejected with an
//! [`EncounterError`], leaving the encounter as it was. Rejections are
//! also reported through `tracing` at warn level.

use std::sync::{Arc, LazyLock};

use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::combat::{
    self, apply_death_save, apply_flag, apply_hp, apply_round_attrition, apply_status,
    can_roll_death_save, check_hp_change, format_modifier, initiative_order, is_critical, is_fumble,
    palette_color, parse_dice, plan_rerolls, recompute_movement, recompute_turn, roll_d20,
    roll_initiative, Ability, AbilityRoll, AbilityScores, ActionFlag, Attack, CombatLog, Combatant,
    CombatantId, CombatantKind, DeathSaveOutcome, DiceError, DiceRoll, DieSource, HpChangeKind,
    LogEntry, LogKind, RollResult, Status, TraitActivation, STANDARD_DICE,
};
use crate::config::{Limits, TrackerConfig};
use crate::data::ReferenceData;
use crate::error::EncounterError;
use crate::ledger::{Ledger, LootLine, LootPool, UndoBuffer, UndoEntry};
use crate::roster::{build_batch, BatchContext, BatchOptions, Roster, UsedNames};

static COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("color pattern is valid"));

/// Direction and size of an HP adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HpAdjustment {
    Heal(u32),
    Damage(u32),
}

impl HpAdjustment {
    fn amount(self) -> u32 {
        match self {
            HpAdjustment::Heal(n) | HpAdjustment::Damage(n) => n,
        }
    }
}

/// A player character to add
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlayer {
    pub name: String,
    pub max_hp: i32,
    /// Rolled from DEX when absent
    pub initiative: Option<i32>,
    pub ac: i32,
    pub movement: u32,
    pub abilities: AbilityScores,
    pub randomize_stats: bool,
    /// Named actions, without dice
    pub actions: Vec<String>,
}

impl NewPlayer {
    pub fn new(name: impl Into<String>, max_hp: i32) -> Self {
        Self {
            name: name.into(),
            max_hp,
            initiative: None,
            ac: 10,
            movement: 30,
            abilities: AbilityScores::default(),
            randomize_stats: false,
            actions: Vec::new(),
        }
    }

    pub fn with_initiative(mut self, initiative: i32) -> Self {
        self.initiative = Some(initiative);
        self
    }

    pub fn with_ac(mut self, ac: i32) -> Self {
        self.ac = ac;
        self
    }

    pub fn with_movement(mut self, feet: u32) -> Self {
        self.movement = feet;
        self
    }

    pub fn with_abilities(mut self, abilities: AbilityScores) -> Self {
        self.abilities = abilities;
        self
    }
}

/// A hand-built weapon attack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomWeapon {
    pub name: String,
    pub count: u32,
    pub sides: u32,
    pub modifier: i32,
    pub damage_type: Option<String>,
    pub to_hit_modifier: i32,
}

/// Outcome of an attack roll
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToHitRoll {
    pub attack: String,
    pub d20: u32,
    pub modifier: i32,
    pub total: i32,
    pub critical: bool,
    pub fumble: bool,
}

/// One multi-round combat session
pub struct Encounter {
    roster: Roster,
    ledger: Ledger,
    undo: UndoBuffer,
    log: CombatLog,
    data: ReferenceData,
    used_names: UsedNames,
    dice: Box<dyn DieSource + Send>,
    round: u32,
    death_saves_enabled: bool,
    limits: Limits,
}

impl std::fmt::Debug for Encounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encounter")
            .field("round", &self.round)
            .field("combatants", &self.roster.len())
            .field("death_saves_enabled", &self.death_saves_enabled)
            .finish_non_exhaustive()
    }
}

fn warn_rejected<T>(op: &str, result: Result<T, EncounterError>) -> Result<T, EncounterError> {
    result.inspect_err(|e| warn!("{} rejected: {}", op, e))
}

fn find_attack<'a>(c: &'a Combatant, key: &str) -> Option<&'a Attack> {
    let key = key.trim();
    c.actions
        .iter()
        .find(|a| a.id == key)
        .or_else(|| c.actions.iter().find(|a| a.name.eq_ignore_ascii_case(key)))
        .or_else(|| {
            let n: usize = key.parse().ok()?;
            c.actions.get(n.checked_sub(1)?)
        })
}

fn creation_message(c: &Combatant) -> String {
    let movement = if c.movement.is_empty() {
        "N/A"
    } else {
        c.movement.as_str()
    };
    format!(
        "created. Init: {}, HP: {}/{}, AC: {}, Movement: {}",
        c.initiative, c.hp, c.max_hp, c.ac, movement
    )
}

impl Encounter {
    /// Start an encounter from configuration and reference data
    pub fn new(config: &TrackerConfig, data: ReferenceData) -> Self {
        let dice: Box<dyn DieSource + Send> = match config.seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(StdRng::from_os_rng()),
        };
        info!(
            "Encounter started: {} monster templates, {} status effects, death saves {}",
            data.monsters.len(),
            data.statuses.len(),
            if config.death_saves_enabled { "on" } else { "off" }
        );
        Self {
            roster: Roster::new(config.limits.max_total_combatants),
            ledger: Ledger::new(),
            undo: UndoBuffer::new(config.limits.undo_capacity),
            log: CombatLog::new(),
            data,
            used_names: UsedNames::new(),
            dice,
            round: 1,
            death_saves_enabled: config.death_saves_enabled,
            limits: config.limits.clone(),
        }
    }

    /// Replace the dice, e.g. with scripted faces
    pub fn with_dice(mut self, dice: impl DieSource + Send + 'static) -> Self {
        self.dice = Box::new(dice);
        self
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn death_saves_enabled(&self) -> bool {
        self.death_saves_enabled
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn data(&self) -> &ReferenceData {
        &self.data
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn get(&self, id: CombatantId) -> Option<Arc<Combatant>> {
        self.roster.get(id)
    }

    pub fn log(&self) -> &CombatLog {
        &self.log
    }

    pub fn undo_buffer(&self) -> &UndoBuffer {
        &self.undo
    }

    pub fn loot_pool(&self) -> &LootPool {
        self.ledger.loot()
    }

    pub fn grouped_loot(&self) -> Vec<LootLine> {
        self.ledger.loot().grouped()
    }

    pub fn xp_pool(&self) -> u64 {
        self.ledger.xp()
    }

    /// Turn order for display
    pub fn initiative_order(&self) -> Vec<Arc<Combatant>> {
        initiative_order(&self.roster.snapshot())
    }

    fn check_adjustment(&self, amount: u32, what: &str) -> Result<(), EncounterError> {
        if amount == 0 || amount > self.limits.max_adjustment {
            return Err(EncounterError::invalid(format!(
                "{} adjustment must be between 1 and {}",
                what, self.limits.max_adjustment
            )));
        }
        Ok(())
    }

    fn require(&self, id: CombatantId) -> Result<Arc<Combatant>, EncounterError> {
        self.roster
            .get(id)
            .ok_or_else(|| crate::roster::RosterError::UnknownCombatant(id).into())
    }

    // --- Roster ---

    /// Add a player character
    pub fn add_player(&mut self, player: NewPlayer) -> Result<CombatantId, EncounterError> {
        let result = self.add_player_inner(player);
        warn_rejected("add player", result)
    }

    fn add_player_inner(&mut self, player: NewPlayer) -> Result<CombatantId, EncounterError> {
        let name = player.name.trim();
        if name.is_empty() {
            return Err(EncounterError::invalid("player name is required"));
        }
        if player.max_hp < 1 || player.max_hp > self.limits.max_hp {
            return Err(EncounterError::invalid(format!(
                "max HP must be between 1 and {}",
                self.limits.max_hp
            )));
        }
        self.roster.check_capacity(1)?;

        let mut c = Combatant::new(name, CombatantKind::Player, player.max_hp)
            .with_movement(player.movement);
        c.species = "Human".to_string();
        c.color = palette_color(self.roster.len());
        c.ac = player.ac;
        c.base_ac = player.ac;
        c.is_custom = true;
        c.abilities = if player.randomize_stats {
            let dice = self.dice.as_mut();
            let mut score = || 7 + dice.roll_die(8) as i32;
            AbilityScores {
                strength: score(),
                dexterity: score(),
                constitution: score(),
                intelligence: score(),
                wisdom: score(),
                charisma: score(),
            }
        } else {
            player.abilities
        };
        c.initiative = match player.initiative {
            Some(value) => value,
            None => {
                let roll = roll_initiative(self.dice.as_mut(), combat::initiative_bonus(&c));
                roll.total
            }
        };
        c.actions = player
            .actions
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(|a| Attack {
                id: Uuid::new_v4().to_string(),
                name: a.to_string(),
                dice: String::new(),
                damage_type: None,
                to_hit_modifier: 0,
                is_custom: true,
            })
            .collect();

        let message = creation_message(&c);
        let id = self.roster.add(c)?;
        self.log.push(LogEntry::info(id, message));
        Ok(id)
    }

    /// Add a batch of monsters from a template (by id or name)
    pub fn add_monsters(
        &mut self,
        template: &str,
        options: &BatchOptions,
    ) -> Result<Vec<CombatantId>, EncounterError> {
        let result = self.add_monsters_inner(template, options);
        warn_rejected("add monsters", result)
    }

    fn add_monsters_inner(
        &mut self,
        template_key: &str,
        options: &BatchOptions,
    ) -> Result<Vec<CombatantId>, EncounterError> {
        if options.quantity == 0 {
            return Err(EncounterError::invalid("quantity must be at least 1"));
        }
        if options.quantity > self.limits.max_add_quantity {
            return Err(EncounterError::BatchTooLarge {
                requested: options.quantity,
                max: self.limits.max_add_quantity,
            });
        }
        self.roster.check_capacity(options.quantity as usize)?;

        let Self {
            roster,
            log,
            data,
            used_names,
            dice,
            limits,
            ..
        } = self;

        let template = data
            .monster(template_key)
            .ok_or_else(|| EncounterError::UnknownTemplate(template_key.to_string()))?;

        let batch = build_batch(
            template,
            options,
            BatchContext {
                names: &data.names,
                used_names,
                source: dice.as_mut(),
                first_color: roster.len(),
                max_hp: limits.max_hp,
            },
        );

        if options.shared_initiative {
            let value = batch.combatants.first().map(|c| c.initiative).unwrap_or(0);
            match batch.group_roll {
                Some(roll) => log.push(
                    LogEntry::new(
                        LogKind::InitiativeRoll,
                        format!("Initiative for {}s rolled:", template.name),
                    )
                    .with_value(roll.total)
                    .with_details(roll.breakdown()),
                ),
                None => log.push(
                    LogEntry::new(
                        LogKind::InitiativeSet,
                        format!("Initiative for {}s set to:", template.name),
                    )
                    .with_value(value)
                    .with_details("(From input field)"),
                ),
            }
        }

        let messages: Vec<_> = batch
            .combatants
            .iter()
            .map(|c| (c.id, creation_message(c)))
            .collect();
        let ids = roster.add_batch(batch.combatants)?;
        for (id, message) in messages {
            log.push(LogEntry::info(id, message));
        }
        info!("Added {} x {}", ids.len(), template.name);
        Ok(ids)
    }

    /// Remove a combatant, moving its XP and items to the pools
    pub fn remove_and_loot(&mut self, id: CombatantId) -> Result<Arc<Combatant>, EncounterError> {
        let removed = warn_rejected("remove and loot", self.roster.remove(id).map_err(Into::into))?;

        self.ledger.credit(&removed);
        if !removed.items.is_empty() {
            self.log.push(LogEntry::new(
                LogKind::Loot,
                format!("Items from {} added to loot pool.", removed.name),
            ));
        }
        self.log
            .push(LogEntry::info(id, "removed from combat and items moved to loot."));
        self.undo.push(UndoEntry {
            combatant: Combatant::clone(&removed),
            was_looted: true,
        });
        Ok(removed)
    }

    /// Remove a combatant without touching the pools
    pub fn delete(&mut self, id: CombatantId) -> Result<Arc<Combatant>, EncounterError> {
        let removed = warn_rejected("delete", self.roster.remove(id).map_err(Into::into))?;

        self.log.push(LogEntry::info(id, "deleted from combat."));
        self.undo.push(UndoEntry {
            combatant: Combatant::clone(&removed),
            was_looted: false,
        });
        Ok(removed)
    }

    /// Bring a removed combatant back from the undo buffer.
    ///
    /// A looted combatant's XP and items are taken back out of the pools.
    /// The record returns combat-ready unless a combatant with the same id
    /// is already in the roster, in which case only the pools change.
    pub fn restore(&mut self, id: CombatantId) -> Result<CombatantId, EncounterError> {
        let result = self.restore_inner(id);
        warn_rejected("restore", result)
    }

    fn restore_inner(&mut self, id: CombatantId) -> Result<CombatantId, EncounterError> {
        let entry = self
            .undo
            .get(id)
            .ok_or(EncounterError::NotInUndoBuffer(id))?;

        if !self.roster.contains(id) {
            let mut c = entry.combatant.clone();
            c.hp = c.hp.max(1);
            c.clear_dying();
            c.status = Status::Active;
            c.removed_from_combat = false;
            c.turn_completed = false;
            c.action_used = false;
            c.bonus_action_used = false;
            c.dash_used = false;
            c.reaction_used = false;
            c.is_movement_dashed = false;
            recompute_movement(&mut c, &self.data.statuses);
            self.roster.restore(c)?;
            self.log.push(LogEntry::info(id, "restored from undo list."));
        }

        if let Some(entry) = self.undo.take(id) {
            if entry.was_looted {
                self.ledger.reverse(&entry.combatant);
                if !entry.combatant.items.is_empty() {
                    self.log.push(LogEntry::new(
                        LogKind::LootRestore,
                        format!("Items from {} removed from loot pool.", entry.combatant.name),
                    ));
                }
            }
        }
        Ok(id)
    }

    /// Move `id` to sit just before `before` in roster order
    pub fn reorder(
        &mut self,
        id: CombatantId,
        before: Option<CombatantId>,
    ) -> Result<(), EncounterError> {
        warn_rejected("reorder", self.roster.reorder(id, before).map_err(Into::into))
    }

    // --- Lifecycle ---

    /// Set HP to an absolute value
    pub fn set_hp(&mut self, id: CombatantId, hp: i32) -> Result<(), EncounterError> {
        let Self {
            roster,
            log,
            death_saves_enabled,
            ..
        } = self;
        let enabled = *death_saves_enabled;
        warn_rejected("set HP", roster.try_update(id, |c| apply_hp(c, hp, enabled, log)))
    }

    /// Heal or damage by an amount
    pub fn adjust_hp(
        &mut self,
        id: CombatantId,
        adjustment: HpAdjustment,
    ) -> Result<(), EncounterError> {
        let result = self.adjust_hp_inner(id, adjustment);
        warn_rejected("adjust HP", result)
    }

    fn adjust_hp_inner(
        &mut self,
        id: CombatantId,
        adjustment: HpAdjustment,
    ) -> Result<(), EncounterError> {
        self.check_adjustment(adjustment.amount(), "HP")?;
        let current = self.require(id)?;
        if current.is_dead() && matches!(adjustment, HpAdjustment::Heal(_)) {
            return Err(EncounterError::illegal(format!(
                "{} is dead and cannot be healed",
                current.name
            )));
        }

        let Self {
            roster,
            log,
            death_saves_enabled,
            ..
        } = self;
        let enabled = *death_saves_enabled;
        roster.try_update(id, |c| {
            let amount = adjustment.amount() as i32;
            let (target, entry) = match adjustment {
                HpAdjustment::Heal(_) => (
                    c.hp.saturating_add(amount),
                    LogEntry::new(LogKind::HpChange, "healed").with_hp_change(HpChangeKind::Heal),
                ),
                HpAdjustment::Damage(_) => (
                    c.hp.saturating_sub(amount),
                    LogEntry::new(LogKind::HpChange, "took damage")
                        .with_hp_change(HpChangeKind::Damage),
                ),
            };
            check_hp_change(c, target)?;
            log.push(entry.with_combatant(c.id).with_value(amount));
            apply_hp(c, target, enabled, log)
        })
    }

    /// Set a status explicitly
    pub fn set_status(&mut self, id: CombatantId, status: Status) -> Result<(), EncounterError> {
        let Self {
            roster, log, data, ..
        } = self;
        if let Status::Custom(key) = &status {
            if !data.statuses.contains(key) {
                debug!("Status {:?} has no table entry; no movement effect", key);
            }
        }
        warn_rejected(
            "set status",
            roster.try_update(id, |c| {
                apply_status(c, status, &data.statuses, log)?;
                recompute_turn(c);
                Ok(())
            }),
        )
    }

    /// Roll a death save for a dying combatant
    pub fn roll_death_save(&mut self, id: CombatantId) -> Result<DeathSaveOutcome, EncounterError> {
        let result = self.roll_death_save_inner(id);
        warn_rejected("death save", result)
    }

    fn roll_death_save_inner(
        &mut self,
        id: CombatantId,
    ) -> Result<DeathSaveOutcome, EncounterError> {
        let c = self.require(id)?;
        if !can_roll_death_save(&c, self.death_saves_enabled) {
            let reason = if !self.death_saves_enabled {
                "death saves are disabled"
            } else if c.is_dead() {
                "already dead"
            } else if !c.is_dying {
                "not dying"
            } else {
                "already rolled this round"
            };
            return Err(EncounterError::illegal(format!(
                "{} cannot roll a death save: {}",
                c.name, reason
            )));
        }

        let Self {
            roster, log, dice, ..
        } = self;
        let roll = roll_d20(dice.as_mut());
        roster.try_update(id, |c| Ok::<_, EncounterError>(apply_death_save(c, roll, log)))
    }

    /// Turn death saves on or off for the rest of the encounter
    pub fn set_death_saves_enabled(&mut self, enabled: bool) {
        if self.death_saves_enabled != enabled {
            self.death_saves_enabled = enabled;
            self.log.push(LogEntry::new(
                LogKind::Info,
                format!("Death saves {}.", if enabled { "enabled" } else { "disabled" }),
            ));
        }
    }

    // --- Action economy ---

    /// Set or clear one action flag
    pub fn set_flag(
        &mut self,
        id: CombatantId,
        flag: ActionFlag,
        value: bool,
    ) -> Result<(), EncounterError> {
        let Self { roster, log, .. } = self;
        warn_rejected("set flag", roster.try_update(id, |c| apply_flag(c, flag, value, log)))
    }

    /// Mark the turn complete or reopen it
    pub fn set_turn_completed(
        &mut self,
        id: CombatantId,
        completed: bool,
    ) -> Result<(), EncounterError> {
        warn_rejected(
            "set turn completed",
            self.roster
                .try_update(id, |c| combat::set_turn_completed(c, completed)),
        )
    }

    /// Clear all flags and reopen the turn
    pub fn reset_actions(&mut self, id: CombatantId) -> Result<(), EncounterError> {
        let Self { roster, log, .. } = self;
        warn_rejected(
            "reset actions",
            roster.try_update(id, |c| combat::reset_actions(c, log)),
        )
    }

    /// Set current movement; negative values clamp to zero
    pub fn set_movement(&mut self, id: CombatantId, feet: i64) -> Result<(), EncounterError> {
        let Self { roster, log, .. } = self;
        warn_rejected(
            "set movement",
            roster.try_update(id, |c| {
                combat::set_movement(c, feet, log);
                Ok::<_, EncounterError>(())
            }),
        )
    }

    /// Add or spend movement
    pub fn adjust_movement(&mut self, id: CombatantId, delta: i32) -> Result<(), EncounterError> {
        let result = self
            .check_adjustment(delta.unsigned_abs(), "movement")
            .and_then(|()| {
                let Self { roster, log, .. } = &mut *self;
                roster.try_update(id, |c| {
                    combat::adjust_movement(c, delta, log);
                    Ok::<_, EncounterError>(())
                })
            });
        warn_rejected("adjust movement", result)
    }

    /// Take a combatant out of the turn economy or bring them back
    pub fn set_removed_from_combat(
        &mut self,
        id: CombatantId,
        removed: bool,
    ) -> Result<(), EncounterError> {
        let Self { roster, log, .. } = self;
        warn_rejected(
            "set removed from combat",
            roster.try_update(id, |c| {
                combat::set_removed_from_combat(c, removed, log);
                Ok::<_, EncounterError>(())
            }),
        )
    }

    // --- Rolls ---

    /// Roll d20 + ability modifier and remember the result
    pub fn roll_ability_check(
        &mut self,
        id: CombatantId,
        ability: Ability,
    ) -> Result<AbilityRoll, EncounterError> {
        let result = self.roll_ability_check_inner(id, ability);
        warn_rejected("ability check", result)
    }

    fn roll_ability_check_inner(
        &mut self,
        id: CombatantId,
        ability: Ability,
    ) -> Result<AbilityRoll, EncounterError> {
        let c = self.require(id)?;
        if c.is_dead() {
            return Err(EncounterError::illegal(format!("{} is dead", c.name)));
        }

        let Self {
            roster, log, dice, ..
        } = self;
        let d20 = roll_d20(dice.as_mut());
        let modifier = c.abilities.modifier(ability);
        let check = AbilityRoll {
            ability,
            roll: d20,
            total: d20 as i32 + modifier,
        };
        roster.update(id, |c| c.last_ability_roll = Some(check))?;
        log.push(
            LogEntry::new(LogKind::AbilityCheck, format!("rolled {} check:", ability))
                .with_combatant(id)
                .with_value(check.total)
                .with_details(format!("({} + {})", d20, modifier))
                .critical(is_critical(d20)),
        );
        Ok(check)
    }

    /// Roll to hit with one of the combatant's attacks.
    ///
    /// Uses up the Action unless the Action or Dash is already spent or
    /// the combatant is dying.
    pub fn roll_to_hit(&mut self, id: CombatantId, attack: &str) -> Result<ToHitRoll, EncounterError> {
        let result = self.roll_to_hit_inner(id, attack);
        warn_rejected("to-hit roll", result)
    }

    fn roll_to_hit_inner(&mut self, id: CombatantId, key: &str) -> Result<ToHitRoll, EncounterError> {
        let c = self.require(id)?;
        let attack = find_attack(&c, key)
            .ok_or_else(|| EncounterError::invalid(format!("{} has no attack {:?}", c.name, key)))?;

        let Self {
            roster, log, dice, ..
        } = self;
        let d20 = roll_d20(dice.as_mut());
        let roll = ToHitRoll {
            attack: attack.name.clone(),
            d20,
            modifier: attack.to_hit_modifier,
            total: d20 as i32 + attack.to_hit_modifier,
            critical: is_critical(d20),
            fumble: is_fumble(d20),
        };
        log.push(
            LogEntry::new(LogKind::ToHit, format!("rolled {} to hit:", roll.attack))
                .with_combatant(id)
                .with_value(roll.total)
                .with_details(format!("({}{})", d20, format_modifier(roll.modifier)))
                .critical(roll.critical),
        );

        if !c.action_used && !c.dash_used && !c.is_dying && !c.is_dead() {
            roster.try_update(id, |c| apply_flag(c, ActionFlag::Action, true, log))?;
        }
        Ok(roll)
    }

    /// Roll damage for an attack; a critical adds one maximized die
    pub fn roll_damage(
        &mut self,
        id: CombatantId,
        attack: &str,
        critical: bool,
    ) -> Result<RollResult, EncounterError> {
        let result = self.roll_damage_inner(id, attack, critical);
        warn_rejected("damage roll", result)
    }

    fn roll_damage_inner(
        &mut self,
        id: CombatantId,
        key: &str,
        critical: bool,
    ) -> Result<RollResult, EncounterError> {
        let c = self.require(id)?;
        let attack = find_attack(&c, key)
            .ok_or_else(|| EncounterError::invalid(format!("{} has no attack {:?}", c.name, key)))?;
        let dice_roll = DiceRoll::lenient(&attack.dice);
        if dice_roll.is_empty() {
            return Err(EncounterError::invalid(format!(
                "{} has no damage dice",
                attack.name
            )));
        }

        let result = if critical {
            dice_roll.roll_critical(self.dice.as_mut())
        } else {
            dice_roll.roll_detailed(self.dice.as_mut())
        };
        let message = if critical {
            format!("rolled CRITICAL {} damage:", attack.name)
        } else {
            format!("rolled {} damage:", attack.name)
        };
        let damage_type = attack
            .damage_type
            .as_deref()
            .map(|t| format!(" [{}]", t))
            .unwrap_or_default();
        self.log.push(
            LogEntry::new(LogKind::Damage, message)
                .with_combatant(id)
                .with_value(result.total)
                .with_details(format!("({}){}", result.breakdown(), damage_type))
                .critical(critical),
        );
        Ok(result)
    }

    /// Use a trait, spending the part of the action economy it needs
    pub fn activate_trait(&mut self, id: CombatantId, key: &str) -> Result<TraitActivation, EncounterError> {
        let result = self.activate_trait_inner(id, key);
        warn_rejected("activate trait", result)
    }

    fn activate_trait_inner(
        &mut self,
        id: CombatantId,
        key: &str,
    ) -> Result<TraitActivation, EncounterError> {
        let c = self.require(id)?;
        if c.is_dead() {
            return Err(EncounterError::illegal(format!("{} is dead", c.name)));
        }
        let key = key.trim();
        let found = c
            .traits
            .iter()
            .find(|t| t.id == key || t.name.eq_ignore_ascii_case(key))
            .or_else(|| {
                let n: usize = key.parse().ok()?;
                c.traits.get(n.checked_sub(1)?)
            })
            .ok_or_else(|| EncounterError::invalid(format!("{} has no trait {:?}", c.name, key)))?;
        let activation = found.action_type;
        let name = found.name.clone();

        let flag = match activation {
            TraitActivation::Action => Some(ActionFlag::Action),
            TraitActivation::BonusAction => Some(ActionFlag::BonusAction),
            TraitActivation::Reaction => Some(ActionFlag::Reaction),
            TraitActivation::Free => None,
        };

        let Self { roster, log, .. } = self;
        if let Some(flag) = flag {
            roster.try_update(id, |c| apply_flag(c, flag, true, log))?;
        }
        log.push(
            LogEntry::new(LogKind::TraitActivation, format!("activated trait: {}", name))
                .with_combatant(id)
                .with_details(format!("({})", activation)),
        );
        Ok(activation)
    }

    /// Roll free-form dice notation, e.g. from the dice tray
    pub fn roll_dice(&mut self, notation: &str) -> Result<RollResult, DiceError> {
        let roll = parse_dice(notation).inspect_err(|e| warn!("dice roll rejected: {}", e))?;
        let result = roll.roll_detailed(self.dice.as_mut());
        self.log.push(
            LogEntry::new(LogKind::Info, format!("rolled {}:", roll))
                .with_value(result.total)
                .with_details(format!("({})", result.breakdown())),
        );
        Ok(result)
    }

    // --- Rounds and initiative ---

    /// Start the next round.
    ///
    /// Dying combatants lose an opportunity if they skipped their save,
    /// then every combatant's flags reset and movement is recomputed from
    /// their status.
    pub fn advance_round(&mut self) -> u32 {
        let Self {
            roster,
            log,
            data,
            death_saves_enabled,
            round,
            ..
        } = self;
        let enabled = *death_saves_enabled;

        roster.update_all(|c| {
            if enabled {
                apply_round_attrition(c, log);
            }
            c.action_used = false;
            c.bonus_action_used = false;
            c.dash_used = false;
            c.reaction_used = false;
            c.has_made_death_save_this_round = false;
            c.is_movement_dashed = false;
            c.turn_completed = c.is_dying && !c.is_dead();
            recompute_movement(c, &data.statuses);
            recompute_turn(c);
        });

        let ended = *round;
        *round += 1;
        log.push(LogEntry::new(
            LogKind::Info,
            format!(
                "Round {} ended. Round {} initiated! All actions reset, movement restored.",
                ended, *round
            ),
        ));
        info!("Round {} started", *round);
        *round
    }

    /// Reroll initiative for everyone still fighting
    pub fn reroll_all(&mut self) {
        let Self {
            roster, log, dice, ..
        } = self;
        let snapshot = roster.snapshot();
        for (id, initiative) in plan_rerolls(&snapshot, dice.as_mut(), log) {
            if let Err(e) = roster.update(id, |c| c.initiative = initiative) {
                warn!("Initiative reroll skipped: {}", e);
            }
        }
        log.push(LogEntry::new(
            LogKind::Info,
            "All active combatants' initiatives rerolled.",
        ));
    }

    /// Set one combatant's initiative directly
    pub fn set_initiative(&mut self, id: CombatantId, initiative: i32) -> Result<(), EncounterError> {
        let Self { roster, log, .. } = self;
        warn_rejected(
            "set initiative",
            roster
                .update(id, |c| c.initiative = initiative)
                .map(|_| {
                    log.push(
                        LogEntry::new(LogKind::InitiativeSet, "initiative set to:")
                            .with_combatant(id)
                            .with_value(initiative),
                    )
                })
                .map_err(Into::into),
        )
    }

    // --- Sheet edits ---

    /// Rename a combatant; the record becomes custom
    pub fn rename(&mut self, id: CombatantId, name: &str) -> Result<(), EncounterError> {
        let name = name.trim().to_string();
        let result = if name.is_empty() {
            Err(EncounterError::invalid("name cannot be empty"))
        } else {
            let Self { roster, log, .. } = &mut *self;
            roster
                .update(id, |c| {
                    c.name = name.clone();
                    c.is_custom = true;
                })
                .map(|_| log.push(LogEntry::info(id, format!("renamed to {}.", name))))
                .map_err(Into::into)
        };
        warn_rejected("rename", result)
    }

    /// Set the display color, "#RRGGBB"
    pub fn set_color(&mut self, id: CombatantId, color: &str) -> Result<(), EncounterError> {
        let result = if COLOR.is_match(color) {
            self.roster
                .update(id, |c| c.color = color.to_uppercase())
                .map(|_| ())
                .map_err(Into::into)
        } else {
            Err(EncounterError::invalid(format!("not a #RRGGBB color: {}", color)))
        };
        warn_rejected("set color", result)
    }

    /// Pin or unpin the combatant's detail panel
    pub fn set_locked(&mut self, id: CombatantId, locked: bool) -> Result<(), EncounterError> {
        warn_rejected(
            "set locked",
            self.roster
                .update(id, |c| c.is_locked = locked)
                .map(|_| ())
                .map_err(Into::into),
        )
    }

    /// Give a combatant a new weapon attack
    pub fn add_custom_weapon(
        &mut self,
        id: CombatantId,
        weapon: CustomWeapon,
    ) -> Result<String, EncounterError> {
        let result = self.add_custom_weapon_inner(id, weapon);
        warn_rejected("add weapon", result)
    }

    fn add_custom_weapon_inner(
        &mut self,
        id: CombatantId,
        weapon: CustomWeapon,
    ) -> Result<String, EncounterError> {
        let name = weapon.name.trim();
        if name.is_empty() {
            return Err(EncounterError::invalid("weapon name cannot be empty"));
        }
        if !STANDARD_DICE.contains(&weapon.sides) {
            return Err(EncounterError::invalid(format!(
                "d{} is not an offered die",
                weapon.sides
            )));
        }
        if weapon.count == 0 || weapon.count > combat::MAX_DICE_COUNT {
            return Err(EncounterError::invalid("dice count out of range"));
        }

        let max = self.limits.max_custom_weapons;
        let attack = Attack {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            dice: DiceRoll::new(weapon.count, weapon.sides, weapon.modifier).to_string(),
            damage_type: weapon
                .damage_type
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            to_hit_modifier: weapon.to_hit_modifier,
            is_custom: true,
        };
        let attack_id = attack.id.clone();

        self.roster.try_update(id, |c| {
            if c.actions.len() >= max {
                return Err(EncounterError::invalid(format!(
                    "cannot carry more than {} weapons",
                    max
                )));
            }
            c.actions.push(attack);
            Ok(())
        })?;
        Ok(attack_id)
    }
}
