//! Line-oriented command console
//!
//! Parses one command per line and runs it against an [`Encounter`].
//! Combatants are named by their position in the initiative order
//! (1-based) or by a case-insensitive name prefix.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::debug;

use crate::combat::{
    parse_dice, Ability, ActionFlag, Combatant, CombatantId, LogEntry, Status,
};
use crate::encounter::{CustomWeapon, Encounter, HpAdjustment, NewPlayer};
use crate::roster::BatchOptions;

const HELP: &str = "\
Combatants:  add-player <name> <max-hp> [initiative]
             add <template> [qty] [shared[=N]] [unique] [roll-hp] [rand-ac] [rand-weapons] [rand-stats]
             rename <who> <name>   color <who> <#RRGGBB>   lock|unlock <who>
             weapon <who> <name> <NdS[+M]> [to-hit] [damage-type]
HP/status:   hp <who> <n>   heal <who> <n>   dmg <who> <n>   status <who> <key>
             save <who>   deathsaves on|off
Turn:        use <who> <action|bonus|dash|reaction> [off]   done <who> [off]   reset <who>
             move <who> <n|+n|-n>   out <who>   back <who>
Rolls:       check <who> <ability>   attack <who> <attack>   damage <who> <attack> [crit]
             trait <who> <trait>   roll <notation>   init <who> <n>
Rounds:      next   reroll   order   before <who> <target|end>
Loot:        loot <who>   delete <who>   undo [name]   pool
Info:        show <who>   export <who>   log [n]   templates   statuses   help   quit";

/// What the caller should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Output(String),
    Quit,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Reply::Output(text.into())
    }
}

/// Command console bound to one encounter
pub struct Console {
    encounter: Encounter,
}

impl Console {
    pub fn new(encounter: Encounter) -> Self {
        Self { encounter }
    }

    pub fn encounter(&self) -> &Encounter {
        &self.encounter
    }

    /// Run one command line
    pub fn execute(&mut self, line: &str) -> Reply {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            return Reply::text("");
        }

        let verb = parts[0].to_lowercase();
        let args = &parts[1..];
        debug!("Console command: {} {:?}", verb, args);

        let log_mark = self.encounter.log().len();
        let result = match verb.as_str() {
            "help" | "?" => Ok(HELP.to_string()),
            "quit" | "exit" | "q" => return Reply::Quit,
            "add-player" | "player" => self.add_player(args),
            "add" => self.add_monsters(args),
            "hp" => self.set_hp(args),
            "heal" => self.adjust_hp(args, true),
            "dmg" => self.adjust_hp(args, false),
            "status" => self.set_status(args),
            "save" => self.death_save(args),
            "deathsaves" => self.toggle_death_saves(args),
            "use" => self.use_flag(args),
            "done" => self.turn_done(args),
            "reset" => self.reset_actions(args),
            "move" => self.movement(args),
            "out" | "back" => self.set_out(args, verb == "out"),
            "check" => self.ability_check(args),
            "attack" => self.attack(args),
            "damage" => self.damage(args),
            "trait" => self.activate_trait(args),
            "roll" => self.roll(args),
            "init" => self.set_initiative(args),
            "next" => {
                self.encounter.advance_round();
                Ok(self.render_order())
            }
            "reroll" => {
                self.encounter.reroll_all();
                Ok(self.render_order())
            }
            "order" => Ok(self.render_order()),
            "before" => self.reorder(args),
            "loot" => self.loot(args),
            "delete" => self.delete(args),
            "undo" => self.undo(args),
            "pool" => Ok(self.render_pool()),
            "rename" => self.rename(args),
            "color" => self.set_color(args),
            "lock" | "unlock" => self.set_locked(args, verb == "lock"),
            "weapon" => self.add_weapon(args),
            "show" => self.who(args, 0).map(|id| self.render_sheet(id)),
            "export" => self.export(args),
            "log" => Ok(self.render_log(args)),
            "templates" => Ok(self.render_templates()),
            "statuses" => Ok(self.render_statuses()),
            _ => Err(format!("Unknown command: {} (try help)", verb)),
        };

        match result {
            Ok(text) => {
                let mut out = self.new_log_lines(log_mark);
                if !text.is_empty() {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(&text);
                }
                Reply::Output(out)
            }
            Err(e) => Reply::Output(format!("Error: {}", e)),
        }
    }

    // --- Argument helpers ---

    /// Resolve the combatant named by `args[at]`
    fn who(&self, args: &[&str], at: usize) -> Result<CombatantId, String> {
        let key = args.get(at).ok_or("missing combatant")?;
        resolve(&self.encounter.initiative_order(), key)
    }

    fn number<T: std::str::FromStr>(args: &[&str], at: usize, what: &str) -> Result<T, String> {
        let raw = args.get(at).ok_or_else(|| format!("missing {}", what))?;
        raw.parse()
            .map_err(|_| format!("{} must be a number, got {:?}", what, raw))
    }

    // --- Commands ---

    fn add_player(&mut self, args: &[&str]) -> Result<String, String> {
        let name = args.first().ok_or("missing name")?;
        let max_hp: i32 = Self::number(args, 1, "max HP")?;
        let mut player = NewPlayer::new(*name, max_hp);
        if args.len() > 2 {
            player = player.with_initiative(Self::number(args, 2, "initiative")?);
        }
        self.encounter
            .add_player(player)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn add_monsters(&mut self, args: &[&str]) -> Result<String, String> {
        let template = args.first().ok_or("missing template")?;
        let mut options = BatchOptions::default();
        let mut rest = &args[1..];
        if let Some(qty) = rest.first().and_then(|q| q.parse::<u32>().ok()) {
            options.quantity = qty;
            rest = &rest[1..];
        }
        for flag in rest {
            match flag.split_once('=') {
                Some(("shared", value)) => {
                    let value = value
                        .parse()
                        .map_err(|_| format!("shared initiative must be a number, got {:?}", value))?;
                    options = options.shared(Some(value));
                }
                _ => match *flag {
                    "shared" => options = options.shared(None),
                    "unique" => options.unique_names = true,
                    "roll-hp" => options.roll_hp = true,
                    "rand-ac" => options.randomize_ac = true,
                    "rand-weapons" => options.randomize_weapons = true,
                    "rand-stats" => options.randomize_stats = true,
                    other => return Err(format!("unknown option: {}", other)),
                },
            }
        }
        self.encounter
            .add_monsters(template, &options)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn set_hp(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        let hp = Self::number(args, 1, "HP")?;
        self.encounter
            .set_hp(id, hp)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn adjust_hp(&mut self, args: &[&str], heal: bool) -> Result<String, String> {
        let id = self.who(args, 0)?;
        let amount = Self::number(args, 1, "amount")?;
        let adjustment = if heal {
            HpAdjustment::Heal(amount)
        } else {
            HpAdjustment::Damage(amount)
        };
        self.encounter
            .adjust_hp(id, adjustment)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn set_status(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        let key = args.get(1).ok_or("missing status")?;
        self.encounter
            .set_status(id, Status::from_key(key))
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn death_save(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        self.encounter
            .roll_death_save(id)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn toggle_death_saves(&mut self, args: &[&str]) -> Result<String, String> {
        let enabled = match args.first().copied() {
            Some("on") => true,
            Some("off") => false,
            _ => {
                return Ok(format!(
                    "Death saves are {}",
                    if self.encounter.death_saves_enabled() { "on" } else { "off" }
                ))
            }
        };
        self.encounter.set_death_saves_enabled(enabled);
        Ok(String::new())
    }

    fn use_flag(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        let flag: ActionFlag = args
            .get(1)
            .ok_or("missing flag")?
            .parse()
            .map_err(|e: crate::error::EncounterError| e.to_string())?;
        let value = args.get(2) != Some(&"off");
        self.encounter
            .set_flag(id, flag, value)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn turn_done(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        let value = args.get(1) != Some(&"off");
        self.encounter
            .set_turn_completed(id, value)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn reset_actions(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        self.encounter
            .reset_actions(id)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn set_out(&mut self, args: &[&str], out: bool) -> Result<String, String> {
        let id = self.who(args, 0)?;
        self.encounter
            .set_removed_from_combat(id, out)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn movement(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        let raw = args.get(1).ok_or("missing movement")?;
        let result = if raw.starts_with('+') || raw.starts_with('-') {
            let delta: i32 = raw
                .parse()
                .map_err(|_| format!("movement must be a number, got {:?}", raw))?;
            self.encounter.adjust_movement(id, delta)
        } else {
            let feet: i64 = Self::number(args, 1, "movement")?;
            self.encounter.set_movement(id, feet)
        };
        result.map(|_| String::new()).map_err(|e| e.to_string())
    }

    fn ability_check(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        let raw = args.get(1).ok_or("missing ability")?;
        let ability: Ability = raw
            .parse()
            .map_err(|_| format!("unknown ability: {}", raw))?;
        self.encounter
            .roll_ability_check(id, ability)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn attack(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        let attack = args.get(1..).map(|a| a.join(" ")).unwrap_or_default();
        let roll = self
            .encounter
            .roll_to_hit(id, &attack)
            .map_err(|e| e.to_string())?;
        Ok(if roll.critical {
            "Natural 20!".to_string()
        } else if roll.fumble {
            "Natural 1.".to_string()
        } else {
            String::new()
        })
    }

    fn damage(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        let mut words = args.get(1..).unwrap_or_default().to_vec();
        let critical = words.last() == Some(&"crit");
        if critical {
            words.pop();
        }
        self.encounter
            .roll_damage(id, &words.join(" "), critical)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn activate_trait(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        let name = args.get(1..).map(|a| a.join(" ")).unwrap_or_default();
        self.encounter
            .activate_trait(id, &name)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn roll(&mut self, args: &[&str]) -> Result<String, String> {
        self.encounter
            .roll_dice(&args.join(""))
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn set_initiative(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        let value = Self::number(args, 1, "initiative")?;
        self.encounter
            .set_initiative(id, value)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn reorder(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        let before = match args.get(1).copied() {
            Some("end") => None,
            Some(_) => Some(self.who(args, 1)?),
            None => return Err("missing target".into()),
        };
        self.encounter
            .reorder(id, before)
            .map(|_| self.render_order())
            .map_err(|e| e.to_string())
    }

    fn loot(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        self.encounter
            .remove_and_loot(id)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn delete(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        self.encounter
            .delete(id)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn undo(&mut self, args: &[&str]) -> Result<String, String> {
        if args.is_empty() {
            let undo = self.encounter.undo_buffer();
            if undo.is_empty() {
                return Ok("Undo list is empty.".into());
            }
            let mut out = String::from("Undo list (oldest first):");
            for entry in undo.iter() {
                let _ = write!(
                    out,
                    "\n  {}{}",
                    entry.combatant.name,
                    if entry.was_looted { " (looted)" } else { "" }
                );
            }
            return Ok(out);
        }

        let name = args.join(" ");
        let id = self
            .encounter
            .undo_buffer()
            .iter()
            .rev()
            .find(|e| e.combatant.name.eq_ignore_ascii_case(&name))
            .map(|e| e.combatant.id)
            .ok_or_else(|| format!("{} is not in the undo list", name))?;
        self.encounter
            .restore(id)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn set_locked(&mut self, args: &[&str], locked: bool) -> Result<String, String> {
        let id = self.who(args, 0)?;
        self.encounter
            .set_locked(id, locked)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn rename(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        let name = args.get(1..).map(|a| a.join(" ")).unwrap_or_default();
        self.encounter
            .rename(id, &name)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn set_color(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        let color = args.get(1).ok_or("missing color")?;
        self.encounter
            .set_color(id, color)
            .map(|_| String::new())
            .map_err(|e| e.to_string())
    }

    fn add_weapon(&mut self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        let name = args.get(1).ok_or("missing weapon name")?;
        let dice = parse_dice(args.get(2).ok_or("missing damage dice")?).map_err(|e| e.to_string())?;
        let to_hit_modifier = match args.get(3) {
            Some(_) => Self::number(args, 3, "to-hit modifier")?,
            None => 0,
        };
        let weapon = CustomWeapon {
            name: name.to_string(),
            count: dice.count,
            sides: dice.sides,
            modifier: dice.modifier,
            damage_type: args.get(4..).map(|a| a.join(" ")),
            to_hit_modifier,
        };
        self.encounter
            .add_custom_weapon(id, weapon)
            .map(|_| format!("{} can now use {}", self.render_name(id), name))
            .map_err(|e| e.to_string())
    }

    fn export(&self, args: &[&str]) -> Result<String, String> {
        let id = self.who(args, 0)?;
        let c = self.encounter.get(id).ok_or("combatant vanished")?;
        serde_json::to_string_pretty(&*c).map_err(|e| e.to_string())
    }

    // --- Rendering ---

    fn render_name(&self, id: CombatantId) -> String {
        self.encounter
            .get(id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn new_log_lines(&self, mark: usize) -> String {
        let entries = self.encounter.log().entries();
        entries
            .get(mark..)
            .unwrap_or_default()
            .iter()
            .map(|e| self.render_entry(e))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_entry(&self, entry: &LogEntry) -> String {
        match entry.combatant {
            Some(id) => {
                let name = self
                    .encounter
                    .get(id)
                    .map(|c| c.name.clone())
                    .or_else(|| {
                        self.encounter
                            .undo_buffer()
                            .get(id)
                            .map(|u| u.combatant.name.clone())
                    })
                    .unwrap_or_else(|| "?".to_string());
                format!("{} {}", name, entry.text())
            }
            None => entry.text(),
        }
    }

    fn render_order(&self) -> String {
        let order = self.encounter.initiative_order();
        let mut out = format!(
            "Round {}{}",
            self.encounter.round(),
            if self.encounter.death_saves_enabled() {
                " (death saves on)"
            } else {
                ""
            }
        );
        for (i, c) in order.iter().enumerate() {
            let _ = write!(
                out,
                "\n{:>2}. {:<20} init {:>3}  HP {:>3}/{:<3} AC {:>2}  mv {:>3}ft  {:<12} {}",
                i + 1,
                c.name,
                c.initiative,
                c.hp,
                c.max_hp,
                c.ac,
                c.current_movement,
                c.status,
                flags(c)
            );
        }
        out
    }

    fn render_sheet(&self, id: CombatantId) -> String {
        let Some(c) = self.encounter.get(id) else {
            return String::new();
        };
        let mut out = format!(
            "{} ({} {}), {}\nHP {}/{}  AC {} (base {})  Movement {} ({}ft now)\nStatus {}",
            c.name,
            c.size.as_deref().unwrap_or(""),
            c.species,
            c.color,
            c.hp,
            c.max_hp,
            c.ac,
            c.base_ac,
            c.movement,
            c.current_movement,
            c.status
        );
        if c.is_dying && !c.is_dead() {
            let _ = write!(
                out,
                "  dying: {} successes, {} failures, {} opportunities left",
                c.death_successes,
                c.death_failures,
                c.death_save_opportunities.unwrap_or(0)
            );
        }
        let a = &c.abilities;
        let _ = write!(
            out,
            "\nSTR {} DEX {} CON {} INT {} WIS {} CHA {}",
            a.strength, a.dexterity, a.constitution, a.intelligence, a.wisdom, a.charisma
        );
        if let Some(roll) = c.last_ability_roll {
            let _ = write!(out, "  last {} check: {}", roll.ability, roll.total);
        }
        for (i, attack) in c.actions.iter().enumerate() {
            let _ = write!(
                out,
                "\n  {}. {} {:+} to hit, {} {}",
                i + 1,
                attack.name,
                attack.to_hit_modifier,
                if attack.dice.is_empty() { "-" } else { &attack.dice },
                attack.damage_type.as_deref().unwrap_or("")
            );
        }
        for t in &c.traits {
            let _ = write!(out, "\n  * {} ({})", t.name, t.action_type);
        }
        for item in &c.items {
            match item.stack_quantity() {
                Some(q) => {
                    let _ = write!(
                        out,
                        "\n  - {} x{} {}",
                        item.name,
                        q,
                        item.unit.as_deref().unwrap_or("")
                    );
                }
                None => {
                    let _ = write!(out, "\n  - {}", item.name);
                }
            }
        }
        out
    }

    fn render_log(&self, args: &[&str]) -> String {
        let n = args.first().and_then(|n| n.parse().ok()).unwrap_or(20);
        self.encounter
            .log()
            .tail(n)
            .iter()
            .map(|e| format!("[{}] {}", e.timestamp.format("%H:%M:%S"), self.render_entry(e)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_pool(&self) -> String {
        let mut out = format!("XP pool: {}", self.encounter.xp_pool());
        for line in self.encounter.grouped_loot() {
            let unit = line.key.unit.as_deref().unwrap_or("");
            if let Some(q) = line.quantity {
                let _ = write!(out, "\n  {} x{} {}", line.key.name, q, unit);
            }
            if line.loose > 0 {
                let _ = write!(out, "\n  {} ({} unstacked)", line.key.name, line.loose);
            }
        }
        out
    }

    fn render_templates(&self) -> String {
        self.encounter
            .data()
            .monsters
            .iter()
            .map(|m| {
                format!(
                    "{:<16} {:<12} HP {:>3}  AC {:>2}  CR {:<4} XP {}",
                    m.id,
                    m.name,
                    m.hp,
                    m.ac,
                    m.cr.as_deref().unwrap_or("-"),
                    m.xp
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_statuses(&self) -> String {
        let mut keys: Vec<&str> = self.encounter.data().statuses.keys().collect();
        keys.sort_unstable();
        keys.join(", ")
    }
}

fn flags(c: &Combatant) -> String {
    let mut out = String::new();
    for (set, mark) in [
        (c.action_used, 'A'),
        (c.bonus_action_used, 'B'),
        (c.dash_used, 'D'),
        (c.reaction_used, 'R'),
    ] {
        out.push(if set { mark } else { '.' });
    }
    if c.turn_completed {
        out.push_str(" done");
    }
    if c.removed_from_combat {
        out.push_str(" out");
    }
    out
}

/// Find a combatant by 1-based position or by name
fn resolve(order: &[Arc<Combatant>], key: &str) -> Result<CombatantId, String> {
    if let Ok(n) = key.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|i| order.get(i))
            .map(|c| c.id)
            .ok_or_else(|| format!("no combatant at position {}", n));
    }

    if let Some(c) = order.iter().find(|c| c.name.eq_ignore_ascii_case(key)) {
        return Ok(c.id);
    }

    let key = key.to_lowercase();
    let matches: Vec<_> = order
        .iter()
        .filter(|c| c.name.to_lowercase().starts_with(&key))
        .collect();
    match matches.as_slice() {
        [one] => Ok(one.id),
        [] => Err(format!("no combatant matches {:?}", key)),
        _ => Err(format!("{:?} matches {} combatants", key, matches.len())),
    }
}
