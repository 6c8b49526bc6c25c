//! Combat log
//!
//! Every state transition, roll and ledger movement appends one entry.
//! The log is the user-facing record of the encounter; diagnostics go
//! through `tracing` instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::combatant::CombatantId;

/// Category of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Info,
    HpChange,
    DeathSave,
    MovementChange,
    InitiativeRoll,
    InitiativeSet,
    AbilityCheck,
    ToHit,
    Damage,
    TraitActivation,
    Loot,
    LootRestore,
}

/// Direction of an HP adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HpChangeKind {
    Heal,
    Damage,
}

/// One line of the combat log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    pub combatant: Option<CombatantId>,
    pub message: String,
    pub value: Option<i64>,
    pub details: Option<String>,
    pub is_crit: bool,
    pub hp_change: Option<HpChangeKind>,
}

impl LogEntry {
    /// Create a new entry stamped with the current time
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            combatant: None,
            message: message.into(),
            value: None,
            details: None,
            is_crit: false,
            hp_change: None,
        }
    }

    /// Shorthand for an informational entry about one combatant
    pub fn info(combatant: CombatantId, message: impl Into<String>) -> Self {
        Self::new(LogKind::Info, message).with_combatant(combatant)
    }

    pub fn with_combatant(mut self, combatant: CombatantId) -> Self {
        self.combatant = Some(combatant);
        self
    }

    pub fn with_value(mut self, value: impl Into<i64>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn critical(mut self, is_crit: bool) -> Self {
        self.is_crit = is_crit;
        self
    }

    pub fn with_hp_change(mut self, change: HpChangeKind) -> Self {
        self.hp_change = Some(change);
        self
    }

    /// Message, value and details joined for display
    pub fn text(&self) -> String {
        let mut text = self.message.clone();
        if let Some(value) = self.value {
            text.push(' ');
            text.push_str(&value.to_string());
        }
        if let Some(details) = &self.details {
            text.push(' ');
            text.push_str(details);
        }
        text
    }
}

/// Append-only encounter log
#[derive(Debug, Clone, Default)]
pub struct CombatLog {
    entries: Vec<LogEntry>,
}

impl CombatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn push(&mut self, entry: LogEntry) {
        debug!(kind = ?entry.kind, combatant = ?entry.combatant, "{}", entry.text());
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// The most recent `n` entries, oldest first
    pub fn tail(&self, n: usize) -> &[LogEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Entries of one kind
    pub fn of_kind(&self, kind: LogKind) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    /// Entries about one combatant
    pub fn for_combatant(&self, id: CombatantId) -> impl Iterator<Item = &LogEntry> {
        self.entries
            .iter()
            .filter(move |e| e.combatant == Some(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
