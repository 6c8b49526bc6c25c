//! Loot pool, XP pool and undo buffer
//!
//! Removing a combatant with loot moves its XP and items into the pools
//! and keeps a snapshot in a bounded undo buffer. Restoring the snapshot
//! reverses exactly what the removal added.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::combat::{Combatant, CombatantId, Item};

/// Default number of removed combatants kept for undo
pub const UNDO_CAPACITY: usize = 20;

/// Items stack when name, unit and custom flag all match
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LootKey {
    pub name: String,
    pub unit: Option<String>,
    pub is_custom: bool,
}

impl LootKey {
    pub fn of(item: &Item) -> Self {
        Self {
            name: item.name.clone(),
            unit: item.unit.clone(),
            is_custom: item.is_custom,
        }
    }
}

/// One row of the loot pool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LootEntry {
    pub id: Uuid,
    pub item: Item,
    /// Combatant whose removal created the row
    pub source: CombatantId,
}

impl LootEntry {
    fn key(&self) -> LootKey {
        LootKey::of(&self.item)
    }
}

/// Loot rows grouped for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LootLine {
    pub key: LootKey,
    /// Sum over stacked rows; `None` when no row carries a quantity
    pub quantity: Option<u32>,
    /// Rows without a quantity
    pub loose: usize,
}

/// Ordered pool of looted items
#[derive(Debug, Clone, Default)]
pub struct LootPool {
    entries: Vec<LootEntry>,
}

impl LootPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LootEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add one item; quantities stack, unquantified items get their own row
    pub fn add(&mut self, item: &Item, source: CombatantId) {
        if let Some(quantity) = item.stack_quantity() {
            let key = LootKey::of(item);
            if let Some(entry) = self
                .entries
                .iter_mut()
                .find(|e| e.item.stack_quantity().is_some() && e.key() == key)
            {
                let total = entry.item.quantity.unwrap_or(0).saturating_add(quantity);
                entry.item.quantity = Some(total);
                return;
            }
        }

        self.entries.push(LootEntry {
            id: Uuid::new_v4(),
            item: Item {
                id: Uuid::new_v4().to_string(),
                ..item.clone()
            },
            source,
        });
    }

    /// Exact inverse of [`LootPool::add`] for the same item and source
    pub fn remove(&mut self, item: &Item, source: CombatantId) {
        let key = LootKey::of(item);

        if let Some(quantity) = item.stack_quantity() {
            if let Some(i) = self
                .entries
                .iter()
                .position(|e| e.item.stack_quantity().is_some() && e.key() == key)
            {
                let left = self.entries[i].item.quantity.unwrap_or(0).saturating_sub(quantity);
                if left == 0 {
                    self.entries.remove(i);
                } else {
                    self.entries[i].item.quantity = Some(left);
                }
            }
            return;
        }

        let loose = |e: &LootEntry| e.item.stack_quantity().is_none() && e.key() == key;
        let position = self
            .entries
            .iter()
            .position(|e| loose(e) && e.source == source)
            .or_else(|| self.entries.iter().position(loose));
        if let Some(i) = position {
            self.entries.remove(i);
        }
    }

    /// Rows grouped by key, in order of first appearance
    pub fn grouped(&self) -> Vec<LootLine> {
        let mut lines: Vec<LootLine> = Vec::new();
        for entry in &self.entries {
            let key = entry.key();
            let line = match lines.iter().position(|l| l.key == key) {
                Some(i) => &mut lines[i],
                None => {
                    lines.push(LootLine {
                        key,
                        quantity: None,
                        loose: 0,
                    });
                    let last = lines.len() - 1;
                    &mut lines[last]
                }
            };
            match entry.item.stack_quantity() {
                Some(q) => line.quantity = Some(line.quantity.unwrap_or(0) + q),
                None => line.loose += 1,
            }
        }
        lines
    }
}

/// A removed combatant held for undo
#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    pub combatant: Combatant,
    pub was_looted: bool,
}

/// Bounded FIFO of removed combatants; the oldest entry is evicted silently
#[derive(Debug, Clone)]
pub struct UndoBuffer {
    entries: VecDeque<UndoEntry>,
    capacity: usize,
}

impl Default for UndoBuffer {
    fn default() -> Self {
        Self::new(UNDO_CAPACITY)
    }
}

impl UndoBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, returning the one evicted to make room
    pub fn push(&mut self, entry: UndoEntry) -> Option<UndoEntry> {
        if self.capacity == 0 {
            return Some(entry);
        }
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        if let Some(old) = &evicted {
            debug!("Undo buffer full, dropping {}", old.combatant.name);
        }
        self.entries.push_back(entry);
        evicted
    }

    pub fn get(&self, id: CombatantId) -> Option<&UndoEntry> {
        self.entries.iter().find(|e| e.combatant.id == id)
    }

    /// Remove and return the entry for `id`
    pub fn take(&mut self, id: CombatantId) -> Option<UndoEntry> {
        let i = self.entries.iter().position(|e| e.combatant.id == id)?;
        self.entries.remove(i)
    }

    /// Oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &UndoEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Loot and XP accumulated from removed combatants
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    loot: LootPool,
    xp: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loot(&self) -> &LootPool {
        &self.loot
    }

    pub fn xp(&self) -> u64 {
        self.xp
    }

    /// Credit a removed combatant's XP and items
    pub fn credit(&mut self, c: &Combatant) {
        self.xp = self.xp.saturating_add(c.xp);
        for item in &c.items {
            self.loot.add(item, c.id);
        }
    }

    /// Reverse [`Ledger::credit`]; XP floors at zero
    pub fn reverse(&mut self, c: &Combatant) {
        self.xp = self.xp.saturating_sub(c.xp);
        for item in &c.items {
            self.loot.remove(item, c.id);
        }
    }
}
