//! Combatant entity store
//!
//! An ordered, copy-on-write collection of combatants:
//! - Readers take a [`Roster::snapshot`] and never see a half-applied change
//! - A mutation clones only what a reader still shares
//! - An id -> position index keeps lookups off the hot path
//! - A hard ceiling on the number of combatants, enforced before any change

mod naming;
mod templates;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::combat::{Combatant, CombatantId};

pub use naming::{generate_unique_name, NamePool, NameTable, UsedNames, UNIQUE_NAME_ATTEMPTS};
pub use templates::{
    build_batch, Batch, BatchContext, BatchOptions, MonsterTemplate, MAX_ADD_QUANTITY,
};

/// Default ceiling on combatants in one encounter
pub const MAX_TOTAL_COMBATANTS: usize = 40;

/// Roster rejections; the roster is unchanged when one is returned
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("roster full: {current} + {requested} would exceed {max} combatants")]
    CapacityExceeded {
        current: usize,
        requested: usize,
        max: usize,
    },

    #[error("unknown combatant {0}")]
    UnknownCombatant(CombatantId),

    #[error("combatant {0} is already in the roster")]
    DuplicateId(CombatantId),
}

/// Ordered combatant collection
#[derive(Debug, Clone)]
pub struct Roster {
    combatants: Arc<Vec<Arc<Combatant>>>,
    index: HashMap<CombatantId, usize>,
    max_total: usize,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new(MAX_TOTAL_COMBATANTS)
    }
}

impl Roster {
    /// Create an empty roster holding at most `max_total` combatants
    pub fn new(max_total: usize) -> Self {
        Self {
            combatants: Arc::new(Vec::new()),
            index: HashMap::new(),
            max_total,
        }
    }

    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }

    pub fn max_total(&self) -> usize {
        self.max_total
    }

    pub fn contains(&self, id: CombatantId) -> bool {
        self.index.contains_key(&id)
    }

    /// Get a combatant by id
    pub fn get(&self, id: CombatantId) -> Option<Arc<Combatant>> {
        self.index.get(&id).map(|&i| Arc::clone(&self.combatants[i]))
    }

    /// The whole collection as of now, in roster order
    pub fn snapshot(&self) -> Arc<Vec<Arc<Combatant>>> {
        Arc::clone(&self.combatants)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Combatant>> {
        self.combatants.iter()
    }

    /// Position in roster order
    pub fn position(&self, id: CombatantId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Fail if `requested` more combatants would not fit
    pub fn check_capacity(&self, requested: usize) -> Result<(), RosterError> {
        if self.len() + requested > self.max_total {
            return Err(RosterError::CapacityExceeded {
                current: self.len(),
                requested,
                max: self.max_total,
            });
        }
        Ok(())
    }

    /// Append one combatant
    pub fn add(&mut self, combatant: Combatant) -> Result<CombatantId, RosterError> {
        self.check_capacity(1)?;
        if self.contains(combatant.id) {
            return Err(RosterError::DuplicateId(combatant.id));
        }

        let id = combatant.id;
        let combatants = Arc::make_mut(&mut self.combatants);
        self.index.insert(id, combatants.len());
        combatants.push(Arc::new(combatant));
        Ok(id)
    }

    /// Append several combatants, all or none
    pub fn add_batch(&mut self, batch: Vec<Combatant>) -> Result<Vec<CombatantId>, RosterError> {
        self.check_capacity(batch.len())?;

        let mut seen = std::collections::HashSet::with_capacity(batch.len());
        for c in &batch {
            if self.contains(c.id) || !seen.insert(c.id) {
                return Err(RosterError::DuplicateId(c.id));
            }
        }

        let combatants = Arc::make_mut(&mut self.combatants);
        let mut ids = Vec::with_capacity(batch.len());
        for c in batch {
            self.index.insert(c.id, combatants.len());
            ids.push(c.id);
            combatants.push(Arc::new(c));
        }
        Ok(ids)
    }

    /// Apply an infallible patch to one combatant
    pub fn update<F>(&mut self, id: CombatantId, patch: F) -> Result<Arc<Combatant>, RosterError>
    where
        F: FnOnce(&mut Combatant),
    {
        self.try_update(id, |c| {
            patch(c);
            Ok::<_, RosterError>(())
        })?;
        self.get(id).ok_or(RosterError::UnknownCombatant(id))
    }

    /// Apply a fallible patch to one combatant.
    ///
    /// The patch works on a private copy, committed only when it returns Ok.
    pub fn try_update<F, T, E>(&mut self, id: CombatantId, patch: F) -> Result<T, E>
    where
        F: FnOnce(&mut Combatant) -> Result<T, E>,
        E: From<RosterError>,
    {
        let position = self.position(id).ok_or(RosterError::UnknownCombatant(id))?;

        let mut draft = Combatant::clone(&self.combatants[position]);
        let value = patch(&mut draft)?;

        Arc::make_mut(&mut self.combatants)[position] = Arc::new(draft);
        Ok(value)
    }

    /// Apply a patch to every combatant, in roster order
    pub fn update_all<F>(&mut self, mut patch: F)
    where
        F: FnMut(&mut Combatant),
    {
        for slot in Arc::make_mut(&mut self.combatants).iter_mut() {
            patch(Arc::make_mut(slot));
        }
    }

    /// Take a combatant out of the roster
    pub fn remove(&mut self, id: CombatantId) -> Result<Arc<Combatant>, RosterError> {
        let position = self.position(id).ok_or(RosterError::UnknownCombatant(id))?;
        let removed = Arc::make_mut(&mut self.combatants).remove(position);
        self.rebuild_index();
        Ok(removed)
    }

    /// Put a previously removed combatant back at the end of the roster
    pub fn restore(&mut self, snapshot: Combatant) -> Result<CombatantId, RosterError> {
        self.add(snapshot)
    }

    /// Move `id` so it sits immediately before `before`; `None` moves it to the end
    pub fn reorder(
        &mut self,
        id: CombatantId,
        before: Option<CombatantId>,
    ) -> Result<(), RosterError> {
        let from = self.position(id).ok_or(RosterError::UnknownCombatant(id))?;
        let to = match before {
            Some(target) if target == id => return Ok(()),
            Some(target) => {
                let at = self
                    .position(target)
                    .ok_or(RosterError::UnknownCombatant(target))?;
                // The target shifts left once the mover is taken out ahead of it
                if at > from {
                    at - 1
                } else {
                    at
                }
            }
            None => self.len() - 1,
        };

        let combatants = Arc::make_mut(&mut self.combatants);
        let moving = combatants.remove(from);
        combatants.insert(to, moving);
        self.rebuild_index();
        Ok(())
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .combatants
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id, i))
            .collect();
    }
}
