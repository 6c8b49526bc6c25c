//! Encounter errors
//!
//! Every error is local and recoverable: the operation that produced it
//! left the encounter exactly as it was.

use thiserror::Error;

use crate::combat::CombatantId;
use crate::roster::RosterError;

/// Rejections reported by encounter operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncounterError {
    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error("cannot add {requested} at once (limit {max})")]
    BatchTooLarge { requested: u32, max: u32 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("illegal transition: {0}")]
    IllegalTransition(String),

    #[error("unknown monster template: {0}")]
    UnknownTemplate(String),

    #[error("combatant {0} is not in the undo buffer")]
    NotInUndoBuffer(CombatantId),
}

impl EncounterError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        EncounterError::InvalidInput(message.into())
    }

    pub(crate) fn illegal(message: impl Into<String>) -> Self {
        EncounterError::IllegalTransition(message.into())
    }

    /// True for roster capacity and batch-size rejections
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            EncounterError::Roster(RosterError::CapacityExceeded { .. })
                | EncounterError::BatchTooLarge { .. }
        )
    }
}
