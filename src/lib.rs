//! battle-tracker - tabletop combat tracker
//!
//! Keeps one encounter's bookkeeping: initiative order, hit points with
//! dying and death saves, the per-round action economy, status effects
//! and the loot and XP gathered from defeated combatants.

pub mod combat;
pub mod config;
pub mod console;
pub mod data;
pub mod encounter;
pub mod error;
pub mod ledger;
pub mod roster;

pub use config::TrackerConfig;
pub use data::ReferenceData;
pub use encounter::Encounter;
pub use error::EncounterError;
