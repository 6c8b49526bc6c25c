//! Ledger scenario tests
//!
//! Loot pool, XP pool and the undo buffer

use battle_tracker::combat::{LogKind, Status};
use battle_tracker::config::{Limits, TrackerConfig};
use battle_tracker::encounter::HpAdjustment;
use battle_tracker::ledger::LootLine;
use battle_tracker::EncounterError;

use crate::harness::TestEncounter;

fn line<'a>(lines: &'a [LootLine], name: &str) -> &'a LootLine {
    lines
        .iter()
        .find(|l| l.key.name == name)
        .unwrap_or_else(|| panic!("no {} in pool", name))
}

/// Test: looting credits XP and stacks items by name and unit
#[test]
fn test_remove_and_loot() {
    let mut t = TestEncounter::new([10]);
    let goblins = t.monsters("goblin", 2);

    t.remove_and_loot(goblins[0]).unwrap();
    t.remove_and_loot(goblins[1]).unwrap();

    assert_eq!(t.xp_pool(), 100);
    assert_eq!(t.roster().len(), 0);

    let lines = t.grouped_loot();
    assert_eq!(line(&lines, "Gold").quantity, Some(10));
    assert_eq!(line(&lines, "Potion of Healing").quantity, Some(2));
    assert_eq!(line(&lines, "Shield").loose, 2);
    assert_eq!(line(&lines, "Leather Armor").quantity, None);

    assert_eq!(
        t.messages(LogKind::Loot),
        [
            "Items from Goblin added to loot pool.",
            "Items from Goblin added to loot pool."
        ]
    );
    assert_eq!(t.undo_buffer().len(), 2);
    assert!(t.undo_buffer().iter().all(|e| e.was_looted));
}

/// Test: restore reverses exactly what its removal added
#[test]
fn test_loot_round_trip() {
    let mut t = TestEncounter::new([10]);
    let goblins = t.monsters("goblin", 3);
    let orc = t.monsters("orc", 1)[0];

    t.remove_and_loot(goblins[0]).unwrap();
    let xp_before = t.xp_pool();
    let loot_before = t.grouped_loot();

    t.remove_and_loot(goblins[1]).unwrap();
    t.remove_and_loot(orc).unwrap();
    t.delete(goblins[2]).unwrap();
    t.restore(goblins[1]).unwrap();
    t.restore(orc).unwrap();

    assert_eq!(t.xp_pool(), xp_before);
    assert_eq!(t.grouped_loot(), loot_before);
    assert_eq!(
        t.messages(LogKind::LootRestore),
        [
            "Items from Goblin removed from loot pool.",
            "Items from Orc removed from loot pool."
        ]
    );
}

/// Test: a restored combatant comes back ready to fight
#[test]
fn test_restore_is_combat_ready() {
    let mut t = TestEncounter::with_death_saves([10]);
    let goblin = t.monsters("goblin", 1)[0];
    t.adjust_hp(goblin, HpAdjustment::Damage(9)).unwrap();
    t.set_removed_from_combat(goblin, true).unwrap();
    assert!(t.get(goblin).is_dying);

    t.remove_and_loot(goblin).unwrap();
    assert!(!t.roster().contains(goblin));

    t.restore(goblin).unwrap();
    let c = t.get(goblin);
    assert_eq!(c.status, Status::Active);
    assert_eq!(c.hp, 1);
    assert!(!c.is_dying);
    assert!(!c.removed_from_combat);
    assert!(!c.turn_completed);
    assert!(!c.action_used);
    assert_eq!(c.current_movement, 30);
    assert!(t.logged(goblin, "restored from undo list."));
    assert_eq!(t.xp_pool(), 0);
    assert!(t.loot_pool().is_empty());
    assert!(t.undo_buffer().is_empty());
}

/// Test: delete keeps the pools untouched
#[test]
fn test_delete_and_restore() {
    let mut t = TestEncounter::new([10]);
    let goblin = t.monsters("goblin", 1)[0];

    t.delete(goblin).unwrap();
    assert_eq!(t.xp_pool(), 0);
    assert!(t.loot_pool().is_empty());
    assert!(!t.undo_buffer().get(goblin).unwrap().was_looted);

    t.restore(goblin).unwrap();
    assert_eq!(t.roster().len(), 1);
    assert!(t.messages(LogKind::LootRestore).is_empty());
}

/// Test: the undo buffer keeps the 20 most recent removals
#[test]
fn test_undo_buffer_evicts_oldest() {
    let mut t = TestEncounter::new([10]);
    let ids: Vec<_> = (0..21).map(|i| t.player(&format!("P{}", i), 10)).collect();
    for id in &ids {
        t.delete(*id).unwrap();
    }

    assert_eq!(t.undo_buffer().len(), 20);
    assert_eq!(
        t.restore(ids[0]),
        Err(EncounterError::NotInUndoBuffer(ids[0]))
    );
    t.restore(ids[20]).unwrap();
    t.restore(ids[1]).unwrap();
    assert_eq!(t.undo_buffer().len(), 18);
}

/// Test: restore is refused while the roster is full, and can be retried
#[test]
fn test_restore_respects_capacity() {
    let config = TrackerConfig {
        limits: Limits {
            max_total_combatants: 2,
            ..Limits::default()
        },
        ..TrackerConfig::default()
    };
    let mut t = TestEncounter::with_config(config, [10]);
    let a = t.player("A", 10);
    t.player("B", 10);

    t.remove_and_loot(a).unwrap();
    t.player("C", 10);

    let err = t.restore(a).unwrap_err();
    assert!(err.is_capacity());
    assert!(t.undo_buffer().get(a).is_some());
    assert_eq!(t.roster().len(), 2);

    let c = t.roster().iter().find(|c| c.name == "C").unwrap().id;
    t.delete(c).unwrap();
    t.restore(a).unwrap();
    assert!(t.undo_buffer().get(a).is_none());
}

/// Test: XP in the pool never goes negative
#[test]
fn test_xp_floor() {
    let mut t = TestEncounter::new([10]);
    let ogre = t.monsters("ogre", 1)[0];
    t.remove_and_loot(ogre).unwrap();
    assert_eq!(t.xp_pool(), 450);

    t.restore(ogre).unwrap();
    assert_eq!(t.xp_pool(), 0);
}
