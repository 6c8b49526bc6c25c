//! Lifecycle scenario tests
//!
//! HP updates, dying, death saves and instant death

use battle_tracker::combat::{DeathSaveOutcome, LogKind, Status};
use battle_tracker::encounter::HpAdjustment;

use crate::harness::TestEncounter;

/// Test: 0 HP with death saves off kills outright
#[test]
fn test_instant_death_when_saves_disabled() {
    let mut t = TestEncounter::new([10]);
    let aria = t.player("Aria", 10);

    t.set_hp(aria, -3).unwrap();

    let c = t.get(aria);
    assert_eq!(c.status, Status::Dead);
    assert!(c.is_dying);
    assert_eq!(c.death_failures, 3);
    assert_eq!(c.death_save_opportunities, Some(0));
    assert!(c.turn_completed);
    assert_eq!(c.hp, -3);
}

/// Test: HP never drops below -max HP
#[test]
fn test_hp_floor_is_negative_max() {
    let mut t = TestEncounter::new([10]);
    let aria = t.player("Aria", 10);
    t.set_hp(aria, -50).unwrap();
    assert_eq!(t.get(aria).hp, -10);

    let mut t = TestEncounter::with_death_saves([10]);
    let borin = t.player("Borin", 10);
    t.adjust_hp(borin, HpAdjustment::Damage(200)).unwrap();
    let c = t.get(borin);
    assert_eq!(c.hp, -10);
    assert_eq!(c.status, Status::Dead);
    assert!(t.logged(borin, "suffered instant death!"));
}

/// Test: dropping to 0 with saves on starts dying; healing ends it
#[test]
fn test_dying_and_recovery() {
    let mut t = TestEncounter::with_death_saves([10]);
    let aria = t.player("Aria", 10);

    t.adjust_hp(aria, HpAdjustment::Damage(12)).unwrap();
    let c = t.get(aria);
    assert_eq!(c.hp, -2);
    assert_eq!(c.status, Status::Unconscious);
    assert!(c.is_dying);
    assert_eq!(c.death_save_opportunities, Some(4));
    assert!(c.turn_completed);
    assert!(t.logged(aria, "dropped to 0 HP and is now unconscious/dying."));

    t.adjust_hp(aria, HpAdjustment::Heal(5)).unwrap();
    let c = t.get(aria);
    assert_eq!(c.hp, 3);
    assert_eq!(c.status, Status::Active);
    assert!(!c.is_dying);
    assert_eq!(c.death_save_opportunities, None);
    assert!(!c.turn_completed);
    assert!(t.logged(aria, "is no longer dying and is now active."));
}

/// Test: skipping saves until opportunities run out kills
#[test]
fn test_round_attrition_kills() {
    let mut t = TestEncounter::with_death_saves([10]);
    let aria = t.player("Aria", 10);
    t.set_hp(aria, 0).unwrap();

    for _ in 0..3 {
        t.advance_round();
    }
    let c = t.get(aria);
    assert_eq!(c.death_save_opportunities, Some(1));
    assert!(!c.has_made_death_save_this_round);
    assert_eq!(c.status, Status::Unconscious);
    assert!(c.turn_completed);

    t.advance_round();
    let c = t.get(aria);
    assert_eq!(c.death_save_opportunities, Some(0));
    assert_eq!(c.status, Status::Dead);
    assert_eq!(c.death_failures, 3);
    assert!(t.logged(aria, "ran out of death save opportunities and dies!"));
}

/// Test: a natural 1 counts as two failures
#[test]
fn test_natural_one_on_second_failure_kills() {
    let mut t = TestEncounter::with_death_saves([5, 1]);
    let aria = t.player("Aria", 10);
    t.set_hp(aria, 0).unwrap();

    assert_eq!(
        t.roll_death_save(aria).unwrap(),
        DeathSaveOutcome::Failure { failures: 1 }
    );
    // One save per round
    assert!(t.roll_death_save(aria).is_err());

    t.advance_round();
    assert_eq!(t.get(aria).death_save_opportunities, Some(3));

    assert_eq!(t.roll_death_save(aria).unwrap(), DeathSaveOutcome::Died);
    let c = t.get(aria);
    assert_eq!(c.death_failures, 3);
    assert_eq!(c.status, Status::Dead);

    let saves = t.log().of_kind(LogKind::DeathSave).collect::<Vec<_>>();
    assert_eq!(saves.len(), 2);
    assert_eq!(saves[1].value, Some(1));
    assert_eq!(saves[1].details.as_deref(), Some("Critical Failure! (3 failures)"));
}

/// Test: three successes stabilize at 1 HP whatever the failures
#[test]
fn test_three_successes_stabilize() {
    let mut t = TestEncounter::with_death_saves([5, 12, 20, 10]);
    let aria = t.player("Aria", 10);
    t.set_hp(aria, -4).unwrap();

    assert_eq!(
        t.roll_death_save(aria).unwrap(),
        DeathSaveOutcome::Failure { failures: 1 }
    );
    t.advance_round();
    assert_eq!(
        t.roll_death_save(aria).unwrap(),
        DeathSaveOutcome::Success { successes: 1 }
    );
    t.advance_round();
    assert_eq!(
        t.roll_death_save(aria).unwrap(),
        DeathSaveOutcome::Success { successes: 2 }
    );
    t.advance_round();
    assert_eq!(t.roll_death_save(aria).unwrap(), DeathSaveOutcome::Stabilized);

    let c = t.get(aria);
    assert_eq!(c.hp, 1);
    assert_eq!(c.status, Status::Active);
    assert!(!c.is_dying);
    assert_eq!(c.death_failures, 0);
    assert_eq!(c.death_successes, 0);
    assert_eq!(c.death_save_opportunities, None);
    assert!(!c.turn_completed);
    assert!(t.logged(aria, "is stable and conscious at 1 HP!"));
}

/// Test: no death saves while saves are off or the combatant is fine
#[test]
fn test_death_save_preconditions() {
    let mut t = TestEncounter::new([10]);
    let aria = t.player("Aria", 10);
    assert!(t.roll_death_save(aria).is_err());

    t.set_death_saves_enabled(true);
    assert!(t.roll_death_save(aria).is_err());

    t.set_hp(aria, 0).unwrap();
    assert!(t.roll_death_save(aria).is_ok());
}

/// Test: the dead stay dead under HP changes
#[test]
fn test_dead_cannot_be_healed() {
    let mut t = TestEncounter::new([10]);
    let aria = t.player("Aria", 10);
    t.set_hp(aria, 0).unwrap();
    let log_len = t.log().len();

    assert!(t.adjust_hp(aria, HpAdjustment::Heal(5)).is_err());
    assert!(t.set_hp(aria, 5).is_err());
    assert!(t.set_status(aria, Status::Active).is_err());

    let c = t.get(aria);
    assert_eq!(c.status, Status::Dead);
    assert_eq!(c.hp, 0);
    assert_eq!(t.log().len(), log_len);
}

/// Test: a combatant marked dead at positive HP can be revived
#[test]
fn test_revive_after_forced_death() {
    let mut t = TestEncounter::new([10]);
    let aria = t.player("Aria", 10);

    t.set_status(aria, Status::Dead).unwrap();
    assert!(t.get(aria).is_dead());

    t.set_status(aria, Status::Active).unwrap();
    let c = t.get(aria);
    assert_eq!(c.status, Status::Active);
    assert!(!c.is_dying);
    assert_eq!(c.death_failures, 0);
    assert!(t.logged(aria, "was revived and is now active."));
}

/// Test: forced unconsciousness at positive HP, then waking on an HP change
#[test]
fn test_forced_unconscious() {
    let mut t = TestEncounter::with_death_saves([10]);
    let aria = t.player("Aria", 10);

    t.set_status(aria, Status::Unconscious).unwrap();
    let c = t.get(aria);
    assert_eq!(c.status, Status::Unconscious);
    assert!(!c.is_dying);
    assert!(c.turn_completed);
    assert_eq!(c.current_movement, 0);

    t.set_hp(aria, 6).unwrap();
    let c = t.get(aria);
    assert_eq!(c.status, Status::Active);
    assert!(!c.turn_completed);
    assert!(t.logged(aria, "is no longer unconscious and is now active."));
}

/// Test: status effects drive current movement
#[test]
fn test_status_movement() {
    let mut t = TestEncounter::new([10]);
    let aria = t.player("Aria", 10);
    assert_eq!(t.get(aria).current_movement, 30);

    t.set_status(aria, Status::from_key("prone")).unwrap();
    assert_eq!(t.get(aria).current_movement, 15);

    t.set_status(aria, Status::from_key("Grappled")).unwrap();
    assert_eq!(t.get(aria).current_movement, 0);

    t.set_status(aria, Status::from_key("poisoned")).unwrap();
    assert_eq!(t.get(aria).current_movement, 30);

    t.set_status(aria, Status::from_key("hexed")).unwrap();
    assert_eq!(t.get(aria).current_movement, 30);
    assert_eq!(t.get(aria).status, Status::Custom("hexed".into()));

    t.set_status(aria, Status::Active).unwrap();
    assert_eq!(t.get(aria).current_movement, 30);
}

/// Test: dying combatants only accept unconscious or dead
#[test]
fn test_custom_status_rejected_while_dying() {
    let mut t = TestEncounter::with_death_saves([10]);
    let aria = t.player("Aria", 10);
    t.set_hp(aria, 0).unwrap();

    assert!(t.set_status(aria, Status::from_key("prone")).is_err());
    assert_eq!(t.get(aria).status, Status::Unconscious);

    t.set_status(aria, Status::Dead).unwrap();
    assert!(t.get(aria).is_dead());
}

/// Test: HP adjustments outside 1..=200 are rejected
#[test]
fn test_adjustment_bounds() {
    let mut t = TestEncounter::new([10]);
    let aria = t.player("Aria", 20);

    assert!(t.adjust_hp(aria, HpAdjustment::Damage(0)).is_err());
    assert!(t.adjust_hp(aria, HpAdjustment::Damage(201)).is_err());
    t.adjust_hp(aria, HpAdjustment::Damage(200)).unwrap();
    assert_eq!(t.get(aria).hp, -5);
}

/// Test: damage still lands on a combatant forced dead at positive HP
#[test]
fn test_damage_after_forced_death() {
    let mut t = TestEncounter::with_death_saves([10]);
    let aria = t.player("Aria", 20);
    t.set_status(aria, Status::Dead).unwrap();

    t.adjust_hp(aria, HpAdjustment::Damage(3)).unwrap();
    let c = t.get(aria);
    assert_eq!(c.hp, 17);
    assert_eq!(c.status, Status::Dead);
    assert_eq!(t.messages(LogKind::HpChange), ["took damage"]);

    // Dropping below zero does not start the dying clock again
    t.set_hp(aria, -4).unwrap();
    let c = t.get(aria);
    assert_eq!(c.hp, -4);
    assert_eq!(c.status, Status::Dead);
}

/// Test: a refused heal leaves no trace in the log
#[test]
fn test_rejected_heal_leaves_log_untouched() {
    let mut t = TestEncounter::new([10]);
    let aria = t.player("Aria", 20);
    t.set_status(aria, Status::Dead).unwrap();
    t.adjust_hp(aria, HpAdjustment::Damage(25)).unwrap();
    let log_len = t.log().len();

    assert!(t.set_hp(aria, 5).is_err());
    assert!(t.adjust_hp(aria, HpAdjustment::Heal(2)).is_err());
    assert_eq!(t.log().len(), log_len);
    assert_eq!(t.get(aria).hp, -5);
}
