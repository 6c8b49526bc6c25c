//! Initiative scenario tests
//!
//! Shared groups, rerolls, turn order and round advance

use battle_tracker::combat::{ActionFlag, LogKind, Status};
use battle_tracker::roster::BatchOptions;

use crate::harness::TestEncounter;

/// Test: a shared group rolls once when created and once on reroll
#[test]
fn test_shared_group_rerolls_once() {
    let mut t = TestEncounter::new([7, 13, 4]);
    let goblins = t
        .add_monsters("goblin", &BatchOptions::default().with_quantity(2).shared(None))
        .unwrap();

    // 7 + 2
    assert_eq!(t.get(goblins[0]).initiative, 9);
    assert_eq!(t.get(goblins[1]).initiative, 9);
    assert_eq!(
        t.get(goblins[0]).shared_initiative_id,
        t.get(goblins[1]).shared_initiative_id
    );
    assert_eq!(
        t.messages(LogKind::InitiativeRoll),
        ["Initiative for Goblins rolled:"]
    );

    t.reroll_all();
    assert_eq!(t.get(goblins[0]).initiative, 15);
    assert_eq!(t.get(goblins[1]).initiative, 15);

    let rerolls: Vec<_> = t
        .messages(LogKind::InitiativeRoll)
        .into_iter()
        .skip(1)
        .collect();
    assert_eq!(rerolls, ["(Group) rerolled initiative:"]);
    assert_eq!(
        t.log().entries().last().unwrap().message,
        "All active combatants' initiatives rerolled."
    );
}

/// Test: a given shared initiative is logged as set, not rolled
#[test]
fn test_shared_group_with_given_initiative() {
    let mut t = TestEncounter::new([10]);
    let orcs = t
        .add_monsters("orc", &BatchOptions::default().with_quantity(3).shared(Some(14)))
        .unwrap();

    for id in &orcs {
        assert_eq!(t.get(*id).initiative, 14);
    }
    let set = t.log().of_kind(LogKind::InitiativeSet).next().unwrap();
    assert_eq!(set.message, "Initiative for Orcs set to:");
    assert_eq!(set.value, Some(14));
    assert_eq!(set.details.as_deref(), Some("(From input field)"));
    assert!(t.messages(LogKind::InitiativeRoll).is_empty());
}

/// Test: the dead and the removed keep their initiative on reroll
#[test]
fn test_reroll_skips_dead_and_removed() {
    let mut t = TestEncounter::new([3, 17]);
    let dead = t.player("Dead", 10);
    let away = t.player("Away", 10);
    let live = t.player("Live", 10);

    t.set_status(dead, Status::Dead).unwrap();
    t.set_removed_from_combat(away, true).unwrap();
    t.reroll_all();

    assert_eq!(t.get(dead).initiative, 10);
    assert_eq!(t.get(away).initiative, 10);
    assert_eq!(t.get(live).initiative, 3);
    assert_eq!(t.messages(LogKind::InitiativeRoll), ["rerolled initiative:"]);
}

/// Test: fighting combatants sort first, each part by initiative
#[test]
fn test_initiative_order() {
    let mut t = TestEncounter::new([10]);
    let slow = t.player("Slow", 10);
    let fast = t.player("Fast", 10);
    let fallen = t.player("Fallen", 10);
    let away = t.player("Away", 10);
    let tied = t.player("Tied", 10);

    t.set_initiative(slow, 4).unwrap();
    t.set_initiative(fast, 18).unwrap();
    t.set_initiative(fallen, 25).unwrap();
    t.set_initiative(away, 2).unwrap();
    t.set_initiative(tied, 4).unwrap();
    t.set_hp(fallen, 0).unwrap();
    t.set_removed_from_combat(away, true).unwrap();

    let order: Vec<_> = t
        .initiative_order()
        .iter()
        .map(|c| c.name.clone())
        .collect();
    assert_eq!(order, ["Fast", "Slow", "Tied", "Fallen", "Away"]);
}

/// Test: a new round resets the economy and recomputes movement
#[test]
fn test_advance_round_resets() {
    let mut t = TestEncounter::new([10]);
    let aria = t.player("Aria", 10);
    let borin = t.player("Borin", 10);

    t.set_flag(aria, ActionFlag::Dash, true).unwrap();
    t.set_flag(aria, ActionFlag::BonusAction, true).unwrap();
    t.set_turn_completed(aria, true).unwrap();
    t.set_status(borin, Status::from_key("prone")).unwrap();
    t.set_movement(borin, 0).unwrap();

    assert_eq!(t.advance_round(), 2);
    assert_eq!(t.round(), 2);

    let a = t.get(aria);
    assert!(!a.dash_used && !a.bonus_action_used);
    assert!(!a.is_movement_dashed);
    assert!(!a.turn_completed);
    assert_eq!(a.current_movement, 30);
    assert_eq!(t.get(borin).current_movement, 15);

    assert_eq!(
        t.log().entries().last().unwrap().message,
        "Round 1 ended. Round 2 initiated! All actions reset, movement restored."
    );
}

/// Test: dying combatants start the new round with their turn complete
#[test]
fn test_advance_round_with_dying() {
    let mut t = TestEncounter::with_death_saves([12]);
    let aria = t.player("Aria", 10);
    let borin = t.player("Borin", 10);
    t.set_hp(aria, 0).unwrap();
    t.roll_death_save(aria).unwrap();

    t.advance_round();
    let a = t.get(aria);
    assert!(a.turn_completed);
    assert!(!a.has_made_death_save_this_round);
    // Saved last round, so no opportunity was lost to attrition
    assert_eq!(a.death_save_opportunities, Some(3));
    assert!(!t.get(borin).turn_completed);
}
