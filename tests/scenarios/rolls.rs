//! Roll scenario tests
//!
//! Dice tray, ability checks, attacks, damage and traits

use battle_tracker::combat::{Ability, AbilityScores, DiceError, LogKind, Status, TraitActivation};
use battle_tracker::encounter::{CustomWeapon, NewPlayer};

use crate::harness::TestEncounter;

/// Test: free-form notation through the dice tray
#[test]
fn test_roll_dice() {
    let mut t = TestEncounter::new([4, 5]);

    let result = t.roll_dice("2d6+3").unwrap();
    assert_eq!(result.total, 12);
    assert_eq!(result.rolls, vec![4, 5]);
    assert_eq!(result.modifier, 3);

    let entry = t.log().entries().last().unwrap();
    assert_eq!(entry.message, "rolled 2d6+3:");
    assert_eq!(entry.value, Some(12));
    assert_eq!(entry.details.as_deref(), Some("(4 + 5 +3)"));

    assert!(matches!(t.roll_dice("2d"), Err(DiceError::Malformed(_))));
    assert_eq!(t.log().len(), 1);
}

/// Test: ability checks add the modifier and are remembered
#[test]
fn test_ability_check() {
    let mut t = TestEncounter::new([13]);
    let abilities = AbilityScores {
        wisdom: 15,
        ..AbilityScores::default()
    };
    let aria = t
        .add_player(
            NewPlayer::new("Aria", 10)
                .with_initiative(10)
                .with_abilities(abilities),
        )
        .unwrap();

    let roll = t.roll_ability_check(aria, Ability::Wis).unwrap();
    assert_eq!(roll.roll, 13);
    assert_eq!(roll.total, 15);
    assert_eq!(t.get(aria).last_ability_roll, Some(roll));

    let entry = t.log().of_kind(LogKind::AbilityCheck).next().unwrap();
    assert_eq!(entry.message, "rolled WIS check:");
    assert_eq!(entry.details.as_deref(), Some("(13 + 2)"));

    // Death clears the remembered roll and blocks new ones
    t.set_status(aria, Status::Dead).unwrap();
    assert_eq!(t.get(aria).last_ability_roll, None);
    assert!(t.roll_ability_check(aria, Ability::Str).is_err());
}

/// Test: to-hit rolls spend the action, flag natural 20s
#[test]
fn test_to_hit() {
    let mut t = TestEncounter::new([10, 20]);
    let goblin = t.monsters("goblin", 1)[0];

    let roll = t.roll_to_hit(goblin, "2").unwrap();
    assert_eq!(roll.attack, "Shortbow");
    assert_eq!(roll.total, 24);
    assert!(roll.critical);
    assert!(t.get(goblin).action_used);

    let entry = t.log().of_kind(LogKind::ToHit).next().unwrap();
    assert_eq!(entry.message, "rolled Shortbow to hit:");
    assert_eq!(entry.details.as_deref(), Some("(20+4)"));
    assert!(entry.is_crit);

    assert!(t.roll_to_hit(goblin, "Greataxe").is_err());
}

/// Test: attacking after a dash leaves the action unspent
#[test]
fn test_to_hit_after_dash() {
    let mut t = TestEncounter::new([10]);
    let goblin = t.monsters("goblin", 1)[0];
    t.set_flag(goblin, battle_tracker::combat::ActionFlag::Dash, true)
        .unwrap();

    t.roll_to_hit(goblin, "Scimitar").unwrap();
    let g = t.get(goblin);
    assert!(!g.action_used);
    assert!(g.dash_used);
}

/// Test: damage rolls, with and without a critical
#[test]
fn test_damage() {
    let mut t = TestEncounter::new([10, 3, 5]);
    let goblin = t.monsters("goblin", 1)[0];

    let normal = t.roll_damage(goblin, "scimitar", false).unwrap();
    assert_eq!(normal.total, 5);
    let crit = t.roll_damage(goblin, "scimitar", true).unwrap();
    assert_eq!(crit.rolls, vec![5, 6]);
    assert_eq!(crit.total, 13);

    let entries: Vec<_> = t.log().of_kind(LogKind::Damage).collect();
    assert_eq!(entries[0].message, "rolled Scimitar damage:");
    assert_eq!(entries[0].details.as_deref(), Some("(3 +2) [Slashing]"));
    assert_eq!(entries[1].message, "rolled CRITICAL Scimitar damage:");
    assert_eq!(entries[1].details.as_deref(), Some("(6 (max) + 5 +2) [Slashing]"));
    assert!(entries[1].is_crit);
}

/// Test: traits spend the matching part of the action economy
#[test]
fn test_activate_trait() {
    let mut t = TestEncounter::new([10]);
    let goblin = t.monsters("goblin", 1)[0];

    let used = t.activate_trait(goblin, "Nimble Escape").unwrap();
    assert_eq!(used, TraitActivation::BonusAction);
    assert!(t.get(goblin).bonus_action_used);

    let entry = t.log().of_kind(LogKind::TraitActivation).next().unwrap();
    assert_eq!(entry.message, "activated trait: Nimble Escape");
    assert_eq!(entry.details.as_deref(), Some("(Bonus Action)"));

    assert!(t.activate_trait(goblin, "Fly").is_err());
}

/// Test: custom weapons get notation built from their parts
#[test]
fn test_custom_weapon() {
    let mut t = TestEncounter::new([10, 15, 4]);
    let aria = t.player("Aria", 20);

    let weapon = CustomWeapon {
        name: "Longsword".into(),
        count: 2,
        sides: 8,
        modifier: -1,
        damage_type: Some("Slashing".into()),
        to_hit_modifier: 5,
    };
    let id = t.add_custom_weapon(aria, weapon).unwrap();

    let attack = t.get(aria).actions[0].clone();
    assert_eq!(attack.id, id);
    assert_eq!(attack.dice, "2d8-1");
    assert!(attack.is_custom);

    assert_eq!(t.roll_to_hit(aria, "longsword").unwrap().total, 15);
    assert_eq!(t.roll_damage(aria, "Longsword", false).unwrap().total, 11);
}
