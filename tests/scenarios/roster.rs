//! Roster scenario tests
//!
//! Batches, capacity, unique names and display order

use battle_tracker::combat::palette_color;
use battle_tracker::encounter::NewPlayer;
use battle_tracker::roster::{BatchOptions, RosterError};
use battle_tracker::EncounterError;

use crate::harness::TestEncounter;

/// Test: the roster ceiling rejects a whole batch, never part of one
#[test]
fn test_capacity_is_all_or_nothing() {
    let mut t = TestEncounter::new([10]);
    t.monsters("goblin", 20);
    t.monsters("orc", 15);
    let log_len = t.log().len();

    let err = t
        .add_monsters("wolf", &BatchOptions::default().with_quantity(6))
        .unwrap_err();
    assert_eq!(
        err,
        EncounterError::Roster(RosterError::CapacityExceeded {
            current: 35,
            requested: 6,
            max: 40
        })
    );
    assert_eq!(t.roster().len(), 35);
    assert_eq!(t.log().len(), log_len);

    t.monsters("wolf", 5);
    assert!(t.add_player(NewPlayer::new("Late", 10)).unwrap_err().is_capacity());
}

/// Test: one batch is limited to 20 monsters
#[test]
fn test_batch_size_limit() {
    let mut t = TestEncounter::new([10]);
    let err = t
        .add_monsters("goblin", &BatchOptions::default().with_quantity(21))
        .unwrap_err();
    assert_eq!(err, EncounterError::BatchTooLarge { requested: 21, max: 20 });
    assert!(t.roster().is_empty());
}

/// Test: monsters copy the template and take palette colors in turn
#[test]
fn test_batch_from_template() {
    let mut t = TestEncounter::new([10]);
    t.player("Aria", 20);
    let goblins = t.monsters("Goblin", 2);

    let g = t.get(goblins[0]);
    assert_eq!(g.name, "Goblin");
    assert_eq!(g.hp, 7);
    assert_eq!(g.max_hp, 7);
    assert_eq!(g.ac, 15);
    assert_eq!(g.initiative, 12);
    assert_eq!(g.xp, 50);
    assert_eq!(g.color, palette_color(1));
    assert_eq!(t.get(goblins[1]).color, palette_color(2));
    assert_ne!(g.actions[0].id, t.get(goblins[1]).actions[0].id);

    assert!(t.logged(
        goblins[0],
        "created. Init: 12, HP: 7/7, AC: 15, Movement: 30ft"
    ));
}

/// Test: batch options change how monsters are stamped out
#[test]
fn test_batch_randomization() {
    // hp 2d6 -> 3 + 3, AC deduction 3 - 1, initiative 3 + 2
    let mut t = TestEncounter::new([3]);
    let options = BatchOptions {
        roll_hp: true,
        randomize_ac: true,
        ..BatchOptions::default()
    };
    let id = t.add_monsters("goblin", &options).unwrap()[0];

    let g = t.get(id);
    assert_eq!(g.hp, 6);
    assert_eq!(g.max_hp, 6);
    assert_eq!(g.ac, 13);
    assert_eq!(g.base_ac, 15);
    assert_eq!(g.initiative, 5);
}

/// Test: unique names draw from the species pool, then fall back to numbering
#[test]
fn test_unique_names() {
    let mut t = TestEncounter::new([1]);
    let options = BatchOptions {
        quantity: 2,
        unique_names: true,
        ..BatchOptions::default()
    };
    let ids = t.add_monsters("goblin", &options).unwrap();
    assert_eq!(t.get(ids[0]).name, "Snik Toecutter");
    assert_eq!(t.get(ids[1]).name, "Goblin 1");

    // Names stay unique across batches
    let more = t.add_monsters("goblin", &options).unwrap();
    assert_eq!(t.get(more[0]).name, "Goblin 2");

    // No pool for the species: template name
    let ogre = t.add_monsters("ogre", &options.clone().with_quantity(1)).unwrap()[0];
    assert_eq!(t.get(ogre).name, "Ogre");
}

/// Test: display order can be rearranged
#[test]
fn test_reorder() {
    let mut t = TestEncounter::new([10]);
    let a = t.player("A", 10);
    let b = t.player("B", 10);
    let c = t.player("C", 10);

    t.reorder(c, Some(a)).unwrap();
    let names: Vec<_> = t.roster().iter().map(|x| x.name.clone()).collect();
    assert_eq!(names, ["C", "A", "B"]);

    t.reorder(c, None).unwrap();
    let names: Vec<_> = t.roster().iter().map(|x| x.name.clone()).collect();
    assert_eq!(names, ["A", "B", "C"]);

    assert!(t.reorder(b, Some(uuid::Uuid::new_v4())).is_err());
}

/// Test: sheet edits
#[test]
fn test_rename_and_color() {
    let mut t = TestEncounter::new([10]);
    let g = t.monsters("goblin", 1)[0];

    t.rename(g, "  Boss Snik ").unwrap();
    assert_eq!(t.get(g).name, "Boss Snik");
    assert!(t.get(g).is_custom);
    assert!(t.rename(g, "   ").is_err());

    t.set_color(g, "#123abc").unwrap();
    assert_eq!(t.get(g).color, "#123ABC");
    assert!(t.set_color(g, "#12345").is_err());

    t.set_locked(g, true).unwrap();
    assert!(t.get(g).is_locked);
}
