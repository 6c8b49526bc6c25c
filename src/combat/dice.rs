//! Dice rolling system
//!
//! Parses and rolls dice notation like "2d6+3", "1d20", "4d6-2".
//! Every roll draws from a [`DieSource`], so the encounter can run on a
//! seeded generator and tests can script exact faces.

use std::str::FromStr;
use std::sync::LazyLock;

use rand::{Rng, RngCore};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Die sizes offered by the simple roller
pub const STANDARD_DICE: [u32; 7] = [4, 6, 8, 10, 12, 20, 100];

/// Upper bound on dice in one notation (monster hit dice stay well below this)
pub const MAX_DICE_COUNT: u32 = 1000;

static NOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d*)d(\d+)(?:([+-])(\d+))?$").expect("dice notation pattern is valid")
});

/// Errors from strict notation parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("malformed dice notation: {0:?}")]
    Malformed(String),

    #[error("dice count must be at least 1")]
    ZeroCount,

    #[error("die sides must be at least 1")]
    ZeroSides,

    #[error("too many dice ({0} > {MAX_DICE_COUNT})")]
    TooManyDice(u32),
}

/// A source of uniformly distributed die faces
pub trait DieSource {
    /// Roll one die, returning a face in `[1, sides]` (0 when `sides` is 0)
    fn roll_die(&mut self, sides: u32) -> u32;
}

impl<R: RngCore> DieSource for R {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        self.random_range(1..=sides)
    }
}

/// Replays a fixed sequence of faces, cycling when it runs out.
///
/// Faces larger than the die are clamped to its maximum.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    faces: Vec<u32>,
    cursor: usize,
}

impl ScriptedDice {
    pub fn new(faces: impl Into<Vec<u32>>) -> Self {
        Self {
            faces: faces.into(),
            cursor: 0,
        }
    }

    /// Number of faces handed out so far
    pub fn draws(&self) -> usize {
        self.cursor
    }
}

impl DieSource for ScriptedDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        let face = if self.faces.is_empty() {
            1
        } else {
            self.faces[self.cursor % self.faces.len()]
        };
        self.cursor += 1;
        face.clamp(1, sides)
    }
}

/// A parsed dice roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiceRoll {
    /// Number of dice to roll
    pub count: u32,
    /// Number of sides per die
    pub sides: u32,
    /// Modifier to add/subtract
    pub modifier: i32,
}

impl DiceRoll {
    /// Create a new dice roll
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self {
            count,
            sides,
            modifier,
        }
    }

    /// Parse user-editable notation; anything malformed becomes zero dice
    /// with zero modifier instead of an error.
    pub fn lenient(notation: &str) -> Self {
        parse_dice(notation).unwrap_or_else(|e| {
            debug!("Treating {:?} as an empty roll: {}", notation, e);
            Self::default()
        })
    }

    /// True when there is nothing to roll
    pub fn is_empty(&self) -> bool {
        self.count == 0 || self.sides == 0
    }

    /// Whether the die size is one the simple roller offers
    pub fn is_standard_die(&self) -> bool {
        STANDARD_DICE.contains(&self.sides)
    }

    /// Roll and return the total
    pub fn roll(&self, source: &mut dyn DieSource) -> i32 {
        self.roll_detailed(source).total
    }

    /// Roll and return individual die results plus total
    pub fn roll_detailed(&self, source: &mut dyn DieSource) -> RollResult {
        let rolls: Vec<u32> = if self.is_empty() {
            Vec::new()
        } else {
            (0..self.count).map(|_| source.roll_die(self.sides)).collect()
        };
        let sum: u64 = rolls.iter().map(|&r| u64::from(r)).sum();

        RollResult {
            total: saturating_total(sum, self.modifier),
            rolls,
            modifier: self.modifier,
            sum_of_dice: u32::try_from(sum).unwrap_or(u32::MAX),
            dice_part: self.dice_part(),
            critical: false,
        }
    }

    /// Critical damage: one normal roll plus the maximum face of one extra die
    pub fn roll_critical(&self, source: &mut dyn DieSource) -> RollResult {
        let mut result = self.roll_detailed(source);
        if self.sides > 0 {
            result.rolls.push(self.sides);
            let sum: u64 = result.rolls.iter().map(|&r| u64::from(r)).sum();
            result.sum_of_dice = u32::try_from(sum).unwrap_or(u32::MAX);
            result.total = saturating_total(sum, self.modifier);
        }
        result.critical = true;
        result
    }

    /// The "2d6" half of the notation (empty for an empty roll)
    pub fn dice_part(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!("{}d{}", self.count, self.sides)
        }
    }

    /// The "+3" half of the notation (empty when the modifier is zero)
    pub fn modifier_part(&self) -> String {
        format_modifier(self.modifier)
    }
}

impl FromStr for DiceRoll {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_dice(s)
    }
}

impl std::fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d{}{}", self.count, self.sides, self.modifier_part())
    }
}

/// Itemized outcome of rolling a notation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollResult {
    pub total: i32,
    pub rolls: Vec<u32>,
    pub modifier: i32,
    pub sum_of_dice: u32,
    pub dice_part: String,
    /// Last entry of `rolls` is the maximized extra die
    pub critical: bool,
}

impl RollResult {
    /// Arithmetic behind the total, e.g. "4 + 5 +3" or "6 (max) + 2 -1"
    pub fn breakdown(&self) -> String {
        let faces = if self.critical {
            match self.rolls.split_last() {
                Some((max, rest)) => std::iter::once(format!("{} (max)", max))
                    .chain(rest.iter().map(u32::to_string))
                    .collect::<Vec<_>>()
                    .join(" + "),
                None => String::new(),
            }
        } else {
            self.rolls
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(" + ")
        };

        match (faces.is_empty(), self.modifier) {
            (true, m) => m.to_string(),
            (false, 0) => faces,
            (false, m) => format!("{} {}", faces, format_modifier(m)),
        }
    }
}

/// Display halves of a notation, for rebuilding edit fields
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotationParts {
    pub dice_part: String,
    pub modifier_part: String,
}

impl NotationParts {
    /// Reassemble the notation
    pub fn join(&self) -> String {
        format!("{}{}", self.dice_part, self.modifier_part)
    }
}

/// Faces plus modifier, pinned to the `i32` range
fn saturating_total(sum: u64, modifier: i32) -> i32 {
    let total = i64::try_from(sum)
        .unwrap_or(i64::MAX)
        .saturating_add(i64::from(modifier));
    i32::try_from(total).unwrap_or(if total < 0 { i32::MIN } else { i32::MAX })
}

/// Parse a dice notation string like "2d6+3"
pub fn parse_dice(notation: &str) -> Result<DiceRoll, DiceError> {
    let normalized: String = notation
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let malformed = || DiceError::Malformed(notation.trim().to_string());
    let caps = NOTATION.captures(&normalized).ok_or_else(malformed)?;

    // "d6" means "1d6"
    let count: u32 = match &caps[1] {
        "" => 1,
        digits => digits.parse().map_err(|_| malformed())?,
    };
    if count == 0 {
        return Err(DiceError::ZeroCount);
    }
    if count > MAX_DICE_COUNT {
        return Err(DiceError::TooManyDice(count));
    }

    let sides: u32 = caps[2].parse().map_err(|_| malformed())?;
    if sides == 0 {
        return Err(DiceError::ZeroSides);
    }

    let modifier = match (caps.get(3), caps.get(4)) {
        (Some(sign), Some(value)) => {
            let value: i32 = value.as_str().parse().map_err(|_| malformed())?;
            if sign.as_str() == "-" {
                -value
            } else {
                value
            }
        }
        _ => 0,
    };

    Ok(DiceRoll {
        count,
        sides,
        modifier,
    })
}

/// Roll a notation with itemized components; malformed notation rolls nothing
pub fn roll_detailed(notation: &str, source: &mut dyn DieSource) -> RollResult {
    DiceRoll::lenient(notation).roll_detailed(source)
}

/// Die size of a notation, used to maximize the extra critical die
pub fn max_of_die_type(notation: &str) -> u32 {
    DiceRoll::lenient(notation).sides
}

/// Split a notation into its dice and modifier halves
pub fn split_notation(notation: &str) -> NotationParts {
    let roll = DiceRoll::lenient(notation);
    NotationParts {
        dice_part: roll.dice_part(),
        modifier_part: roll.modifier_part(),
    }
}

/// "+3", "-2", or "" for zero
pub fn format_modifier(modifier: i32) -> String {
    match modifier {
        0 => String::new(),
        m if m > 0 => format!("+{}", m),
        m => m.to_string(),
    }
}

/// Roll a single d20
pub fn roll_d20(source: &mut dyn DieSource) -> u32 {
    source.roll_die(20)
}

/// Check if a d20 roll is a natural 20 (critical hit)
pub fn is_critical(roll: u32) -> bool {
    roll == 20
}

/// Check if a d20 roll is a natural 1 (critical fail)
pub fn is_fumble(roll: u32) -> bool {
    roll == 1
}
