//! Dice notation and the seeded dice service.
//!
//! Every random number an encounter consumes comes from a [`Dice`] stream.
//! Each encounter owns its own stream, so a given seed replays the same
//! sequence of rolls no matter what other encounters are doing.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice parsing.
#[derive(Debug, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
}

/// Standard polyhedral die types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieType> {
        match sides {
            4 => Some(DieType::D4),
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            20 => Some(DieType::D20),
            100 => Some(DieType::D100),
            _ => None,
        }
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

/// A single die component of a dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceComponent {
    pub count: u32,
    pub die_type: DieType,
}

/// A complete dice expression (e.g., 1d8+2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub components: Vec<DiceComponent>,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Build `count`d`die` + `modifier` without going through the parser.
    pub fn simple(count: u32, die_type: DieType, modifier: i32) -> Self {
        let original = match modifier {
            0 => format!("{count}{die_type}"),
            m if m > 0 => format!("{count}{die_type}+{m}"),
            m => format!("{count}{die_type}-{}", m.abs()),
        };
        Self {
            components: vec![DiceComponent { count, die_type }],
            modifier,
            original,
        }
    }

    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation = notation.trim().to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut components = Vec::new();
        let mut modifier: i32 = 0;
        let mut current = String::new();
        let mut sign: i32 = 1;

        for ch in notation.chars() {
            match ch {
                '+' | '-' => {
                    if !current.is_empty() {
                        Self::parse_component(&current, sign, &mut components, &mut modifier)?;
                        current.clear();
                    }
                    sign = if ch == '+' { 1 } else { -1 };
                }
                ' ' => continue,
                _ => current.push(ch),
            }
        }

        if !current.is_empty() {
            Self::parse_component(&current, sign, &mut components, &mut modifier)?;
        }

        if components.is_empty() && modifier == 0 {
            return Err(DiceError::NoDice);
        }

        Ok(DiceExpression {
            components,
            modifier,
            original: notation,
        })
    }

    fn parse_component(
        s: &str,
        sign: i32,
        components: &mut Vec<DiceComponent>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        if let Some(d_pos) = s.find('d') {
            let count_str = &s[..d_pos];
            let count: u32 = if count_str.is_empty() {
                1
            } else {
                count_str
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?
            };

            let sides: u32 = s[d_pos + 1..]
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            let die_type = DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))?;

            if sign < 0 {
                return Err(DiceError::InvalidNotation(format!("-{s}")));
            }
            components.push(DiceComponent { count, die_type });
        } else {
            let value: i32 = s
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            *modifier = modifier.saturating_add(sign * value);
        }

        Ok(())
    }

    /// Same dice with `bonus` added to the flat modifier.
    pub fn plus(&self, bonus: i32) -> Self {
        let mut expr = self.clone();
        expr.modifier = expr.modifier.saturating_add(bonus);
        expr.original = if bonus >= 0 {
            format!("{}+{bonus}", self.original)
        } else {
            format!("{}-{}", self.original, bonus.abs())
        };
        expr
    }

    /// Both expressions rolled together as one.
    pub fn combined(&self, other: &DiceExpression) -> Self {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Self {
            components,
            modifier: self.modifier.saturating_add(other.modifier),
            original: format!("{}+{}", self.original, other.original),
        }
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Result of rolling a single dice component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentResult {
    pub die_type: DieType,
    pub rolls: Vec<u32>,
    pub subtotal: u32,
}

/// Complete result of a dice roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    pub expression: String,
    pub component_results: Vec<ComponentResult>,
    pub modifier: i32,
    pub total: i32,
}

impl RollResult {
    /// Sum of the dice faces, without the flat modifier.
    pub fn dice_total(&self) -> i32 {
        self.total - self.modifier
    }

    /// Format the individual dice results for display.
    pub fn dice_display(&self) -> String {
        let dice_str = self
            .component_results
            .iter()
            .map(|c| {
                let faces: Vec<String> = c.rolls.iter().map(|r| r.to_string()).collect();
                format!("[{}]", faces.join(", "))
            })
            .collect::<Vec<_>>()
            .join(" + ");

        match self.modifier {
            0 => dice_str,
            m if m > 0 => format!("{dice_str} + {m}"),
            m => format!("{dice_str} - {}", m.abs()),
        }
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.dice_display(), self.total)
    }
}

/// Seeded dice stream owned by one encounter.
///
/// Uses ChaCha8 so the same seed yields the same rolls on every platform.
/// A scripted stream hands out queued faces first, then falls back to the
/// seeded generator once the script is exhausted.
#[derive(Debug, Clone)]
pub struct Dice {
    rng: ChaCha8Rng,
    seed: u64,
    script: VecDeque<u32>,
}

impl Dice {
    /// Create a stream from a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            script: VecDeque::new(),
        }
    }

    /// Create a stream from a fresh random seed.
    pub fn from_entropy() -> Self {
        Self::seeded(rand::random())
    }

    /// Create a stream whose die rolls come from `faces` in order.
    ///
    /// Each face is clamped into the rolled die's range.
    pub fn scripted(faces: impl IntoIterator<Item = u32>) -> Self {
        let mut dice = Self::seeded(0);
        dice.script = faces.into_iter().collect();
        dice
    }

    /// Derive the seed of the `index`-th child stream of `base`.
    pub fn derive_seed(base: u64, index: u64) -> u64 {
        base.wrapping_add(index.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Roll one die.
    pub fn roll_die(&mut self, die_type: DieType) -> u32 {
        let sides = die_type.sides();
        match self.script.pop_front() {
            Some(face) => face.clamp(1, sides),
            None => self.rng.gen_range(1..=sides),
        }
    }

    /// Roll a single d20.
    pub fn d20(&mut self) -> u32 {
        self.roll_die(DieType::D20)
    }

    /// Roll a full dice expression.
    pub fn roll(&mut self, expression: &DiceExpression) -> RollResult {
        let component_results: Vec<ComponentResult> = expression
            .components
            .iter()
            .map(|component| {
                let rolls: Vec<u32> = (0..component.count)
                    .map(|_| self.roll_die(component.die_type))
                    .collect();
                ComponentResult {
                    die_type: component.die_type,
                    subtotal: rolls.iter().sum(),
                    rolls,
                }
            })
            .collect();

        let dice_total = component_results
            .iter()
            .map(|c| i32::try_from(c.subtotal).unwrap_or(i32::MAX))
            .fold(0, i32::saturating_add);

        RollResult {
            expression: expression.original.clone(),
            component_results,
            modifier: expression.modifier,
            total: dice_total.saturating_add(expression.modifier),
        }
    }

    /// Uniform index in `0..len`, or `None` when `len` is zero.
    ///
    /// Never consumes scripted faces.
    pub fn pick(&mut self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.rng.gen_range(0..len))
    }

    /// True with the given probability. Never consumes scripted faces.
    pub fn chance(&mut self, probability: f64) -> bool {
        if probability.is_nan() {
            return false;
        }
        self.rng.gen_bool(probability.clamp(0.0, 1.0))
    }
}
