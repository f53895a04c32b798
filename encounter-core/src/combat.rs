//! Attack and damage arithmetic.
//!
//! Pure functions over a [`Dice`] stream. Nothing here touches creatures
//! directly; rule modules turn the results into effects.

use crate::creature::{DamageModifier, DamageModifierKind, DamageType};
use crate::dice::{Dice, DiceExpression, DieType, RollResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Degree of success of an attack roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttackOutcome {
    CriticalSuccess,
    Success,
    Failure,
    CriticalFailure,
}

impl AttackOutcome {
    pub fn is_hit(self) -> bool {
        matches!(self, AttackOutcome::CriticalSuccess | AttackOutcome::Success)
    }

    pub fn is_critical(self) -> bool {
        self == AttackOutcome::CriticalSuccess
    }

    pub fn verb(self) -> &'static str {
        match self {
            AttackOutcome::CriticalSuccess => "critically hit",
            AttackOutcome::Success => "hit",
            AttackOutcome::Failure => "missed",
            AttackOutcome::CriticalFailure => "critically missed",
        }
    }
}

impl fmt::Display for AttackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AttackOutcome::CriticalSuccess => "critical-success",
            AttackOutcome::Success => "success",
            AttackOutcome::Failure => "failure",
            AttackOutcome::CriticalFailure => "critical-failure",
        };
        write!(f, "{text}")
    }
}

/// Band an attack roll against the defender's armor.
///
/// A natural 20 is always a critical success and a natural 1 always a
/// critical failure. Otherwise beating armor by 10 crits, missing it by 10
/// fumbles, and meeting it hits.
pub fn classify_attack(natural: u32, total: i32, armor: i32) -> AttackOutcome {
    if natural == 20 {
        AttackOutcome::CriticalSuccess
    } else if natural == 1 {
        AttackOutcome::CriticalFailure
    } else if total >= armor.saturating_add(10) {
        AttackOutcome::CriticalSuccess
    } else if total <= armor.saturating_sub(10) {
        AttackOutcome::CriticalFailure
    } else if total >= armor {
        AttackOutcome::Success
    } else {
        AttackOutcome::Failure
    }
}

/// A resolved d20 attack roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRoll {
    pub natural: u32,
    pub bonus: i32,
    pub total: i32,
    pub armor: i32,
    pub outcome: AttackOutcome,
}

/// Roll d20 + `bonus` against `armor`.
pub fn roll_attack(dice: &mut Dice, bonus: i32, armor: i32) -> AttackRoll {
    let natural = dice.d20();
    let total = (natural as i32).saturating_add(bonus);
    AttackRoll {
        natural,
        bonus,
        total,
        armor,
        outcome: classify_attack(natural, total, armor),
    }
}

/// The default strike damage die.
pub fn strike_dice() -> DiceExpression {
    DiceExpression::simple(1, DieType::D8, 0)
}

/// A damage roll before resistances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRoll {
    pub roll: RollResult,
    pub critical: bool,
    pub total: i32,
}

/// Roll `dice` + `level`, doubling the whole total on a critical.
pub fn roll_damage(dice: &mut Dice, expression: &DiceExpression, level: u32, critical: bool) -> DamageRoll {
    let roll = dice.roll(&expression.plus(i32::try_from(level).unwrap_or(i32::MAX)));
    let base = roll.total.max(0);
    DamageRoll {
        total: if critical { base.saturating_mul(2) } else { base },
        roll,
        critical,
    }
}

/// Damage after immunities, resistances, and weaknesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedDamage {
    pub raw: i32,
    pub amount: i32,
    pub modifiers_applied: bool,
}

/// Apply every modifier matching `damage_type` to `raw`.
///
/// Immunity zeroes the damage outright. Otherwise resistances subtract
/// (floored at 0) and weaknesses add.
pub fn apply_damage_modifiers(
    raw: i32,
    damage_type: DamageType,
    modifiers: &[DamageModifier],
) -> ModifiedDamage {
    let matching: Vec<&DamageModifier> = modifiers
        .iter()
        .filter(|m| m.damage_type == damage_type)
        .collect();

    let sum = |kind: DamageModifierKind| -> i32 {
        matching
            .iter()
            .filter(|m| m.kind == kind)
            .map(|m| m.value.max(0))
            .fold(0, i32::saturating_add)
    };

    let amount = if matching
        .iter()
        .any(|m| m.kind == DamageModifierKind::Immunity)
    {
        0
    } else {
        raw.saturating_sub(sum(DamageModifierKind::Resistance))
            .max(0)
            .saturating_add(sum(DamageModifierKind::Weakness))
    };

    ModifiedDamage {
        raw,
        amount,
        modifiers_applied: !matching.is_empty(),
    }
}
