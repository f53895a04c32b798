//! Creatures, conditions, and the positions they occupy.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for creatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CreatureId(pub Uuid);

impl CreatureId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CreatureId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CreatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for encounters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncounterId(pub Uuid);

impl EncounterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EncounterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EncounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Positioning
// ============================================================================

/// Integer grid coordinate. `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Number of king moves between two squares.
    pub fn chebyshev_distance(&self, other: Position) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ============================================================================
// Categories
// ============================================================================

/// Who controls a creature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreatureKind {
    Player,
    /// Controlled non-player creature fighting on the players' side.
    Ally,
    Hostile,
}

impl CreatureKind {
    pub fn side(&self) -> Side {
        match self {
            CreatureKind::Player | CreatureKind::Ally => Side::Players,
            CreatureKind::Hostile => Side::Opponents,
        }
    }
}

/// The two sides of an encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Side {
    Players,
    Opponents,
}

// ============================================================================
// Conditions
// ============================================================================

/// How long a condition lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionDuration {
    /// Remaining round rollovers.
    Rounds(u32),
    Permanent,
}

/// What, if anything, a condition's magnitude modifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionKind {
    #[default]
    Status,
    ArmorBonus,
    AttackBonus,
}

/// A timed or permanent status effect on a creature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub duration: ConditionDuration,
    pub magnitude: Option<i32>,
    #[serde(default)]
    pub kind: ConditionKind,
}

impl Condition {
    pub fn new(name: impl Into<String>, rounds: u32) -> Self {
        Self {
            name: name.into(),
            duration: ConditionDuration::Rounds(rounds),
            magnitude: None,
            kind: ConditionKind::Status,
        }
    }

    pub fn permanent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration: ConditionDuration::Permanent,
            magnitude: None,
            kind: ConditionKind::Status,
        }
    }

    pub fn armor_bonus(name: impl Into<String>, rounds: u32, bonus: i32) -> Self {
        Self::new(name, rounds)
            .with_magnitude(bonus)
            .with_kind(ConditionKind::ArmorBonus)
    }

    pub fn attack_bonus(name: impl Into<String>, rounds: u32, bonus: i32) -> Self {
        Self::new(name, rounds)
            .with_magnitude(bonus)
            .with_kind(ConditionKind::AttackBonus)
    }

    pub fn with_magnitude(mut self, magnitude: i32) -> Self {
        self.magnitude = Some(magnitude);
        self
    }

    pub fn with_kind(mut self, kind: ConditionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_permanent(&self) -> bool {
        self.duration == ConditionDuration::Permanent
    }

    pub fn remaining_rounds(&self) -> Option<u32> {
        match self.duration {
            ConditionDuration::Rounds(n) => Some(n),
            ConditionDuration::Permanent => None,
        }
    }

    /// Count down one round. Returns true once the condition has run out.
    fn tick(&mut self) -> bool {
        match &mut self.duration {
            ConditionDuration::Permanent => false,
            ConditionDuration::Rounds(n) => {
                *n = n.saturating_sub(1);
                *n == 0
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.magnitude {
            Some(m) => write!(f, "{} {m}", self.name)?,
            None => write!(f, "{}", self.name)?,
        }
        match self.duration {
            ConditionDuration::Permanent => write!(f, " (permanent)"),
            ConditionDuration::Rounds(1) => write!(f, " (1 round)"),
            ConditionDuration::Rounds(n) => write!(f, " ({n} rounds)"),
        }
    }
}

/// Whether applying a condition added a new one or refreshed an old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionChange {
    Added,
    Refreshed,
}

// ============================================================================
// Damage typing
// ============================================================================

/// Damage types the rules distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DamageType {
    Physical,
    Force,
    Fire,
    Cold,
    Poison,
}

impl DamageType {
    pub fn name(&self) -> &'static str {
        match self {
            DamageType::Physical => "physical",
            DamageType::Force => "force",
            DamageType::Fire => "fire",
            DamageType::Cold => "cold",
            DamageType::Poison => "poison",
        }
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DamageModifierKind {
    Immunity,
    Resistance,
    Weakness,
}

impl DamageModifierKind {
    /// Magnitude used when a modifier is declared without one.
    pub fn default_value(self) -> i32 {
        match self {
            DamageModifierKind::Immunity => 0,
            DamageModifierKind::Resistance => DamageModifier::DEFAULT_RESISTANCE,
            DamageModifierKind::Weakness => DamageModifier::DEFAULT_WEAKNESS,
        }
    }
}

/// Immunity, resistance, or weakness to one damage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DamageModifierRecord")]
pub struct DamageModifier {
    pub kind: DamageModifierKind,
    pub damage_type: DamageType,
    pub value: i32,
}

/// Wire form of a modifier, where `value` may be left out.
#[derive(Deserialize)]
struct DamageModifierRecord {
    kind: DamageModifierKind,
    damage_type: DamageType,
    #[serde(default)]
    value: Option<i32>,
}

impl From<DamageModifierRecord> for DamageModifier {
    fn from(record: DamageModifierRecord) -> Self {
        Self {
            kind: record.kind,
            damage_type: record.damage_type,
            value: record.value.unwrap_or_else(|| record.kind.default_value()),
        }
    }
}

impl DamageModifier {
    pub const DEFAULT_RESISTANCE: i32 = 10;
    pub const DEFAULT_WEAKNESS: i32 = 5;

    pub fn immunity(damage_type: DamageType) -> Self {
        Self {
            kind: DamageModifierKind::Immunity,
            damage_type,
            value: 0,
        }
    }

    pub fn resistance(damage_type: DamageType, value: i32) -> Self {
        Self {
            kind: DamageModifierKind::Resistance,
            damage_type,
            value,
        }
    }

    pub fn weakness(damage_type: DamageType, value: i32) -> Self {
        Self {
            kind: DamageModifierKind::Weakness,
            damage_type,
            value,
        }
    }
}

// ============================================================================
// Creatures
// ============================================================================

/// Result of taking damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageResult {
    pub damage_taken: i32,
    pub dropped_to_zero: bool,
}

/// One combatant on the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creature {
    pub id: CreatureId,
    pub name: String,
    pub kind: CreatureKind,
    pub level: u32,
    pub max_health: i32,
    pub current_health: i32,
    pub armor: i32,
    pub position: Position,
    pub conditions: Vec<Condition>,
    pub initiative: i32,
    #[serde(default)]
    pub damage_modifiers: Vec<DamageModifier>,
}

impl Creature {
    pub fn is_incapacitated(&self) -> bool {
        self.current_health <= 0
    }

    pub fn side(&self) -> Side {
        self.kind.side()
    }

    /// Armor plus any active armor-bonus conditions.
    pub fn armor_class(&self) -> i32 {
        self.armor
            .saturating_add(self.condition_total(ConditionKind::ArmorBonus))
    }

    /// Level as a flat bonus to rolls.
    pub fn level_bonus(&self) -> i32 {
        i32::try_from(self.level).unwrap_or(i32::MAX)
    }

    /// Attack bonus: level + 2, plus any active attack-bonus conditions.
    pub fn attack_bonus(&self) -> i32 {
        self.level_bonus()
            .saturating_add(2)
            .saturating_add(self.condition_total(ConditionKind::AttackBonus))
    }

    fn condition_total(&self, kind: ConditionKind) -> i32 {
        self.conditions
            .iter()
            .filter(|c| c.kind == kind)
            .filter_map(|c| c.magnitude)
            .fold(0, i32::saturating_add)
    }

    pub fn condition(&self, name: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.name == name)
    }

    pub fn has_condition(&self, name: &str) -> bool {
        self.condition(name).is_some()
    }

    /// Add a condition, or refresh the existing one with the same name.
    pub fn apply_condition(&mut self, condition: Condition) -> ConditionChange {
        match self.conditions.iter_mut().find(|c| c.name == condition.name) {
            Some(existing) => {
                *existing = condition;
                ConditionChange::Refreshed
            }
            None => {
                self.conditions.push(condition);
                ConditionChange::Added
            }
        }
    }

    /// Count every timed condition down one round and drop the expired ones.
    pub fn decay_conditions(&mut self) -> Vec<Condition> {
        let mut expired = Vec::new();
        let mut kept = Vec::with_capacity(self.conditions.len());
        for mut condition in self.conditions.drain(..) {
            if condition.tick() {
                expired.push(condition);
            } else {
                kept.push(condition);
            }
        }
        self.conditions = kept;
        expired
    }

    /// Subtract health, flooring at zero.
    pub fn take_damage(&mut self, amount: i32) -> DamageResult {
        let amount = amount.max(0);
        let was_up = self.current_health > 0;
        self.current_health = (self.current_health - amount).max(0);
        DamageResult {
            damage_taken: amount,
            dropped_to_zero: was_up && self.current_health == 0,
        }
    }

    /// Restore health up to the maximum. Returns the amount actually healed.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let old = self.current_health;
        self.current_health = self
            .current_health
            .saturating_add(amount.max(0))
            .min(self.max_health);
        self.current_health - old
    }
}

/// Highest level a creature can be created at.
pub const MAX_LEVEL: u32 = 100;

/// Input description of a creature for encounter creation.
///
/// Every field left unset falls back to the engine defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatureSpec {
    pub name: Option<String>,
    pub kind: Option<CreatureKind>,
    pub level: Option<u32>,
    pub max_health: Option<i32>,
    pub current_health: Option<i32>,
    pub armor: Option<i32>,
    pub position: Option<Position>,
    #[serde(default)]
    pub damage_modifiers: Vec<DamageModifier>,
}

impl CreatureSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: CreatureKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_max_health(mut self, max_health: i32) -> Self {
        self.max_health = Some(max_health);
        self
    }

    pub fn with_current_health(mut self, current_health: i32) -> Self {
        self.current_health = Some(current_health);
        self
    }

    pub fn with_armor(mut self, armor: i32) -> Self {
        self.armor = Some(armor);
        self
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.position = Some(Position::new(x, y));
        self
    }

    pub fn with_damage_modifier(mut self, modifier: DamageModifier) -> Self {
        self.damage_modifiers.push(modifier);
        self
    }
}
