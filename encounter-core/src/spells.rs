//! Spell catalogue.
//!
//! A [`SpellBook`] is built once when an engine starts and shared between
//! encounters behind an `Arc`. Nothing here is mutable after construction.

use crate::creature::{Condition, DamageType};
use crate::dice::{DiceExpression, DieType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schools the rules know how to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpellSchool {
    /// Direct damage to a target.
    Evocation,
    /// Temporary armor bonus on the caster.
    Abjuration,
    /// Temporary attack bonus on the caster.
    Transmutation,
}

impl SpellSchool {
    pub fn name(&self) -> &'static str {
        match self {
            SpellSchool::Evocation => "Evocation",
            SpellSchool::Abjuration => "Abjuration",
            SpellSchool::Transmutation => "Transmutation",
        }
    }
}

/// One castable spell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellDefinition {
    pub id: String,
    pub name: String,
    pub level: u32,
    pub school: SpellSchool,
    pub action_cost: u32,
    /// Rounds a self-buff lasts.
    pub duration: u32,
    /// Damage dice before the caster's level is added.
    pub damage: Option<DiceExpression>,
    pub damage_type: DamageType,
    /// Armor or attack bonus granted by a buff.
    pub bonus: i32,
}

impl SpellDefinition {
    /// Whether the spell has to be pointed at someone other than the caster.
    pub fn needs_target(&self) -> bool {
        self.school == SpellSchool::Evocation
    }

    /// The condition a buff spell leaves on its caster.
    pub fn buff_condition(&self) -> Option<Condition> {
        match self.school {
            SpellSchool::Evocation => None,
            SpellSchool::Abjuration => Some(Condition::armor_bonus(
                format!("protected-{}", self.id),
                self.duration,
                self.bonus,
            )),
            SpellSchool::Transmutation => Some(Condition::attack_bonus(
                format!("enhanced-{}", self.id),
                self.duration,
                self.bonus,
            )),
        }
    }
}

/// Spells keyed by id.
#[derive(Debug, Clone, Default)]
pub struct SpellBook {
    spells: BTreeMap<String, SpellDefinition>,
}

impl SpellBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Magic missile, shield, and haste.
    pub fn standard() -> Self {
        let mut book = Self::new();
        book.insert(SpellDefinition {
            id: "magic-missile".to_string(),
            name: "Magic Missile".to_string(),
            level: 1,
            school: SpellSchool::Evocation,
            action_cost: 2,
            duration: 0,
            damage: Some(DiceExpression::simple(1, DieType::D6, 0)),
            damage_type: DamageType::Force,
            bonus: 0,
        });
        book.insert(SpellDefinition {
            id: "shield".to_string(),
            name: "Shield".to_string(),
            level: 1,
            school: SpellSchool::Abjuration,
            action_cost: 1,
            duration: 1,
            damage: None,
            damage_type: DamageType::Force,
            bonus: 2,
        });
        book.insert(SpellDefinition {
            id: "haste".to_string(),
            name: "Haste".to_string(),
            level: 3,
            school: SpellSchool::Transmutation,
            action_cost: 2,
            duration: 3,
            damage: None,
            damage_type: DamageType::Force,
            bonus: 1,
        });
        book
    }

    /// Add or replace a spell.
    pub fn insert(&mut self, spell: SpellDefinition) {
        self.spells.insert(spell.id.clone(), spell);
    }

    pub fn get(&self, id: &str) -> Option<&SpellDefinition> {
        self.spells.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpellDefinition> {
        self.spells.values()
    }

    pub fn len(&self) -> usize {
        self.spells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spells.is_empty()
    }
}
