//! Special ability catalogue.

use crate::dice::{DiceExpression, DieType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What using an ability does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AbilityEffect {
    /// A melee strike with a to-hit adjustment and extra damage dice.
    Strike {
        attack_modifier: i32,
        extra_damage: DiceExpression,
    },
    /// Heal the user for dice + level.
    Heal { dice: DiceExpression },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityDefinition {
    pub id: String,
    pub name: String,
    pub action_cost: u32,
    /// `None` means the ability can be used any number of times.
    pub charges_per_day: Option<u32>,
    pub effect: AbilityEffect,
}

impl AbilityDefinition {
    pub fn is_unlimited(&self) -> bool {
        self.charges_per_day.is_none()
    }
}

/// Abilities keyed by id.
#[derive(Debug, Clone, Default)]
pub struct AbilityBook {
    abilities: BTreeMap<String, AbilityDefinition>,
}

impl AbilityBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Power attack and second wind.
    pub fn standard() -> Self {
        let mut book = Self::new();
        book.insert(AbilityDefinition {
            id: "power-attack".to_string(),
            name: "Power Attack".to_string(),
            action_cost: 2,
            charges_per_day: None,
            effect: AbilityEffect::Strike {
                attack_modifier: -2,
                extra_damage: DiceExpression::simple(1, DieType::D6, 0),
            },
        });
        book.insert(AbilityDefinition {
            id: "second-wind".to_string(),
            name: "Second Wind".to_string(),
            action_cost: 1,
            charges_per_day: Some(1),
            effect: AbilityEffect::Heal {
                dice: DiceExpression::simple(1, DieType::D8, 0),
            },
        });
        book
    }

    pub fn insert(&mut self, ability: AbilityDefinition) {
        self.abilities.insert(ability.id.clone(), ability);
    }

    pub fn get(&self, id: &str) -> Option<&AbilityDefinition> {
        self.abilities.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AbilityDefinition> {
        self.abilities.values()
    }
}
