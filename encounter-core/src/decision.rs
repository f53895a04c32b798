//! The seam for whatever chooses actions on a creature's behalf.
//!
//! A [`DecisionProvider`] only ever sees a snapshot. Whatever it proposes
//! goes back through [`EncounterEngine::act`](crate::EncounterEngine::act)
//! and is validated like any other request.

use crate::config::EngineConfig;
use crate::creature::{Creature, CreatureId, Position};
use crate::encounter::Encounter;
use crate::movement::reachable;
use crate::rules::{ActionRequest, RuleViolation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecisionError {
    #[error("Decision timed out after {0:?}")]
    Timeout(Duration),
    #[error("Decision provider failed: {0}")]
    Provider(String),
    #[error("Decision was rejected: {0}")]
    Rejected(RuleViolation),
}

/// A proposed action plus the provider's reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action_id: String,
    pub target_id: Option<CreatureId>,
    pub target_position: Option<Position>,
    pub reasoning: String,
}

impl Decision {
    pub fn new(action_id: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            target_id: None,
            target_position: None,
            reasoning: reasoning.into(),
        }
    }

    pub fn targeting(mut self, target: CreatureId) -> Self {
        self.target_id = Some(target);
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.target_position = Some(position);
        self
    }

    pub fn to_request(&self) -> ActionRequest {
        ActionRequest {
            action_id: self.action_id.clone(),
            target_id: self.target_id,
            target_position: self.target_position,
            ..ActionRequest::default()
        }
    }
}

#[async_trait]
pub trait DecisionProvider: Send + Sync {
    async fn decide(&self, encounter: &Encounter, actor: CreatureId) -> Result<Decision, DecisionError>;
}

/// Strike the nearest enemy in reach, otherwise close the distance.
#[derive(Debug, Clone)]
pub struct NaiveTactician {
    reach: u32,
    budget: f64,
}

impl NaiveTactician {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            reach: config.melee_reach,
            budget: config.movement_budget,
        }
    }

    fn choose(&self, encounter: &Encounter, actor: &Creature) -> Decision {
        if actor.is_incapacitated() {
            return Decision::new("pass", "down and out");
        }

        let nearest = encounter
            .creatures
            .iter()
            .filter(|c| c.side() != actor.side() && !c.is_incapacitated())
            .min_by_key(|c| actor.position.chebyshev_distance(c.position));
        let Some(enemy) = nearest else {
            return Decision::new("pass", "no enemies left standing");
        };

        let distance = actor.position.chebyshev_distance(enemy.position);
        if distance <= self.reach {
            return Decision::new("strike", format!("{} is within reach", enemy.name))
                .targeting(enemy.id);
        }

        let step = reachable(&encounter.grid, actor.position, self.budget)
            .into_iter()
            .filter(|(p, _)| encounter.occupant(*p).is_none())
            .min_by(|(a, cost_a), (b, cost_b)| {
                a.chebyshev_distance(enemy.position)
                    .cmp(&b.chebyshev_distance(enemy.position))
                    .then(cost_a.total_cmp(cost_b))
            });
        match step {
            Some((to, _)) if to.chebyshev_distance(enemy.position) < distance => {
                Decision::new("move", format!("closing on {}", enemy.name)).at(to)
            }
            _ => Decision::new("pass", format!("no way to get closer to {}", enemy.name)),
        }
    }
}

#[async_trait]
impl DecisionProvider for NaiveTactician {
    async fn decide(&self, encounter: &Encounter, actor: CreatureId) -> Result<Decision, DecisionError> {
        let creature = encounter
            .creature(actor)
            .ok_or_else(|| DecisionError::Provider(format!("unknown creature {actor}")))?;
        Ok(self.choose(encounter, creature))
    }
}
