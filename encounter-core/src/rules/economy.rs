//! Turn gating and the per-turn action point budget.

use super::{ActionContext, ActionKind, ActionRequest, Resolution, Resource, RuleModule, RuleViolation};
use crate::creature::CreatureId;
use crate::dice::Dice;
use crate::ledger::ActionLedger;
use serde_json::json;
use tracing::debug;

/// Gates every action: right creature, still standing, enough points left.
///
/// Owns `pass`, which costs nothing.
#[derive(Debug, Clone)]
pub struct ActionEconomy {
    points_per_turn: u32,
    ledger: ActionLedger,
}

impl ActionEconomy {
    pub fn new(points_per_turn: u32) -> Self {
        Self {
            points_per_turn,
            ledger: ActionLedger::new(),
        }
    }

    pub fn spent(&self, creature: CreatureId) -> u32 {
        self.ledger.spent(creature)
    }

    pub fn remaining(&self, creature: CreatureId) -> u32 {
        self.points_per_turn.saturating_sub(self.spent(creature))
    }
}

impl RuleModule for ActionEconomy {
    fn name(&self) -> &'static str {
        "action-economy"
    }

    fn owns(&self, kind: &ActionKind) -> bool {
        *kind == ActionKind::Pass
    }

    fn action_cost(&self, _kind: &ActionKind, _request: &ActionRequest) -> u32 {
        0
    }

    fn validate(&self, ctx: &ActionContext<'_>) -> Result<(), RuleViolation> {
        if ctx.encounter.current_actor() != Some(ctx.actor.id) {
            return Err(RuleViolation::NotYourTurn);
        }
        if *ctx.kind == ActionKind::Pass {
            return Ok(());
        }
        if ctx.actor.is_incapacitated() {
            return Err(RuleViolation::Incapacitated);
        }
        if self
            .ledger
            .would_exceed(ctx.actor.id, ctx.cost, self.points_per_turn)
        {
            return Err(RuleViolation::ResourceExhausted {
                resource: Resource::ActionPoints,
            });
        }
        Ok(())
    }

    fn apply(&mut self, ctx: &ActionContext<'_>, _dice: &mut Dice) -> Result<Resolution, RuleViolation> {
        Ok(Resolution::new(format!("{} ends their turn", ctx.actor.name))
            .with_details(json!({ "passed": true })))
    }

    fn after_apply(&mut self, ctx: &ActionContext<'_>, _resolution: &mut Resolution) {
        self.ledger.record(ctx.actor.id, ctx.cost);
        debug!(
            actor = %ctx.actor.id,
            cost = ctx.cost,
            spent = self.ledger.spent(ctx.actor.id),
            "Action points spent"
        );
    }

    fn on_turn_start(&mut self, creature: CreatureId) {
        self.ledger.reset(creature);
    }

    fn turn_spent(&self, creature: CreatureId) -> bool {
        self.remaining(creature) == 0
    }
}
