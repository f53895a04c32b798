//! The `move` action.

use super::{ActionContext, ActionKind, Effect, Resolution, RuleModule, RuleViolation};
use crate::creature::Position;
use crate::dice::Dice;
use crate::movement::{resolve_move, PathCost};
use serde_json::json;

#[derive(Debug, Clone)]
pub struct MovementRules {
    budget: f64,
}

impl MovementRules {
    pub fn new(budget: f64) -> Self {
        Self { budget }
    }

    fn check(&self, ctx: &ActionContext<'_>) -> Result<PathCost, RuleViolation> {
        let to = ctx
            .request
            .target_position
            .ok_or(RuleViolation::MissingDestination)?;
        if !ctx.encounter.grid.contains(to) {
            return Err(RuleViolation::OutOfBounds(to));
        }
        if to != ctx.actor.position && occupied(ctx, to) {
            return Err(RuleViolation::Occupied(to));
        }
        Ok(resolve_move(
            &ctx.encounter.grid,
            ctx.actor.position,
            to,
            self.budget,
        )?)
    }
}

fn occupied(ctx: &ActionContext<'_>, position: Position) -> bool {
    ctx.encounter
        .occupant(position)
        .is_some_and(|c| c.id != ctx.actor.id)
}

impl RuleModule for MovementRules {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn owns(&self, kind: &ActionKind) -> bool {
        *kind == ActionKind::Move
    }

    fn validate(&self, ctx: &ActionContext<'_>) -> Result<(), RuleViolation> {
        if *ctx.kind != ActionKind::Move {
            return Ok(());
        }
        self.check(ctx).map(|_| ())
    }

    fn apply(&mut self, ctx: &ActionContext<'_>, _dice: &mut Dice) -> Result<Resolution, RuleViolation> {
        let path = self.check(ctx)?;
        Ok(Resolution::new(format!(
            "{} moves from {} to {} ({:.1} movement)",
            ctx.actor.name, path.from, path.to, path.cost
        ))
        .with_effect(Effect::Moved {
            creature: ctx.actor.id,
            from: path.from,
            to: path.to,
            cost: path.cost,
        })
        .with_details(json!({
            "from": path.from,
            "to": path.to,
            "cost": path.cost,
            "budget": self.budget,
        })))
    }
}
