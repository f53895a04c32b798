//! The `apply-condition` action.

use super::{ActionContext, ActionKind, Effect, Resolution, RuleModule, RuleViolation};
use crate::creature::{Condition, ConditionDuration, Creature};
use crate::dice::Dice;
use serde_json::json;

#[derive(Debug, Clone, Default)]
pub struct ConditionRules;

impl ConditionRules {
    pub fn new() -> Self {
        Self
    }

    fn check<'a>(ctx: &ActionContext<'a>) -> Result<(&'a Creature, &'a Condition), RuleViolation> {
        let condition = ctx
            .request
            .condition
            .as_ref()
            .ok_or_else(|| RuleViolation::InvalidCondition("no condition given".to_string()))?;
        if condition.name.trim().is_empty() {
            return Err(RuleViolation::InvalidCondition("empty name".to_string()));
        }
        if condition.duration == ConditionDuration::Rounds(0) {
            return Err(RuleViolation::InvalidCondition(format!(
                "{} has no duration",
                condition.name
            )));
        }

        let target = match ctx.request.target_id {
            Some(id) => ctx
                .encounter
                .creature(id)
                .ok_or(RuleViolation::InvalidTarget)?,
            None => ctx.actor,
        };
        if target
            .condition(&condition.name)
            .is_some_and(Condition::is_permanent)
        {
            return Err(RuleViolation::PermanentCondition(condition.name.clone()));
        }
        Ok((target, condition))
    }
}

impl RuleModule for ConditionRules {
    fn name(&self) -> &'static str {
        "conditions"
    }

    fn owns(&self, kind: &ActionKind) -> bool {
        *kind == ActionKind::ApplyCondition
    }

    fn validate(&self, ctx: &ActionContext<'_>) -> Result<(), RuleViolation> {
        if *ctx.kind != ActionKind::ApplyCondition {
            return Ok(());
        }
        Self::check(ctx).map(|_| ())
    }

    fn apply(&mut self, ctx: &ActionContext<'_>, _dice: &mut Dice) -> Result<Resolution, RuleViolation> {
        let (target, condition) = Self::check(ctx)?;
        let refresh = target.has_condition(&condition.name);
        Ok(Resolution::new(format!(
            "{} applies {} to {}",
            ctx.actor.name, condition, target.name
        ))
        .with_effect(Effect::ConditionApplied {
            target: target.id,
            condition: condition.clone(),
        })
        .with_details(json!({
            "target": target.id,
            "condition": condition,
            "refresh": refresh,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encounter::Encounter;
    use crate::rules::ActionRequest;
    use crate::testing::ScenarioBuilder;

    fn validate(encounter: &Encounter, request: ActionRequest) -> Result<(), RuleViolation> {
        ConditionRules::new().validate(&ActionContext {
            encounter,
            actor: &encounter.creatures[0],
            request: &request,
            kind: &ActionKind::ApplyCondition,
            cost: 1,
        })
    }

    #[test]
    fn test_defaults_to_self() {
        let encounter = ScenarioBuilder::new(5).player("Hero", 0, 0).build_encounter();
        let request = ActionRequest::condition(Condition::new("blessed", 2));
        let ctx = ActionContext {
            encounter: &encounter,
            actor: &encounter.creatures[0],
            request: &request,
            kind: &ActionKind::ApplyCondition,
            cost: 1,
        };
        let resolution = ConditionRules::new()
            .apply(&ctx, &mut Dice::seeded(0))
            .unwrap();
        assert!(matches!(
            &resolution.effects[..],
            [Effect::ConditionApplied { target, .. }] if *target == encounter.creatures[0].id
        ));
    }

    #[test]
    fn test_rejects_bad_conditions() {
        let encounter = ScenarioBuilder::new(5).player("Hero", 0, 0).build_encounter();
        assert!(matches!(
            validate(&encounter, ActionRequest::new("apply-condition")),
            Err(RuleViolation::InvalidCondition(_))
        ));
        assert!(matches!(
            validate(&encounter, ActionRequest::condition(Condition::new("dazed", 0))),
            Err(RuleViolation::InvalidCondition(_))
        ));
        assert!(matches!(
            validate(&encounter, ActionRequest::condition(Condition::new(" ", 1))),
            Err(RuleViolation::InvalidCondition(_))
        ));
    }

    #[test]
    fn test_permanent_condition_cannot_be_reapplied() {
        let mut encounter = ScenarioBuilder::new(5)
            .player("Hero", 0, 0)
            .hostile("Goblin", 3, 3)
            .build_encounter();
        encounter.creatures[1].apply_condition(Condition::permanent("cursed"));
        let goblin = encounter.creatures[1].id;

        assert_eq!(
            validate(
                &encounter,
                ActionRequest::condition(Condition::new("cursed", 2)).targeting(goblin)
            ),
            Err(RuleViolation::PermanentCondition("cursed".to_string()))
        );
        // Timed conditions can be refreshed
        assert!(validate(
            &encounter,
            ActionRequest::condition(Condition::new("slowed", 2)).targeting(goblin)
        )
        .is_ok());
    }
}
