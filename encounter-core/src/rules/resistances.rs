//! Immunities, resistances, and weaknesses.
//!
//! Owns no action. Rewrites every damage effect another module produced
//! before it reaches the encounter.

use super::{ActionContext, Effect, Resolution, RuleModule, RuleViolation};
use crate::combat::apply_damage_modifiers;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ResistanceRules;

impl ResistanceRules {
    pub fn new() -> Self {
        Self
    }
}

impl RuleModule for ResistanceRules {
    fn name(&self) -> &'static str {
        "resistances"
    }

    fn validate(&self, _ctx: &ActionContext<'_>) -> Result<(), RuleViolation> {
        Ok(())
    }

    fn after_apply(&mut self, ctx: &ActionContext<'_>, resolution: &mut Resolution) {
        let mut adjusted = Vec::new();
        for effect in &mut resolution.effects {
            let Effect::Damage {
                target,
                raw,
                amount,
                damage_type,
                ..
            } = effect
            else {
                continue;
            };
            let Some(creature) = ctx.encounter.creature(*target) else {
                continue;
            };
            let modified = apply_damage_modifiers(*raw, *damage_type, &creature.damage_modifiers);
            if modified.modifiers_applied && modified.amount != *amount {
                debug!(
                    target = %target,
                    raw = *raw,
                    amount = modified.amount,
                    damage_type = %damage_type,
                    "Damage modified"
                );
                adjusted.push((creature.name.clone(), *raw, modified.amount));
                *amount = modified.amount;
            }
        }

        for (name, raw, amount) in adjusted {
            let note = if amount == 0 {
                format!(" ({name} is unaffected)")
            } else if amount < raw {
                format!(" ({name} resists, taking {amount})")
            } else {
                format!(" ({name} is vulnerable, taking {amount})")
            };
            resolution.message.push_str(&note);
            if let Some(details) = resolution.details.as_object_mut() {
                details.insert("damage".to_string(), amount.into());
                details.insert("raw_damage".to_string(), raw.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creature::{CreatureKind, CreatureSpec, DamageModifier, DamageType};
    use crate::rules::{ActionKind, ActionRequest};
    use crate::testing::ScenarioBuilder;
    use serde_json::json;

    #[test]
    fn test_adjusts_damage_effects() {
        let encounter = ScenarioBuilder::new(5)
            .player("Hero", 0, 0)
            .creature(
                CreatureSpec::named("Golem")
                    .with_kind(CreatureKind::Hostile)
                    .with_damage_modifier(DamageModifier::resistance(DamageType::Physical, 3))
                    .at(1, 0),
            )
            .build_encounter();
        let golem = encounter.creatures[1].id;
        let request = ActionRequest::strike(golem);
        let ctx = ActionContext {
            encounter: &encounter,
            actor: &encounter.creatures[0],
            request: &request,
            kind: &ActionKind::Strike,
            cost: 1,
        };

        let mut resolution = Resolution::new("Hero hit Golem for 8 damage")
            .with_effect(Effect::Damage {
                target: golem,
                raw: 8,
                amount: 8,
                damage_type: DamageType::Physical,
                source: "a strike".to_string(),
            })
            .with_details(json!({ "damage": 8 }));
        ResistanceRules::new().after_apply(&ctx, &mut resolution);

        assert!(matches!(
            resolution.effects[0],
            Effect::Damage { raw: 8, amount: 5, .. }
        ));
        assert_eq!(resolution.details["damage"], 5);
        assert!(resolution.message.contains("resists"));
    }
}
