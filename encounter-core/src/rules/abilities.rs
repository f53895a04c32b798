//! `ability:<id>` actions and daily charges.

use super::combat::{melee_target, resolve_melee};
use super::{ActionContext, ActionKind, ActionRequest, Effect, Resolution, Resource, RuleModule, RuleViolation};
use crate::abilities::{AbilityBook, AbilityDefinition, AbilityEffect};
use crate::creature::CreatureId;
use crate::dice::{Dice, DiceExpression};
use crate::ledger::ChargeLedger;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AbilityRules {
    book: Arc<AbilityBook>,
    charges: ChargeLedger,
    reach: u32,
    strike_damage: DiceExpression,
}

impl AbilityRules {
    pub fn new(book: Arc<AbilityBook>, reach: u32, strike_damage: DiceExpression) -> Self {
        Self {
            book,
            charges: ChargeLedger::new(),
            reach,
            strike_damage,
        }
    }

    /// Charges left, or `None` for an unlimited or unknown ability.
    pub fn charges_left(&self, creature: CreatureId, ability: &str) -> Option<u32> {
        let per_day = self.book.get(ability)?.charges_per_day;
        self.charges.remaining(creature, ability, per_day)
    }

    fn ability(&self, kind: &ActionKind) -> Option<Result<&AbilityDefinition, RuleViolation>> {
        match kind {
            ActionKind::Ability(id) => Some(
                self.book
                    .get(id)
                    .ok_or_else(|| RuleViolation::UnknownAbility(id.clone())),
            ),
            _ => None,
        }
    }

    fn check(&self, ctx: &ActionContext<'_>, ability: &AbilityDefinition) -> Result<(), RuleViolation> {
        if !self
            .charges
            .has_charge(ctx.actor.id, &ability.id, ability.charges_per_day)
        {
            return Err(RuleViolation::ResourceExhausted {
                resource: Resource::AbilityCharge {
                    ability: ability.id.clone(),
                },
            });
        }
        match ability.effect {
            AbilityEffect::Strike { .. } => melee_target(ctx, self.reach).map(|_| ()),
            AbilityEffect::Heal { .. } => Ok(()),
        }
    }
}

impl RuleModule for AbilityRules {
    fn name(&self) -> &'static str {
        "abilities"
    }

    fn owns(&self, kind: &ActionKind) -> bool {
        matches!(kind, ActionKind::Ability(_))
    }

    fn action_cost(&self, kind: &ActionKind, request: &ActionRequest) -> u32 {
        match self.ability(kind) {
            Some(Ok(ability)) => ability.action_cost,
            _ => request.declared_cost(),
        }
    }

    fn validate(&self, ctx: &ActionContext<'_>) -> Result<(), RuleViolation> {
        match self.ability(ctx.kind) {
            None => Ok(()),
            Some(ability) => self.check(ctx, ability?),
        }
    }

    fn apply(&mut self, ctx: &ActionContext<'_>, dice: &mut Dice) -> Result<Resolution, RuleViolation> {
        let ability = match self.ability(ctx.kind) {
            Some(ability) => ability?.clone(),
            None => return Err(RuleViolation::UnknownAction(ctx.kind.to_string())),
        };
        self.check(ctx, &ability)?;

        let actor = ctx.actor;
        let mut resolution = match &ability.effect {
            AbilityEffect::Strike {
                attack_modifier,
                extra_damage,
            } => {
                let target = melee_target(ctx, self.reach)?;
                let damage = self.strike_damage.combined(extra_damage);
                resolve_melee(actor, target, *attack_modifier, &damage, &ability.name, dice)
            }
            AbilityEffect::Heal { dice: heal } => {
                let roll = dice.roll(&heal.plus(actor.level_bonus()));
                let healed = roll.total.max(0).min(actor.max_health - actor.current_health);
                Resolution::new(format!(
                    "{} uses {} and recovers {} health",
                    actor.name, ability.name, healed
                ))
                .with_effect(Effect::DiceRolled {
                    roll: roll.clone(),
                    purpose: ability.name.clone(),
                })
                .with_effect(Effect::Healed {
                    target: actor.id,
                    amount: healed,
                })
                .with_details(json!({ "healed": healed, "roll": roll.to_string() }))
            }
        };

        if let Some(details) = resolution.details.as_object_mut() {
            details.insert("ability".to_string(), json!(ability.id));
        }
        if !ability.is_unlimited() {
            self.charges
                .spend(actor.id, &ability.id, ability.charges_per_day);
            if let Some(details) = resolution.details.as_object_mut() {
                details.insert(
                    "charges_left".to_string(),
                    json!(self
                        .charges
                        .remaining(actor.id, &ability.id, ability.charges_per_day)),
                );
            }
        }
        Ok(resolution)
    }

    fn on_rest(&mut self, creature: Option<CreatureId>) {
        match creature {
            Some(id) => self.charges.reset(id),
            None => self.charges.reset_all(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::strike_dice;
    use crate::encounter::Encounter;
    use crate::testing::ScenarioBuilder;

    fn rules() -> AbilityRules {
        AbilityRules::new(Arc::new(AbilityBook::standard()), 1, strike_dice())
    }

    fn use_ability(
        rules: &mut AbilityRules,
        encounter: &Encounter,
        request: ActionRequest,
        dice: &mut Dice,
    ) -> Result<Resolution, RuleViolation> {
        let kind: ActionKind = request.action_id.parse()?;
        let ctx = ActionContext {
            encounter,
            actor: &encounter.creatures[0],
            request: &request,
            kind: &kind,
            cost: rules.action_cost(&kind, &request),
        };
        rules.validate(&ctx)?;
        rules.apply(&ctx, dice)
    }

    #[test]
    fn test_second_wind_is_once_per_day() {
        let mut encounter = ScenarioBuilder::new(5).player("Hero", 0, 0).build_encounter();
        encounter.creatures[0].current_health = 5;
        let hero = encounter.creatures[0].id;
        let mut rules = rules();
        let mut dice = Dice::scripted([6]);

        let resolution =
            use_ability(&mut rules, &encounter, ActionRequest::ability("second-wind"), &mut dice)
                .unwrap();
        assert!(resolution
            .effects
            .contains(&Effect::Healed { target: hero, amount: 7 }));
        assert_eq!(rules.charges_left(hero, "second-wind"), Some(0));

        assert_eq!(
            use_ability(&mut rules, &encounter, ActionRequest::ability("second-wind"), &mut dice),
            Err(RuleViolation::ResourceExhausted {
                resource: Resource::AbilityCharge {
                    ability: "second-wind".to_string()
                }
            })
        );

        rules.on_rest(None);
        assert_eq!(rules.charges_left(hero, "second-wind"), Some(1));
    }

    #[test]
    fn test_heal_is_capped_at_max() {
        let mut encounter = ScenarioBuilder::new(5).player("Hero", 0, 0).build_encounter();
        encounter.creatures[0].current_health = 18;
        let hero = encounter.creatures[0].id;
        let resolution = use_ability(
            &mut rules(),
            &encounter,
            ActionRequest::ability("second-wind"),
            &mut Dice::scripted([8]),
        )
        .unwrap();
        assert!(resolution
            .effects
            .contains(&Effect::Healed { target: hero, amount: 2 }));
    }

    #[test]
    fn test_power_attack_adds_dice_and_lowers_accuracy() {
        let encounter = ScenarioBuilder::new(5)
            .player("Hero", 0, 0)
            .hostile("Ogre", 1, 1)
            .build_encounter();
        let ogre = encounter.creatures[1].id;
        let mut rules = rules();

        // 14 + 3 - 2 = 15 vs 10: hit. d8 = 5, d6 = 3, +1 level.
        let hit = use_ability(
            &mut rules,
            &encounter,
            ActionRequest::ability("power-attack").targeting(ogre),
            &mut Dice::scripted([14, 5, 3]),
        )
        .unwrap();
        assert_eq!(hit.details["attack"]["total"], 15);
        assert_eq!(hit.details["damage"], 9);
        // Unlimited
        assert_eq!(rules.charges_left(encounter.creatures[0].id, "power-attack"), None);
        assert!(hit.details.get("charges_left").is_none());
        assert_eq!(hit.details["ability"], "power-attack");

        // 8 + 3 - 2 = 9 falls short of armor 10
        let miss = use_ability(
            &mut rules,
            &encounter,
            ActionRequest::ability("power-attack").targeting(ogre),
            &mut Dice::scripted([8]),
        )
        .unwrap();
        assert_eq!(miss.details["hit"], false);
    }

    #[test]
    fn test_unknown_ability() {
        let encounter = ScenarioBuilder::new(5).player("Hero", 0, 0).build_encounter();
        assert_eq!(
            use_ability(
                &mut rules(),
                &encounter,
                ActionRequest::ability("fly"),
                &mut Dice::seeded(0)
            ),
            Err(RuleViolation::UnknownAbility("fly".to_string()))
        );
    }
}
