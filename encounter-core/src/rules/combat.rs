//! The `strike` action.

use super::{ActionContext, ActionKind, Effect, Resolution, RuleModule, RuleViolation};
use crate::combat::{roll_attack, roll_damage, AttackRoll, DamageRoll};
use crate::creature::{Creature, DamageType};
use crate::dice::{Dice, DiceExpression};
use serde_json::json;

/// The target of a melee attack: standing, and within `reach`.
pub(crate) fn melee_target<'a>(ctx: &ActionContext<'a>, reach: u32) -> Result<&'a Creature, RuleViolation> {
    let target = ctx.living_target()?;
    let distance = ctx.actor.position.chebyshev_distance(target.position);
    if distance > reach {
        return Err(RuleViolation::OutOfReach { distance, reach });
    }
    Ok(target)
}

/// Roll a melee attack and, on a hit, its damage.
pub(crate) fn resolve_melee(
    actor: &Creature,
    target: &Creature,
    attack_modifier: i32,
    damage: &DiceExpression,
    source: &str,
    dice: &mut Dice,
) -> Resolution {
    let attack = roll_attack(dice, actor.attack_bonus() + attack_modifier, target.armor_class());
    let mut resolution = Resolution::new(format!(
        "{} {} {} with {} (roll {} vs armor {})",
        actor.name,
        attack.outcome.verb(),
        target.name,
        source,
        attack.total,
        attack.armor
    ));

    let mut damage_roll: Option<DamageRoll> = None;
    if attack.outcome.is_hit() {
        let rolled = roll_damage(dice, damage, actor.level, attack.outcome.is_critical());
        resolution.message.push_str(&format!(" for {} damage", rolled.total));
        resolution = resolution
            .with_effect(Effect::DiceRolled {
                roll: rolled.roll.clone(),
                purpose: format!("{source} damage"),
            })
            .with_effect(Effect::Damage {
                target: target.id,
                raw: rolled.total,
                amount: rolled.total,
                damage_type: DamageType::Physical,
                source: source.to_string(),
            });
        damage_roll = Some(rolled);
    }

    resolution.with_details(attack_details(&attack, damage_roll.as_ref()))
}

fn attack_details(attack: &AttackRoll, damage: Option<&DamageRoll>) -> serde_json::Value {
    json!({
        "attack": attack,
        "hit": attack.outcome.is_hit(),
        "damage": damage.map(|d| d.total),
        "damage_roll": damage.map(|d| d.roll.to_string()),
    })
}

#[derive(Debug, Clone)]
pub struct CombatRules {
    reach: u32,
    damage: DiceExpression,
}

impl CombatRules {
    pub fn new(reach: u32, damage: DiceExpression) -> Self {
        Self { reach, damage }
    }
}

impl RuleModule for CombatRules {
    fn name(&self) -> &'static str {
        "combat"
    }

    fn owns(&self, kind: &ActionKind) -> bool {
        *kind == ActionKind::Strike
    }

    fn validate(&self, ctx: &ActionContext<'_>) -> Result<(), RuleViolation> {
        if *ctx.kind != ActionKind::Strike {
            return Ok(());
        }
        melee_target(ctx, self.reach).map(|_| ())
    }

    fn apply(&mut self, ctx: &ActionContext<'_>, dice: &mut Dice) -> Result<Resolution, RuleViolation> {
        let target = melee_target(ctx, self.reach)?;
        Ok(resolve_melee(ctx.actor, target, 0, &self.damage, "a strike", dice))
    }
}
