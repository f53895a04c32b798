//! `spell:<id>` actions and spell slots.

use super::{ActionContext, ActionKind, ActionRequest, Effect, Resolution, Resource, RuleModule, RuleViolation};
use crate::creature::CreatureId;
use crate::dice::Dice;
use crate::ledger::SpellSlotLedger;
use crate::spells::{SpellBook, SpellDefinition, SpellSchool};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SpellRules {
    book: Arc<SpellBook>,
    slots: SpellSlotLedger,
}

impl SpellRules {
    pub fn new(book: Arc<SpellBook>) -> Self {
        Self {
            book,
            slots: SpellSlotLedger::new(),
        }
    }

    pub fn slots_used(&self, creature: CreatureId, level: u32) -> u32 {
        self.slots.used(creature, level)
    }

    fn spell(&self, kind: &ActionKind) -> Option<Result<&SpellDefinition, RuleViolation>> {
        match kind {
            ActionKind::Spell(id) => Some(
                self.book
                    .get(id)
                    .ok_or_else(|| RuleViolation::UnknownSpell(id.clone())),
            ),
            _ => None,
        }
    }

    fn check(&self, ctx: &ActionContext<'_>, spell: &SpellDefinition) -> Result<(), RuleViolation> {
        if !self.slots.can_cast(ctx.actor.id, spell.level, ctx.actor.level) {
            return Err(RuleViolation::ResourceExhausted {
                resource: Resource::SpellSlot { level: spell.level },
            });
        }
        match spell.school {
            _ if spell.needs_target() => ctx.living_target().map(|_| ()),
            // Self-buff that has to be explicitly aimed at the caster
            SpellSchool::Transmutation => match ctx.request.target_id {
                Some(id) if id == ctx.actor.id => Ok(()),
                Some(_) => Err(RuleViolation::InvalidTarget),
                None => Err(RuleViolation::MissingTarget),
            },
            _ => Ok(()),
        }
    }
}

impl RuleModule for SpellRules {
    fn name(&self) -> &'static str {
        "spells"
    }

    fn owns(&self, kind: &ActionKind) -> bool {
        matches!(kind, ActionKind::Spell(_))
    }

    fn action_cost(&self, kind: &ActionKind, request: &ActionRequest) -> u32 {
        match self.spell(kind) {
            Some(Ok(spell)) => spell.action_cost,
            _ => request.declared_cost(),
        }
    }

    fn validate(&self, ctx: &ActionContext<'_>) -> Result<(), RuleViolation> {
        match self.spell(ctx.kind) {
            None => Ok(()),
            Some(spell) => self.check(ctx, spell?),
        }
    }

    fn apply(&mut self, ctx: &ActionContext<'_>, dice: &mut Dice) -> Result<Resolution, RuleViolation> {
        let spell = match self.spell(ctx.kind) {
            Some(spell) => spell?.clone(),
            None => return Err(RuleViolation::UnknownAction(ctx.kind.to_string())),
        };
        self.check(ctx, &spell)?;

        let caster = ctx.actor;
        let resolution = match (&spell.damage, spell.buff_condition()) {
            (Some(damage), _) => {
                let target = ctx.living_target()?;
                let roll = dice.roll(&damage.plus(caster.level_bonus()));
                let amount = roll.total.max(0);
                Resolution::new(format!(
                    "{} casts {} at {} for {} damage",
                    caster.name, spell.name, target.name, amount
                ))
                .with_effect(Effect::DiceRolled {
                    roll: roll.clone(),
                    purpose: format!("{} damage", spell.name),
                })
                .with_effect(Effect::Damage {
                    target: target.id,
                    raw: amount,
                    amount,
                    damage_type: spell.damage_type,
                    source: spell.name.clone(),
                })
                .with_details(json!({
                    "spell": spell.id,
                    "school": spell.school,
                    "target": target.id,
                    "damage": amount,
                    "damage_roll": roll.to_string(),
                }))
            }
            (None, Some(condition)) => Resolution::new(format!(
                "{} casts {} and gains {}",
                caster.name, spell.name, condition
            ))
            .with_effect(Effect::ConditionApplied {
                target: caster.id,
                condition: condition.clone(),
            })
            .with_details(json!({
                "spell": spell.id,
                "school": spell.school,
                "condition": condition,
            })),
            (None, None) => Resolution::new(format!("{} casts {}", caster.name, spell.name))
                .with_details(json!({ "spell": spell.id })),
        };

        self.slots.record(caster.id, spell.level);
        debug!(
            caster = %caster.id,
            spell = %spell.id,
            school = spell.school.name(),
            used = self.slots.used(caster.id, spell.level),
            "Spell slot used"
        );
        Ok(resolution)
    }

    fn on_rest(&mut self, creature: Option<CreatureId>) {
        match creature {
            Some(id) => self.slots.reset(id),
            None => self.slots.reset_all(),
        }
    }
}
