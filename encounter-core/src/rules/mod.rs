//! Action resolution pipeline.
//!
//! An [`ActionRequest`] is parsed into an [`ActionKind`], every registered
//! [`RuleModule`] validates it, and the single module that owns the kind
//! resolves it into a [`Resolution`]: a list of [`Effect`]s plus a message.
//! Effects are pure data until [`apply_effects`] writes them into the
//! encounter, so a rejected action never touches state.

pub mod abilities;
pub mod combat;
pub mod conditions;
pub mod economy;
pub mod movement;
pub mod registry;
pub mod resistances;
pub mod spells;

pub use registry::{Dispatched, ModuleRegistry};

use crate::creature::{Condition, ConditionChange, Creature, CreatureId, DamageType, Position};
use crate::dice::{Dice, RollResult};
use crate::encounter::{Encounter, LogKind};
use crate::movement::MovementError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Requests
// ============================================================================

/// The category an action id resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "kebab-case")]
pub enum ActionKind {
    Strike,
    Move,
    ApplyCondition,
    Spell(String),
    Ability(String),
    Pass,
}

impl FromStr for ActionKind {
    type Err = RuleViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strike" => Ok(ActionKind::Strike),
            "move" => Ok(ActionKind::Move),
            "apply-condition" => Ok(ActionKind::ApplyCondition),
            "pass" => Ok(ActionKind::Pass),
            other => match other.split_once(':') {
                Some(("spell", id)) if !id.is_empty() => Ok(ActionKind::Spell(id.to_string())),
                Some(("ability", id)) if !id.is_empty() => Ok(ActionKind::Ability(id.to_string())),
                _ => Err(RuleViolation::UnknownAction(s.to_string())),
            },
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Strike => write!(f, "strike"),
            ActionKind::Move => write!(f, "move"),
            ActionKind::ApplyCondition => write!(f, "apply-condition"),
            ActionKind::Spell(id) => write!(f, "spell:{id}"),
            ActionKind::Ability(id) => write!(f, "ability:{id}"),
            ActionKind::Pass => write!(f, "pass"),
        }
    }
}

/// An action as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action_id: String,
    pub target_id: Option<CreatureId>,
    pub target_position: Option<Position>,
    /// Payload for `apply-condition`.
    pub condition: Option<Condition>,
    /// Declared cost, for actions whose module doesn't fix one.
    pub action_cost: Option<u32>,
}

impl ActionRequest {
    pub fn new(action_id: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            ..Self::default()
        }
    }

    pub fn strike(target: CreatureId) -> Self {
        Self::new("strike").targeting(target)
    }

    pub fn move_to(x: i32, y: i32) -> Self {
        Self::new("move").at(Position::new(x, y))
    }

    pub fn spell(id: &str) -> Self {
        Self::new(format!("spell:{id}"))
    }

    pub fn ability(id: &str) -> Self {
        Self::new(format!("ability:{id}"))
    }

    pub fn condition(condition: Condition) -> Self {
        Self::new("apply-condition").with_condition(condition)
    }

    pub fn pass() -> Self {
        Self::new("pass")
    }

    pub fn targeting(mut self, target: CreatureId) -> Self {
        self.target_id = Some(target);
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.target_position = Some(position);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_cost(mut self, cost: u32) -> Self {
        self.action_cost = Some(cost);
        self
    }

    /// The declared cost, or 1.
    pub fn declared_cost(&self) -> u32 {
        self.action_cost.unwrap_or(1)
    }
}

// ============================================================================
// Violations
// ============================================================================

/// A resource that can run out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Resource {
    ActionPoints,
    SpellSlot { level: u32 },
    AbilityCharge { ability: String },
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::ActionPoints => write!(f, "action points"),
            Resource::SpellSlot { level } => write!(f, "level {level} spell slots"),
            Resource::AbilityCharge { ability } => write!(f, "{ability} charges"),
        }
    }
}

/// Why a rule module refused an action.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "violation", content = "detail", rename_all = "kebab-case")]
pub enum RuleViolation {
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("It is not this creature's turn")]
    NotYourTurn,
    #[error("Creature is incapacitated")]
    Incapacitated,
    #[error("Out of {resource}")]
    ResourceExhausted { resource: Resource },
    #[error("Action needs a target")]
    MissingTarget,
    #[error("Invalid target")]
    InvalidTarget,
    #[error("Target is already down")]
    TargetDefeated,
    #[error("Target is {distance} squares away, reach is {reach}")]
    OutOfReach { distance: u32, reach: u32 },
    #[error("Move needs a destination")]
    MissingDestination,
    #[error("No valid path to destination")]
    NoPath,
    #[error("Path costs {cost:.1} but only {budget:.1} movement is available")]
    OutOfRange { cost: f64, budget: f64 },
    #[error("Destination {0} is off the map")]
    OutOfBounds(Position),
    #[error("Destination {0} is occupied")]
    Occupied(Position),
    #[error("Unknown spell: {0}")]
    UnknownSpell(String),
    #[error("Unknown ability: {0}")]
    UnknownAbility(String),
    #[error("Invalid condition: {0}")]
    InvalidCondition(String),
    #[error("{0} is permanent and cannot be reapplied")]
    PermanentCondition(String),
}

impl From<MovementError> for RuleViolation {
    fn from(err: MovementError) -> Self {
        match err {
            MovementError::NoPath => RuleViolation::NoPath,
            MovementError::OutOfRange { cost, budget } => RuleViolation::OutOfRange { cost, budget },
            MovementError::OutOfBounds(position) => RuleViolation::OutOfBounds(position),
        }
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// A concrete state change produced by resolving an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Effect {
    /// A dice roll occurred. Recorded for the log only.
    DiceRolled { roll: RollResult, purpose: String },
    Moved {
        creature: CreatureId,
        from: Position,
        to: Position,
        cost: f64,
    },
    /// `amount` is what lands after resistances; `raw` is what was rolled.
    Damage {
        target: CreatureId,
        raw: i32,
        amount: i32,
        damage_type: DamageType,
        source: String,
    },
    Healed { target: CreatureId, amount: i32 },
    ConditionApplied {
        target: CreatureId,
        condition: Condition,
    },
}

/// The result of resolving an action.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub effects: Vec<Effect>,
    pub message: String,
    pub details: serde_json::Value,
}

impl Resolution {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            effects: Vec::new(),
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Everything a module sees while checking or resolving one action.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub encounter: &'a Encounter,
    pub actor: &'a Creature,
    pub request: &'a ActionRequest,
    pub kind: &'a ActionKind,
    /// Cost declared by the owning module.
    pub cost: u32,
}

impl<'a> ActionContext<'a> {
    /// The declared target, which must be a different creature still standing.
    pub fn living_target(&self) -> Result<&'a Creature, RuleViolation> {
        let id = self.request.target_id.ok_or(RuleViolation::MissingTarget)?;
        if id == self.actor.id {
            return Err(RuleViolation::InvalidTarget);
        }
        let target = self
            .encounter
            .creature(id)
            .ok_or(RuleViolation::InvalidTarget)?;
        if target.is_incapacitated() {
            return Err(RuleViolation::TargetDefeated);
        }
        Ok(target)
    }
}

/// One independent piece of the rules.
///
/// Every module validates every action, passing anything outside its own
/// category. Only the first module that [`owns`](RuleModule::owns) an
/// action resolves it. After resolution every module sees the result in
/// [`after_apply`](RuleModule::after_apply), before effects hit the encounter.
pub trait RuleModule: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    fn owns(&self, _kind: &ActionKind) -> bool {
        false
    }

    /// Cost of an action this module owns.
    fn action_cost(&self, _kind: &ActionKind, request: &ActionRequest) -> u32 {
        request.declared_cost()
    }

    fn validate(&self, ctx: &ActionContext<'_>) -> Result<(), RuleViolation>;

    /// Resolve an action this module owns. Only called after validation passed.
    fn apply(&mut self, ctx: &ActionContext<'_>, _dice: &mut Dice) -> Result<Resolution, RuleViolation> {
        Err(RuleViolation::UnknownAction(ctx.kind.to_string()))
    }

    fn after_apply(&mut self, _ctx: &ActionContext<'_>, _resolution: &mut Resolution) {}

    fn on_turn_start(&mut self, _creature: CreatureId) {}

    /// Whether `creature` has nothing left to do this turn.
    fn turn_spent(&self, _creature: CreatureId) -> bool {
        false
    }

    /// Restore daily resources for one creature, or everyone.
    fn on_rest(&mut self, _creature: Option<CreatureId>) {}
}

/// Write resolved effects into the encounter and log them.
pub fn apply_effects(encounter: &mut Encounter, effects: &[Effect]) {
    for effect in effects {
        apply_effect(encounter, effect);
    }
}

/// Apply a single effect to the encounter.
pub fn apply_effect(encounter: &mut Encounter, effect: &Effect) {
    match effect {
        Effect::DiceRolled { .. } => {}
        Effect::Moved { creature, to, .. } => {
            if let Some(c) = encounter.creature_mut(*creature) {
                c.position = *to;
            }
        }
        Effect::Damage {
            target,
            amount,
            damage_type,
            source,
            ..
        } => {
            let Some(c) = encounter.creature_mut(*target) else {
                return;
            };
            let result = c.take_damage(*amount);
            let (name, health) = (c.name.clone(), c.current_health);

            encounter.log(
                LogKind::Damage,
                format!("{name} takes {} {damage_type} damage from {source}", result.damage_taken),
                json!({
                    "target": target,
                    "amount": result.damage_taken,
                    "damage_type": damage_type,
                    "current_health": health,
                }),
            );
            if result.dropped_to_zero {
                encounter.log(
                    LogKind::Death,
                    format!("{name} falls"),
                    json!({ "creature": target }),
                );
            }
        }
        Effect::Healed { target, amount } => {
            if let Some(c) = encounter.creature_mut(*target) {
                c.heal(*amount);
            }
        }
        Effect::ConditionApplied { target, condition } => {
            let Some(c) = encounter.creature_mut(*target) else {
                return;
            };
            let change = c.apply_condition(condition.clone());
            let name = c.name.clone();
            let verb = match change {
                ConditionChange::Added => "gains",
                ConditionChange::Refreshed => "refreshes",
            };
            encounter.log(
                LogKind::Condition,
                format!("{name} {verb} {condition}"),
                json!({ "creature": target, "condition": condition, "change": change }),
            );
        }
    }
}
