//! Module registry: every module gates, one module resolves.

use super::abilities::AbilityRules;
use super::combat::CombatRules;
use super::conditions::ConditionRules;
use super::economy::ActionEconomy;
use super::movement::MovementRules;
use super::resistances::ResistanceRules;
use super::spells::SpellRules;
use super::{ActionContext, ActionKind, ActionRequest, Resolution, RuleModule, RuleViolation};
use crate::abilities::AbilityBook;
use crate::config::EngineConfig;
use crate::creature::{Creature, CreatureId};
use crate::dice::Dice;
use crate::encounter::Encounter;
use crate::engine::EngineError;
use crate::spells::SpellBook;
use std::sync::Arc;
use tracing::debug;

/// An action that made it through validation and resolution.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub kind: ActionKind,
    pub cost: u32,
    /// Name of the module that resolved it.
    pub module: &'static str,
    pub resolution: Resolution,
}

#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: Vec<Box<dyn RuleModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full rule set, configured from `config`.
    pub fn standard(config: &EngineConfig, spells: Arc<SpellBook>, abilities: Arc<AbilityBook>) -> Self {
        let mut registry = Self::new();
        registry
            .register(ActionEconomy::new(config.action_points_per_turn))
            .register(MovementRules::new(config.movement_budget))
            .register(CombatRules::new(
                config.melee_reach,
                config.strike_damage.clone(),
            ))
            .register(ConditionRules::new())
            .register(SpellRules::new(spells))
            .register(AbilityRules::new(
                abilities,
                config.melee_reach,
                config.strike_damage.clone(),
            ))
            .register(ResistanceRules::new());
        registry
    }

    /// Add a module, replacing any module registered under the same name.
    pub fn register(&mut self, module: impl RuleModule + 'static) -> &mut Self {
        let module: Box<dyn RuleModule> = Box::new(module);
        match self.modules.iter().position(|m| m.name() == module.name()) {
            Some(index) => self.modules[index] = module,
            None => self.modules.push(module),
        }
        self
    }

    /// `(name, version)` of every registered module.
    pub fn modules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.modules.iter().map(|m| (m.name(), m.version()))
    }

    fn owner(&self, kind: &ActionKind) -> Option<usize> {
        self.modules.iter().position(|m| m.owns(kind))
    }

    /// Every module must accept the action.
    pub fn validate(&self, ctx: &ActionContext<'_>) -> Result<(), RuleViolation> {
        for module in &self.modules {
            if let Err(violation) = module.validate(ctx) {
                debug!(module = module.name(), %violation, "Action rejected");
                return Err(violation);
            }
        }
        Ok(())
    }

    /// Validate and resolve one action without touching the encounter.
    ///
    /// Returns the resolution for the caller to apply. A rejection leaves
    /// every module's own state untouched too.
    pub fn dispatch(
        &mut self,
        encounter: &Encounter,
        actor: &Creature,
        request: &ActionRequest,
        dice: &mut Dice,
    ) -> Result<Dispatched, EngineError> {
        let kind: ActionKind = request.action_id.parse()?;
        let owner = self
            .owner(&kind)
            .ok_or_else(|| RuleViolation::UnknownAction(request.action_id.clone()))?;
        let cost = self.modules[owner].action_cost(&kind, request);

        let ctx = ActionContext {
            encounter,
            actor,
            request,
            kind: &kind,
            cost,
        };
        self.validate(&ctx)?;

        let module = &mut self.modules[owner];
        let name = module.name();
        let mut resolution =
            module
                .apply(&ctx, dice)
                .map_err(|violation| EngineError::ModuleContract {
                    module: name.to_string(),
                    reason: format!("rejected {kind} after validating it: {violation}"),
                })?;

        for module in &mut self.modules {
            module.after_apply(&ctx, &mut resolution);
        }
        debug!(module = name, action = %kind, cost, "Action resolved");

        Ok(Dispatched {
            kind,
            cost,
            module: name,
            resolution,
        })
    }

    pub fn on_turn_start(&mut self, creature: CreatureId) {
        for module in &mut self.modules {
            module.on_turn_start(creature);
        }
    }

    pub fn turn_spent(&self, creature: CreatureId) -> bool {
        self.modules.iter().any(|m| m.turn_spent(creature))
    }

    pub fn on_rest(&mut self, creature: Option<CreatureId>) {
        for module in &mut self.modules {
            module.on_rest(creature);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Effect;
    use crate::testing::ScenarioBuilder;

    /// Owns nothing, refuses everything.
    #[derive(Debug)]
    struct Veto;

    impl RuleModule for Veto {
        fn name(&self) -> &'static str {
            "veto"
        }

        fn validate(&self, _ctx: &ActionContext<'_>) -> Result<(), RuleViolation> {
            Err(RuleViolation::InvalidTarget)
        }
    }

    /// Claims to own strikes but never resolves them.
    #[derive(Debug)]
    struct Broken;

    impl RuleModule for Broken {
        fn name(&self) -> &'static str {
            "combat"
        }

        fn owns(&self, kind: &ActionKind) -> bool {
            *kind == ActionKind::Strike
        }

        fn validate(&self, _ctx: &ActionContext<'_>) -> Result<(), RuleViolation> {
            Ok(())
        }
    }

    fn standard() -> ModuleRegistry {
        ModuleRegistry::standard(
            &EngineConfig::default(),
            Arc::new(SpellBook::standard()),
            Arc::new(AbilityBook::standard()),
        )
    }

    #[test]
    fn test_standard_modules() {
        let names: Vec<_> = standard().modules().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            [
                "action-economy",
                "movement",
                "combat",
                "conditions",
                "spells",
                "abilities",
                "resistances"
            ]
        );
    }

    #[test]
    fn test_any_module_can_veto() {
        let encounter = ScenarioBuilder::new(5).player("Hero", 0, 0).build_encounter();
        let mut registry = standard();
        registry.register(Veto);

        let result = registry.dispatch(
            &encounter,
            &encounter.creatures[0],
            &ActionRequest::move_to(1, 0),
            &mut Dice::seeded(0),
        );
        assert!(matches!(
            result,
            Err(EngineError::ValidationFailed(RuleViolation::InvalidTarget))
        ));
    }

    #[test]
    fn test_only_owner_resolves() {
        let encounter = ScenarioBuilder::new(5).player("Hero", 0, 0).build_encounter();
        let mut registry = standard();
        let dispatched = registry
            .dispatch(
                &encounter,
                &encounter.creatures[0],
                &ActionRequest::move_to(2, 1),
                &mut Dice::seeded(0),
            )
            .unwrap();
        assert_eq!(dispatched.module, "movement");
        assert_eq!(dispatched.cost, 1);
        assert!(matches!(
            dispatched.resolution.effects[..],
            [Effect::Moved { .. }]
        ));
    }

    #[test]
    fn test_unknown_action_is_a_validation_failure() {
        let encounter = ScenarioBuilder::new(5).player("Hero", 0, 0).build_encounter();
        let result = standard().dispatch(
            &encounter,
            &encounter.creatures[0],
            &ActionRequest::new("dance"),
            &mut Dice::seeded(0),
        );
        assert!(matches!(
            result,
            Err(EngineError::ValidationFailed(RuleViolation::UnknownAction(_)))
        ));
    }

    #[test]
    fn test_owner_that_cannot_resolve_is_a_contract_violation() {
        let encounter = ScenarioBuilder::new(5)
            .player("Hero", 0, 0)
            .hostile("Goblin", 1, 0)
            .build_encounter();
        let mut registry = standard();
        registry.register(Broken);

        let result = registry.dispatch(
            &encounter,
            &encounter.creatures[0],
            &ActionRequest::strike(encounter.creatures[1].id),
            &mut Dice::seeded(0),
        );
        assert!(matches!(
            result,
            Err(EngineError::ModuleContract { ref module, .. }) if module == "combat"
        ));
    }
}
