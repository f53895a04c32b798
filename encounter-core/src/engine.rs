//! Encounter engine: the public façade over every running encounter.
//!
//! Each encounter lives behind its own mutex inside a concurrent map, so
//! operations on different encounters never wait on each other while
//! operations on the same encounter are serialized.

use crate::abilities::AbilityBook;
use crate::config::{EngineConfig, StallPolicy, TurnAdvance};
use crate::creature::{
    Creature, CreatureId, CreatureKind, CreatureSpec, EncounterId, Position, Side, MAX_LEVEL,
};
use crate::decision::{Decision, DecisionError, DecisionProvider};
use crate::dice::Dice;
use crate::encounter::{Encounter, LogKind, RoundAction, TurnTransition};
use crate::rules::{apply_effects, ActionKind, ActionRequest, Dispatched, ModuleRegistry, RuleViolation};
use crate::spells::SpellBook;
use crate::terrain::TerrainGrid;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Smallest map edge an encounter can be created with.
pub const MIN_MAP_SIZE: u32 = 3;

/// Largest map edge an encounter can be created with.
pub const MAX_MAP_SIZE: u32 = 256;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Encounter not found: {0}")]
    EncounterNotFound(EncounterId),

    #[error("Creature not found: {0}")]
    CreatureNotFound(CreatureId),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] RuleViolation),

    #[error("Rule module {module} broke its contract: {reason}")]
    ModuleContract { module: String, reason: String },

    #[error(transparent)]
    Decision(#[from] DecisionError),
}

impl EngineError {
    /// The rule that refused the action, for a validation failure.
    pub fn violation(&self) -> Option<&RuleViolation> {
        match self {
            EngineError::ValidationFailed(violation) => Some(violation),
            _ => None,
        }
    }
}

/// What happened when an action was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    /// One human-readable line.
    pub message: String,
    /// Per-module structured payload.
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    /// Snapshot taken after the action and any turn advance.
    pub encounter: Encounter,
    pub outcome: Outcome,
    /// `None` when the actor keeps the turn.
    pub transition: Option<TurnTransition>,
}

/// Result of [`EncounterEngine::run_decided_turn`].
#[derive(Debug, Clone)]
pub struct DecidedTurn {
    pub actor: CreatureId,
    /// What the provider proposed, if it proposed anything.
    pub decision: Option<Decision>,
    /// Why a pass was forced instead, if one was.
    pub forced: Option<DecisionError>,
    pub report: ActionReport,
}

/// Everything needed to create an encounter.
#[derive(Debug, Clone, Default)]
pub struct EncounterSetup {
    pub players: Vec<CreatureSpec>,
    pub opponents: Vec<CreatureSpec>,
    pub map_size: u32,
    /// Hand-made map. Replaces the generated one and `map_size`.
    pub grid: Option<TerrainGrid>,
    pub seed: Option<u64>,
    /// Explicit dice stream. Takes priority over `seed`.
    pub dice: Option<Dice>,
}

impl EncounterSetup {
    pub fn new(players: Vec<CreatureSpec>, opponents: Vec<CreatureSpec>, map_size: u32) -> Self {
        Self {
            players,
            opponents,
            map_size,
            ..Self::default()
        }
    }

    pub fn with_grid(mut self, grid: TerrainGrid) -> Self {
        self.grid = Some(grid);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_dice(mut self, dice: Dice) -> Self {
        self.dice = Some(dice);
        self
    }
}

#[derive(Debug)]
struct EncounterSession {
    encounter: Encounter,
    registry: ModuleRegistry,
    dice: Dice,
}

fn lock(session: &Mutex<EncounterSession>) -> MutexGuard<'_, EncounterSession> {
    // A panic mid-action never leaves partial state behind, so a poisoned
    // session is still consistent.
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct EncounterEngine {
    sessions: DashMap<EncounterId, Arc<Mutex<EncounterSession>>>,
    config: EngineConfig,
    spells: Arc<SpellBook>,
    abilities: Arc<AbilityBook>,
    streams: AtomicU64,
}

impl Default for EncounterEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl EncounterEngine {
    /// An engine with the standard spell and ability catalogues.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_catalogues(config, SpellBook::standard(), AbilityBook::standard())
    }

    pub fn with_catalogues(config: EngineConfig, spells: SpellBook, abilities: AbilityBook) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
            spells: Arc::new(spells),
            abilities: Arc::new(abilities),
            streams: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn spells(&self) -> &SpellBook {
        &self.spells
    }

    pub fn abilities(&self) -> &AbilityBook {
        &self.abilities
    }

    /// Ids of every live encounter.
    pub fn encounter_ids(&self) -> Vec<EncounterId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn session(&self, id: EncounterId) -> Result<Arc<Mutex<EncounterSession>>, EngineError> {
        self.sessions
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(EngineError::EncounterNotFound(id))
    }

    fn next_stream(&self) -> Dice {
        match self.config.base_seed {
            Some(base) => Dice::seeded(Dice::derive_seed(
                base,
                self.streams.fetch_add(1, Ordering::Relaxed),
            )),
            None => Dice::from_entropy(),
        }
    }

    /// Create an encounter on a generated `map_size` × `map_size` map.
    pub fn create(
        &self,
        players: Vec<CreatureSpec>,
        opponents: Vec<CreatureSpec>,
        map_size: u32,
    ) -> Result<Encounter, EngineError> {
        self.create_with(EncounterSetup::new(players, opponents, map_size))
    }

    #[instrument(skip(self, setup), fields(players = setup.players.len(), opponents = setup.opponents.len()))]
    pub fn create_with(&self, setup: EncounterSetup) -> Result<Encounter, EngineError> {
        let EncounterSetup {
            players,
            opponents,
            map_size,
            grid,
            seed,
            dice,
        } = setup;

        if players.is_empty() && opponents.is_empty() {
            return Err(EngineError::InvalidConfiguration(
                "an encounter needs at least one creature".to_string(),
            ));
        }

        self.config
            .validate()
            .map_err(|err| EngineError::InvalidConfiguration(err.to_string()))?;

        let mut dice = match (dice, seed) {
            (Some(dice), _) => dice,
            (None, Some(seed)) => Dice::seeded(seed),
            (None, None) => self.next_stream(),
        };

        let grid = match grid {
            Some(grid) => {
                let edges = MIN_MAP_SIZE..=MAX_MAP_SIZE;
                if !edges.contains(&grid.width()) || !edges.contains(&grid.height()) {
                    return Err(EngineError::InvalidConfiguration(format!(
                        "map is {}x{}, edges must be within {MIN_MAP_SIZE}..={MAX_MAP_SIZE}",
                        grid.width(),
                        grid.height()
                    )));
                }
                grid
            }
            None => {
                if !(MIN_MAP_SIZE..=MAX_MAP_SIZE).contains(&map_size) {
                    return Err(EngineError::InvalidConfiguration(format!(
                        "map size {map_size} is outside {MIN_MAP_SIZE}..={MAX_MAP_SIZE}"
                    )));
                }
                TerrainGrid::generate(map_size, self.config.difficult_terrain_chance, &mut dice)
            }
        };

        let roster: Vec<(CreatureSpec, Side, String)> = players
            .into_iter()
            .enumerate()
            .map(|(i, spec)| (spec, Side::Players, format!("Player {}", i + 1)))
            .chain(
                opponents
                    .into_iter()
                    .enumerate()
                    .map(|(i, spec)| (spec, Side::Opponents, format!("Opponent {}", i + 1))),
            )
            .collect();

        // Check every creature before building any of them.
        let mut taken = HashSet::new();
        for (spec, side, fallback) in &roster {
            let name = spec.name.as_deref().unwrap_or(fallback);
            self.check_spec(spec, *side, name)?;
            if let Some(position) = spec.position {
                if !grid.is_passable(position) {
                    return Err(EngineError::InvalidConfiguration(format!(
                        "{name} cannot start at {position}"
                    )));
                }
                if !taken.insert(position) {
                    return Err(EngineError::InvalidConfiguration(format!(
                        "{name} starts on an occupied tile {position}"
                    )));
                }
            }
        }

        let mut free: Vec<Position> = grid
            .positions()
            .filter(|p| grid.is_passable(*p) && !taken.contains(p))
            .collect();
        let unplaced = roster.iter().filter(|(s, _, _)| s.position.is_none()).count();
        if unplaced > free.len() {
            return Err(EngineError::InvalidConfiguration(format!(
                "{unplaced} creatures need a starting tile but only {} are free",
                free.len()
            )));
        }

        let mut creatures = Vec::with_capacity(roster.len());
        for (spec, side, fallback) in roster {
            let position = match spec.position {
                Some(position) => position,
                None => {
                    let index = dice.pick(free.len()).ok_or_else(|| {
                        EngineError::InvalidConfiguration("ran out of starting tiles".to_string())
                    })?;
                    free.swap_remove(index)
                }
            };
            creatures.push(self.build_creature(spec, side, fallback, position));
        }

        for creature in &mut creatures {
            creature.initiative = (dice.d20() as i32).saturating_add(creature.level_bonus());
        }

        let mut encounter = Encounter::new(EncounterId::new(), creatures, grid, dice.seed());
        let initiative: Vec<_> = encounter
            .round
            .turn_order
            .iter()
            .filter_map(|id| encounter.creature(*id))
            .map(|c| json!({ "creature": c.id, "name": c.name, "initiative": c.initiative }))
            .collect();
        encounter.log(
            LogKind::System,
            format!(
                "Encounter begins with {} creatures on a {}x{} map",
                encounter.creatures.len(),
                encounter.grid.width(),
                encounter.grid.height()
            ),
            json!({ "initiative": initiative, "seed": encounter.seed }),
        );

        let mut registry =
            ModuleRegistry::standard(&self.config, Arc::clone(&self.spells), Arc::clone(&self.abilities));
        if let Some(first) = encounter.current_actor() {
            registry.on_turn_start(first);
        }

        info!(
            encounter_id = %encounter.id,
            creatures = encounter.creatures.len(),
            seed = encounter.seed,
            "Encounter created"
        );

        let snapshot = encounter.clone();
        self.sessions.insert(
            encounter.id,
            Arc::new(Mutex::new(EncounterSession {
                encounter,
                registry,
                dice,
            })),
        );
        Ok(snapshot)
    }

    fn check_spec(&self, spec: &CreatureSpec, side: Side, name: &str) -> Result<(), EngineError> {
        let invalid = |reason: String| Err(EngineError::InvalidConfiguration(reason));

        if let Some(kind) = spec.kind {
            if kind.side() != side {
                return invalid(format!("{name} is listed on the wrong side"));
            }
        }
        if let Some(level) = spec.level {
            if !(1..=MAX_LEVEL).contains(&level) {
                return invalid(format!("{name} has level {level}, outside 1..={MAX_LEVEL}"));
            }
        }
        let max_health = spec.max_health.unwrap_or(self.config.default_max_health);
        if max_health <= 0 {
            return invalid(format!("{name} has non-positive max health {max_health}"));
        }
        if let Some(current) = spec.current_health {
            if !(0..=max_health).contains(&current) {
                return invalid(format!(
                    "{name} has {current} health, outside 0..={max_health}"
                ));
            }
        }
        Ok(())
    }

    fn build_creature(&self, spec: CreatureSpec, side: Side, fallback: String, position: Position) -> Creature {
        let max_health = spec.max_health.unwrap_or(self.config.default_max_health);
        Creature {
            id: CreatureId::new(),
            name: spec.name.unwrap_or(fallback),
            kind: spec.kind.unwrap_or(match side {
                Side::Players => CreatureKind::Player,
                Side::Opponents => CreatureKind::Hostile,
            }),
            level: spec.level.unwrap_or(self.config.default_level),
            max_health,
            current_health: spec.current_health.unwrap_or(max_health),
            armor: spec.armor.unwrap_or(self.config.default_armor),
            position,
            conditions: Vec::new(),
            initiative: 0,
            damage_modifiers: spec.damage_modifiers,
        }
    }

    /// Validate and apply one action.
    ///
    /// A rejected action leaves the encounter exactly as it was.
    #[instrument(skip(self, request), fields(encounter_id = %encounter_id, actor = %actor_id, action = %request.action_id))]
    pub fn act(
        &self,
        encounter_id: EncounterId,
        actor_id: CreatureId,
        request: ActionRequest,
    ) -> Result<ActionReport, EngineError> {
        let session = self.session(encounter_id)?;
        let mut guard = lock(&session);
        let EncounterSession {
            encounter,
            registry,
            dice,
        } = &mut *guard;

        let actor = encounter
            .creature(actor_id)
            .cloned()
            .ok_or(EngineError::CreatureNotFound(actor_id))?;
        if let Some(target) = request.target_id {
            if encounter.creature(target).is_none() {
                return Err(EngineError::CreatureNotFound(target));
            }
        }

        let Dispatched {
            kind,
            cost,
            module,
            resolution,
        } = match registry.dispatch(encounter, &actor, &request, dice) {
            Ok(dispatched) => dispatched,
            Err(err) => {
                warn!(error = %err, "Action rejected");
                return Err(err);
            }
        };

        encounter.log(
            LogKind::Action,
            resolution.message.clone(),
            json!({
                "actor": actor_id,
                "action": request.action_id,
                "module": module,
                "cost": cost,
                "details": resolution.details,
            }),
        );
        apply_effects(encounter, &resolution.effects);
        encounter.record_action(RoundAction {
            actor: actor_id,
            action_id: request.action_id.clone(),
            target: request.target_id,
            target_position: request.target_position,
            success: true,
        });

        let still_standing = encounter
            .creature(actor_id)
            .is_some_and(|c| !c.is_incapacitated());
        let advance = kind == ActionKind::Pass
            || (still_standing
                && match self.config.turn_advance {
                    TurnAdvance::EveryAction => true,
                    TurnAdvance::WhenActionsSpent => registry.turn_spent(actor_id),
                });

        let transition = advance.then(|| {
            let transition = encounter.advance_turn();
            registry.on_turn_start(transition.actor());
            if let TurnTransition::RoundComplete { round, .. } = transition {
                info!(encounter_id = %encounter_id, round, "Round complete");
            }
            transition
        });
        debug!(module, cost, advanced = advance, "Action applied");

        Ok(ActionReport {
            encounter: encounter.clone(),
            outcome: Outcome {
                success: true,
                message: resolution.message,
                details: resolution.details,
            },
            transition,
        })
    }

    /// Read-only snapshot of an encounter.
    pub fn get(&self, encounter_id: EncounterId) -> Result<Encounter, EngineError> {
        let session = self.session(encounter_id)?;
        let guard = lock(&session);
        Ok(guard.encounter.clone())
    }

    /// Restore spell slots and ability charges for one creature, or everyone.
    #[instrument(skip(self), fields(encounter_id = %encounter_id))]
    pub fn rest(
        &self,
        encounter_id: EncounterId,
        creature: Option<CreatureId>,
    ) -> Result<Encounter, EngineError> {
        let session = self.session(encounter_id)?;
        let mut guard = lock(&session);
        let EncounterSession {
            encounter,
            registry,
            ..
        } = &mut *guard;

        let message = match creature {
            Some(id) => {
                let name = encounter
                    .creature(id)
                    .map(|c| c.name.clone())
                    .ok_or(EngineError::CreatureNotFound(id))?;
                format!("{name} rests")
            }
            None => "Everyone rests".to_string(),
        };
        registry.on_rest(creature);
        encounter.log(LogKind::System, message, json!({ "rest": creature }));
        info!(encounter_id = %encounter_id, ?creature, "Rested");
        Ok(encounter.clone())
    }

    /// Drop an encounter, returning its final state.
    #[instrument(skip(self), fields(encounter_id = %encounter_id))]
    pub fn discard(&self, encounter_id: EncounterId) -> Result<Encounter, EngineError> {
        let (_, session) = self
            .sessions
            .remove(&encounter_id)
            .ok_or(EngineError::EncounterNotFound(encounter_id))?;
        let encounter = lock(&session).encounter.clone();
        info!(encounter_id = %encounter_id, round = encounter.round.number, "Encounter discarded");
        Ok(encounter)
    }

    /// Ask `provider` for the current actor's move and submit it.
    ///
    /// The provider runs outside the encounter lock under the configured
    /// timeout. A timeout, provider error, or rejected decision is handled
    /// by the configured [`StallPolicy`].
    #[instrument(skip(self, provider), fields(encounter_id = %encounter_id))]
    pub async fn run_decided_turn(
        &self,
        encounter_id: EncounterId,
        provider: &dyn DecisionProvider,
    ) -> Result<DecidedTurn, EngineError> {
        let (snapshot, actor) = {
            let session = self.session(encounter_id)?;
            let guard = lock(&session);
            let actor = guard.encounter.current_actor().ok_or_else(|| {
                EngineError::InvalidConfiguration("encounter has no turn order".to_string())
            })?;
            (guard.encounter.clone(), actor)
        };

        let timeout = self.config.decision_timeout;
        let (decision, failure) =
            match tokio::time::timeout(timeout, provider.decide(&snapshot, actor)).await {
                Ok(Ok(decision)) => match self.act(encounter_id, actor, decision.to_request()) {
                    Ok(report) => {
                        return Ok(DecidedTurn {
                            actor,
                            decision: Some(decision),
                            forced: None,
                            report,
                        })
                    }
                    Err(EngineError::ValidationFailed(violation)) => {
                        (Some(decision), DecisionError::Rejected(violation))
                    }
                    // A provider naming a creature that is not here picked a bad target
                    Err(EngineError::CreatureNotFound(id)) if decision.target_id == Some(id) => {
                        (Some(decision), DecisionError::Rejected(RuleViolation::InvalidTarget))
                    }
                    Err(other) => return Err(other),
                },
                Ok(Err(err)) => (None, err),
                Err(_) => (None, DecisionError::Timeout(timeout)),
            };

        match self.config.stall_policy {
            StallPolicy::Wait => {
                warn!(actor = %actor, error = %failure, "Decision failed, actor keeps the turn");
                Err(failure.into())
            }
            StallPolicy::ForcePass => {
                warn!(actor = %actor, error = %failure, "Decision failed, forcing a pass");
                let report = self.act(encounter_id, actor, ActionRequest::pass())?;
                Ok(DecidedTurn {
                    actor,
                    decision,
                    forced: Some(failure),
                    report,
                })
            }
        }
    }
}
