//! Turn-based tactical encounter rules engine.
//!
//! This crate provides:
//! - Encounters on a tile map with initiative order and rounds
//! - Pluggable rule modules that validate and resolve every action
//! - Seeded, reproducible dice
//! - A decision-provider seam for automated actors
//!
//! # Quick Start
//!
//! ```ignore
//! use encounter_core::{ActionRequest, CreatureSpec, EncounterEngine, EngineConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = EncounterEngine::new(EngineConfig::from_env()?);
//!     let encounter = engine.create(
//!         vec![CreatureSpec::named("Thorin")],
//!         vec![CreatureSpec::named("Goblin")],
//!         10,
//!     )?;
//!
//!     let actor = encounter.current_actor().expect("someone acts first");
//!     let report = engine.act(encounter.id, actor, ActionRequest::move_to(3, 3))?;
//!     println!("{}", report.outcome.message);
//!     Ok(())
//! }
//! ```

pub mod abilities;
pub mod combat;
pub mod config;
pub mod creature;
pub mod decision;
pub mod dice;
pub mod encounter;
pub mod engine;
pub mod ledger;
pub mod movement;
pub mod rules;
pub mod spells;
pub mod terrain;
pub mod testing;

// Primary public API
pub use config::{ConfigError, EngineConfig, StallPolicy, TurnAdvance};
pub use creature::{
    Condition, Creature, CreatureId, CreatureKind, CreatureSpec, EncounterId, Position, Side,
    MAX_LEVEL,
};
pub use decision::{Decision, DecisionError, DecisionProvider, NaiveTactician};
pub use dice::{Dice, DiceExpression};
pub use encounter::{Encounter, LogEntry, LogKind, TurnTransition};
pub use engine::{
    ActionReport, DecidedTurn, EncounterEngine, EncounterSetup, EngineError, Outcome,
    MAX_MAP_SIZE, MIN_MAP_SIZE,
};
pub use rules::{ActionRequest, RuleModule, RuleViolation};
pub use terrain::{Terrain, TerrainGrid};
pub use testing::{Scenario, ScenarioBuilder};
