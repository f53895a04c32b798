//! Testing utilities for encounters.
//!
//! This module provides tools for integration testing:
//! - `ScenarioBuilder` for hand-placed creatures on hand-made maps
//! - `Scenario` for driving a built encounter by creature name
//! - Assertion helpers for verifying encounter state

use crate::config::EngineConfig;
use crate::creature::{Creature, CreatureId, CreatureKind, CreatureSpec, Position};
use crate::dice::Dice;
use crate::encounter::Encounter;
use crate::engine::{ActionReport, EncounterEngine, EncounterSetup, EngineError};
use crate::rules::ActionRequest;
use crate::terrain::{Terrain, TerrainGrid};

/// Initiative face every scenario creature rolls, so creatures of equal
/// level act in the order they were added.
const SCENARIO_INITIATIVE: u32 = 10;

/// Builds an encounter with fixed positions and scripted dice.
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    grid: TerrainGrid,
    players: Vec<CreatureSpec>,
    opponents: Vec<CreatureSpec>,
    rolls: Vec<u32>,
    config: EngineConfig,
}

impl ScenarioBuilder {
    /// An open `size` × `size` map with nobody on it.
    pub fn new(size: u32) -> Self {
        Self {
            grid: TerrainGrid::open(size, size),
            players: Vec::new(),
            opponents: Vec::new(),
            rolls: Vec::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn terrain(mut self, x: i32, y: i32, terrain: Terrain) -> Self {
        self.grid = self.grid.with_tile(Position::new(x, y), terrain);
        self
    }

    pub fn player(self, name: &str, x: i32, y: i32) -> Self {
        self.creature(CreatureSpec::named(name).with_kind(CreatureKind::Player).at(x, y))
    }

    pub fn ally(self, name: &str, x: i32, y: i32) -> Self {
        self.creature(CreatureSpec::named(name).with_kind(CreatureKind::Ally).at(x, y))
    }

    pub fn hostile(self, name: &str, x: i32, y: i32) -> Self {
        self.creature(CreatureSpec::named(name).with_kind(CreatureKind::Hostile).at(x, y))
    }

    /// Add a fully specified creature. Specs without a kind join the players.
    pub fn creature(mut self, spec: CreatureSpec) -> Self {
        match spec.kind {
            Some(CreatureKind::Hostile) => self.opponents.push(spec),
            _ => self.players.push(spec),
        }
        self
    }

    /// Die faces consumed after initiative, in order.
    pub fn rolls(mut self, faces: impl IntoIterator<Item = u32>) -> Self {
        self.rolls.extend(faces);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn try_build(self) -> Result<Scenario, EngineError> {
        let count = self.players.len() + self.opponents.len();
        let faces = std::iter::repeat(SCENARIO_INITIATIVE)
            .take(count)
            .chain(self.rolls);
        let size = self.grid.width();
        let setup = EncounterSetup::new(self.players, self.opponents, size)
            .with_grid(self.grid)
            .with_dice(Dice::scripted(faces));

        let engine = EncounterEngine::new(self.config);
        let encounter = engine.create_with(setup)?;
        Ok(Scenario { engine, encounter })
    }

    /// Build the scenario, panicking if the engine refuses it.
    #[track_caller]
    pub fn build(self) -> Scenario {
        match self.try_build() {
            Ok(scenario) => scenario,
            Err(err) => panic!("Scenario could not be built: {err}"),
        }
    }

    /// Build and keep only the encounter snapshot.
    #[track_caller]
    pub fn build_encounter(self) -> Encounter {
        self.build().encounter
    }
}

/// A running encounter plus the engine that owns it.
#[derive(Debug)]
pub struct Scenario {
    pub engine: EncounterEngine,
    /// Latest snapshot, refreshed by every successful [`Scenario::act`].
    pub encounter: Encounter,
}

impl Scenario {
    /// Id of the creature called `name`.
    #[track_caller]
    pub fn id(&self, name: &str) -> CreatureId {
        self.encounter
            .creatures
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
            .unwrap_or_else(|| panic!("No creature named '{name}'"))
    }

    /// Submit an action for the creature called `name`.
    #[track_caller]
    pub fn act(&mut self, name: &str, request: ActionRequest) -> Result<ActionReport, EngineError> {
        let actor = self.id(name);
        let report = self.engine.act(self.encounter.id, actor, request)?;
        self.encounter = report.encounter.clone();
        Ok(report)
    }

    /// Re-read the encounter from the engine.
    #[track_caller]
    pub fn refresh(&mut self) -> &Encounter {
        match self.engine.get(self.encounter.id) {
            Ok(encounter) => self.encounter = encounter,
            Err(err) => panic!("Scenario encounter vanished: {err}"),
        }
        &self.encounter
    }

    #[track_caller]
    pub fn creature(&self, name: &str) -> &Creature {
        creature_named(&self.encounter, name)
    }

    /// Name of the creature whose turn it is.
    pub fn current(&self) -> Option<&str> {
        self.encounter.current_creature().map(|c| c.name.as_str())
    }
}

#[track_caller]
fn creature_named<'a>(encounter: &'a Encounter, name: &str) -> &'a Creature {
    encounter
        .creatures
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("No creature named '{name}'"))
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert a creature's current health.
#[track_caller]
pub fn assert_hp(encounter: &Encounter, name: &str, expected: i32) {
    let actual = creature_named(encounter, name).current_health;
    assert_eq!(
        actual, expected,
        "Expected {name} at {expected} HP, got {actual}"
    );
}

/// Assert a creature stands on `(x, y)`.
#[track_caller]
pub fn assert_position(encounter: &Encounter, name: &str, x: i32, y: i32) {
    let actual = creature_named(encounter, name).position;
    assert_eq!(
        actual,
        Position::new(x, y),
        "Expected {name} at ({x}, {y}), got {actual}"
    );
}

/// Assert a creature carries the named condition.
#[track_caller]
pub fn assert_has_condition(encounter: &Encounter, name: &str, condition: &str) {
    assert!(
        creature_named(encounter, name).has_condition(condition),
        "Expected {name} to have condition '{condition}'"
    );
}

/// Assert a creature does NOT carry the named condition.
#[track_caller]
pub fn assert_no_condition(encounter: &Encounter, name: &str, condition: &str) {
    assert!(
        !creature_named(encounter, name).has_condition(condition),
        "Expected {name} to NOT have condition '{condition}'"
    );
}
