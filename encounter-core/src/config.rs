//! Engine configuration.

use crate::combat::strike_dice;
use crate::creature::MAX_LEVEL;
use crate::dice::{DiceError, DiceExpression};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{var} is not valid dice notation: {source}")]
    Dice {
        var: &'static str,
        #[source]
        source: DiceError,
    },
}

/// When the turn pointer moves on after a successful action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnAdvance {
    /// After every action the actor survives.
    #[default]
    EveryAction,
    /// Once the actor has spent all of its action points.
    WhenActionsSpent,
}

impl FromStr for TurnAdvance {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "every-action" => Ok(TurnAdvance::EveryAction),
            "when-actions-spent" => Ok(TurnAdvance::WhenActionsSpent),
            _ => Err(()),
        }
    }
}

/// What happens when a decision provider stalls or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StallPolicy {
    /// Leave the encounter waiting on the same actor.
    Wait,
    /// Submit a `pass` on the actor's behalf.
    #[default]
    ForcePass,
}

impl FromStr for StallPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wait" => Ok(StallPolicy::Wait),
            "force-pass" => Ok(StallPolicy::ForcePass),
            _ => Err(()),
        }
    }
}

impl fmt::Display for StallPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StallPolicy::Wait => write!(f, "wait"),
            StallPolicy::ForcePass => write!(f, "force-pass"),
        }
    }
}

/// Tunables shared by every encounter an engine runs.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Movement units available to a single move action.
    pub movement_budget: f64,
    pub action_points_per_turn: u32,
    /// Chance each generated tile is difficult terrain.
    pub difficult_terrain_chance: f64,
    /// Chebyshev distance a melee attack can reach.
    pub melee_reach: u32,
    pub default_level: u32,
    pub default_max_health: i32,
    pub default_armor: i32,
    /// Dice for a plain strike, before the attacker's level is added.
    pub strike_damage: DiceExpression,
    /// Seed every encounter stream is derived from. `None` seeds from entropy.
    pub base_seed: Option<u64>,
    pub turn_advance: TurnAdvance,
    pub decision_timeout: Duration,
    pub stall_policy: StallPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            movement_budget: 6.0,
            action_points_per_turn: 3,
            difficult_terrain_chance: 0.1,
            melee_reach: 1,
            default_level: 1,
            default_max_health: 20,
            default_armor: 10,
            strike_damage: strike_dice(),
            base_seed: None,
            turn_advance: TurnAdvance::EveryAction,
            decision_timeout: Duration::from_secs(30),
            stall_policy: StallPolicy::ForcePass,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_movement_budget(mut self, budget: f64) -> Self {
        self.movement_budget = budget;
        self
    }

    pub fn with_action_points(mut self, points: u32) -> Self {
        self.action_points_per_turn = points;
        self
    }

    pub fn with_difficult_terrain_chance(mut self, chance: f64) -> Self {
        self.difficult_terrain_chance = chance;
        self
    }

    pub fn with_melee_reach(mut self, reach: u32) -> Self {
        self.melee_reach = reach;
        self
    }

    /// Defaults for creature specs that leave fields unset.
    pub fn with_creature_defaults(mut self, level: u32, max_health: i32, armor: i32) -> Self {
        self.default_level = level;
        self.default_max_health = max_health;
        self.default_armor = armor;
        self
    }

    pub fn with_strike_damage(mut self, damage: DiceExpression) -> Self {
        self.strike_damage = damage;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.base_seed = Some(seed);
        self
    }

    pub fn with_turn_advance(mut self, turn_advance: TurnAdvance) -> Self {
        self.turn_advance = turn_advance;
        self
    }

    pub fn with_decision_timeout(mut self, timeout: Duration) -> Self {
        self.decision_timeout = timeout;
        self
    }

    pub fn with_stall_policy(mut self, policy: StallPolicy) -> Self {
        self.stall_policy = policy;
        self
    }

    /// Defaults overridden by any `ENCOUNTER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = parse::<f64>(&lookup, "ENCOUNTER_MOVEMENT_BUDGET", "a non-negative number")? {
            config.movement_budget = non_negative("ENCOUNTER_MOVEMENT_BUDGET", v)?;
        }
        if let Some(v) = parse::<u32>(&lookup, "ENCOUNTER_ACTION_POINTS", "a whole number")? {
            config.action_points_per_turn = v;
        }
        if let Some(v) = parse::<f64>(&lookup, "ENCOUNTER_DIFFICULT_TERRAIN_CHANCE", "a probability")? {
            if !(0.0..=1.0).contains(&v) {
                return Err(invalid("ENCOUNTER_DIFFICULT_TERRAIN_CHANCE", v, "a probability"));
            }
            config.difficult_terrain_chance = v;
        }
        if let Some(v) = parse::<u32>(&lookup, "ENCOUNTER_MELEE_REACH", "a whole number")? {
            config.melee_reach = v;
        }
        if let Some(v) = parse::<u32>(&lookup, "ENCOUNTER_DEFAULT_LEVEL", "a positive whole number")? {
            if v == 0 {
                return Err(invalid("ENCOUNTER_DEFAULT_LEVEL", v, "a positive whole number"));
            }
            config.default_level = v;
        }
        if let Some(v) = parse::<i32>(&lookup, "ENCOUNTER_DEFAULT_MAX_HEALTH", "a positive number")? {
            if v <= 0 {
                return Err(invalid("ENCOUNTER_DEFAULT_MAX_HEALTH", v, "a positive number"));
            }
            config.default_max_health = v;
        }
        if let Some(v) = parse::<i32>(&lookup, "ENCOUNTER_DEFAULT_ARMOR", "a number")? {
            config.default_armor = v;
        }
        if let Some(raw) = lookup("ENCOUNTER_STRIKE_DAMAGE") {
            config.strike_damage = DiceExpression::parse(&raw).map_err(|source| ConfigError::Dice {
                var: "ENCOUNTER_STRIKE_DAMAGE",
                source,
            })?;
        }
        if let Some(v) = parse::<u64>(&lookup, "ENCOUNTER_SEED", "a 64-bit unsigned integer")? {
            config.base_seed = Some(v);
        }
        if let Some(v) = parse::<TurnAdvance>(
            &lookup,
            "ENCOUNTER_TURN_ADVANCE",
            "\"every-action\" or \"when-actions-spent\"",
        )? {
            config.turn_advance = v;
        }
        if let Some(ms) = parse::<u64>(&lookup, "ENCOUNTER_DECISION_TIMEOUT_MS", "milliseconds")? {
            config.decision_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = parse::<StallPolicy>(&lookup, "ENCOUNTER_STALL_POLICY", "\"wait\" or \"force-pass\"")? {
            config.stall_policy = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the builders accept but the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("ENCOUNTER_MOVEMENT_BUDGET", self.movement_budget)?;
        if !(0.0..=1.0).contains(&self.difficult_terrain_chance) {
            return Err(invalid(
                "ENCOUNTER_DIFFICULT_TERRAIN_CHANCE",
                self.difficult_terrain_chance,
                "a probability",
            ));
        }
        if !(1..=MAX_LEVEL).contains(&self.default_level) {
            return Err(invalid(
                "ENCOUNTER_DEFAULT_LEVEL",
                self.default_level,
                "a level between 1 and 100",
            ));
        }
        if self.default_max_health <= 0 {
            return Err(invalid(
                "ENCOUNTER_DEFAULT_MAX_HEALTH",
                self.default_max_health,
                "a positive number",
            ));
        }
        Ok(())
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => {
            let parsed = raw.trim().parse::<T>();
            match parsed {
                Ok(value) => Ok(Some(value)),
                Err(_) => Err(invalid(var, raw, expected)),
            }
        }
    }
}

fn non_negative(var: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(invalid(var, value, "a non-negative number"))
    }
}

fn invalid(var: &'static str, value: impl ToString, expected: &'static str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.movement_budget, 6.0);
        assert_eq!(config.action_points_per_turn, 3);
        assert_eq!(config.turn_advance, TurnAdvance::EveryAction);
        assert_eq!(config.stall_policy, StallPolicy::ForcePass);
        assert_eq!(EngineConfig::from_lookup(lookup(&[])).unwrap(), config);
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("ENCOUNTER_MOVEMENT_BUDGET", "8.5"),
            ("ENCOUNTER_SEED", "42"),
            ("ENCOUNTER_STRIKE_DAMAGE", "1d10+1"),
            ("ENCOUNTER_TURN_ADVANCE", "when-actions-spent"),
            ("ENCOUNTER_STALL_POLICY", "wait"),
            ("ENCOUNTER_DECISION_TIMEOUT_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.movement_budget, 8.5);
        assert_eq!(config.base_seed, Some(42));
        assert_eq!(config.strike_damage.modifier, 1);
        assert_eq!(config.turn_advance, TurnAdvance::WhenActionsSpent);
        assert_eq!(config.stall_policy, StallPolicy::Wait);
        assert_eq!(config.decision_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[("ENCOUNTER_ACTION_POINTS", "lots")])),
            Err(ConfigError::Invalid { var: "ENCOUNTER_ACTION_POINTS", .. })
        ));
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[("ENCOUNTER_DIFFICULT_TERRAIN_CHANCE", "1.5")])),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[("ENCOUNTER_STRIKE_DAMAGE", "1d7")])),
            Err(ConfigError::Dice { .. })
        ));
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[("ENCOUNTER_STALL_POLICY", "panic")])),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_validate_catches_builder_values() {
        assert!(EngineConfig::new().validate().is_ok());
        assert!(matches!(
            EngineConfig::new().with_difficult_terrain_chance(f64::NAN).validate(),
            Err(ConfigError::Invalid { var: "ENCOUNTER_DIFFICULT_TERRAIN_CHANCE", .. })
        ));
        assert!(matches!(
            EngineConfig::new().with_movement_budget(f64::INFINITY).validate(),
            Err(ConfigError::Invalid { var: "ENCOUNTER_MOVEMENT_BUDGET", .. })
        ));
        assert!(matches!(
            EngineConfig::new().with_creature_defaults(MAX_LEVEL + 1, 20, 10).validate(),
            Err(ConfigError::Invalid { var: "ENCOUNTER_DEFAULT_LEVEL", .. })
        ));
        assert!(matches!(
            EngineConfig::new().with_creature_defaults(1, 0, 10).validate(),
            Err(ConfigError::Invalid { var: "ENCOUNTER_DEFAULT_MAX_HEALTH", .. })
        ));
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[("ENCOUNTER_DEFAULT_LEVEL", "5000")])),
            Err(ConfigError::Invalid { var: "ENCOUNTER_DEFAULT_LEVEL", .. })
        ));
    }
}
