//! Encounter state: roster, map, round, and log.
//!
//! The turn pointer only moves through [`Encounter::advance_turn`], which
//! also runs end-of-round upkeep when it wraps.

use crate::creature::{Condition, Creature, CreatureId, EncounterId, Position, Side};
use crate::terrain::TerrainGrid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// Category of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogKind {
    System,
    Action,
    Damage,
    Condition,
    Death,
}

/// One line of the encounter log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    pub message: String,
    pub details: serde_json::Value,
}

/// An action taken during the current round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundAction {
    pub actor: CreatureId,
    pub action_id: String,
    pub target: Option<CreatureId>,
    pub target_position: Option<Position>,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// Starts at 1.
    pub number: u32,
    /// Fixed at creation by initiative.
    pub turn_order: Vec<CreatureId>,
    pub turn_index: usize,
    pub actions: Vec<RoundAction>,
}

/// Where the turn pointer went after an advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TurnTransition {
    NextActor { actor: CreatureId },
    RoundComplete { round: u32, actor: CreatureId },
}

impl TurnTransition {
    pub fn actor(&self) -> CreatureId {
        match self {
            TurnTransition::NextActor { actor } | TurnTransition::RoundComplete { actor, .. } => {
                *actor
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encounter {
    pub id: EncounterId,
    pub creatures: Vec<Creature>,
    pub grid: TerrainGrid,
    pub round: Round,
    pub log: Vec<LogEntry>,
    /// Seed of this encounter's dice stream.
    pub seed: u64,
}

impl Encounter {
    /// Build an encounter whose turn order is the roster sorted by
    /// descending initiative. Ties keep roster order.
    pub(crate) fn new(id: EncounterId, creatures: Vec<Creature>, grid: TerrainGrid, seed: u64) -> Self {
        let mut order: Vec<&Creature> = creatures.iter().collect();
        order.sort_by(|a, b| b.initiative.cmp(&a.initiative));
        let turn_order = order.into_iter().map(|c| c.id).collect();

        Self {
            id,
            creatures,
            grid,
            round: Round {
                number: 1,
                turn_order,
                turn_index: 0,
                actions: Vec::new(),
            },
            log: Vec::new(),
            seed,
        }
    }

    pub fn creature(&self, id: CreatureId) -> Option<&Creature> {
        self.creatures.iter().find(|c| c.id == id)
    }

    pub(crate) fn creature_mut(&mut self, id: CreatureId) -> Option<&mut Creature> {
        self.creatures.iter_mut().find(|c| c.id == id)
    }

    /// The creature whose turn it is.
    pub fn current_actor(&self) -> Option<CreatureId> {
        self.round.turn_order.get(self.round.turn_index).copied()
    }

    pub fn current_creature(&self) -> Option<&Creature> {
        self.current_actor().and_then(|id| self.creature(id))
    }

    /// The creature standing on `position`, if any.
    pub fn occupant(&self, position: Position) -> Option<&Creature> {
        self.creatures.iter().find(|c| c.position == position)
    }

    pub fn side(&self, side: Side) -> impl Iterator<Item = &Creature> {
        self.creatures.iter().filter(move |c| c.side() == side)
    }

    /// The side whose every member is at 0 health, if any.
    ///
    /// A side with no members is never reported.
    pub fn defeated_side(&self) -> Option<Side> {
        [Side::Players, Side::Opponents].into_iter().find(|&side| {
            let mut members = self.side(side).peekable();
            members.peek().is_some() && members.all(Creature::is_incapacitated)
        })
    }

    pub(crate) fn log(&mut self, kind: LogKind, message: impl Into<String>, details: serde_json::Value) {
        self.log.push(LogEntry {
            timestamp: Utc::now(),
            kind,
            message: message.into(),
            details,
        });
    }

    pub(crate) fn record_action(&mut self, action: RoundAction) {
        self.round.actions.push(action);
    }

    /// Move the turn pointer on by one, rolling the round over at the end
    /// of the order.
    pub(crate) fn advance_turn(&mut self) -> TurnTransition {
        let len = self.round.turn_order.len().max(1);
        self.round.turn_index += 1;

        if self.round.turn_index >= len {
            self.round.turn_index = 0;
            self.round.number += 1;
            self.round.actions.clear();
            self.upkeep();
            let round = self.round.number;
            self.log(
                LogKind::System,
                format!("Round {round} begins"),
                json!({ "round": round }),
            );
            debug!(encounter_id = %self.id, round, "Round rolled over");
            TurnTransition::RoundComplete {
                round,
                actor: self.turn_actor(),
            }
        } else {
            TurnTransition::NextActor {
                actor: self.turn_actor(),
            }
        }
    }

    fn turn_actor(&self) -> CreatureId {
        self.round.turn_order[self.round.turn_index]
    }

    /// Count every timed condition down and log what ran out.
    fn upkeep(&mut self) {
        let mut expired: Vec<(String, CreatureId, Condition)> = Vec::new();
        for creature in &mut self.creatures {
            for condition in creature.decay_conditions() {
                expired.push((creature.name.clone(), creature.id, condition));
            }
        }
        for (name, id, condition) in expired {
            self.log(
                LogKind::Condition,
                format!("{}'s {} wore off", name, condition.name),
                json!({ "creature": id, "condition": condition.name, "expired": true }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creature::CreatureKind;

    fn creature(name: &str, kind: CreatureKind, initiative: i32) -> Creature {
        Creature {
            id: CreatureId::new(),
            name: name.to_string(),
            kind,
            level: 1,
            max_health: 20,
            current_health: 20,
            armor: 10,
            position: Position::new(0, 0),
            conditions: Vec::new(),
            initiative,
            damage_modifiers: Vec::new(),
        }
    }

    fn encounter(creatures: Vec<Creature>) -> Encounter {
        Encounter::new(EncounterId::new(), creatures, TerrainGrid::open(5, 5), 0)
    }

    #[test]
    fn test_turn_order_by_initiative_with_stable_ties() {
        let a = creature("A", CreatureKind::Player, 12);
        let b = creature("B", CreatureKind::Hostile, 18);
        let c = creature("C", CreatureKind::Hostile, 12);
        let ids = (a.id, b.id, c.id);
        let enc = encounter(vec![a, b, c]);
        assert_eq!(enc.round.turn_order, vec![ids.1, ids.0, ids.2]);
        assert_eq!(enc.current_actor(), Some(ids.1));
    }

    #[test]
    fn test_advance_wraps_and_increments_round_once() {
        let mut enc = encounter(vec![
            creature("A", CreatureKind::Player, 5),
            creature("B", CreatureKind::Hostile, 3),
        ]);
        assert!(matches!(
            enc.advance_turn(),
            TurnTransition::NextActor { .. }
        ));
        assert_eq!(enc.round.number, 1);
        assert!(matches!(
            enc.advance_turn(),
            TurnTransition::RoundComplete { round: 2, .. }
        ));
        assert_eq!(enc.round.turn_index, 0);
        assert_eq!(enc.round.number, 2);
    }

    #[test]
    fn test_upkeep_decays_conditions() {
        let mut a = creature("A", CreatureKind::Player, 5);
        a.apply_condition(Condition::new("frightened", 2));
        a.apply_condition(Condition::permanent("cursed"));
        let id = a.id;
        let mut enc = encounter(vec![a]);

        enc.advance_turn();
        let a = enc.creature(id).unwrap();
        assert_eq!(a.condition("frightened").unwrap().remaining_rounds(), Some(1));

        enc.advance_turn();
        let a = enc.creature(id).unwrap();
        assert!(!a.has_condition("frightened"));
        assert!(a.has_condition("cursed"));
        assert!(enc
            .log
            .iter()
            .any(|e| e.kind == LogKind::Condition && e.message.contains("frightened")));
    }

    #[test]
    fn test_round_actions_clear_on_rollover() {
        let a = creature("A", CreatureKind::Player, 5);
        let actor = a.id;
        let mut enc = encounter(vec![a]);
        enc.record_action(RoundAction {
            actor,
            action_id: "pass".to_string(),
            target: None,
            target_position: None,
            success: true,
        });
        assert_eq!(enc.round.actions.len(), 1);
        enc.advance_turn();
        assert!(enc.round.actions.is_empty());
    }

    #[test]
    fn test_defeated_side() {
        let hero = creature("Hero", CreatureKind::Player, 5);
        let mut goblin = creature("Goblin", CreatureKind::Hostile, 3);
        goblin.current_health = 0;
        let mut enc = encounter(vec![hero, goblin]);
        assert_eq!(enc.defeated_side(), Some(Side::Opponents));

        enc.creatures[0].current_health = 0;
        assert_eq!(enc.defeated_side(), Some(Side::Players));

        let lonely = encounter(vec![creature("Solo", CreatureKind::Player, 1)]);
        assert_eq!(lonely.defeated_side(), None);
    }

    #[test]
    fn test_snapshot_serializes() {
        let enc = encounter(vec![creature("A", CreatureKind::Ally, 1)]);
        let json = serde_json::to_string(&enc).unwrap();
        let back: Encounter = serde_json::from_str(&json).unwrap();
        assert_eq!(back.round, enc.round);
        assert_eq!(back.grid, enc.grid);
    }
}
