//! End-to-end encounter scenarios driven through the engine.
//!
//! Run with: `cargo test -p encounter-core --test scenarios`

use encounter_core::creature::{DamageModifier, DamageType};
use encounter_core::rules::Resource;
use encounter_core::testing::{
    assert_has_condition, assert_hp, assert_no_condition, assert_position,
};
use encounter_core::{
    ActionRequest, Condition, CreatureKind, CreatureSpec, EncounterId, EngineConfig, EngineError,
    LogKind, RuleViolation, ScenarioBuilder, Side, Terrain, TurnAdvance, TurnTransition,
};

fn violation(result: Result<encounter_core::ActionReport, EngineError>) -> RuleViolation {
    match result {
        Err(EngineError::ValidationFailed(violation)) => violation,
        other => panic!("Expected a validation failure, got {other:?}"),
    }
}

// =============================================================================
// Combat
// =============================================================================

#[test]
fn test_critical_strike_doubles_damage() {
    // d20 = 17: 17 + 3 = 20 meets armor 10 + 10. d8 = 5, +1 level, doubled.
    let mut scenario = ScenarioBuilder::new(5)
        .player("Hero", 0, 0)
        .hostile("Goblin", 1, 0)
        .rolls([17, 5])
        .build();
    let goblin = scenario.id("Goblin");

    let report = scenario.act("Hero", ActionRequest::strike(goblin)).unwrap();

    assert!(report.outcome.success);
    assert_eq!(report.outcome.details["attack"]["outcome"], "critical-success");
    assert_eq!(report.outcome.details["damage"], 12);
    assert_hp(&scenario.encounter, "Goblin", 8);
    assert!(scenario
        .encounter
        .log
        .iter()
        .any(|e| e.kind == LogKind::Damage));
}

#[test]
fn test_natural_one_misses_weak_armor() {
    let mut scenario = ScenarioBuilder::new(5)
        .player("Hero", 0, 0)
        .creature(
            CreatureSpec::named("Scarecrow")
                .with_kind(CreatureKind::Hostile)
                .with_armor(-5)
                .at(1, 0),
        )
        .rolls([1])
        .build();
    let target = scenario.id("Scarecrow");

    let report = scenario.act("Hero", ActionRequest::strike(target)).unwrap();
    assert_eq!(report.outcome.details["hit"], false);
    assert_hp(&scenario.encounter, "Scarecrow", 20);
}

#[test]
fn test_strike_drops_target_and_logs_death() {
    let mut scenario = ScenarioBuilder::new(5)
        .player("Hero", 0, 0)
        .creature(
            CreatureSpec::named("Goblin")
                .with_kind(CreatureKind::Hostile)
                .with_current_health(3)
                .at(1, 0),
        )
        .rolls([15, 6])
        .build();
    let goblin = scenario.id("Goblin");

    scenario.act("Hero", ActionRequest::strike(goblin)).unwrap();

    assert_hp(&scenario.encounter, "Goblin", 0);
    assert!(scenario.creature("Goblin").is_incapacitated());
    assert_eq!(scenario.encounter.creatures.len(), 2);
    assert!(scenario
        .encounter
        .log
        .iter()
        .any(|e| e.kind == LogKind::Death && e.message.contains("Goblin")));
    assert_eq!(scenario.encounter.defeated_side(), Some(Side::Opponents));
}

#[test]
fn test_immunity_zeroes_spell_damage() {
    let mut scenario = ScenarioBuilder::new(8)
        .player("Mage", 0, 0)
        .creature(
            CreatureSpec::named("Golem")
                .with_kind(CreatureKind::Hostile)
                .with_damage_modifier(DamageModifier::immunity(DamageType::Force))
                .at(5, 5),
        )
        .rolls([6])
        .build();
    let golem = scenario.id("Golem");

    let report = scenario
        .act("Mage", ActionRequest::spell("magic-missile").targeting(golem))
        .unwrap();
    assert!(report.outcome.message.contains("unaffected"));
    assert_hp(&scenario.encounter, "Golem", 20);
}

// =============================================================================
// Movement
// =============================================================================

#[test]
fn test_move_exactly_at_budget() {
    let mut scenario = ScenarioBuilder::new(10)
        .player("Hero", 0, 0)
        .hostile("Goblin", 9, 9)
        .build();

    let report = scenario.act("Hero", ActionRequest::move_to(6, 0)).unwrap();
    assert_eq!(report.outcome.details["cost"], 6.0);
    assert_position(&scenario.encounter, "Hero", 6, 0);
}

#[test]
fn test_move_past_budget_is_out_of_range() {
    let mut scenario = ScenarioBuilder::new(10)
        .player("Hero", 0, 0)
        .hostile("Goblin", 9, 9)
        .build();

    let result = scenario.act("Hero", ActionRequest::move_to(7, 0));
    assert!(matches!(
        violation(result),
        RuleViolation::OutOfRange { cost, budget } if cost == 7.0 && budget == 6.0
    ));
    assert_position(scenario.refresh(), "Hero", 0, 0);
}

#[test]
fn test_move_onto_impassable_tile_has_no_path() {
    let mut scenario = ScenarioBuilder::new(5)
        .terrain(2, 0, Terrain::Impassable)
        .player("Hero", 0, 0)
        .hostile("Goblin", 4, 4)
        .build();

    let result = scenario.act("Hero", ActionRequest::move_to(2, 0));
    assert_eq!(violation(result), RuleViolation::NoPath);
}

#[test]
fn test_difficult_terrain_doubles_cost() {
    let mut scenario = ScenarioBuilder::new(6)
        .terrain(1, 0, Terrain::Difficult)
        .terrain(1, 1, Terrain::Difficult)
        .terrain(0, 1, Terrain::Difficult)
        .player("Hero", 0, 0)
        .hostile("Goblin", 5, 5)
        .build();

    let report = scenario.act("Hero", ActionRequest::move_to(1, 0)).unwrap();
    assert_eq!(report.outcome.details["cost"], 2.0);
}

// =============================================================================
// Conditions and rounds
// =============================================================================

#[test]
fn test_frightened_decays_over_two_rollovers() {
    let mut scenario = ScenarioBuilder::new(5)
        .player("Hero", 0, 0)
        .hostile("Goblin", 4, 4)
        .build();
    let goblin = scenario.id("Goblin");

    scenario
        .act(
            "Hero",
            ActionRequest::condition(Condition::new("frightened", 2)).targeting(goblin),
        )
        .unwrap();
    assert_has_condition(&scenario.encounter, "Goblin", "frightened");

    let report = scenario.act("Goblin", ActionRequest::pass()).unwrap();
    assert!(matches!(
        report.transition,
        Some(TurnTransition::RoundComplete { round: 2, .. })
    ));
    let frightened = scenario.creature("Goblin").condition("frightened").cloned();
    assert_eq!(frightened.and_then(|c| c.remaining_rounds()), Some(1));

    scenario.act("Hero", ActionRequest::pass()).unwrap();
    scenario.act("Goblin", ActionRequest::pass()).unwrap();
    assert_eq!(scenario.encounter.round.number, 3);
    assert_no_condition(&scenario.encounter, "Goblin", "frightened");
    assert!(scenario
        .encounter
        .log
        .iter()
        .any(|e| e.kind == LogKind::Condition && e.message.contains("frightened")));
}

#[test]
fn test_permanent_condition_survives_rollover() {
    let mut scenario = ScenarioBuilder::new(5)
        .player("Hero", 0, 0)
        .hostile("Goblin", 4, 4)
        .build();

    scenario
        .act("Hero", ActionRequest::condition(Condition::permanent("cursed")))
        .unwrap();
    for _ in 0..3 {
        scenario.act("Goblin", ActionRequest::pass()).unwrap();
        if scenario.current() == Some("Hero") {
            scenario.act("Hero", ActionRequest::pass()).unwrap();
        }
    }
    assert_has_condition(&scenario.encounter, "Hero", "cursed");
}

// =============================================================================
// Turn handling
// =============================================================================

#[test]
fn test_rejected_action_mutates_nothing() {
    let mut scenario = ScenarioBuilder::new(5)
        .player("Hero", 0, 0)
        .hostile("Goblin", 1, 0)
        .build();
    let hero = scenario.id("Hero");
    let before = scenario.encounter.clone();

    let result = scenario.act("Goblin", ActionRequest::strike(hero));
    assert_eq!(violation(result), RuleViolation::NotYourTurn);

    let after = scenario.refresh();
    assert_eq!(after.round, before.round);
    assert_eq!(after.log, before.log);
    assert_eq!(after.creatures, before.creatures);
}

#[test]
fn test_incapacitated_actor_can_only_pass() {
    let mut scenario = ScenarioBuilder::new(5)
        .creature(
            CreatureSpec::named("Hero")
                .with_kind(CreatureKind::Player)
                .with_current_health(0)
                .at(0, 0),
        )
        .hostile("Goblin", 1, 0)
        .build();
    let goblin = scenario.id("Goblin");

    let result = scenario.act("Hero", ActionRequest::strike(goblin));
    assert_eq!(violation(result), RuleViolation::Incapacitated);

    scenario.act("Hero", ActionRequest::pass()).unwrap();
    assert_eq!(scenario.current(), Some("Goblin"));
}

#[test]
fn test_actions_spent_policy_keeps_turn() {
    let mut scenario = ScenarioBuilder::new(8)
        .config(EngineConfig::new().with_turn_advance(TurnAdvance::WhenActionsSpent))
        .player("Hero", 0, 0)
        .hostile("Goblin", 7, 7)
        .build();

    let first = scenario.act("Hero", ActionRequest::move_to(1, 0)).unwrap();
    assert!(first.transition.is_none());
    scenario.act("Hero", ActionRequest::move_to(2, 0)).unwrap();
    assert_eq!(scenario.current(), Some("Hero"));

    let last = scenario.act("Hero", ActionRequest::move_to(3, 0)).unwrap();
    assert!(matches!(last.transition, Some(TurnTransition::NextActor { .. })));
    assert_eq!(scenario.current(), Some("Goblin"));
}

#[test]
fn test_costly_action_exhausts_points() {
    let mut scenario = ScenarioBuilder::new(8)
        .config(EngineConfig::new().with_turn_advance(TurnAdvance::WhenActionsSpent))
        .player("Hero", 0, 0)
        .hostile("Goblin", 7, 7)
        .build();

    scenario
        .act("Hero", ActionRequest::move_to(1, 0).with_cost(2))
        .unwrap();
    let result = scenario.act("Hero", ActionRequest::move_to(2, 0).with_cost(2));
    assert_eq!(
        violation(result),
        RuleViolation::ResourceExhausted {
            resource: Resource::ActionPoints
        }
    );
    assert_position(&scenario.encounter, "Hero", 1, 0);
}

// =============================================================================
// Spells, abilities and rest
// =============================================================================

#[test]
fn test_spell_slots_return_after_rest() {
    let mut scenario = ScenarioBuilder::new(8)
        .player("Mage", 0, 0)
        .hostile("Goblin", 5, 5)
        .rolls([3])
        .build();
    let goblin = scenario.id("Goblin");
    let mage = scenario.id("Mage");
    let missile = || ActionRequest::spell("magic-missile").targeting(goblin);

    scenario.act("Mage", missile()).unwrap();
    assert_hp(&scenario.encounter, "Goblin", 16);
    scenario.act("Goblin", ActionRequest::pass()).unwrap();

    assert_eq!(
        violation(scenario.act("Mage", missile())),
        RuleViolation::ResourceExhausted {
            resource: Resource::SpellSlot { level: 1 }
        }
    );

    scenario.engine.rest(scenario.encounter.id, Some(mage)).unwrap();
    scenario.act("Mage", missile()).unwrap();
}

#[test]
fn test_strike_against_unreachable_armor_misses() {
    let mut scenario = ScenarioBuilder::new(5)
        .player("Hero", 0, 0)
        .creature(
            CreatureSpec::named("Fortress")
                .with_kind(CreatureKind::Hostile)
                .with_armor(i32::MAX)
                .at(1, 0),
        )
        .rolls([15])
        .build();
    let target = scenario.id("Fortress");

    let report = scenario.act("Hero", ActionRequest::strike(target)).unwrap();
    assert_eq!(report.outcome.details["hit"], false);
    assert_hp(&scenario.encounter, "Fortress", 20);
}

#[test]
fn test_huge_armor_bonus_then_strike() {
    let mut scenario = ScenarioBuilder::new(5)
        .player("Hero", 0, 0)
        .hostile("Goblin", 1, 0)
        .rolls([19])
        .build();
    let goblin = scenario.id("Goblin");

    scenario
        .act(
            "Hero",
            ActionRequest::condition(Condition::armor_bonus("warded", 3, i32::MAX)).targeting(goblin),
        )
        .unwrap();
    assert_eq!(scenario.creature("Goblin").armor_class(), i32::MAX);
    scenario.act("Goblin", ActionRequest::pass()).unwrap();

    let report = scenario.act("Hero", ActionRequest::strike(goblin)).unwrap();
    assert_eq!(report.outcome.details["hit"], false);
    assert_hp(&scenario.encounter, "Goblin", 20);
}

#[test]
fn test_shield_raises_armor() {
    let mut scenario = ScenarioBuilder::new(8)
        .player("Mage", 0, 0)
        .hostile("Goblin", 5, 5)
        .build();

    scenario.act("Mage", ActionRequest::spell("shield")).unwrap();
    assert_eq!(scenario.creature("Mage").armor_class(), 12);
}

#[test]
fn test_second_wind_once_per_day() {
    let mut scenario = ScenarioBuilder::new(5)
        .creature(
            CreatureSpec::named("Hero")
                .with_kind(CreatureKind::Player)
                .with_current_health(10)
                .at(0, 0),
        )
        .hostile("Goblin", 4, 4)
        .rolls([4])
        .build();

    let report = scenario
        .act("Hero", ActionRequest::ability("second-wind"))
        .unwrap();
    assert_eq!(report.outcome.details["charges_left"], 0);
    assert_hp(&scenario.encounter, "Hero", 15);

    scenario.act("Goblin", ActionRequest::pass()).unwrap();
    assert_eq!(
        violation(scenario.act("Hero", ActionRequest::ability("second-wind"))),
        RuleViolation::ResourceExhausted {
            resource: Resource::AbilityCharge {
                ability: "second-wind".to_string()
            }
        }
    );
}

#[test]
fn test_unknown_spell_is_rejected() {
    let mut scenario = ScenarioBuilder::new(5).player("Mage", 0, 0).build();
    assert_eq!(
        violation(scenario.act("Mage", ActionRequest::spell("fireball"))),
        RuleViolation::UnknownSpell("fireball".to_string())
    );
}

// =============================================================================
// Lookup errors
// =============================================================================

#[test]
fn test_unknown_encounter_and_creature() {
    let scenario = ScenarioBuilder::new(5).player("Hero", 0, 0).build();
    let missing = EncounterId::new();

    assert!(matches!(
        scenario.engine.get(missing),
        Err(EngineError::EncounterNotFound(id)) if id == missing
    ));
    assert!(matches!(
        scenario
            .engine
            .act(missing, scenario.id("Hero"), ActionRequest::pass()),
        Err(EngineError::EncounterNotFound(_))
    ));
    assert!(matches!(
        scenario.engine.act(
            scenario.encounter.id,
            encounter_core::CreatureId::new(),
            ActionRequest::pass()
        ),
        Err(EngineError::CreatureNotFound(_))
    ));
}

#[test]
fn test_encounter_serializes() {
    let scenario = ScenarioBuilder::new(5)
        .player("Hero", 0, 0)
        .hostile("Goblin", 4, 4)
        .build();
    let json = serde_json::to_string(&scenario.encounter).unwrap();
    let back: encounter_core::Encounter = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, scenario.encounter.id);
    assert_eq!(back.creatures, scenario.encounter.creatures);
}
