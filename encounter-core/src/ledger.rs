//! Per-creature resource counters.
//!
//! Action points reset whenever the turn comes back around to a creature.
//! Spell slots and ability charges reset only on an explicit rest.

use crate::creature::CreatureId;
use std::collections::HashMap;

/// Action points spent during the current turn.
#[derive(Debug, Clone, Default)]
pub struct ActionLedger {
    spent: HashMap<CreatureId, u32>,
}

impl ActionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spent(&self, creature: CreatureId) -> u32 {
        self.spent.get(&creature).copied().unwrap_or(0)
    }

    /// Whether spending `cost` more would take `creature` past `limit`.
    pub fn would_exceed(&self, creature: CreatureId, cost: u32, limit: u32) -> bool {
        self.spent(creature).saturating_add(cost) > limit
    }

    pub fn record(&mut self, creature: CreatureId, cost: u32) {
        *self.spent.entry(creature).or_insert(0) += cost;
    }

    pub fn reset(&mut self, creature: CreatureId) {
        self.spent.remove(&creature);
    }
}

/// Spell casts per (creature, spell level) since the last rest.
#[derive(Debug, Clone, Default)]
pub struct SpellSlotLedger {
    used: HashMap<(CreatureId, u32), u32>,
}

impl SpellSlotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn used(&self, creature: CreatureId, level: u32) -> u32 {
        self.used.get(&(creature, level)).copied().unwrap_or(0)
    }

    /// A caster may cast spells of a given level `caster_level` times per rest.
    pub fn can_cast(&self, creature: CreatureId, level: u32, caster_level: u32) -> bool {
        self.used(creature, level) < caster_level
    }

    pub fn record(&mut self, creature: CreatureId, level: u32) {
        *self.used.entry((creature, level)).or_insert(0) += 1;
    }

    pub fn reset(&mut self, creature: CreatureId) {
        self.used.retain(|(id, _), _| *id != creature);
    }

    pub fn reset_all(&mut self) {
        self.used.clear();
    }
}

/// Remaining daily charges per (creature, ability).
///
/// A creature with no entry for an ability still has its full allotment.
#[derive(Debug, Clone, Default)]
pub struct ChargeLedger {
    remaining: HashMap<(CreatureId, String), u32>,
}

impl ChargeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Charges left, or `None` for an unlimited ability.
    pub fn remaining(&self, creature: CreatureId, ability: &str, per_day: Option<u32>) -> Option<u32> {
        let per_day = per_day?;
        Some(
            self.remaining
                .get(&(creature, ability.to_string()))
                .copied()
                .unwrap_or(per_day),
        )
    }

    pub fn has_charge(&self, creature: CreatureId, ability: &str, per_day: Option<u32>) -> bool {
        self.remaining(creature, ability, per_day)
            .map_or(true, |left| left > 0)
    }

    /// Use one charge. Unlimited abilities are not tracked.
    pub fn spend(&mut self, creature: CreatureId, ability: &str, per_day: Option<u32>) {
        let Some(per_day) = per_day else {
            return;
        };
        let left = self
            .remaining
            .entry((creature, ability.to_string()))
            .or_insert(per_day);
        *left = left.saturating_sub(1);
    }

    pub fn reset(&mut self, creature: CreatureId) {
        self.remaining.retain(|(id, _), _| *id != creature);
    }

    pub fn reset_all(&mut self) {
        self.remaining.clear();
    }
}
