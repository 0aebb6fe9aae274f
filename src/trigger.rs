//! Overlap tests for trigger regions, reporting outside-to-inside edges.

use std::collections::BTreeSet;

use crate::entity_store::{EntityStore, TriggerPurpose};
use crate::types::EntityId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerEntry {
    pub trigger: EntityId,
    pub purpose: TriggerPurpose,
    pub entity: EntityId,
}

#[derive(Debug, Default)]
pub struct TriggerTracker {
    inside: BTreeSet<(EntityId, EntityId)>,
}

impl TriggerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tests every (trigger, candidate) pair and returns only the pairs
    /// that went from outside to inside since the previous call.
    pub fn evaluate(&mut self, store: &EntityStore, candidates: &[EntityId]) -> Vec<TriggerEntry> {
        let mut entries = Vec::new();
        for trigger in store.iter() {
            let Some(region) = trigger.trigger() else {
                continue;
            };
            for &candidate in candidates {
                let Some(entity) = store.get(candidate) else {
                    self.inside.remove(&(trigger.id, candidate));
                    continue;
                };
                let key = (trigger.id, candidate);
                if region.contains(trigger.position, entity.position) {
                    if self.inside.insert(key) {
                        entries.push(TriggerEntry {
                            trigger: trigger.id,
                            purpose: region.purpose,
                            entity: candidate,
                        });
                    }
                } else {
                    self.inside.remove(&key);
                }
            }
        }
        entries
    }

    /// Forgets that `entity` is inside, so the next evaluation reports the
    /// entry again if it is still there.
    pub fn release(&mut self, trigger: EntityId, entity: EntityId) {
        self.inside.remove(&(trigger, entity));
    }

    pub fn is_inside(&self, trigger: EntityId, entity: EntityId) -> bool {
        self.inside.contains(&(trigger, entity))
    }
}
