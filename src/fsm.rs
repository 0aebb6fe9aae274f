//! Per-kind state machines for actors, the doll and enemies.
//!
//! Enter/exit hooks only touch simulation bookkeeping on the entity; every
//! successful change pushes a [`SimEvent`] for the presentation layer.

use std::collections::BTreeMap;

use glam::Vec3;
use log::debug;

use crate::entity_store::EntityStore;
use crate::error::TransitionError;
use crate::types::{ActorState, EnemyState, EntityId, LightPhase, SimEvent};

/// Returns `Ok(true)` if the state changed, `Ok(false)` for a same-state request.
pub fn change_actor_state(
    store: &mut EntityStore,
    id: EntityId,
    target: ActorState,
    events: &mut Vec<SimEvent>,
) -> Result<bool, TransitionError> {
    let entity = store
        .get_mut(id)
        .ok_or(TransitionError::UnknownEntity(id))?;
    let tag = entity.tag();
    let actor = entity
        .actor_mut()
        .ok_or(TransitionError::WrongKind { id, tag })?;

    let from = actor.state;
    if from == target {
        return Ok(false);
    }
    if from.is_terminal() {
        return Err(TransitionError::Terminal {
            id,
            from,
            to: target,
        });
    }

    actor.state = target;
    if target.is_terminal() {
        actor.behavior_active = false;
        actor.resume_at_ms = None;
        if target == ActorState::Dead {
            actor.eliminated = true;
        }
        entity.velocity = Vec3::ZERO;
    }
    debug!("actor {id} {from:?} -> {target:?}");
    events.push(SimEvent::ActorStateChanged { id, state: target });
    Ok(true)
}

pub fn change_phase(
    store: &mut EntityStore,
    id: EntityId,
    target: LightPhase,
    now_ms: u64,
    events: &mut Vec<SimEvent>,
) -> Result<bool, TransitionError> {
    let entity = store
        .get_mut(id)
        .ok_or(TransitionError::UnknownEntity(id))?;
    let tag = entity.tag();
    let doll = entity
        .doll_mut()
        .ok_or(TransitionError::WrongKind { id, tag })?;

    let from = doll.phase;
    if from == target {
        return Ok(false);
    }
    if from == LightPhase::EliminateAll {
        return Err(TransitionError::Sink {
            id,
            from,
            to: target,
        });
    }

    doll.phase = target;
    match target {
        LightPhase::RedLight => {
            doll.red_light_started_at = Some(now_ms);
            doll.green_hold_until = None;
        }
        LightPhase::GreenLight => {
            doll.red_light_started_at = None;
        }
        LightPhase::EliminateAll => {
            doll.red_light_started_at = None;
            doll.green_hold_until = None;
        }
    }
    debug!("doll {id} {from:?} -> {target:?} at {now_ms}ms");
    events.push(SimEvent::PhaseChanged { phase: target });
    Ok(true)
}

pub fn change_enemy_state(
    store: &mut EntityStore,
    id: EntityId,
    target: EnemyState,
    now_ms: u64,
    shoot_ms: u64,
    events: &mut Vec<SimEvent>,
) -> Result<bool, TransitionError> {
    let entity = store
        .get_mut(id)
        .ok_or(TransitionError::UnknownEntity(id))?;
    let tag = entity.tag();
    let enemy = entity
        .enemy_mut()
        .ok_or(TransitionError::WrongKind { id, tag })?;

    match target {
        EnemyState::Shooting => {
            // A fresh trigger restarts the volley even when already shooting.
            enemy.shooting_until = Some(now_ms.saturating_add(shoot_ms));
        }
        EnemyState::Idle => enemy.shooting_until = None,
    }
    if enemy.state == target {
        return Ok(false);
    }
    enemy.state = target;
    events.push(SimEvent::EnemyStateChanged { id, state: target });
    Ok(true)
}

fn actor_priority(state: ActorState) -> u8 {
    if state.is_terminal() {
        1
    } else {
        0
    }
}

fn phase_priority(phase: LightPhase) -> u8 {
    match phase {
        LightPhase::EliminateAll => 1,
        LightPhase::GreenLight | LightPhase::RedLight => 0,
    }
}

/// Same-tick transition requests, resolved so terminal targets win.
///
/// Among requests of equal rank the earliest one is kept, so callers record
/// requests in tick order (eliminations before trigger evaluation).
#[derive(Debug, Default)]
pub struct TransitionRequests {
    actors: BTreeMap<EntityId, ActorState>,
    phase: Option<(EntityId, LightPhase)>,
}

impl TransitionRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_actor(&mut self, id: EntityId, target: ActorState) {
        match self.actors.get(&id) {
            Some(existing) if actor_priority(*existing) >= actor_priority(target) => {}
            _ => {
                self.actors.insert(id, target);
            }
        }
    }

    pub fn request_phase(&mut self, doll: EntityId, target: LightPhase) {
        match self.phase {
            Some((_, existing)) if phase_priority(existing) >= phase_priority(target) => {}
            _ => self.phase = Some((doll, target)),
        }
    }

    pub fn actor_request(&self, id: EntityId) -> Option<ActorState> {
        self.actors.get(&id).copied()
    }

    pub fn phase_request(&self) -> Option<LightPhase> {
        self.phase.map(|(_, phase)| phase)
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty() && self.phase.is_none()
    }

    /// Applies the phase first, then actors in id order. Rejected requests are
    /// logged and dropped; the ids that actually changed are returned.
    pub fn apply(
        self,
        store: &mut EntityStore,
        now_ms: u64,
        events: &mut Vec<SimEvent>,
    ) -> Vec<(EntityId, ActorState)> {
        if let Some((doll, phase)) = self.phase {
            if let Err(err) = change_phase(store, doll, phase, now_ms, events) {
                debug!("ignored phase request: {err}");
            }
        }
        let mut changed = Vec::new();
        for (id, target) in self.actors {
            match change_actor_state(store, id, target, events) {
                Ok(true) => changed.push((id, target)),
                Ok(false) => {}
                Err(err) => debug!("ignored actor request: {err}"),
            }
        }
        changed
    }
}
