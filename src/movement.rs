//! Per-frame movement integration, arena clamping and red-light checks.

use glam::Vec3;

use crate::config::RoundConfig;
use crate::entity_store::{Entity, EntityStore};
use crate::fsm::TransitionRequests;
use crate::types::{ActorState, EntityId, MoveInput};

/// FSM state the player's input asks for this frame.
///
/// While answering a question the body is frozen, so directional input is
/// read as no input at all.
pub fn player_state_for_input(input: &MoveInput, answering: bool) -> ActorState {
    if answering || !input.has_direction() {
        ActorState::Idle
    } else if input.run {
        ActorState::Run
    } else {
        ActorState::Walk
    }
}

/// Red-light re-check cadence.
#[derive(Clone, Copy, Debug)]
pub struct RecheckClock {
    interval_ms: u64,
    last_at: Option<u64>,
}

impl RecheckClock {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            last_at: None,
        }
    }

    pub fn mark(&mut self, now_ms: u64) {
        self.last_at = Some(now_ms);
    }

    pub fn reset(&mut self) {
        self.last_at = None;
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        match self.last_at {
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
            None => true,
        }
    }
}

/// Actors currently in Walk or Run.
pub fn moving_actors(store: &EntityStore) -> Vec<EntityId> {
    store.ids_where(|entity| {
        entity
            .actor_state()
            .map(ActorState::is_moving)
            .unwrap_or(false)
    })
}

pub struct MovementResolver {
    walk_speed: f32,
    run_speed: f32,
    braking_force: f32,
    half_x: f32,
    half_z: f32,
}

impl MovementResolver {
    pub fn new(config: &RoundConfig) -> Self {
        Self {
            walk_speed: config.walk_speed,
            run_speed: config.run_speed,
            braking_force: config.braking_force,
            half_x: config.walkable_half_x(),
            half_z: config.walkable_half_z(),
        }
    }

    /// Sets the player's velocity from held input, braking exponentially
    /// when nothing is pressed.
    pub fn steer_player(&self, entity: &mut Entity, input: &MoveInput, dt_sec: f32) {
        let Some(actor) = entity.actor_mut() else {
            return;
        };
        if actor.state.is_terminal() {
            entity.velocity = Vec3::ZERO;
            return;
        }
        actor.max_speed = if input.run {
            self.run_speed
        } else {
            self.walk_speed
        };
        let max_speed = actor.max_speed;
        let direction = input.direction();
        if direction == Vec3::ZERO {
            let keep = (1.0 - self.braking_force * dt_sec).max(0.0);
            entity.velocity *= keep;
        } else {
            entity.velocity = direction * max_speed;
            entity.orientation = Some(direction.x.atan2(-direction.z));
        }
    }

    /// Integrates every actor's position.
    ///
    /// During a red light every velocity is zeroed and actors that are not
    /// answering are requested back to Idle.
    pub fn integrate(
        &self,
        store: &mut EntityStore,
        red_light: bool,
        answering: Option<EntityId>,
        dt_sec: f32,
        requests: &mut TransitionRequests,
    ) {
        let mut force_idle = Vec::new();
        store.for_each(
            |entity| entity.actor().is_some(),
            |entity| {
                let state = entity.actor_state().unwrap_or(ActorState::Idle);
                if state.is_terminal() {
                    entity.velocity = Vec3::ZERO;
                    return;
                }
                if red_light {
                    entity.velocity = Vec3::ZERO;
                    if answering != Some(entity.id) && state != ActorState::Idle {
                        force_idle.push(entity.id);
                    }
                    return;
                }
                entity.position += entity.velocity * dt_sec;
                entity.position = self.clamp_to_arena(entity.position);
            },
        );
        for id in force_idle {
            requests.request_actor(id, ActorState::Idle);
        }
    }

    pub fn clamp_to_arena(&self, position: Vec3) -> Vec3 {
        Vec3::new(
            position.x.clamp(-self.half_x, self.half_x),
            position.y,
            position.z.clamp(-self.half_z, self.half_z),
        )
    }
}
