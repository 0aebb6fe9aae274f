//! NPC contestants: seek steering toward their goal, halted by red light
//! and resumed after a per-NPC reaction latency on green.

use glam::Vec3;
use log::debug;

use crate::entity_store::{Entity, EntityStore};
use crate::fsm::TransitionRequests;
use crate::types::ActorState;

fn is_live_npc(entity: &Entity) -> bool {
    entity
        .actor()
        .map(|actor| actor.is_npc && !actor.state.is_terminal())
        .unwrap_or(false)
}

pub struct CrowdDirector {
    arrive_radius: f32,
}

impl CrowdDirector {
    pub fn new(arrive_radius: f32) -> Self {
        Self { arrive_radius }
    }

    /// Round start: every live NPC that has not arrived starts running.
    pub fn activate(&self, store: &mut EntityStore, requests: &mut TransitionRequests) {
        let arrive_radius = self.arrive_radius;
        let mut started = Vec::new();
        store.for_each(is_live_npc, |entity| {
            let position = entity.position;
            let Some(actor) = entity.actor_mut() else {
                return;
            };
            actor.resume_at_ms = None;
            if !has_arrived(actor.goal, position, arrive_radius) {
                actor.behavior_active = true;
                started.push(entity.id);
            }
        });
        debug!("{} npc(s) start running", started.len());
        for id in started {
            requests.request_actor(id, ActorState::Run);
        }
    }

    /// Green light: each NPC that has not arrived picks up again after its
    /// own reaction latency. NPCs with no latency start right away.
    pub fn schedule_resume(
        &self,
        store: &mut EntityStore,
        now_ms: u64,
        requests: &mut TransitionRequests,
    ) {
        let arrive_radius = self.arrive_radius;
        let mut started = Vec::new();
        store.for_each(is_live_npc, |entity| {
            let position = entity.position;
            let Some(actor) = entity.actor_mut() else {
                return;
            };
            if has_arrived(actor.goal, position, arrive_radius) {
                actor.resume_at_ms = None;
                return;
            }
            if actor.reaction_ms == 0 {
                actor.resume_at_ms = None;
                actor.behavior_active = true;
                started.push(entity.id);
            } else {
                actor.resume_at_ms = Some(now_ms.saturating_add(actor.reaction_ms));
            }
        });
        for id in started {
            requests.request_actor(id, ActorState::Run);
        }
    }

    /// Starts NPCs whose reaction deadline has passed and asks for Run.
    pub fn apply_due_resumes(
        &self,
        store: &mut EntityStore,
        now_ms: u64,
        requests: &mut TransitionRequests,
    ) -> usize {
        let mut resumed = Vec::new();
        store.for_each(is_live_npc, |entity| {
            let Some(actor) = entity.actor_mut() else {
                return;
            };
            match actor.resume_at_ms {
                Some(deadline) if now_ms >= deadline => {
                    actor.resume_at_ms = None;
                    actor.behavior_active = true;
                    resumed.push(entity.id);
                }
                _ => {}
            }
        });
        let count = resumed.len();
        for id in resumed {
            requests.request_actor(id, ActorState::Run);
        }
        count
    }

    /// Red light: steering switches off for every NPC at once and pending
    /// resumes are dropped. FSM states are left alone, so an NPC caught in
    /// Run is still seen moving by the entry check.
    pub fn halt(&self, store: &mut EntityStore) {
        store.for_each(is_live_npc, |entity| {
            let Some(actor) = entity.actor_mut() else {
                return;
            };
            actor.behavior_active = false;
            actor.resume_at_ms = None;
            entity.velocity = Vec3::ZERO;
        });
    }

    /// Seek steering for active NPCs; arrival parks them in Idle.
    pub fn steer(&self, store: &mut EntityStore, dt_sec: f32, requests: &mut TransitionRequests) {
        let arrive_radius = self.arrive_radius;
        let mut arrived = Vec::new();
        store.for_each(is_live_npc, |entity| {
            let position = entity.position;
            let velocity = entity.velocity;
            let Some(actor) = entity.actor_mut() else {
                return;
            };
            if !actor.behavior_active {
                return;
            }
            let Some(goal) = actor.goal else {
                return;
            };
            let max_speed = actor.max_speed;
            let to_goal = Vec3::new(goal.x - position.x, 0.0, goal.z - position.z);
            if to_goal.length() <= arrive_radius {
                actor.behavior_active = false;
                entity.velocity = Vec3::ZERO;
                arrived.push(entity.id);
                return;
            }
            let desired = to_goal.normalize_or_zero() * max_speed;
            let blend = dt_sec.clamp(0.0, 1.0);
            let steered = velocity + (desired - velocity) * blend;
            entity.velocity = steered.clamp_length_max(max_speed);
            entity.orientation = Some(to_goal.x.atan2(-to_goal.z));
        });
        for id in arrived {
            debug!("npc {id} reached its goal");
            requests.request_actor(id, ActorState::Idle);
        }
    }
}

/// Alive and dead NPC counts.
pub fn census(store: &EntityStore) -> (usize, usize) {
    store
        .iter()
        .filter_map(|entity| entity.actor().filter(|actor| actor.is_npc))
        .fold((0, 0), |(alive, dead), actor| {
            if actor.eliminated {
                (alive, dead + 1)
            } else {
                (alive + 1, dead)
            }
        })
}

fn has_arrived(goal: Option<Vec3>, position: Vec3, arrive_radius: f32) -> bool {
    goal.map(|goal| flat_distance(position, goal) <= arrive_radius).unwrap_or(true)
}

fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    Vec3::new(a.x - b.x, 0.0, a.z - b.z).length()
}
