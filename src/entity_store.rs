//! Flat registry of every simulation entity.
//!
//! Entities are keyed by [`EntityId`] and iterate in ascending id order so
//! two rounds built from the same seed visit entities identically. Other
//! components keep ids, never references, across ticks.

use std::collections::BTreeMap;

use glam::Vec3;

use crate::types::{ActorState, EnemyState, EntityId, EntityTag, LightPhase};

#[derive(Clone, Debug)]
pub struct Actor {
    pub state: ActorState,
    pub max_speed: f32,
    pub is_npc: bool,
    pub behavior_active: bool,
    pub eliminated: bool,
    pub goal: Option<Vec3>,
    pub reaction_ms: u64,
    pub resume_at_ms: Option<u64>,
}

impl Actor {
    pub fn player(max_speed: f32) -> Self {
        Self {
            state: ActorState::Idle,
            max_speed,
            is_npc: false,
            behavior_active: false,
            eliminated: false,
            goal: None,
            reaction_ms: 0,
            resume_at_ms: None,
        }
    }

    pub fn npc(max_speed: f32, goal: Vec3, reaction_ms: u64) -> Self {
        Self {
            is_npc: true,
            goal: Some(goal),
            reaction_ms,
            ..Self::player(max_speed)
        }
    }
}

#[derive(Clone, Debug)]
pub struct Doll {
    pub phase: LightPhase,
    pub red_light_started_at: Option<u64>,
    pub green_hold_until: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct Enemy {
    pub state: EnemyState,
    pub shooting_until: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerPurpose {
    FinishLine,
}

/// Axis-aligned box centred on the owning entity's position.
#[derive(Clone, Debug)]
pub struct TriggerRegion {
    pub half_extents: Vec3,
    pub purpose: TriggerPurpose,
}

impl TriggerRegion {
    pub fn contains(&self, center: Vec3, point: Vec3) -> bool {
        let delta = (point - center).abs();
        delta.x <= self.half_extents.x
            && delta.y <= self.half_extents.y
            && delta.z <= self.half_extents.z
    }
}

#[derive(Clone, Debug)]
pub enum EntityKind {
    Player(Actor),
    Npc(Actor),
    Doll(Doll),
    Enemy(Enemy),
    Trigger(TriggerRegion),
}

impl EntityKind {
    pub fn tag(&self) -> EntityTag {
        match self {
            Self::Player(_) => EntityTag::Player,
            Self::Npc(_) => EntityTag::Npc,
            Self::Doll(_) => EntityTag::Doll,
            Self::Enemy(_) => EntityTag::Enemy,
            Self::Trigger(_) => EntityTag::Trigger,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Entity {
    pub id: EntityId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: Option<f32>,
    pub kind: EntityKind,
}

impl Entity {
    pub fn tag(&self) -> EntityTag {
        self.kind.tag()
    }

    pub fn actor(&self) -> Option<&Actor> {
        match &self.kind {
            EntityKind::Player(actor) | EntityKind::Npc(actor) => Some(actor),
            _ => None,
        }
    }

    pub fn actor_mut(&mut self) -> Option<&mut Actor> {
        match &mut self.kind {
            EntityKind::Player(actor) | EntityKind::Npc(actor) => Some(actor),
            _ => None,
        }
    }

    pub fn doll(&self) -> Option<&Doll> {
        match &self.kind {
            EntityKind::Doll(doll) => Some(doll),
            _ => None,
        }
    }

    pub fn doll_mut(&mut self) -> Option<&mut Doll> {
        match &mut self.kind {
            EntityKind::Doll(doll) => Some(doll),
            _ => None,
        }
    }

    pub fn enemy(&self) -> Option<&Enemy> {
        match &self.kind {
            EntityKind::Enemy(enemy) => Some(enemy),
            _ => None,
        }
    }

    pub fn enemy_mut(&mut self) -> Option<&mut Enemy> {
        match &mut self.kind {
            EntityKind::Enemy(enemy) => Some(enemy),
            _ => None,
        }
    }

    pub fn trigger(&self) -> Option<&TriggerRegion> {
        match &self.kind {
            EntityKind::Trigger(region) => Some(region),
            _ => None,
        }
    }

    pub fn actor_state(&self) -> Option<ActorState> {
        self.actor().map(|actor| actor.state)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Attachment {
    anchor: EntityId,
    offset: Vec3,
}

#[derive(Clone, Debug, Default)]
pub struct EntityStore {
    entities: BTreeMap<EntityId, Entity>,
    attachments: BTreeMap<EntityId, Attachment>,
    next_id: u32,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, position: Vec3, kind: EntityKind) -> EntityId {
        self.next_id = self.next_id.saturating_add(1);
        let id = EntityId(self.next_id);
        self.entities.insert(
            id,
            Entity {
                id,
                position,
                velocity: Vec3::ZERO,
                orientation: None,
                kind,
            },
        );
        id
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.attachments
            .retain(|dependent, link| *dependent != id && link.anchor != id);
        self.entities.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn for_each<P, F>(&mut self, mut predicate: P, mut f: F)
    where
        P: FnMut(&Entity) -> bool,
        F: FnMut(&mut Entity),
    {
        for entity in self.entities.values_mut() {
            if predicate(&*entity) {
                f(entity);
            }
        }
    }

    pub fn ids_where<P>(&self, mut predicate: P) -> Vec<EntityId>
    where
        P: FnMut(&Entity) -> bool,
    {
        self.entities
            .values()
            .filter(|entity| predicate(*entity))
            .map(|entity| entity.id)
            .collect()
    }

    /// Keeps `dependent` at `anchor.position + offset`, refreshed by
    /// [`EntityStore::sync_attachments`]. Returns false if either id is gone.
    pub fn attach(&mut self, dependent: EntityId, anchor: EntityId, offset: Vec3) -> bool {
        if dependent == anchor
            || !self.entities.contains_key(&dependent)
            || !self.entities.contains_key(&anchor)
        {
            return false;
        }
        self.attachments
            .insert(dependent, Attachment { anchor, offset });
        true
    }

    pub fn sync_attachments(&mut self) {
        let resolved: Vec<(EntityId, Vec3)> = self
            .attachments
            .iter()
            .filter_map(|(dependent, link)| {
                self.entities
                    .get(&link.anchor)
                    .map(|anchor| (*dependent, anchor.position + link.offset))
            })
            .collect();
        for (dependent, position) in resolved {
            if let Some(entity) = self.entities.get_mut(&dependent) {
                entity.position = position;
            }
        }
    }
}
