use glam::Vec3;

use crate::config::RoundConfig;
use crate::entity_store::{
    Actor, Doll, Enemy, EntityKind, EntityStore, TriggerPurpose, TriggerRegion,
};
use crate::rng::Rng;
use crate::types::{EnemyState, EntityId, LightPhase};

/// Ids of the fixed cast, created once when the round is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundIds {
    pub player: EntityId,
    pub doll: EntityId,
    pub enemies: Vec<EntityId>,
    pub finish: EntityId,
    pub npcs: Vec<EntityId>,
}

pub(super) fn populate(store: &mut EntityStore, config: &RoundConfig, rng: &mut Rng) -> RoundIds {
    let player = store.add(
        config.player_start,
        EntityKind::Player(Actor::player(config.walk_speed)),
    );
    let doll = store.add(
        config.doll_position,
        EntityKind::Doll(Doll {
            phase: LightPhase::GreenLight,
            red_light_started_at: None,
            green_hold_until: None,
        }),
    );
    let enemies = config
        .enemy_offsets
        .iter()
        .map(|offset| spawn_enemy(store, doll, config.doll_position, *offset))
        .collect();
    let finish = store.add(
        config.finish_center,
        EntityKind::Trigger(TriggerRegion {
            half_extents: config.finish_half_extents,
            purpose: TriggerPurpose::FinishLine,
        }),
    );
    let npcs = (0..config.npc_count)
        .map(|_| spawn_npc(store, config, rng))
        .collect();

    RoundIds {
        player,
        doll,
        enemies,
        finish,
        npcs,
    }
}

fn spawn_enemy(store: &mut EntityStore, doll: EntityId, doll_position: Vec3, offset: Vec3) -> EntityId {
    let id = store.add(
        doll_position + offset,
        EntityKind::Enemy(Enemy {
            state: EnemyState::Idle,
            shooting_until: None,
        }),
    );
    store.attach(id, doll, offset);
    id
}

fn spawn_npc(store: &mut EntityStore, config: &RoundConfig, rng: &mut Rng) -> EntityId {
    let x = rng.range_f32(-config.npc_spawn_half_x, config.npc_spawn_half_x);
    let z = rng.range_f32(config.npc_spawn_z_min, config.npc_spawn_z_max);
    let max_speed = rng.range_f32(config.npc_speed_min, config.npc_speed_max);
    let reaction_ms = rng.range_ms(0, config.npc_max_reaction_ms);
    let goal = Vec3::new(x, 0.0, config.npc_goal_z);
    store.add(
        Vec3::new(x, 0.0, z),
        EntityKind::Npc(Actor::npc(max_speed, goal, reaction_ms)),
    )
}
