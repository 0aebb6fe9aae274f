use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;

/// Round geometry and tuning, supplied once at round start.
///
/// Every field has a default, so a JSON file only needs the keys it
/// overrides. Vectors are `[x, y, z]` arrays.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoundConfig {
    pub arena_half_x: f32,
    pub arena_half_z: f32,
    pub arena_margin: f32,
    pub player_start: Vec3,
    pub doll_position: Vec3,
    pub finish_center: Vec3,
    pub finish_half_extents: Vec3,
    pub enemy_offsets: Vec<Vec3>,

    pub npc_count: usize,
    pub npc_spawn_half_x: f32,
    pub npc_spawn_z_min: f32,
    pub npc_spawn_z_max: f32,
    pub npc_speed_min: f32,
    pub npc_speed_max: f32,
    pub npc_goal_z: f32,
    pub npc_max_reaction_ms: u64,

    pub walk_speed: f32,
    pub run_speed: f32,
    pub braking_force: f32,
    pub max_frame_ms: u64,

    pub round_seconds: u32,
    pub red_light_min_ms: u64,
    pub green_hold_min_ms: u64,
    pub green_hold_max_ms: u64,
    pub recheck_interval_ms: u64,
    pub enemy_shoot_ms: u64,

    pub max_wrong_answers: u32,
    pub total_questions: u32,
    pub progress_step: f32,
    pub answer_reveal_ms: u64,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            arena_half_x: ARENA_HALF_X,
            arena_half_z: ARENA_HALF_Z,
            arena_margin: ARENA_MARGIN,
            player_start: Vec3::from(PLAYER_START),
            doll_position: Vec3::from(DOLL_POSITION),
            finish_center: Vec3::from(FINISH_CENTER),
            finish_half_extents: Vec3::from(FINISH_HALF_EXTENTS),
            enemy_offsets: ENEMY_OFFSETS.iter().copied().map(Vec3::from).collect(),
            npc_count: NPC_COUNT,
            npc_spawn_half_x: NPC_SPAWN_HALF_X,
            npc_spawn_z_min: NPC_SPAWN_Z_MIN,
            npc_spawn_z_max: NPC_SPAWN_Z_MAX,
            npc_speed_min: NPC_SPEED_MIN,
            npc_speed_max: NPC_SPEED_MAX,
            npc_goal_z: NPC_GOAL_Z,
            npc_max_reaction_ms: NPC_MAX_REACTION_MS,
            walk_speed: PLAYER_WALK_SPEED,
            run_speed: PLAYER_RUN_SPEED,
            braking_force: BRAKING_FORCE,
            max_frame_ms: MAX_FRAME_MS,
            round_seconds: ROUND_SECONDS,
            red_light_min_ms: RED_LIGHT_MIN_MS,
            green_hold_min_ms: GREEN_HOLD_RANDOM_MIN_MS,
            green_hold_max_ms: GREEN_HOLD_RANDOM_MAX_MS,
            recheck_interval_ms: RECHECK_INTERVAL_MS,
            enemy_shoot_ms: ENEMY_SHOOT_MS,
            max_wrong_answers: MAX_WRONG_ANSWERS,
            total_questions: TOTAL_QUESTIONS,
            progress_step: PROGRESS_STEP,
            answer_reveal_ms: ANSWER_REVEAL_MS,
        }
    }
}

impl RoundConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        Ok(config.sanitized())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Clamps values that would stall or invert the round.
    pub fn sanitized(mut self) -> Self {
        self.arena_half_x = self.arena_half_x.max(self.arena_margin + 0.1);
        self.arena_half_z = self.arena_half_z.max(self.arena_margin + 0.1);
        self.finish_half_extents = self.finish_half_extents.abs();
        if self.npc_speed_max < self.npc_speed_min {
            std::mem::swap(&mut self.npc_speed_min, &mut self.npc_speed_max);
        }
        if self.npc_spawn_z_max < self.npc_spawn_z_min {
            std::mem::swap(&mut self.npc_spawn_z_min, &mut self.npc_spawn_z_max);
        }
        if self.green_hold_max_ms < self.green_hold_min_ms {
            self.green_hold_max_ms = self.green_hold_min_ms;
        }
        self.max_frame_ms = self.max_frame_ms.max(1);
        self.round_seconds = self.round_seconds.max(1);
        self.recheck_interval_ms = self.recheck_interval_ms.max(1);
        self.max_wrong_answers = self.max_wrong_answers.max(1);
        self.total_questions = self.total_questions.max(1);
        self.progress_step = self.progress_step.max(0.0);
        self.answer_reveal_ms = self
            .answer_reveal_ms
            .clamp(ANSWER_REVEAL_MIN_MS, ANSWER_REVEAL_MAX_MS);
        self
    }

    pub fn walkable_half_x(&self) -> f32 {
        self.arena_half_x - self.arena_margin
    }

    pub fn walkable_half_z(&self) -> f32 {
        self.arena_half_z - self.arena_margin
    }

    /// Z coordinate of the finish line the player progresses toward.
    pub fn finish_line_z(&self) -> f32 {
        self.finish_center.z
    }
}
