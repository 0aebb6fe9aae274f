pub const CONTROLLER_TICK_MS: u64 = 1_000;
pub const FRAME_MS: u64 = 16;
pub const MAX_FRAME_MS: u64 = 50;

pub const ROUND_SECONDS: u32 = 60;
pub const RED_LIGHT_MIN_MS: u64 = 10_000;
pub const GREEN_HOLD_RANDOM_MIN_MS: u64 = 1_000;
pub const GREEN_HOLD_RANDOM_MAX_MS: u64 = 5_000;
pub const RECHECK_INTERVAL_MS: u64 = 500;

pub const ANSWER_REVEAL_MS: u64 = 1_500;
pub const ANSWER_REVEAL_MIN_MS: u64 = 150;
pub const ANSWER_REVEAL_MAX_MS: u64 = 2_000;
pub const MAX_WRONG_ANSWERS: u32 = 5;
pub const TOTAL_QUESTIONS: u32 = 20;
pub const PROGRESS_STEP: f32 = 5.0;
pub const OPTIONS_PER_QUESTION: usize = 4;

pub const PLAYER_WALK_SPEED: f32 = 2.0;
pub const PLAYER_RUN_SPEED: f32 = 4.0;
pub const BRAKING_FORCE: f32 = 10.0;

pub const ARENA_HALF_X: f32 = 15.0;
pub const ARENA_HALF_Z: f32 = 50.0;
pub const ARENA_MARGIN: f32 = 0.6;

pub const PLAYER_START: [f32; 3] = [0.0, 0.0, 50.0];
pub const DOLL_POSITION: [f32; 3] = [0.0, 0.0, -52.0];
pub const FINISH_CENTER: [f32; 3] = [0.0, 0.0, -50.0];
pub const FINISH_HALF_EXTENTS: [f32; 3] = [25.0, 2.5, 5.0];

/// Enemy offsets relative to the doll.
pub const ENEMY_OFFSETS: [[f32; 3]; 4] = [
    [3.0, 0.0, 22.0],
    [-3.0, 0.0, 22.0],
    [6.0, 0.0, 24.0],
    [-6.0, 0.0, 24.0],
];
pub const ENEMY_SHOOT_MS: u64 = 1_200;

pub const NPC_COUNT: usize = 100;
pub const NPC_SPAWN_HALF_X: f32 = 14.0;
pub const NPC_SPAWN_Z_MIN: f32 = 47.0;
pub const NPC_SPAWN_Z_MAX: f32 = 50.0;
pub const NPC_SPEED_MIN: f32 = 3.0;
pub const NPC_SPEED_MAX: f32 = 6.0;
pub const NPC_GOAL_Z: f32 = -45.0;
pub const NPC_ARRIVE_RADIUS: f32 = 0.5;
pub const NPC_MAX_REACTION_MS: u64 = 600;
