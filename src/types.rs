use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityTag {
    Player,
    Npc,
    Doll,
    Enemy,
    Trigger,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorState {
    Idle,
    Walk,
    Run,
    Dead,
    Dance,
}

impl ActorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Dead | Self::Dance)
    }

    pub fn is_moving(self) -> bool {
        matches!(self, Self::Walk | Self::Run)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightPhase {
    GreenLight,
    RedLight,
    EliminateAll,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyState {
    Idle,
    Shooting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    Victory,
    Elimination,
    Timeout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "outcome", rename_all = "snake_case")]
pub enum RoundStatus {
    Ready,
    Running,
    Ended(RoundOutcome),
}

/// Directional movement flags as held by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveInput {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub run: bool,
}

impl MoveInput {
    pub fn forward() -> Self {
        Self {
            forward: true,
            ..Self::default()
        }
    }

    /// Unit direction on the XZ plane; forward is -Z.
    pub fn direction(&self) -> Vec3 {
        let x = f32::from(u8::from(self.right)) - f32::from(u8::from(self.left));
        let z = f32::from(u8::from(self.back)) - f32::from(u8::from(self.forward));
        Vec3::new(x, 0.0, z).normalize_or_zero()
    }

    pub fn has_direction(&self) -> bool {
        self.direction() != Vec3::ZERO
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    #[serde(alias = "question")]
    pub text: String,
    pub options: Vec<String>,
    #[serde(rename = "correctIndex", alias = "correctAnswer", alias = "correct_index")]
    pub correct_index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AnswerOutcome {
    Ignored,
    Correct,
    Wrong { eliminated: bool },
}

/// Inbound host commands, consumed between ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostCommand {
    Move(MoveInput),
    SelectAnswer(usize),
    ShootFinished(EntityId),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    ActorStateChanged {
        id: EntityId,
        state: ActorState,
    },
    EnemyStateChanged {
        id: EntityId,
        state: EnemyState,
    },
    PhaseChanged {
        phase: LightPhase,
    },
    QuestionChanged {
        question: Option<Question>,
    },
    ScoreChanged {
        correct: u32,
        wrong: u32,
    },
    RoundEnded {
        outcome: RoundOutcome,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct ActorView {
    pub id: EntityId,
    pub npc: bool,
    pub state: ActorState,
    pub position: Vec3,
    pub velocity: Vec3,
}

#[derive(Clone, Debug, Serialize)]
pub struct QuizView {
    pub correct: u32,
    pub wrong: u32,
    #[serde(rename = "maxWrong")]
    pub max_wrong: u32,
    pub total: u32,
    pub outstanding: Option<Question>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub frame: u64,
    #[serde(rename = "nowMs")]
    pub now_ms: u64,
    #[serde(rename = "secondsLeft")]
    pub seconds_left: u32,
    pub phase: LightPhase,
    pub status: RoundStatus,
    pub player: ActorView,
    #[serde(rename = "npcsAlive")]
    pub npcs_alive: usize,
    #[serde(rename = "npcsDead")]
    pub npcs_dead: usize,
    pub quiz: QuizView,
    pub events: Vec<SimEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RoundSummary {
    pub outcome: Option<RoundOutcome>,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(rename = "correctAnswers")]
    pub correct_answers: u32,
    #[serde(rename = "wrongAnswers")]
    pub wrong_answers: u32,
    #[serde(rename = "redLights")]
    pub red_lights: u32,
    #[serde(rename = "npcsSurvived")]
    pub npcs_survived: usize,
    #[serde(rename = "npcsEliminated")]
    pub npcs_eliminated: usize,
    #[serde(rename = "playerDistanceLeft")]
    pub player_distance_left: f32,
}
