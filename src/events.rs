//! Outbound notification surface for whatever presents the round.

use crate::types::{ActorState, EnemyState, EntityId, LightPhase, Question, RoundOutcome, SimEvent};

/// Receives simulation events in emission order. Every method defaults to a
/// no-op so hosts implement only what they render.
pub trait PresentationSink {
    fn on_actor_state_changed(&mut self, _id: EntityId, _state: ActorState) {}

    fn on_enemy_state_changed(&mut self, _id: EntityId, _state: EnemyState) {}

    fn on_phase_changed(&mut self, _phase: LightPhase) {}

    fn on_question_changed(&mut self, _question: Option<&Question>) {}

    fn on_score_changed(&mut self, _correct: u32, _wrong: u32) {}

    fn on_round_ended(&mut self, _outcome: RoundOutcome) {}
}

/// Sink that ignores everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl PresentationSink for NullSink {}

/// Sink that keeps every event, for tests and headless replays.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<SimEvent>,
}

impl PresentationSink for RecordingSink {
    fn on_actor_state_changed(&mut self, id: EntityId, state: ActorState) {
        self.events.push(SimEvent::ActorStateChanged { id, state });
    }

    fn on_enemy_state_changed(&mut self, id: EntityId, state: EnemyState) {
        self.events.push(SimEvent::EnemyStateChanged { id, state });
    }

    fn on_phase_changed(&mut self, phase: LightPhase) {
        self.events.push(SimEvent::PhaseChanged { phase });
    }

    fn on_question_changed(&mut self, question: Option<&Question>) {
        self.events.push(SimEvent::QuestionChanged {
            question: question.cloned(),
        });
    }

    fn on_score_changed(&mut self, correct: u32, wrong: u32) {
        self.events.push(SimEvent::ScoreChanged { correct, wrong });
    }

    fn on_round_ended(&mut self, outcome: RoundOutcome) {
        self.events.push(SimEvent::RoundEnded { outcome });
    }
}

pub fn dispatch<S>(sink: &mut S, events: &[SimEvent])
where
    S: PresentationSink + ?Sized,
{
    for event in events {
        match event {
            SimEvent::ActorStateChanged { id, state } => sink.on_actor_state_changed(*id, *state),
            SimEvent::EnemyStateChanged { id, state } => sink.on_enemy_state_changed(*id, *state),
            SimEvent::PhaseChanged { phase } => sink.on_phase_changed(*phase),
            SimEvent::QuestionChanged { question } => sink.on_question_changed(question.as_ref()),
            SimEvent::ScoreChanged { correct, wrong } => sink.on_score_changed(*correct, *wrong),
            SimEvent::RoundEnded { outcome } => sink.on_round_ended(*outcome),
        }
    }
}
