//! Quiz gate: ties answers to player progress and the elimination budget.
//!
//! A question is outstanding from the moment the red light issues it until
//! the player answers or the light turns green. While one is outstanding the
//! red light cannot end.

use glam::Vec3;
use log::{debug, info};

use crate::config::RoundConfig;
use crate::entity_store::EntityStore;
use crate::fsm::change_actor_state;
use crate::types::{ActorState, AnswerOutcome, EntityId, Question, QuizView, SimEvent};

#[derive(Clone, Debug)]
pub struct QuizSession {
    questions: Vec<Question>,
    current_index: Option<usize>,
    correct_answers: u32,
    wrong_answers: u32,
    max_wrong_answers: u32,
    total_questions: u32,
    outstanding: Option<Question>,
    answered_this_cycle: bool,
    progress_step: f32,
    reveal_ms: u64,
    reveal_due_at: Option<u64>,
}

impl QuizSession {
    pub fn new(questions: Vec<Question>, config: &RoundConfig) -> Self {
        Self {
            questions,
            current_index: None,
            correct_answers: 0,
            wrong_answers: 0,
            max_wrong_answers: config.max_wrong_answers,
            total_questions: config.total_questions,
            outstanding: None,
            answered_this_cycle: false,
            progress_step: config.progress_step,
            reveal_ms: config.answer_reveal_ms,
            reveal_due_at: None,
        }
    }

    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    pub fn wrong_answers(&self) -> u32 {
        self.wrong_answers
    }

    pub fn max_wrong_answers(&self) -> u32 {
        self.max_wrong_answers
    }

    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn outstanding(&self) -> Option<&Question> {
        self.outstanding.as_ref()
    }

    pub fn is_outstanding(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Enough correct answers to claim the finish line.
    pub fn is_eligible(&self) -> bool {
        self.correct_answers >= self.total_questions
    }

    pub fn reveal_pending(&self) -> bool {
        self.reveal_due_at.is_some()
    }

    pub fn view(&self) -> QuizView {
        QuizView {
            correct: self.correct_answers,
            wrong: self.wrong_answers,
            max_wrong: self.max_wrong_answers,
            total: self.total_questions,
            outstanding: self.outstanding.clone(),
        }
    }

    /// Issues the next question in the cycle, wrapping at the end.
    pub fn next_question(&mut self, events: &mut Vec<SimEvent>) -> Option<&Question> {
        if self.questions.is_empty() {
            return None;
        }
        let index = self
            .current_index
            .map(|idx| (idx + 1) % self.questions.len())
            .unwrap_or(0);
        self.current_index = Some(index);
        self.answered_this_cycle = false;
        self.reveal_due_at = None;
        let question = self.questions[index].clone();
        debug!("question {} issued", question.id);
        events.push(SimEvent::QuestionChanged {
            question: Some(question.clone()),
        });
        self.outstanding = Some(question);
        self.outstanding.as_ref()
    }

    /// Drops the outstanding question (the light turned green) and any
    /// pending reveal. Counters are untouched.
    pub fn clear_outstanding(&mut self, events: &mut Vec<SimEvent>) {
        self.reveal_due_at = None;
        if self.outstanding.take().is_some() {
            events.push(SimEvent::QuestionChanged { question: None });
        }
    }

    pub fn cancel_reveal(&mut self) {
        self.reveal_due_at = None;
    }

    /// Consumes a due reveal. The caller decides whether to chain a question.
    pub fn take_due_reveal(&mut self, now_ms: u64) -> bool {
        match self.reveal_due_at {
            Some(due) if now_ms >= due => {
                self.reveal_due_at = None;
                true
            }
            _ => false,
        }
    }

    /// Scores `selected` against the outstanding question.
    ///
    /// A correct answer moves the player `progress_step` units toward
    /// `finish_z`, never past it. Reaching the wrong-answer cap kills the
    /// player whatever the light phase.
    pub fn submit_answer(
        &mut self,
        selected: usize,
        store: &mut EntityStore,
        player: EntityId,
        finish_z: f32,
        now_ms: u64,
        events: &mut Vec<SimEvent>,
    ) -> AnswerOutcome {
        if self.answered_this_cycle {
            return AnswerOutcome::Ignored;
        }
        let Some(question) = self.outstanding.take() else {
            return AnswerOutcome::Ignored;
        };
        self.answered_this_cycle = true;
        self.reveal_due_at = Some(now_ms.saturating_add(self.reveal_ms));

        let outcome = if selected == question.correct_index {
            self.correct_answers = (self.correct_answers + 1).min(self.total_questions);
            if let Some(entity) = store.get_mut(player) {
                entity.position.z = advance_toward(entity.position.z, finish_z, self.progress_step);
            }
            AnswerOutcome::Correct
        } else {
            self.wrong_answers = self.wrong_answers.saturating_add(1);
            let eliminated = self.wrong_answers >= self.max_wrong_answers;
            if eliminated {
                info!(
                    "wrong answer {}/{}: player eliminated",
                    self.wrong_answers, self.max_wrong_answers
                );
                if let Err(err) = change_actor_state(store, player, ActorState::Dead, events) {
                    debug!("wrong-answer elimination ignored: {err}");
                }
            }
            AnswerOutcome::Wrong { eliminated }
        };

        events.push(SimEvent::ScoreChanged {
            correct: self.correct_answers,
            wrong: self.wrong_answers,
        });
        events.push(SimEvent::QuestionChanged { question: None });
        outcome
    }
}

/// Moves `from` by `step` toward `target` without crossing it.
pub fn advance_toward(from: f32, target: f32, step: f32) -> f32 {
    if from > target {
        (from - step).max(target)
    } else {
        (from + step).min(target)
    }
}

/// Remaining distance from the player to the finish line along Z.
pub fn distance_left(position: Vec3, finish_z: f32) -> f32 {
    (position.z - finish_z).abs()
}
