use glam::Vec3;
use log::{debug, info};

use crate::config::RoundConfig;
use crate::constants::NPC_ARRIVE_RADIUS;
use crate::crowd::{census, CrowdDirector};
use crate::entity_store::{Doll, EntityStore, TriggerPurpose};
use crate::events::{dispatch, PresentationSink};
use crate::fsm::{change_enemy_state, TransitionRequests};
use crate::movement::{moving_actors, player_state_for_input, MovementResolver, RecheckClock};
use crate::questions::QuestionBank;
use crate::quiz::{distance_left, QuizSession};
use crate::rng::Rng;
use crate::timing::{CueDurationProvider, LightCycleController, PhaseDecision};
use crate::trigger::{TriggerEntry, TriggerTracker};
use crate::types::{
    ActorState, ActorView, AnswerOutcome, EnemyState, EntityId, HostCommand, LightPhase,
    MoveInput, RoundOutcome, RoundStatus, RoundSummary, SimEvent, Snapshot,
};

mod light_system;
mod setup;

pub use self::setup::RoundIds;

#[derive(Default)]
pub struct RoundEngineOptions {
    pub cue: Option<Box<dyn CueDurationProvider>>,
}

/// Round-level flags, kept in one place so invariants are checkable.
#[derive(Clone, Debug)]
pub struct RoundState {
    pub status: RoundStatus,
    pub frame: u64,
    pub controller_ticks: u64,
    pub now_ms: u64,
    pub ended_at_ms: Option<u64>,
    pub torn_down: bool,
    pub recheck: RecheckClock,
}

impl RoundState {
    fn new(recheck_interval_ms: u64) -> Self {
        Self {
            status: RoundStatus::Ready,
            frame: 0,
            controller_ticks: 0,
            now_ms: 0,
            ended_at_ms: None,
            torn_down: false,
            recheck: RecheckClock::new(recheck_interval_ms),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == RoundStatus::Running && !self.torn_down
    }

    pub fn outcome(&self) -> Option<RoundOutcome> {
        match self.status {
            RoundStatus::Ended(outcome) => Some(outcome),
            RoundStatus::Ready | RoundStatus::Running => None,
        }
    }
}

pub struct RoundEngine {
    pub config: RoundConfig,
    pub seed: u32,

    ids: RoundIds,
    store: EntityStore,
    rng: Rng,
    controller: LightCycleController,
    quiz: QuizSession,
    movement: MovementResolver,
    crowd: CrowdDirector,
    triggers: TriggerTracker,
    state: RoundState,
    input: MoveInput,
    events: Vec<SimEvent>,
}

impl RoundEngine {
    pub fn new(
        config: RoundConfig,
        questions: QuestionBank,
        seed: u32,
        options: RoundEngineOptions,
    ) -> Self {
        let config = config.sanitized();
        let mut rng = Rng::new(seed);
        let mut store = EntityStore::new();
        let ids = setup::populate(&mut store, &config, &mut rng);
        debug!(
            "round built with seed {seed}: {} entities, {} npc(s)",
            store.len(),
            ids.npcs.len()
        );

        Self {
            controller: LightCycleController::new(&config, options.cue),
            quiz: QuizSession::new(questions.into_questions(), &config),
            movement: MovementResolver::new(&config),
            crowd: CrowdDirector::new(NPC_ARRIVE_RADIUS),
            triggers: TriggerTracker::new(),
            state: RoundState::new(config.recheck_interval_ms),
            input: MoveInput::default(),
            events: Vec::new(),
            ids,
            store,
            rng,
            seed,
            config,
        }
    }

    pub fn ids(&self) -> &RoundIds {
        &self.ids
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn quiz(&self) -> &QuizSession {
        &self.quiz
    }

    pub fn input(&self) -> MoveInput {
        self.input
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.state.status, RoundStatus::Ended(_))
    }

    pub fn outcome(&self) -> Option<RoundOutcome> {
        self.state.outcome()
    }

    pub fn seconds_left(&self) -> u32 {
        self.controller.seconds_left()
    }

    pub fn red_lights(&self) -> u32 {
        self.controller.red_lights()
    }

    pub fn doll(&self) -> Option<&Doll> {
        self.store.get(self.ids.doll).and_then(|e| e.doll())
    }

    pub fn phase(&self) -> LightPhase {
        self.doll()
            .map(|doll| doll.phase)
            .unwrap_or(LightPhase::GreenLight)
    }

    pub fn player_state(&self) -> Option<ActorState> {
        self.store.get(self.ids.player).and_then(|e| e.actor_state())
    }

    /// The player is answering while a question is up during a red light.
    pub fn is_answering(&self) -> bool {
        self.phase() == LightPhase::RedLight && self.quiz.is_outstanding()
    }

    pub fn start(&mut self) {
        if self.state.status != RoundStatus::Ready || self.state.torn_down {
            return;
        }
        self.state.status = RoundStatus::Running;
        let now_ms = self.state.now_ms;
        info!(
            "round started: seed={} npcs={} questions={}",
            self.seed,
            self.ids.npcs.len(),
            self.config.total_questions
        );
        self.events.push(SimEvent::PhaseChanged {
            phase: LightPhase::GreenLight,
        });
        self.enter_green_light(now_ms, true);
    }

    /// One render frame. Ordering: FSM updates, red-light re-check,
    /// integration, trigger evaluation.
    pub fn frame(&mut self, dt_ms: u64) {
        if !self.state.is_running() {
            return;
        }
        self.state.frame += 1;
        self.state.now_ms = self.state.now_ms.saturating_add(dt_ms);
        let now_ms = self.state.now_ms;
        let dt_sec = dt_ms.min(self.config.max_frame_ms) as f32 / 1000.0;
        let red_light = self.phase() == LightPhase::RedLight;
        let answering = self.is_answering();
        let recheck_due = red_light && self.state.recheck.is_due(now_ms);

        self.release_enemies(now_ms);
        let mut requests = TransitionRequests::new();
        self.crowd.apply_due_resumes(&mut self.store, now_ms, &mut requests);
        if !self.player_state().map(ActorState::is_terminal).unwrap_or(true) {
            let wanted = player_state_for_input(&self.input, answering);
            // Under red light a held key only registers when the doll looks.
            if !(red_light && wanted.is_moving() && !recheck_due) {
                requests.request_actor(self.ids.player, wanted);
            }
        }
        requests.apply(&mut self.store, now_ms, &mut self.events);

        if recheck_due {
            self.state.recheck.mark(now_ms);
            let caught = self.eliminate_moving(now_ms);
            if caught > 0 {
                debug!("re-check at {now_ms}ms caught {caught} actor(s)");
            }
        }
        if self.check_round_end(now_ms) {
            return;
        }

        let input = if answering {
            MoveInput::default()
        } else {
            self.input
        };
        let mut requests = TransitionRequests::new();
        if let Some(player) = self.store.get_mut(self.ids.player) {
            self.movement.steer_player(player, &input, dt_sec);
        }
        self.crowd.steer(&mut self.store, dt_sec, &mut requests);
        self.movement.integrate(
            &mut self.store,
            red_light,
            answering.then_some(self.ids.player),
            dt_sec,
            &mut requests,
        );
        self.store.sync_attachments();

        let actors = self.store.ids_where(|entity| entity.actor().is_some());
        for entry in self.triggers.evaluate(&self.store, &actors) {
            self.on_trigger_entry(entry, &mut requests);
        }
        requests.apply(&mut self.store, now_ms, &mut self.events);

        self.process_due_reveal(now_ms);
        self.check_round_end(now_ms);
    }

    pub fn set_input(&mut self, input: MoveInput) {
        if self.state.torn_down || self.is_ended() {
            return;
        }
        self.input = input;
    }

    pub fn submit_answer(&mut self, selected: usize) -> AnswerOutcome {
        if !self.state.is_running() {
            return AnswerOutcome::Ignored;
        }
        let now_ms = self.state.now_ms;
        let outcome = self.quiz.submit_answer(
            selected,
            &mut self.store,
            self.ids.player,
            self.config.finish_line_z(),
            now_ms,
            &mut self.events,
        );
        debug!("answer {selected}: {outcome:?}");
        if let AnswerOutcome::Wrong { .. } = outcome {
            self.enemies_shoot(now_ms);
        }
        self.check_round_end(now_ms);
        outcome
    }

    /// The presentation layer finished an enemy's shooting animation.
    pub fn notify_shoot_finished(&mut self, enemy: EntityId) {
        if !self.state.is_running() {
            return;
        }
        let now_ms = self.state.now_ms;
        self.return_enemy_to_idle(enemy, now_ms);
    }

    pub fn apply_command(&mut self, command: HostCommand) -> Option<AnswerOutcome> {
        match command {
            HostCommand::Move(input) => {
                self.set_input(input);
                None
            }
            HostCommand::SelectAnswer(selected) => Some(self.submit_answer(selected)),
            HostCommand::ShootFinished(enemy) => {
                self.notify_shoot_finished(enemy);
                None
            }
        }
    }

    /// Stops the controller and cancels any pending reveal. Every mutator
    /// is a no-op afterwards.
    pub fn teardown(&mut self) {
        if self.state.torn_down {
            return;
        }
        self.state.torn_down = true;
        self.controller.stop();
        self.quiz.cancel_reveal();
        info!("round torn down at {}ms", self.state.now_ms);
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let (npcs_alive, npcs_dead) = census(&self.store);
        Snapshot {
            frame: self.state.frame,
            now_ms: self.state.now_ms,
            seconds_left: self.controller.seconds_left(),
            phase: self.phase(),
            status: self.state.status,
            player: self.player_view(),
            npcs_alive,
            npcs_dead,
            quiz: self.quiz.view(),
            events: if include_events {
                std::mem::take(&mut self.events)
            } else {
                Vec::new()
            },
        }
    }

    pub fn build_summary(&self) -> RoundSummary {
        let (npcs_survived, npcs_eliminated) = census(&self.store);
        let player_position = self
            .store
            .get(self.ids.player)
            .map(|e| e.position)
            .unwrap_or(self.config.player_start);
        RoundSummary {
            outcome: self.state.outcome(),
            duration_ms: self.state.ended_at_ms.unwrap_or(self.state.now_ms),
            correct_answers: self.quiz.correct_answers(),
            wrong_answers: self.quiz.wrong_answers(),
            red_lights: self.controller.red_lights(),
            npcs_survived,
            npcs_eliminated,
            player_distance_left: distance_left(player_position, self.config.finish_line_z()),
        }
    }

    /// Drains queued events into `sink` in emission order.
    pub fn dispatch_events<S>(&mut self, sink: &mut S)
    where
        S: PresentationSink + ?Sized,
    {
        let events = std::mem::take(&mut self.events);
        dispatch(sink, &events);
    }

    fn player_view(&self) -> ActorView {
        let player = self.store.get(self.ids.player);
        ActorView {
            id: self.ids.player,
            npc: false,
            state: player
                .and_then(|e| e.actor_state())
                .unwrap_or(ActorState::Idle),
            position: player.map(|e| e.position).unwrap_or(Vec3::ZERO),
            velocity: player.map(|e| e.velocity).unwrap_or(Vec3::ZERO),
        }
    }

    fn on_trigger_entry(&mut self, entry: TriggerEntry, requests: &mut TransitionRequests) {
        match entry.purpose {
            TriggerPurpose::FinishLine if entry.entity != self.ids.player => {
                debug!("npc {} crossed the finish line", entry.entity);
            }
            TriggerPurpose::FinishLine => {
                if self.quiz.is_eligible() {
                    requests.request_actor(entry.entity, ActorState::Dance);
                } else {
                    // Not eligible yet; offer the entry again next frame.
                    self.triggers.release(entry.trigger, entry.entity);
                }
            }
        }
    }

    /// Ends the round if the player reached a terminal state.
    fn check_round_end(&mut self, now_ms: u64) -> bool {
        if !self.state.is_running() {
            return true;
        }
        let outcome = match self.player_state() {
            Some(ActorState::Dead) => RoundOutcome::Elimination,
            Some(ActorState::Dance) => RoundOutcome::Victory,
            _ => return false,
        };
        self.end_round(outcome, now_ms);
        true
    }

    fn end_round(&mut self, outcome: RoundOutcome, now_ms: u64) {
        if !self.state.is_running() {
            return;
        }
        self.state.status = RoundStatus::Ended(outcome);
        self.state.ended_at_ms = Some(now_ms);
        self.controller.stop();
        self.quiz.cancel_reveal();
        self.events.push(SimEvent::RoundEnded { outcome });
        info!("round ended: {outcome:?} at {now_ms}ms");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;

    fn quiet_config() -> RoundConfig {
        RoundConfig {
            npc_count: 0,
            ..RoundConfig::default()
        }
    }

    fn started(config: RoundConfig, seed: u32) -> RoundEngine {
        let mut engine = RoundEngine::new(
            config,
            QuestionBank::builtin(),
            seed,
            RoundEngineOptions::default(),
        );
        engine.start();
        engine
    }

    /// Pulls the green hold forward so the next controller tick turns red.
    fn force_red(engine: &mut RoundEngine) {
        let doll = engine.ids.doll;
        if let Some(state) = engine.store.get_mut(doll).and_then(|e| e.doll_mut()) {
            state.green_hold_until = Some(0);
        }
        engine.controller_tick();
        assert_eq!(engine.phase(), LightPhase::RedLight);
    }

    fn correct_index(engine: &RoundEngine) -> Option<usize> {
        engine.quiz().outstanding().map(|q| q.correct_index)
    }

    fn wrong_index(engine: &RoundEngine) -> Option<usize> {
        correct_index(engine).map(|idx| (idx + 1) % 4)
    }

    /// Advances `ms` of time in 50 ms frames with a controller tick every
    /// 1000 ms, answering correctly whenever a question is up.
    fn play(engine: &mut RoundEngine, ms: u64, answer: bool) {
        for _ in 0..ms / 50 {
            if answer {
                if let Some(idx) = correct_index(engine) {
                    engine.submit_answer(idx);
                }
            }
            engine.frame(50);
            if engine.state().now_ms % 1_000 == 0 {
                engine.controller_tick();
            }
        }
    }

    #[test]
    fn start_enters_green_and_runs_npcs() {
        let mut engine = started(
            RoundConfig {
                npc_count: 5,
                ..RoundConfig::default()
            },
            1,
        );
        assert!(engine.state().is_running());
        assert_eq!(engine.phase(), LightPhase::GreenLight);
        let hold = engine.doll().and_then(|d| d.green_hold_until).expect("hold set");
        assert!((1_000..=5_000).contains(&hold));
        for id in engine.ids().npcs.clone() {
            assert_eq!(
                engine.store().get(id).and_then(|e| e.actor_state()),
                Some(ActorState::Run)
            );
        }
        let snapshot = engine.build_snapshot(true);
        assert_eq!(
            snapshot.events.first(),
            Some(&SimEvent::PhaseChanged {
                phase: LightPhase::GreenLight
            })
        );
        assert!(engine.build_snapshot(true).events.is_empty());
    }

    #[test]
    fn frames_before_start_do_nothing() {
        let mut engine = RoundEngine::new(
            quiet_config(),
            QuestionBank::builtin(),
            3,
            RoundEngineOptions::default(),
        );
        engine.set_input(MoveInput::forward());
        engine.frame(50);
        engine.controller_tick();
        assert_eq!(engine.state().frame, 0);
        assert_eq!(engine.state().status, RoundStatus::Ready);
    }

    #[test]
    fn walking_moves_the_player_toward_the_doll() {
        let mut engine = started(quiet_config(), 2);
        engine.set_input(MoveInput::forward());
        for _ in 0..10 {
            engine.frame(50);
        }
        assert_eq!(engine.player_state(), Some(ActorState::Walk));
        // The start line sits beyond the walkable margin, so the first
        // frame clamps before walking nine more steps of 0.1.
        let z = engine.build_snapshot(false).player.position.z;
        let expected = engine.config.walkable_half_z() - 0.9;
        assert!((z - expected).abs() < 1e-3, "z={z}");
    }

    #[test]
    fn oversized_frames_are_clamped() {
        let mut engine = started(quiet_config(), 2);
        engine.set_input(MoveInput::forward());
        engine.frame(16);
        let before = engine.build_snapshot(false).player.position.z;
        engine.frame(1_000);
        let snapshot = engine.build_snapshot(false);
        assert_eq!(snapshot.now_ms, 1_016);
        assert!((before - snapshot.player.position.z - 0.1).abs() < 1e-4);
    }

    #[test]
    fn red_light_issues_a_question_and_freezes_the_player() {
        let mut engine = started(quiet_config(), 4);
        force_red(&mut engine);
        assert!(engine.quiz().is_outstanding());
        assert!(engine.is_answering());
        engine.set_input(MoveInput::forward());
        play(&mut engine, 2_000, false);
        assert_eq!(engine.player_state(), Some(ActorState::Idle));
        assert_eq!(engine.build_snapshot(false).player.position.z, 50.0);
    }

    #[test]
    fn idle_player_survives_red_light_and_sees_green_after_minimum() {
        let mut engine = started(quiet_config(), 5);
        force_red(&mut engine);
        let red_started = engine
            .doll()
            .and_then(|d| d.red_light_started_at)
            .expect("red start");
        let mut green_at = None;
        for _ in 0..(15_000 / 50) {
            if let Some(idx) = correct_index(&engine) {
                engine.submit_answer(idx);
            }
            engine.frame(50);
            if engine.state().now_ms % 1_000 == 0 {
                engine.controller_tick();
            }
            if engine.phase() == LightPhase::GreenLight {
                green_at = Some(engine.state().now_ms);
                break;
            }
        }
        let green_at = green_at.expect("light turns green once answered");
        assert!(green_at - red_started >= engine.config.red_light_min_ms);
        assert_eq!(engine.player_state(), Some(ActorState::Idle));
        assert!(engine.state().is_running());
        assert!(!engine.quiz().is_outstanding());
    }

    #[test]
    fn red_light_cannot_end_with_an_outstanding_question() {
        let mut engine = started(quiet_config(), 6);
        force_red(&mut engine);
        for _ in 0..30 {
            play(&mut engine, 1_000, false);
            assert_eq!(engine.phase(), LightPhase::RedLight);
            assert!(engine.quiz().is_outstanding());
        }
    }

    #[test]
    fn moving_during_red_light_is_caught_at_the_next_recheck() {
        let mut engine = started(quiet_config(), 7);
        force_red(&mut engine);
        let idx = correct_index(&engine).expect("question");
        engine.submit_answer(idx);
        assert!(!engine.is_answering());

        engine.set_input(MoveInput::forward());
        engine.frame(50);
        assert_eq!(engine.player_state(), Some(ActorState::Idle));
        for _ in 0..10 {
            engine.frame(50);
        }
        assert_eq!(engine.player_state(), Some(ActorState::Dead));
        assert_eq!(engine.outcome(), Some(RoundOutcome::Elimination));
        let events = engine.build_snapshot(true).events;
        assert!(events.contains(&SimEvent::RoundEnded {
            outcome: RoundOutcome::Elimination
        }));
        assert!(events.iter().any(|event| matches!(
            event,
            SimEvent::EnemyStateChanged {
                state: EnemyState::Shooting,
                ..
            }
        )));
    }

    #[test]
    fn walking_when_red_light_starts_is_fatal() {
        let mut engine = started(quiet_config(), 8);
        engine.set_input(MoveInput::forward());
        engine.frame(50);
        force_red(&mut engine);
        assert_eq!(engine.player_state(), Some(ActorState::Dead));
        assert_eq!(engine.outcome(), Some(RoundOutcome::Elimination));
    }

    #[test]
    fn wrong_answer_cap_eliminates_even_under_green_light() {
        let mut engine = started(quiet_config(), 9);
        assert_eq!(engine.phase(), LightPhase::GreenLight);
        for round in 1..=5 {
            engine.quiz.next_question(&mut engine.events);
            let idx = wrong_index(&engine).expect("question");
            let outcome = engine.submit_answer(idx);
            assert_eq!(outcome, AnswerOutcome::Wrong { eliminated: round == 5 });
            if round < 5 {
                assert_eq!(engine.player_state(), Some(ActorState::Idle));
            }
        }
        assert_eq!(engine.phase(), LightPhase::GreenLight);
        assert_eq!(engine.player_state(), Some(ActorState::Dead));
        assert_eq!(engine.outcome(), Some(RoundOutcome::Elimination));
        assert_eq!(engine.quiz().wrong_answers(), engine.quiz().max_wrong_answers());
    }

    #[test]
    fn all_correct_answers_then_finish_line_is_victory() {
        let mut engine = started(quiet_config(), 10);
        for answered in 1..=20 {
            engine.quiz.next_question(&mut engine.events);
            let idx = correct_index(&engine).expect("question");
            assert_eq!(engine.submit_answer(idx), AnswerOutcome::Correct);
            engine.frame(16);
            if answered < 20 {
                assert!(engine.state().is_running(), "ended after {answered}");
            }
        }
        assert_eq!(engine.quiz().correct_answers(), 20);
        assert_eq!(engine.player_state(), Some(ActorState::Dance));
        assert_eq!(engine.outcome(), Some(RoundOutcome::Victory));
        let summary = engine.build_summary();
        assert!(summary.player_distance_left <= engine.config.arena_margin + 1e-4);
    }

    #[test]
    fn finish_entry_without_eligibility_is_a_no_op() {
        let mut engine = started(quiet_config(), 11);
        let player = engine.ids.player;
        if let Some(entity) = engine.store.get_mut(player) {
            entity.position.z = -48.0;
        }
        for _ in 0..5 {
            engine.frame(16);
        }
        assert_eq!(engine.player_state(), Some(ActorState::Idle));
        assert!(engine.state().is_running());
    }

    #[test]
    fn timer_expiry_eliminates_everyone_in_one_tick() {
        let mut engine = started(
            RoundConfig {
                npc_count: 2,
                round_seconds: 3,
                ..RoundConfig::default()
            },
            12,
        );
        engine.controller_tick();
        engine.controller_tick();
        engine.build_snapshot(true);
        assert!(engine.state().is_running());

        engine.controller_tick();
        assert_eq!(engine.phase(), LightPhase::EliminateAll);
        assert_eq!(engine.outcome(), Some(RoundOutcome::Timeout));
        let deaths = engine
            .build_snapshot(true)
            .events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    SimEvent::ActorStateChanged {
                        state: ActorState::Dead,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(deaths, 3);
        for id in engine.ids().enemies.clone() {
            assert_eq!(
                engine.store().get(id).and_then(|e| e.enemy()).map(|e| e.state),
                Some(EnemyState::Shooting)
            );
        }
    }

    #[test]
    fn timer_outranks_an_outstanding_question() {
        let mut engine = started(
            RoundConfig {
                round_seconds: 3,
                ..quiet_config()
            },
            13,
        );
        force_red(&mut engine);
        assert!(engine.quiz().is_outstanding());
        engine.controller_tick();
        engine.controller_tick();
        assert_eq!(engine.phase(), LightPhase::EliminateAll);
        assert_eq!(engine.outcome(), Some(RoundOutcome::Timeout));
        assert!(!engine.quiz().is_outstanding());
    }

    #[test]
    fn answer_reveal_chains_questions_inside_red_light() {
        let mut engine = started(quiet_config(), 14);
        force_red(&mut engine);
        let first = engine.quiz().current_index();
        let idx = correct_index(&engine).expect("question");
        engine.submit_answer(idx);
        assert!(engine.quiz().reveal_pending());

        play(&mut engine, 1_450, false);
        assert!(!engine.quiz().is_outstanding());
        play(&mut engine, 100, false);
        assert!(engine.quiz().is_outstanding());
        assert_ne!(engine.quiz().current_index(), first);
    }

    #[test]
    fn teardown_freezes_the_round() {
        let mut engine = started(quiet_config(), 15);
        force_red(&mut engine);
        let idx = correct_index(&engine).expect("question");
        engine.submit_answer(idx);
        engine.teardown();

        let before = engine.build_snapshot(false);
        engine.set_input(MoveInput::forward());
        play(&mut engine, 5_000, true);
        assert_eq!(engine.submit_answer(0), AnswerOutcome::Ignored);
        let after = engine.build_snapshot(false);
        assert_eq!(after.frame, before.frame);
        assert_eq!(after.seconds_left, before.seconds_left);
        assert!(!engine.quiz().reveal_pending());
        assert!(!engine.quiz().is_outstanding());
        assert_eq!(engine.quiz().correct_answers(), 1);
    }

    #[test]
    fn enemies_return_to_idle_by_timer_or_signal() {
        let mut engine = started(quiet_config(), 16);
        force_red(&mut engine);
        let idx = wrong_index(&engine).expect("question");
        engine.submit_answer(idx);
        let enemies = engine.ids().enemies.clone();
        let enemy_state = |engine: &RoundEngine, id: EntityId| {
            engine.store().get(id).and_then(|e| e.enemy()).map(|e| e.state)
        };
        assert_eq!(enemy_state(&engine, enemies[0]), Some(EnemyState::Shooting));

        engine.apply_command(HostCommand::ShootFinished(enemies[0]));
        assert_eq!(enemy_state(&engine, enemies[0]), Some(EnemyState::Idle));
        assert_eq!(enemy_state(&engine, enemies[1]), Some(EnemyState::Shooting));

        play(&mut engine, 1_200, false);
        for id in &enemies {
            assert_eq!(enemy_state(&engine, *id), Some(EnemyState::Idle));
        }
    }

    #[test]
    fn enemies_follow_the_doll() {
        let mut engine = started(quiet_config(), 17);
        let doll = engine.ids.doll;
        if let Some(entity) = engine.store.get_mut(doll) {
            entity.position.x = 4.0;
        }
        engine.frame(16);
        for (id, offset) in engine.ids().enemies.iter().zip(&engine.config.enemy_offsets) {
            let position = engine.store().get(*id).map(|e| e.position).expect("enemy");
            assert_eq!(position.x, 4.0 + offset.x);
        }
    }

    fn actor_states(engine: &RoundEngine) -> Vec<(EntityId, ActorState)> {
        engine
            .store()
            .iter()
            .filter_map(|e| e.actor_state().map(|state| (e.id, state)))
            .collect()
    }

    #[test]
    fn red_light_entry_catches_running_npcs_and_freezes_everyone() {
        let mut engine = started(
            RoundConfig {
                npc_count: 5,
                ..RoundConfig::default()
            },
            18,
        );
        play(&mut engine, 250, false);
        let running: Vec<EntityId> = actor_states(&engine)
            .into_iter()
            .filter(|(_, state)| *state == ActorState::Run)
            .map(|(id, _)| id)
            .collect();
        assert_eq!(running.len(), 5);

        force_red(&mut engine);
        for (id, state) in actor_states(&engine) {
            assert!(!state.is_moving(), "actor {id} still {state:?}");
        }
        for id in &running {
            assert_eq!(
                engine.store().get(*id).and_then(|e| e.actor_state()),
                Some(ActorState::Dead)
            );
        }

        let before: Vec<Vec3> = engine.store().iter().map(|e| e.position).collect();
        engine.frame(50);
        let after: Vec<Vec3> = engine.store().iter().map(|e| e.position).collect();
        assert_eq!(before, after);
        assert_eq!(engine.build_summary().npcs_eliminated, 5);
        assert!(engine.state().is_running());
    }

    #[test]
    fn npcs_resume_after_their_reaction_latency_on_green() {
        let mut engine = started(
            RoundConfig {
                npc_count: 8,
                ..RoundConfig::default()
            },
            20,
        );
        // Park the crowd so it lives through the red light.
        engine.crowd.halt(&mut engine.store);
        let mut requests = TransitionRequests::new();
        for id in engine.ids.npcs.clone() {
            requests.request_actor(id, ActorState::Idle);
        }
        requests.apply(&mut engine.store, 0, &mut engine.events);

        force_red(&mut engine);
        let mut green = false;
        for _ in 0..(15_000 / 50) {
            if let Some(idx) = correct_index(&engine) {
                engine.submit_answer(idx);
            }
            engine.frame(50);
            if engine.state().now_ms % 1_000 == 0 {
                engine.controller_tick();
            }
            if engine.phase() == LightPhase::GreenLight {
                green = true;
                break;
            }
        }
        assert!(green);
        let green_at = engine.state().now_ms;
        let npc_actor = |engine: &RoundEngine, id: EntityId| {
            engine
                .store()
                .get(id)
                .and_then(|e| e.actor())
                .cloned()
                .expect("npc")
        };
        for id in engine.ids().npcs.clone() {
            let actor = npc_actor(&engine, id);
            if actor.reaction_ms == 0 {
                assert_eq!(actor.state, ActorState::Run);
            } else {
                assert_eq!(actor.state, ActorState::Idle);
                assert_eq!(actor.resume_at_ms, Some(green_at + actor.reaction_ms));
            }
        }

        let max_reaction = engine.config.npc_max_reaction_ms;
        for _ in 0..=(max_reaction / 50) {
            engine.frame(50);
            let now_ms = engine.state().now_ms;
            for id in engine.ids().npcs.clone() {
                let actor = npc_actor(&engine, id);
                let expected = if now_ms >= green_at + actor.reaction_ms {
                    ActorState::Run
                } else {
                    ActorState::Idle
                };
                assert_eq!(actor.state, expected, "npc {id} at {now_ms}ms");
            }
        }
        assert_eq!(engine.phase(), LightPhase::GreenLight);
    }

    #[test]
    fn held_input_under_red_light_only_registers_at_the_recheck() {
        let mut engine = started(quiet_config(), 21);
        force_red(&mut engine);
        let idx = correct_index(&engine).expect("question");
        engine.submit_answer(idx);
        engine.build_snapshot(true);

        engine.set_input(MoveInput::forward());
        for _ in 0..9 {
            engine.frame(50);
        }
        let player = engine.ids.player;
        let churn = engine
            .build_snapshot(true)
            .events
            .iter()
            .filter(|event| {
                matches!(event, SimEvent::ActorStateChanged { id, .. } if *id == player)
            })
            .count();
        assert_eq!(churn, 0);
        assert_eq!(engine.player_state(), Some(ActorState::Idle));

        engine.frame(50);
        assert_eq!(engine.player_state(), Some(ActorState::Dead));
        assert_eq!(engine.outcome(), Some(RoundOutcome::Elimination));
    }

    #[test]
    fn npcs_entering_the_finish_region_do_not_end_the_round() {
        let mut engine = started(
            RoundConfig {
                npc_count: 1,
                ..RoundConfig::default()
            },
            22,
        );
        let npc = engine.ids.npcs[0];
        if let Some(entity) = engine.store.get_mut(npc) {
            entity.position.z = -48.0;
        }
        engine.frame(16);
        assert!(engine.triggers.is_inside(engine.ids.finish, npc));
        assert_eq!(
            engine.store().get(npc).and_then(|e| e.actor_state()),
            Some(ActorState::Run)
        );
        assert!(engine.state().is_running());
    }

    #[test]
    fn equal_seeds_give_equal_rounds() {
        let run = |seed: u32| {
            let mut engine = started(
                RoundConfig {
                    npc_count: 20,
                    ..RoundConfig::default()
                },
                seed,
            );
            engine.set_input(MoveInput::forward());
            play(&mut engine, 2_000, true);
            engine.set_input(MoveInput::default());
            play(&mut engine, 20_000, true);
            serde_json::to_string(&engine.build_snapshot(true)).expect("snapshot serializes")
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn events_reach_the_presentation_sink_in_order() {
        let mut engine = started(quiet_config(), 19);
        force_red(&mut engine);
        let mut sink = RecordingSink::default();
        engine.dispatch_events(&mut sink);
        let phases: Vec<LightPhase> = sink
            .events
            .iter()
            .filter_map(|event| match event {
                SimEvent::PhaseChanged { phase } => Some(*phase),
                _ => None,
            })
            .collect();
        assert_eq!(phases, vec![LightPhase::GreenLight, LightPhase::RedLight]);
        assert!(sink
            .events
            .iter()
            .any(|event| matches!(event, SimEvent::QuestionChanged { question: Some(_) })));
        assert!(engine.build_snapshot(true).events.is_empty());
    }
}
