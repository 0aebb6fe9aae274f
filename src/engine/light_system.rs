use super::*;

impl RoundEngine {
    /// One 1 Hz controller step: round timer first, then the light cycle.
    pub fn controller_tick(&mut self) {
        if !self.state.is_running() {
            return;
        }
        self.state.controller_ticks += 1;
        let now_ms = self.state.now_ms;
        let Some(doll) = self.doll().cloned() else {
            return;
        };
        match self
            .controller
            .tick(&doll, now_ms, self.quiz.is_outstanding())
        {
            PhaseDecision::Hold => {}
            PhaseDecision::Expire | PhaseDecision::Switch(LightPhase::EliminateAll) => {
                self.eliminate_all(now_ms)
            }
            PhaseDecision::Switch(LightPhase::RedLight) => self.enter_red_light(now_ms),
            PhaseDecision::Switch(LightPhase::GreenLight) => {
                self.enter_green_light(now_ms, false)
            }
        }
    }

    /// `initial` is the round start, where every NPC sets off at once.
    pub(super) fn enter_green_light(&mut self, now_ms: u64, initial: bool) {
        let mut requests = TransitionRequests::new();
        requests.request_phase(self.ids.doll, LightPhase::GreenLight);
        requests.apply(&mut self.store, now_ms, &mut self.events);

        let hold_until = self.controller.green_hold_until(now_ms, &mut self.rng);
        if let Some(doll) = self.store.get_mut(self.ids.doll).and_then(|e| e.doll_mut()) {
            doll.green_hold_until = Some(hold_until);
        }
        self.quiz.clear_outstanding(&mut self.events);
        self.state.recheck.reset();

        let mut requests = TransitionRequests::new();
        if initial {
            self.crowd.activate(&mut self.store, &mut requests);
        } else {
            self.crowd.schedule_resume(&mut self.store, now_ms, &mut requests);
        }
        requests.apply(&mut self.store, now_ms, &mut self.events);
        debug!("green light at {now_ms}ms, holding until {hold_until}ms");
    }

    fn enter_red_light(&mut self, now_ms: u64) {
        let mut requests = TransitionRequests::new();
        requests.request_phase(self.ids.doll, LightPhase::RedLight);
        requests.apply(&mut self.store, now_ms, &mut self.events);
        self.controller.note_red_light();

        if !self.quiz.is_outstanding() {
            self.quiz.next_question(&mut self.events);
        }

        self.crowd.halt(&mut self.store);
        let caught = self.eliminate_moving(now_ms);
        self.state.recheck.mark(now_ms);
        debug!(
            "red light #{} at {now_ms}ms, {caught} caught moving",
            self.controller.red_lights()
        );
        self.check_round_end(now_ms);
    }

    /// Round timer expiry: every non-terminal actor dies in this tick.
    fn eliminate_all(&mut self, now_ms: u64) {
        let mut requests = TransitionRequests::new();
        requests.request_phase(self.ids.doll, LightPhase::EliminateAll);
        for id in self.store.ids_where(|entity| {
            entity
                .actor_state()
                .map(|state| !state.is_terminal())
                .unwrap_or(false)
        }) {
            requests.request_actor(id, ActorState::Dead);
        }
        let eliminated = requests.apply(&mut self.store, now_ms, &mut self.events);
        self.enemies_shoot(now_ms);
        self.quiz.clear_outstanding(&mut self.events);
        info!(
            "round timer expired, {} actor(s) eliminated",
            eliminated.len()
        );
        self.end_round(RoundOutcome::Timeout, now_ms);
    }

    /// Kills actors caught in Walk or Run and returns how many were caught.
    pub(super) fn eliminate_moving(&mut self, now_ms: u64) -> usize {
        let caught = moving_actors(&self.store);
        if caught.is_empty() {
            return 0;
        }
        self.enemies_shoot(now_ms);
        let mut requests = TransitionRequests::new();
        for id in &caught {
            requests.request_actor(*id, ActorState::Dead);
        }
        requests.apply(&mut self.store, now_ms, &mut self.events);
        caught.len()
    }

    pub(super) fn enemies_shoot(&mut self, now_ms: u64) {
        for id in self.ids.enemies.clone() {
            if let Err(err) = change_enemy_state(
                &mut self.store,
                id,
                EnemyState::Shooting,
                now_ms,
                self.config.enemy_shoot_ms,
                &mut self.events,
            ) {
                debug!("enemy volley skipped: {err}");
            }
        }
    }

    /// Enemies whose volley has run its course go back to Idle.
    pub(super) fn release_enemies(&mut self, now_ms: u64) {
        let finished: Vec<EntityId> = self
            .ids
            .enemies
            .iter()
            .copied()
            .filter(|id| {
                self.store
                    .get(*id)
                    .and_then(|e| e.enemy())
                    .and_then(|enemy| enemy.shooting_until)
                    .map(|until| now_ms >= until)
                    .unwrap_or(false)
            })
            .collect();
        for id in finished {
            self.return_enemy_to_idle(id, now_ms);
        }
    }

    pub(super) fn return_enemy_to_idle(&mut self, id: EntityId, now_ms: u64) {
        if let Err(err) = change_enemy_state(
            &mut self.store,
            id,
            EnemyState::Idle,
            now_ms,
            self.config.enemy_shoot_ms,
            &mut self.events,
        ) {
            debug!("ignored shoot-finished for {id}: {err}");
        }
    }

    /// A reveal that comes due inside the red light's minimum window chains
    /// the next question; otherwise it lapses.
    pub(super) fn process_due_reveal(&mut self, now_ms: u64) {
        if !self.quiz.take_due_reveal(now_ms) {
            return;
        }
        let chain = self
            .doll()
            .map(|doll| {
                doll.phase == LightPhase::RedLight
                    && !self.controller.red_light_min_elapsed(doll, now_ms)
            })
            .unwrap_or(false);
        if chain && !self.quiz.is_outstanding() {
            self.quiz.next_question(&mut self.events);
        }
    }
}
