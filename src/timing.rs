//! Light-cycle timing controller, ticked once per wall-clock second.

use crate::config::RoundConfig;
use crate::entity_store::Doll;
use crate::rng::Rng;
use crate::types::LightPhase;

/// Supplies the length of the "hold" audio cue in milliseconds.
pub trait CueDurationProvider: Send {
    fn hold_cue_ms(&self) -> Option<u64>;
}

impl<F> CueDurationProvider for F
where
    F: Fn() -> Option<u64> + Send,
{
    fn hold_cue_ms(&self) -> Option<u64> {
        self()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseDecision {
    Hold,
    Switch(LightPhase),
    /// The round timer ran out; overrides any light change.
    Expire,
}

pub struct LightCycleController {
    seconds_left: u32,
    red_light_min_ms: u64,
    green_hold_min_ms: u64,
    green_hold_max_ms: u64,
    cue: Option<Box<dyn CueDurationProvider>>,
    red_lights: u32,
    stopped: bool,
}

impl LightCycleController {
    pub fn new(config: &RoundConfig, cue: Option<Box<dyn CueDurationProvider>>) -> Self {
        Self {
            seconds_left: config.round_seconds,
            red_light_min_ms: config.red_light_min_ms,
            green_hold_min_ms: config.green_hold_min_ms,
            green_hold_max_ms: config.green_hold_max_ms,
            cue,
            red_lights: 0,
            stopped: false,
        }
    }

    pub fn seconds_left(&self) -> u32 {
        self.seconds_left
    }

    pub fn red_lights(&self) -> u32 {
        self.red_lights
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Clears the interval; later ticks always hold.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Counts the round timer down one second and decides the doll's phase.
    pub fn tick(&mut self, doll: &Doll, now_ms: u64, question_outstanding: bool) -> PhaseDecision {
        if self.stopped || doll.phase == LightPhase::EliminateAll {
            return PhaseDecision::Hold;
        }
        self.seconds_left = self.seconds_left.saturating_sub(1);
        if self.seconds_left == 0 {
            return PhaseDecision::Expire;
        }
        self.decide(doll, now_ms, question_outstanding)
    }

    pub fn decide(&self, doll: &Doll, now_ms: u64, question_outstanding: bool) -> PhaseDecision {
        match doll.phase {
            LightPhase::GreenLight => {
                let hold_until = doll.green_hold_until.unwrap_or(0);
                if now_ms >= hold_until {
                    PhaseDecision::Switch(LightPhase::RedLight)
                } else {
                    PhaseDecision::Hold
                }
            }
            LightPhase::RedLight => {
                if self.red_light_min_elapsed(doll, now_ms) && !question_outstanding {
                    PhaseDecision::Switch(LightPhase::GreenLight)
                } else {
                    PhaseDecision::Hold
                }
            }
            LightPhase::EliminateAll => PhaseDecision::Hold,
        }
    }

    pub fn red_light_min_elapsed(&self, doll: &Doll, now_ms: u64) -> bool {
        doll.red_light_started_at
            .map(|started| now_ms.saturating_sub(started) >= self.red_light_min_ms)
            .unwrap_or(false)
    }

    /// Deadline for the green light being entered at `now_ms`.
    pub fn green_hold_until(&self, now_ms: u64, rng: &mut Rng) -> u64 {
        let cue_ms = self
            .cue
            .as_ref()
            .and_then(|cue| cue.hold_cue_ms())
            .unwrap_or(0);
        let random_ms = rng.range_ms(self.green_hold_min_ms, self.green_hold_max_ms);
        now_ms.saturating_add(cue_ms).saturating_add(random_ms)
    }

    pub fn note_red_light(&mut self) {
        self.red_lights = self.red_lights.saturating_add(1);
    }
}
