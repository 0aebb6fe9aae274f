use chrono::{SecondsFormat, Utc};
use clap::{Parser, ValueEnum};
use log::{error, Level};
use redlight_sim::config::RoundConfig;
use redlight_sim::constants::CONTROLLER_TICK_MS;
use redlight_sim::engine::{RoundEngine, RoundEngineOptions};
use redlight_sim::error::ConfigError;
use redlight_sim::events::PresentationSink;
use redlight_sim::logging;
use redlight_sim::questions::QuestionBank;
use redlight_sim::rng::Rng;
use redlight_sim::runtime::{spawn_round, RuntimeOptions};
use redlight_sim::types::{
    ActorState, HostCommand, LightPhase, MoveInput, Question, RoundOutcome, RoundSummary,
    SimEvent, Snapshot,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

const SIM_FRAME_MS: u64 = 50;
const ANSWER_DELAY_MS: u64 = 400;
const STOP_MARGIN_MS: u64 = 1_000;
const MAX_NPCS: usize = 500;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 1)]
    rounds: usize,
    #[arg(long)]
    npcs: Option<usize>,
    #[arg(long, value_enum, default_value_t = Strategy::Walker)]
    strategy: Strategy,
    #[arg(long, default_value_t = 0.9)]
    accuracy: f32,
    #[arg(long)]
    questions: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
    #[arg(long)]
    realtime: bool,
    #[arg(long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
enum Strategy {
    /// Never moves, only answers.
    Statue,
    /// Walks under green light and stops a second before the hold runs out.
    Walker,
    /// Walks forward no matter what.
    Reckless,
}

impl Strategy {
    fn key(self) -> &'static str {
        match self {
            Self::Statue => "statue",
            Self::Walker => "walker",
            Self::Reckless => "reckless",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    seed: u32,
    strategy: Strategy,
    accuracy: f32,
}

#[derive(Clone, Debug, Serialize)]
struct RoundResultLine {
    scenario: String,
    seed: u32,
    strategy: Strategy,
    outcome: Option<RoundOutcome>,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    #[serde(rename = "correctAnswers")]
    correct_answers: u32,
    #[serde(rename = "wrongAnswers")]
    wrong_answers: u32,
    #[serde(rename = "questionsIssued")]
    questions_issued: u32,
    #[serde(rename = "redLights")]
    red_lights: u32,
    #[serde(rename = "npcsSurvived")]
    npcs_survived: usize,
    #[serde(rename = "npcsEliminated")]
    npcs_eliminated: usize,
    #[serde(rename = "playerDistanceLeft")]
    player_distance_left: f32,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    frame: u64,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct RoundRunResult {
    #[serde(flatten)]
    result: RoundResultLine,
    #[serde(rename = "anomalyRecords")]
    anomaly_records: Vec<AnomalyRecord>,
    finished_frame: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAt")]
    started_at: String,
    #[serde(rename = "finishedAt")]
    finished_at: String,
    #[serde(rename = "roundCount")]
    round_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageDurationMs")]
    average_duration_ms: u64,
    #[serde(rename = "outcomeCounts")]
    outcome_counts: BTreeMap<String, usize>,
    rounds: Vec<RoundResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    timestamp: String,
    level: String,
    event: String,
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame: Option<u64>,
    details: Value,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match load_config(cli.config.as_deref(), cli.npcs) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            std::process::exit(2);
        }
    };
    let questions = QuestionBank::resolve(cli.questions.as_deref());
    let scenarios = resolve_scenarios(&cli);
    let started_at = now_iso();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed_hint, Utc::now().timestamp_millis()));
    let mut has_anomaly = false;
    let mut round_results = Vec::new();
    let mut outcome_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_duration_ms = 0u64;
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        emit_log(
            Level::Info,
            "round_started",
            &match_id,
            Some(&scenario.name),
            Some(scenario.seed),
            None,
            json!({
                "strategy": scenario.strategy,
                "accuracy": scenario.accuracy,
                "npcs": config.npc_count,
                "questions": questions.len(),
                "fallbackQuestions": questions.is_fallback(),
                "realtime": cli.realtime,
            }),
        );
        let round_run = if cli.realtime {
            run_round_realtime(&scenario, &config, &questions)
        } else {
            run_round(&scenario, &config, &questions)
        };

        for anomaly in &round_run.anomaly_records {
            emit_log(
                Level::Warn,
                "anomaly_detected",
                &match_id,
                Some(&scenario.name),
                Some(scenario.seed),
                Some(anomaly.frame),
                json!({
                    "message": anomaly.message,
                }),
            );
        }

        if !round_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += round_run.anomaly_records.len();
        total_duration_ms += round_run.result.duration_ms;
        *outcome_counts
            .entry(outcome_key(round_run.result.outcome))
            .or_insert(0) += 1;

        emit_log(
            Level::Info,
            "round_finished",
            &match_id,
            Some(&scenario.name),
            Some(scenario.seed),
            Some(round_run.finished_frame),
            json!({
                "outcome": round_run.result.outcome,
                "durationMs": round_run.result.duration_ms,
                "correctAnswers": round_run.result.correct_answers,
                "npcsSurvived": round_run.result.npcs_survived,
                "anomalyCount": round_run.anomaly_records.len(),
            }),
        );

        match serde_json::to_string(&round_run.result) {
            Ok(line) => println!("{line}"),
            Err(err) => error!("round result did not serialize: {err}"),
        }
        round_results.push(round_run.result);
    }

    let summary = build_run_summary(
        match_id.clone(),
        started_at,
        now_iso(),
        round_results,
        outcome_counts,
        total_anomalies,
        total_duration_ms,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(err) = write_summary(path, &summary) {
            emit_log(
                Level::Error,
                "summary_write_failed",
                &match_id,
                None,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": err.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        Level::Info,
        "run_finished",
        &match_id,
        None,
        None,
        None,
        json!({
            "roundCount": summary.round_count,
            "anomalyCount": summary.anomaly_count,
            "averageDurationMs": summary.average_duration_ms,
            "outcomeCounts": summary.outcome_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

/// Scripted player for headless rounds.
struct Autopilot {
    strategy: Strategy,
    accuracy: f32,
    rng: Rng,
    question_seen_at: Option<u64>,
}

impl Autopilot {
    fn new(strategy: Strategy, accuracy: f32, seed: u32) -> Self {
        Self {
            strategy,
            accuracy: accuracy.clamp(0.0, 1.0),
            rng: Rng::new(seed ^ 0x5bd1_e995),
            question_seen_at: None,
        }
    }

    fn choose_answer(&mut self, question: &Question) -> usize {
        if self.rng.chance(self.accuracy) {
            question.correct_index
        } else {
            (question.correct_index + 1) % question.options.len().max(1)
        }
    }

    fn movement(&self, engine: &RoundEngine) -> MoveInput {
        match self.strategy {
            Strategy::Statue => MoveInput::default(),
            Strategy::Reckless => MoveInput::forward(),
            Strategy::Walker => {
                let now_ms = engine.state().now_ms;
                let safe = engine
                    .doll()
                    .filter(|doll| doll.phase == LightPhase::GreenLight)
                    .and_then(|doll| doll.green_hold_until)
                    .map(|until| now_ms.saturating_add(STOP_MARGIN_MS) < until)
                    .unwrap_or(false);
                if safe {
                    MoveInput::forward()
                } else {
                    MoveInput::default()
                }
            }
        }
    }

    /// Sets movement for the coming frame and answers a question once it
    /// has been up for `ANSWER_DELAY_MS`.
    fn drive(&mut self, engine: &mut RoundEngine) {
        let input = self.movement(engine);
        engine.set_input(input);
        let now_ms = engine.state().now_ms;
        let Some(question) = engine.quiz().outstanding().cloned() else {
            self.question_seen_at = None;
            return;
        };
        let seen_at = *self.question_seen_at.get_or_insert(now_ms);
        if now_ms.saturating_sub(seen_at) >= ANSWER_DELAY_MS {
            let choice = self.choose_answer(&question);
            engine.submit_answer(choice);
            self.question_seen_at = None;
        }
    }
}

fn run_round(scenario: &Scenario, config: &RoundConfig, questions: &QuestionBank) -> RoundRunResult {
    let mut engine = RoundEngine::new(
        config.clone(),
        questions.clone(),
        scenario.seed,
        RoundEngineOptions::default(),
    );
    let mut autopilot = Autopilot::new(scenario.strategy, scenario.accuracy, scenario.seed);
    engine.start();

    let mut questions_issued = 0u32;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut last_frame = 0u64;
    let frame_limit = (u64::from(engine.config.round_seconds) + 5) * 1_000 / SIM_FRAME_MS;

    while !engine.is_ended() {
        autopilot.drive(&mut engine);
        engine.frame(SIM_FRAME_MS);
        if engine.state().now_ms % CONTROLLER_TICK_MS == 0 {
            engine.controller_tick();
        }
        let snapshot = engine.build_snapshot(true);
        last_frame = snapshot.frame;
        for message in collect_snapshot_anomalies(&snapshot, &engine.config) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.frame,
                message,
            );
        }
        questions_issued += snapshot
            .events
            .iter()
            .filter(|event| matches!(event, SimEvent::QuestionChanged { question: Some(_) }))
            .count() as u32;

        if snapshot.frame > frame_limit {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.frame,
                "frame safety limit exceeded".to_string(),
            );
            break;
        }
    }

    let summary = engine.build_summary();
    for message in collect_summary_anomalies(&summary, &engine.config) {
        push_anomaly(
            &mut anomalies,
            &mut anomaly_records,
            &mut anomaly_seen,
            last_frame,
            message,
        );
    }
    RoundRunResult {
        result: result_line(scenario, &summary, questions_issued, anomalies),
        anomaly_records,
        finished_frame: last_frame,
    }
}

/// Event-driven autopilot for real-time rounds. It never sees the green
/// light deadline, so only the reckless strategy walks.
struct AutopilotSink {
    autopilot: Autopilot,
    commands: mpsc::Sender<HostCommand>,
    questions_issued: u32,
}

impl AutopilotSink {
    fn send(&self, command: HostCommand) {
        if self.commands.try_send(command).is_err() {
            log::debug!("autopilot command dropped: {command:?}");
        }
    }
}

impl PresentationSink for AutopilotSink {
    fn on_phase_changed(&mut self, phase: LightPhase) {
        if self.autopilot.strategy == Strategy::Reckless && phase == LightPhase::GreenLight {
            self.send(HostCommand::Move(MoveInput::forward()));
        }
    }

    fn on_question_changed(&mut self, question: Option<&Question>) {
        if let Some(question) = question {
            self.questions_issued += 1;
            let choice = self.autopilot.choose_answer(question);
            self.send(HostCommand::SelectAnswer(choice));
        }
    }
}

fn run_round_realtime(
    scenario: &Scenario,
    config: &RoundConfig,
    questions: &QuestionBank,
) -> RoundRunResult {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => return failed_round(scenario, format!("tokio runtime failed: {err}")),
    };
    let engine = RoundEngine::new(
        config.clone(),
        questions.clone(),
        scenario.seed,
        RoundEngineOptions::default(),
    );
    let round_config = engine.config.clone();

    let joined = runtime.block_on(async move {
        let (relay_tx, mut relay_rx) = mpsc::channel::<HostCommand>(16);
        let sink = AutopilotSink {
            autopilot: Autopilot::new(scenario.strategy, scenario.accuracy, scenario.seed),
            commands: relay_tx,
            questions_issued: 0,
        };
        let handle = spawn_round(engine, RuntimeOptions::default(), sink);
        let commands = handle.commands();
        tokio::spawn(async move {
            while let Some(command) = relay_rx.recv().await {
                if commands.send(command).await.is_err() {
                    break;
                }
            }
        });
        handle.join().await
    });

    match joined {
        Ok((summary, sink)) => {
            let mut anomalies = Vec::new();
            let mut anomaly_records = Vec::new();
            let mut anomaly_seen = HashSet::new();
            for message in collect_summary_anomalies(&summary, &round_config) {
                push_anomaly(&mut anomalies, &mut anomaly_records, &mut anomaly_seen, 0, message);
            }
            RoundRunResult {
                result: result_line(scenario, &summary, sink.questions_issued, anomalies),
                anomaly_records,
                finished_frame: 0,
            }
        }
        Err(err) => failed_round(scenario, format!("round task failed: {err}")),
    }
}

fn failed_round(scenario: &Scenario, message: String) -> RoundRunResult {
    let summary = RoundSummary {
        outcome: None,
        duration_ms: 0,
        correct_answers: 0,
        wrong_answers: 0,
        red_lights: 0,
        npcs_survived: 0,
        npcs_eliminated: 0,
        player_distance_left: 0.0,
    };
    RoundRunResult {
        result: result_line(scenario, &summary, 0, vec![message.clone()]),
        anomaly_records: vec![AnomalyRecord { frame: 0, message }],
        finished_frame: 0,
    }
}

fn result_line(
    scenario: &Scenario,
    summary: &RoundSummary,
    questions_issued: u32,
    anomalies: Vec<String>,
) -> RoundResultLine {
    RoundResultLine {
        scenario: scenario.name.clone(),
        seed: scenario.seed,
        strategy: scenario.strategy,
        outcome: summary.outcome,
        duration_ms: summary.duration_ms,
        correct_answers: summary.correct_answers,
        wrong_answers: summary.wrong_answers,
        questions_issued,
        red_lights: summary.red_lights,
        npcs_survived: summary.npcs_survived,
        npcs_eliminated: summary.npcs_eliminated,
        player_distance_left: (summary.player_distance_left * 10.0).round() / 10.0,
        anomalies,
    }
}

fn collect_snapshot_anomalies(snapshot: &Snapshot, config: &RoundConfig) -> Vec<String> {
    let mut anomalies = Vec::new();
    let quiz = &snapshot.quiz;
    if quiz.wrong > quiz.max_wrong && snapshot.player.state != ActorState::Dead {
        anomalies.push(format!(
            "wrong answers over cap while alive: {}/{}",
            quiz.wrong, quiz.max_wrong
        ));
    }
    if quiz.correct > quiz.total {
        anomalies.push(format!(
            "correct answers over total: {}/{}",
            quiz.correct, quiz.total
        ));
    }
    if snapshot.phase == LightPhase::GreenLight && quiz.outstanding.is_some() {
        anomalies.push("question outstanding under green light".to_string());
    }

    let position = snapshot.player.position;
    if !position.is_finite()
        || position.x.abs() > config.walkable_half_x() + 1e-3
        || position.z.abs() > config.arena_half_z + 1e-3
    {
        anomalies.push(format!("player left the arena: {position}"));
    }
    if snapshot.npcs_alive + snapshot.npcs_dead != config.npc_count {
        anomalies.push(format!(
            "npc census mismatch: {} alive + {} dead != {}",
            snapshot.npcs_alive, snapshot.npcs_dead, config.npc_count
        ));
    }
    if snapshot.seconds_left > config.round_seconds {
        anomalies.push(format!("round timer above start: {}", snapshot.seconds_left));
    }
    anomalies
}

fn collect_summary_anomalies(summary: &RoundSummary, config: &RoundConfig) -> Vec<String> {
    let mut anomalies = Vec::new();
    if summary.outcome.is_none() {
        anomalies.push("round did not finish".to_string());
    }
    if summary.outcome == Some(RoundOutcome::Victory) && summary.correct_answers < config.total_questions {
        anomalies.push(format!(
            "victory with {}/{} correct answers",
            summary.correct_answers, config.total_questions
        ));
    }
    let round_ms = u64::from(config.round_seconds) * CONTROLLER_TICK_MS;
    if summary.duration_ms > round_ms + CONTROLLER_TICK_MS {
        anomalies.push(format!("round overran its timer: {}ms", summary.duration_ms));
    }
    anomalies
}

fn load_config(path: Option<&Path>, npcs: Option<usize>) -> Result<RoundConfig, ConfigError> {
    let mut config = match path {
        Some(path) => RoundConfig::load(path)?,
        None => RoundConfig::default(),
    };
    if let Some(npcs) = npcs {
        config.npc_count = npcs.min(MAX_NPCS);
    }
    Ok(config)
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = cli.seed.map(normalize_seed).unwrap_or_else(rand::random::<u32>);
    let rounds = cli.rounds.clamp(1, 1_000);
    (0..rounds)
        .map(|idx| Scenario {
            name: format!("{}-r{}", cli.strategy.key(), idx + 1),
            seed: seed.wrapping_add(idx as u32),
            strategy: cli.strategy,
            accuracy: cli.accuracy.clamp(0.0, 1.0),
        })
        .collect()
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    frame: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        frame,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u32, timestamp_ms: i64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at: String,
    finished_at: String,
    rounds: Vec<RoundResultLine>,
    outcome_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
    total_duration_ms: u64,
) -> RunSummary {
    let round_count = rounds.len();
    let average_duration_ms = if round_count == 0 {
        0
    } else {
        total_duration_ms / round_count as u64
    };
    RunSummary {
        match_id,
        started_at,
        finished_at,
        round_count,
        anomaly_count,
        average_duration_ms,
        outcome_counts,
        rounds,
    }
}

fn emit_log(
    level: Level,
    event: &str,
    match_id: &str,
    scenario: Option<&str>,
    seed: Option<u32>,
    frame: Option<u64>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp: now_iso(),
        level: level.as_str().to_ascii_lowercase(),
        event: event.to_string(),
        match_id: match_id.to_string(),
        scenario: scenario.map(|value| value.to_string()),
        seed,
        frame,
        details,
    };
    match serde_json::to_string(&log_line) {
        Ok(line) => log::log!(level, "{line}"),
        Err(err) => error!("structured log for {event} did not serialize: {err}"),
    }
}

fn outcome_key(outcome: Option<RoundOutcome>) -> String {
    match outcome {
        Some(RoundOutcome::Victory) => "victory",
        Some(RoundOutcome::Elimination) => "elimination",
        Some(RoundOutcome::Timeout) => "timeout",
        None => "unfinished",
    }
    .to_string()
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scenario(strategy: Strategy, accuracy: f32) -> Scenario {
        Scenario {
            name: "test".to_string(),
            seed: 42,
            strategy,
            accuracy,
        }
    }

    fn small_config() -> RoundConfig {
        RoundConfig {
            npc_count: 10,
            ..RoundConfig::default()
        }
    }

    fn make_result_line(outcome: Option<RoundOutcome>, duration_ms: u64) -> RoundResultLine {
        RoundResultLine {
            scenario: "test".to_string(),
            seed: 42,
            strategy: Strategy::Statue,
            outcome,
            duration_ms,
            correct_answers: 0,
            wrong_answers: 0,
            questions_issued: 0,
            red_lights: 0,
            npcs_survived: 0,
            npcs_eliminated: 0,
            player_distance_left: 100.0,
            anomalies: Vec::new(),
        }
    }

    #[test]
    fn default_match_id_contains_seed_and_timestamp() {
        assert_eq!(default_match_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn build_run_summary_calculates_average_duration() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            "2026-01-01T00:00:00.000Z".to_string(),
            "2026-01-01T00:02:00.000Z".to_string(),
            vec![
                make_result_line(Some(RoundOutcome::Timeout), 60_000),
                make_result_line(Some(RoundOutcome::Elimination), 20_000),
            ],
            BTreeMap::from([
                ("timeout".to_string(), 1usize),
                ("elimination".to_string(), 1usize),
            ]),
            0,
            80_000,
        );
        assert_eq!(summary.average_duration_ms, 40_000);
        assert_eq!(summary.round_count, 2);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let target = std::env::temp_dir()
            .join(format!("redlight-missing-{now}"))
            .join("summary.json");
        let summary = build_run_summary(
            "sim-1-1".to_string(),
            now_iso(),
            now_iso(),
            vec![make_result_line(Some(RoundOutcome::Timeout), 60_000)],
            BTreeMap::from([("timeout".to_string(), 1usize)]),
            0,
            60_000,
        );
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(&mut anomalies, &mut records, &mut seen, 10, "same".to_string());
        push_anomaly(&mut anomalies, &mut records, &mut seen, 11, "same".to_string());
        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].frame, 11);
    }

    #[test]
    fn statue_with_perfect_answers_is_never_eliminated() {
        let run = run_round(
            &scenario(Strategy::Statue, 1.0),
            &small_config(),
            &QuestionBank::builtin(),
        );
        assert!(run.result.anomalies.is_empty(), "{:?}", run.result.anomalies);
        assert!(matches!(
            run.result.outcome,
            Some(RoundOutcome::Timeout) | Some(RoundOutcome::Victory)
        ));
        assert_eq!(run.result.wrong_answers, 0);
        assert!(run.result.questions_issued > 0);
    }

    #[test]
    fn reckless_player_is_caught_by_the_first_red_light() {
        let run = run_round(
            &scenario(Strategy::Reckless, 1.0),
            &small_config(),
            &QuestionBank::builtin(),
        );
        assert_eq!(run.result.outcome, Some(RoundOutcome::Elimination));
        assert_eq!(run.result.red_lights, 1);
        assert!(run.result.anomalies.is_empty());
    }

    #[test]
    fn walker_stops_before_the_light_turns() {
        for seed in 0..5 {
            let walker = run_round(
                &Scenario {
                    seed,
                    ..scenario(Strategy::Walker, 1.0)
                },
                &small_config(),
                &QuestionBank::builtin(),
            );
            let statue = run_round(
                &Scenario {
                    seed,
                    ..scenario(Strategy::Statue, 1.0)
                },
                &small_config(),
                &QuestionBank::builtin(),
            );
            assert_ne!(walker.result.outcome, Some(RoundOutcome::Elimination), "seed {seed}");
            assert!(walker.result.player_distance_left <= statue.result.player_distance_left);
        }
    }

    #[test]
    fn equal_seeds_replay_identically() {
        let first = run_round(
            &scenario(Strategy::Walker, 0.7),
            &small_config(),
            &QuestionBank::builtin(),
        );
        let second = run_round(
            &scenario(Strategy::Walker, 0.7),
            &small_config(),
            &QuestionBank::builtin(),
        );
        assert_eq!(
            serde_json::to_string(&first).ok(),
            serde_json::to_string(&second).ok()
        );
    }

    #[test]
    fn snapshot_anomalies_flag_broken_counters() {
        let mut engine = RoundEngine::new(
            small_config(),
            QuestionBank::builtin(),
            1,
            RoundEngineOptions::default(),
        );
        engine.start();
        let mut snapshot = engine.build_snapshot(false);
        assert!(collect_snapshot_anomalies(&snapshot, &engine.config).is_empty());
        snapshot.quiz.correct = snapshot.quiz.total + 1;
        snapshot.npcs_dead += 1;
        assert_eq!(collect_snapshot_anomalies(&snapshot, &engine.config).len(), 2);
    }

    #[test]
    fn npcs_flag_overrides_config() {
        let config = load_config(None, Some(10_000)).expect("default config");
        assert_eq!(config.npc_count, MAX_NPCS);
    }
}
