//! Real-time driver: one tokio task owns the engine and serializes the
//! frame clock, the 1 Hz controller clock and inbound host commands.

use std::time::Duration;

use log::{debug, info};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

use crate::constants::{CONTROLLER_TICK_MS, FRAME_MS};
use crate::engine::RoundEngine;
use crate::events::PresentationSink;
use crate::types::{HostCommand, RoundSummary};

#[derive(Clone, Copy, Debug)]
pub struct RuntimeOptions {
    pub frame_ms: u64,
    pub controller_ms: u64,
    pub command_buffer: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            frame_ms: FRAME_MS,
            controller_ms: CONTROLLER_TICK_MS,
            command_buffer: 64,
        }
    }
}

pub struct RoundHandle<S> {
    commands: mpsc::Sender<HostCommand>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<(RoundSummary, S)>,
}

impl<S> RoundHandle<S> {
    pub fn commands(&self) -> mpsc::Sender<HostCommand> {
        self.commands.clone()
    }

    /// Queues a command; false once the round task has finished.
    pub async fn send(&self, command: HostCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Tears the round down. Later commands are dropped.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the round to end and hands back its summary and the sink.
    pub async fn join(self) -> Result<(RoundSummary, S), JoinError> {
        let RoundHandle {
            commands,
            shutdown,
            task,
        } = self;
        let result = task.await;
        drop(shutdown);
        drop(commands);
        result
    }
}

/// Starts `engine` and drives it until the round ends or is shut down.
/// Dropping the handle without joining also tears the round down.
pub fn spawn_round<S>(mut engine: RoundEngine, options: RuntimeOptions, mut sink: S) -> RoundHandle<S>
where
    S: PresentationSink + Send + 'static,
{
    let (command_tx, mut command_rx) = mpsc::channel(options.command_buffer.max(1));
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        engine.start();
        engine.dispatch_events(&mut sink);

        let mut frames = interval(Duration::from_millis(options.frame_ms.max(1)));
        frames.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let controller_period = Duration::from_millis(options.controller_ms.max(1));
        let mut controller = interval_at(Instant::now() + controller_period, controller_period);
        controller.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_frame = Instant::now();

        loop {
            tokio::select! {
                _ = frames.tick() => {
                    let now = Instant::now();
                    let dt_ms = now.duration_since(last_frame).as_millis() as u64;
                    last_frame = now;
                    engine.frame(dt_ms);
                }
                _ = controller.tick() => engine.controller_tick(),
                Some(command) = command_rx.recv() => {
                    debug!("host command {command:?}");
                    engine.apply_command(command);
                }
                _ = &mut shutdown_rx => engine.teardown(),
            }
            engine.dispatch_events(&mut sink);
            if engine.is_ended() || engine.state().torn_down {
                break;
            }
        }

        let summary = engine.build_summary();
        info!(
            "round task finished: outcome={:?} after {}ms",
            summary.outcome, summary.duration_ms
        );
        (summary, sink)
    });

    RoundHandle {
        commands: command_tx,
        shutdown: Some(shutdown_tx),
        task,
    }
}
