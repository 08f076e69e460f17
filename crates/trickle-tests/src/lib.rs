//! Shared fixtures for the trickle integration tests and benches.
//!
//! Two things live here: builders for binary Netpbm files, and [`replay`],
//! which drives a decode task through a fixed script on a
//! [`ManualScheduler`] so every interleaving is reproducible.

use std::fmt::Write as _;
use std::sync::Arc;

use trickle_decoder::{DecoderFactory, Image};
use trickle_task::{
    Artifact, IncrementalDecodeTask, ManualScheduler, SchedulerEvent, TaskConfig, TaskMessage,
    TaskState, TaskStats, UpstreamSignal,
};
use trickle_types::{DecodeEvent, Outcome, RequestDescriptor, UpstreamError};

// ── Netpbm fixtures ───────────────────────────────────────────────────────────

/// Binary PGM with a deterministic gradient raster.
pub fn graymap(width: u32, height: u32) -> Vec<u8> {
    netpbm(b"P5", width, height, 255, &gradient(width * height))
}

/// Binary PPM with a deterministic gradient raster.
pub fn pixmap(width: u32, height: u32) -> Vec<u8> {
    netpbm(b"P6", width, height, 255, &gradient(width * height * 3))
}

/// Assemble a file from its parts. `raster` is written verbatim.
pub fn netpbm(magic: &[u8; 2], width: u32, height: u32, maxval: u8, raster: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raster.len() + 16);
    out.extend_from_slice(magic);
    out.extend_from_slice(format!(" {width} {height} {maxval}\n").as_bytes());
    out.extend_from_slice(raster);
    out
}

#[allow(clippy::cast_possible_truncation)]
fn gradient(len: u32) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

/// `width x height x channels  rows decoded/height`.
pub fn describe_image(image: &Image) -> String {
    format!(
        "{}x{}x{} rows {}/{}",
        image.width, image.height, image.channels, image.rows_decoded, image.height
    )
}

// ── Scripted replay ───────────────────────────────────────────────────────────

/// One step of a [`replay`] script.
#[derive(Debug)]
pub enum Step {
    /// Deliver an upstream event.
    Deliver(DecodeEvent),
    /// Fail upstream with this message.
    Fail(&'static str),
    /// Run the oldest queued decode (skipped if cancelled).
    Run,
    /// Run the oldest queued decode even if it was cancelled.
    RunCancelled,
    /// Cancel the task.
    Cancel,
}

impl Step {
    pub fn partial(bytes: &[u8]) -> Self {
        Self::Deliver(DecodeEvent::partial(bytes.to_vec()))
    }

    pub fn complete(bytes: &[u8]) -> Self {
        Self::Deliver(DecodeEvent::complete(bytes.to_vec()))
    }
}

/// What a task did over a [`replay`].
pub struct Replay<A> {
    pub outcomes: Vec<Outcome<A>>,
    pub log: Vec<SchedulerEvent>,
    pub stats: TaskStats,
    pub state: TaskState,
}

/// Run `steps` against a fresh task. After every step, completions posted
/// by decode work are handed back to the task before the next step.
pub fn replay<F: DecoderFactory>(
    factory: F,
    config: TaskConfig,
    steps: impl IntoIterator<Item = Step>,
) -> Replay<Artifact<F>> {
    let scheduler = ManualScheduler::new();
    let (mut task, mut channels) = IncrementalDecodeTask::new(
        RequestDescriptor::new("mem://replay"),
        config,
        Arc::new(factory),
        Arc::new(scheduler.clone()),
    );

    for step in steps {
        match step {
            Step::Deliver(event) => task.handle(UpstreamSignal::Data(event).into()),
            Step::Fail(message) => {
                task.handle(UpstreamSignal::Failed(UpstreamError::failed(message)).into());
            }
            Step::Run => {
                scheduler.run_next();
            }
            Step::RunCancelled => {
                scheduler.run_next_even_if_cancelled();
            }
            Step::Cancel => task.handle(TaskMessage::Cancel),
        }
        while let Ok(message) = channels.mailbox.try_recv() {
            task.handle(message);
        }
    }

    let mut outcomes = Vec::new();
    while let Ok(outcome) = channels.outcomes.try_recv() {
        outcomes.push(outcome);
    }
    Replay {
        outcomes,
        log: scheduler.log(),
        stats: task.stats(),
        state: task.state(),
    }
}

impl<A> Replay<A> {
    /// Render outcomes, scheduler activity and final state, one fact per
    /// line, for snapshot comparison.
    ///
    /// ```text
    /// preview 4x3x1 rows 1/3
    /// final 4x3x1 rows 3/3
    /// --
    /// submit 0, run 0, submit 1, run 1
    /// Completed: received 2, dropped 0, stale 0, factory 1
    /// ```
    pub fn trace(&self, describe: impl Fn(&A) -> String) -> String {
        let mut out = String::new();
        for outcome in &self.outcomes {
            let _ = match outcome {
                Outcome::Value {
                    artifact,
                    is_final: false,
                } => writeln!(out, "preview {}", describe(artifact)),
                Outcome::Value {
                    artifact,
                    is_final: true,
                } => writeln!(out, "final {}", describe(artifact)),
                Outcome::Error(err) => writeln!(out, "error {err}"),
            };
        }
        out.push_str("--\n");

        let log: Vec<String> = self
            .log
            .iter()
            .map(|event| match event {
                SchedulerEvent::Submitted(id) => format!("submit {id}"),
                SchedulerEvent::Cancelled(id) => format!("cancel {id}"),
                SchedulerEvent::Ran(id) => format!("run {id}"),
                SchedulerEvent::Skipped(id) => format!("skip {id}"),
            })
            .collect();
        if log.is_empty() {
            out.push_str("no decodes\n");
        } else {
            let _ = writeln!(out, "{}", log.join(", "));
        }

        let _ = write!(
            out,
            "{:?}: received {}, dropped {}, stale {}, factory {}",
            self.state,
            self.stats.events_received,
            self.stats.events_dropped,
            self.stats.stale_completions,
            self.stats.factory_calls,
        );
        out
    }
}
