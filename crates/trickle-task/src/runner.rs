use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span};
use trickle_decoder::DecoderFactory;
use trickle_types::{Outcome, RequestDescriptor, TaskError};

use crate::message::TaskMessage;
use crate::source::DataSource;
use crate::task::{Artifact, IncrementalDecodeTask, TaskChannels, TaskStats};

/// Run `task` on the current tokio runtime.
///
/// Subscribes to `source` immediately, then drains the task's mailbox on
/// a dedicated tokio task until the task finishes. That tokio task is the
/// task's serialized execution context: upstream events, decode
/// completions and cancellation are processed there one at a time.
///
/// ```text
///   source ──▶ ┌─────────┐     ┌────────────────────────┐     ┌────────────┐
///              │ mailbox │ ──▶ │ IncrementalDecodeTask  │ ──▶ │ TaskHandle │
///   workers ─▶ └─────────┘     └────────────────────────┘     └────────────┘
///                                   │ submit    ▲ completion
///                                   ▼           │
///                               DecodeScheduler ┘
/// ```
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn spawn_task<F: DecoderFactory>(
    mut task: IncrementalDecodeTask<F>,
    channels: TaskChannels<Artifact<F>>,
    source: &dyn DataSource,
) -> TaskHandle<Artifact<F>> {
    let TaskChannels {
        mut mailbox,
        outcomes,
    } = channels;
    let control = task.mailbox();
    let request = task.request().clone();
    task.start(source);

    let span = info_span!("decode_task", request = request.id);
    let join = tokio::spawn(
        async move {
            while !task.is_finished() {
                let Some(message) = mailbox.recv().await else {
                    break;
                };
                task.handle(message);
            }
            debug!(state = ?task.state(), "task loop exited");
            task.stats()
        }
        .instrument(span),
    );

    TaskHandle {
        request,
        outcomes,
        control,
        join: Some(join),
    }
}

/// Consumer side of a running decode task.
///
/// Outcomes arrive through [`next`](Self::next) in emission order. After
/// the terminal outcome (or after cancellation) `next` returns `None`.
///
/// Dropping the handle cancels the task.
pub struct TaskHandle<A> {
    request: RequestDescriptor,
    outcomes: mpsc::UnboundedReceiver<Outcome<A>>,
    control: mpsc::UnboundedSender<TaskMessage<A>>,
    join: Option<JoinHandle<TaskStats>>,
}

/// Everything a task delivered.
#[derive(Debug)]
pub struct TaskReport<A> {
    /// Non-final values, in order.
    pub previews: Vec<A>,
    /// The terminal outcome, or `None` if the task was cancelled first.
    pub result: Option<Result<A, TaskError>>,
}

impl<A> TaskHandle<A> {
    pub fn request(&self) -> &RequestDescriptor {
        &self.request
    }

    /// Next outcome, or `None` once the task has finished and every
    /// outcome has been received.
    pub async fn next(&mut self) -> Option<Outcome<A>> {
        self.outcomes.recv().await
    }

    /// Collect outcomes until the task ends.
    pub async fn finish(&mut self) -> TaskReport<A> {
        let mut previews = Vec::new();
        while let Some(outcome) = self.next().await {
            match outcome {
                Outcome::Value {
                    artifact,
                    is_final: false,
                } => previews.push(artifact),
                terminal => {
                    return TaskReport {
                        previews,
                        result: Some(terminal.into_result()),
                    };
                }
            }
        }
        TaskReport {
            previews,
            result: None,
        }
    }

    /// Request cancellation. Idempotent, and a no-op once the task has
    /// finished.
    pub fn cancel(&self) {
        // Loop already gone: nothing left to cancel.
        let _ = self.control.send(TaskMessage::Cancel);
    }

    /// Wait for the task loop to exit and return its counters.
    ///
    /// Returns `None` if already joined or the loop panicked.
    pub async fn join(&mut self) -> Option<TaskStats> {
        self.join.take()?.await.ok()
    }
}

impl<A> Drop for TaskHandle<A> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bytes::Bytes;
    use trickle_decoder::Decoder;
    use trickle_types::{DecodeContext, DecodeEvent, DecodeFailure, ResponseMetadata};

    use crate::config::{SchedulerConfig, TaskConfig};
    use crate::scheduler::PooledScheduler;
    use crate::source::ChunkSource;

    struct Len;

    impl Decoder for Len {
        type Output = usize;

        fn decode(&mut self, buffer: &Bytes, _: Option<&ResponseMetadata>, _: bool) -> Option<usize> {
            Some(buffer.len())
        }
    }

    struct LenFactory;

    impl DecoderFactory for LenFactory {
        type Decoder = Len;

        fn make_decoder(&self, _: &DecodeContext) -> Option<Len> {
            Some(Len)
        }
    }

    fn task(config: TaskConfig) -> (IncrementalDecodeTask<LenFactory>, TaskChannels<usize>) {
        let scheduler = PooledScheduler::new(&SchedulerConfig {
            max_concurrent_decodes: 2,
        });
        IncrementalDecodeTask::new(
            RequestDescriptor::new("mem://len"),
            config,
            Arc::new(LenFactory),
            Arc::new(scheduler),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn spawned_task_ends_with_final_value() {
        let (task, channels) = task(TaskConfig::default());
        let source = ChunkSource::split(&b"0123456789"[..], 3);
        let mut handle = spawn_task(task, channels, &source);

        let report = handle.finish().await;
        assert_eq!(report.result.unwrap().unwrap(), 10);
        assert!(report.previews.iter().all(|&len| len < 10));

        let stats = handle.join().await.unwrap();
        assert_eq!(stats.events_received, 4);
        assert_eq!(stats.values_emitted as usize, report.previews.len() + 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn empty_final_reports_error() {
        let (task, channels) = task(TaskConfig::default());
        let source = ChunkSource::new(vec![DecodeEvent::complete(Bytes::new())]);
        let mut handle = spawn_task(task, channels, &source);

        let report = handle.finish().await;
        assert!(report.previews.is_empty());
        let err = report.result.unwrap().unwrap_err();
        assert_eq!(err.decode_failure(), Some(DecodeFailure::EmptyData));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelled_handle_yields_nothing_further() {
        let (task, channels) = task(TaskConfig::default());
        let source = ChunkSource::split(&b"abcdef"[..], 2).with_delay(std::time::Duration::from_secs(5));
        let mut handle = spawn_task(task, channels, &source);

        handle.cancel();
        let stats = handle.join().await.unwrap();
        assert_eq!(stats.values_emitted, 0);
        assert!(handle.next().await.is_none());
    }
}
