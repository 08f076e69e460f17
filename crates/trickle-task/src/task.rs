use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info_span, trace, warn};
use trickle_decoder::{Decoder, DecoderFactory};
use trickle_types::{
    DecodeContext, DecodeEvent, DecodeFailure, Outcome, RequestDescriptor, TaskError,
    UpstreamError,
};

use crate::config::TaskConfig;
use crate::hook::{DecodeHook, DecodeLabel};
use crate::message::{Completion, OperationId, TaskMessage, UpstreamSignal};
use crate::scheduler::{DecodeScheduler, OperationHandle};
use crate::source::{DataSource, EventSink, Subscription};

/// Artifact type produced by a factory's decoders.
pub type Artifact<F> = <<F as DecoderFactory>::Decoder as Decoder>::Output;

/// Lifecycle of a decode task.
///
/// ```text
///   Idle ──first event──▶ AwaitingDecoder ──decoder──▶ Decoding
///    ▲                          │ (refused, not final)     │
///    │                          ▼                          │
///    └────────────── decode done, not final ◀──────────────┘
///
///   any ──terminal value──▶ Completed
///   any ──terminal error──▶ Failed
///   any ──cancel()───────▶ Cancelled
/// ```
///
/// `Completed`, `Failed` and `Cancelled` are absorbing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    AwaitingDecoder,
    Decoding,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Counters describing what a task did with its input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub events_received: u64,
    pub events_dropped: u64,
    pub factory_calls: u64,
    pub decodes_submitted: u64,
    pub decodes_cancelled: u64,
    pub stale_completions: u64,
    pub values_emitted: u64,
}

struct InFlight {
    id: OperationId,
    handle: Box<dyn OperationHandle>,
}

/// Receiving ends created alongside a task.
///
/// `mailbox` must be drained into [`IncrementalDecodeTask::handle`] by
/// whoever drives the task; `outcomes` goes to the consumer.
pub struct TaskChannels<A> {
    pub mailbox: mpsc::UnboundedReceiver<TaskMessage<A>>,
    pub outcomes: mpsc::UnboundedReceiver<Outcome<A>>,
}

/// Decode lifecycle for one request.
///
/// The task is a plain state machine: it never blocks and never spawns.
/// All of its state changes happen inside [`handle`](Self::handle), one
/// mailbox message at a time. Decode work goes to the scheduler and comes
/// back as a [`TaskMessage::DecodeFinished`] in the same mailbox, so the
/// task's fields are never touched from a worker thread.
///
/// Per upstream event the task applies, in order:
///
///   1. **Finality**: a final event cancels the in-flight decode.
///   2. **Backpressure**: a non-final event is dropped if progressive
///      decoding is off or a decode is in flight.
///   3. **Empty input**: an empty buffer is never decoded; if final, the
///      task fails with [`DecodeFailure::EmptyData`].
///   4. **Decoder**: the memoized decoder is used, or the factory is
///      asked for one. A refusal on a final event fails the task with
///      [`DecodeFailure::DecoderUnavailable`].
///   5. **Submit**: the decode is handed to the scheduler.
///
/// On completion, an artifact is emitted as `Value(artifact, is_final)`;
/// a missing artifact fails the task only if the decode was final.
///
/// The decoder lives behind a mutex shared only with the work this task
/// submitted. Backpressure keeps it uncontended, except when a final
/// decode is submitted while a cancelled progressive decode is still
/// running on a worker; the final decode then waits for it.
///
/// Use [`spawn_task`](crate::spawn_task) to run a task on tokio, or drive
/// it by hand with [`ManualScheduler`](crate::ManualScheduler) in tests.
pub struct IncrementalDecodeTask<F: DecoderFactory> {
    request: RequestDescriptor,
    config: TaskConfig,
    factory: Arc<F>,
    scheduler: Arc<dyn DecodeScheduler>,
    hook: Option<Arc<dyn DecodeHook>>,
    mailbox: mpsc::UnboundedSender<TaskMessage<Artifact<F>>>,
    downstream: mpsc::UnboundedSender<Outcome<Artifact<F>>>,
    decoder: Option<Arc<Mutex<F::Decoder>>>,
    decoder_context: Option<DecodeContext>,
    metadata_diverged: bool,
    in_flight: Option<InFlight>,
    next_operation: u64,
    subscription: Option<Box<dyn Subscription>>,
    state: TaskState,
    stats: TaskStats,
}

impl<F: DecoderFactory> IncrementalDecodeTask<F> {
    pub fn new(
        request: RequestDescriptor,
        config: TaskConfig,
        factory: Arc<F>,
        scheduler: Arc<dyn DecodeScheduler>,
    ) -> (Self, TaskChannels<Artifact<F>>) {
        let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let task = Self {
            request,
            config,
            factory,
            scheduler,
            hook: None,
            mailbox: mailbox_tx,
            downstream: outcome_tx,
            decoder: None,
            decoder_context: None,
            metadata_diverged: false,
            in_flight: None,
            next_operation: 0,
            subscription: None,
            state: TaskState::Idle,
            stats: TaskStats::default(),
        };
        let channels = TaskChannels {
            mailbox: mailbox_rx,
            outcomes: outcome_rx,
        };
        (task, channels)
    }

    /// Install an instrumentation hook around every decode.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn DecodeHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn request(&self) -> &RequestDescriptor {
        &self.request
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn stats(&self) -> TaskStats {
        self.stats
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// The context the decoder was built from, once there is a decoder.
    pub fn decoder_context(&self) -> Option<&DecodeContext> {
        self.decoder_context.as_ref()
    }

    /// Whether a decode is currently in flight.
    pub fn is_decoding(&self) -> bool {
        self.in_flight.is_some()
    }

    /// A sender into this task's mailbox.
    pub fn mailbox(&self) -> mpsc::UnboundedSender<TaskMessage<Artifact<F>>> {
        self.mailbox.clone()
    }

    /// Subscribe to `source`. Has no effect if already subscribed or
    /// finished.
    pub fn start(&mut self, source: &dyn DataSource) {
        if self.subscription.is_some() || self.is_finished() {
            return;
        }
        debug!(request = %self.request, "subscribing");
        let sink = EventSink::for_task(self.mailbox.clone());
        self.subscription = Some(source.subscribe(&self.request, sink));
    }

    /// Process one mailbox message. Messages arriving after the task
    /// finished are ignored.
    pub fn handle(&mut self, message: TaskMessage<Artifact<F>>) {
        if self.is_finished() {
            trace!(request = %self.request, "ignoring message after finish");
            return;
        }
        match message {
            TaskMessage::Upstream(UpstreamSignal::Data(event)) => self.on_event(event),
            TaskMessage::Upstream(UpstreamSignal::Failed(err)) => self.on_upstream_failed(err),
            TaskMessage::DecodeFinished(completion) => self.on_decode_finished(completion),
            TaskMessage::Cancel => self.cancel(),
        }
    }

    /// Cancel the subscription and any in-flight decode. Nothing further
    /// is emitted. Idempotent; a no-op once the task has finished.
    pub fn cancel(&mut self) {
        if self.is_finished() {
            return;
        }
        debug!(request = %self.request, "cancelled");
        self.finish(TaskState::Cancelled);
    }

    fn on_event(&mut self, event: DecodeEvent) {
        self.stats.events_received += 1;

        if event.is_final {
            if let Some(in_flight) = self.in_flight.take() {
                debug!(request = %self.request, op = %in_flight.id, "final data arrived, cancelling progressive decode");
                in_flight.handle.cancel();
                self.stats.decodes_cancelled += 1;
            }
        } else if !self.config.progressive_decoding || self.in_flight.is_some() {
            self.stats.events_dropped += 1;
            trace!(request = %self.request, len = event.buffer.len(), "dropping progressive chunk");
            return;
        }

        if event.buffer.is_empty() {
            if event.is_final {
                self.fail(DecodeFailure::EmptyData.into());
            }
            return;
        }

        let Some(decoder) = self.acquire_decoder(&event) else {
            if event.is_final {
                self.fail(DecodeFailure::DecoderUnavailable.into());
            }
            return;
        };

        self.submit(decoder, event);
    }

    fn acquire_decoder(&mut self, event: &DecodeEvent) -> Option<Arc<Mutex<F::Decoder>>> {
        if let Some(decoder) = self.decoder.clone() {
            self.check_metadata(event);
            return Some(decoder);
        }

        self.state = TaskState::AwaitingDecoder;
        let context = DecodeContext::from_event(&self.request, event);
        self.stats.factory_calls += 1;
        let decoder = Arc::new(Mutex::new(self.factory.make_decoder(&context)?));
        debug!(request = %self.request, len = context.buffer.len(), "decoder created");
        self.decoder = Some(Arc::clone(&decoder));
        self.decoder_context = Some(context);
        Some(decoder)
    }

    fn check_metadata(&mut self, event: &DecodeEvent) {
        if self.metadata_diverged || event.response_metadata.is_none() {
            return;
        }
        let built_with = self
            .decoder_context
            .as_ref()
            .and_then(|c| c.response_metadata.as_ref());
        if built_with != event.response_metadata.as_ref() {
            self.metadata_diverged = true;
            warn!(
                request = %self.request,
                "response metadata changed after the decoder was created; keeping the existing decoder"
            );
        }
    }

    fn submit(&mut self, decoder: Arc<Mutex<F::Decoder>>, event: DecodeEvent) {
        let id = OperationId(self.next_operation);
        self.next_operation += 1;

        let is_final = event.is_final;
        let mailbox = self.mailbox.clone();
        let hook = self.hook.clone();
        let request_id = self.request.id;

        let handle = self.scheduler.submit(Box::new(move || {
            let output = run_decode(&decoder, &event, hook.as_deref(), request_id);
            let completion = Completion {
                operation: id,
                is_final,
                output,
            };
            // Task gone: nobody is waiting for this result.
            let _ = mailbox.send(TaskMessage::DecodeFinished(completion));
        }));

        trace!(request = %self.request, op = %id, is_final, "decode submitted");
        self.stats.decodes_submitted += 1;
        self.in_flight = Some(InFlight { id, handle });
        self.state = TaskState::Decoding;
    }

    fn on_decode_finished(&mut self, completion: Completion<Artifact<F>>) {
        let current = self.in_flight.as_ref().map(|f| f.id);
        if current != Some(completion.operation) {
            self.stats.stale_completions += 1;
            debug!(request = %self.request, op = %completion.operation, "discarding stale decode result");
            return;
        }
        self.in_flight = None;
        self.state = TaskState::Idle;

        match completion.output {
            Some(artifact) => {
                self.emit(Outcome::Value {
                    artifact,
                    is_final: completion.is_final,
                });
                self.stats.values_emitted += 1;
                if completion.is_final {
                    self.finish(TaskState::Completed);
                }
            }
            None if completion.is_final => self.fail(DecodeFailure::NoArtifact.into()),
            None => trace!(request = %self.request, "progressive decode produced nothing"),
        }
    }

    fn on_upstream_failed(&mut self, err: UpstreamError) {
        debug!(request = %self.request, error = %err, "upstream failed");
        self.fail(err.into());
    }

    fn fail(&mut self, err: TaskError) {
        debug!(request = %self.request, error = %err, "task failed");
        self.emit(Outcome::Error(err));
        self.finish(TaskState::Failed);
    }

    fn emit(&self, outcome: Outcome<Artifact<F>>) {
        // Consumer gone: it will cancel us, or already has.
        let _ = self.downstream.send(outcome);
    }

    fn finish(&mut self, state: TaskState) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.handle.cancel();
            self.stats.decodes_cancelled += 1;
        }
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.state = state;
        debug!(request = %self.request, ?state, stats = ?self.stats, "task finished");
    }
}

/// Runs on a scheduler worker.
fn run_decode<D: Decoder>(
    decoder: &Mutex<D>,
    event: &DecodeEvent,
    hook: Option<&dyn DecodeHook>,
    request_id: u64,
) -> Option<D::Output> {
    let label = DecodeLabel::for_event(event.is_final);
    let span = info_span!("decode", request = request_id, kind = %label, len = event.buffer.len());
    let _entered = span.enter();

    if let Some(hook) = hook {
        observe(|| hook.will_decode(label));
    }
    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut decoder = decoder.lock().unwrap_or_else(PoisonError::into_inner);
        decoder.decode(&event.buffer, event.response_metadata.as_ref(), event.is_final)
    }));
    let elapsed = started.elapsed();
    if let Some(hook) = hook {
        observe(|| hook.did_decode(label, elapsed));
    }

    match result {
        Ok(output) => {
            trace!(?elapsed, produced = output.is_some(), "decode returned");
            output
        }
        Err(_) => {
            error!(?elapsed, "decoder panicked");
            None
        }
    }
}

/// Runs a hook callback. A panicking hook is logged and otherwise ignored.
fn observe(callback: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
        error!("decode hook panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use bytes::Bytes;
    use trickle_types::{ResponseMetadata, UpstreamError};

    use crate::manual::{ManualScheduler, SchedulerEvent};

    /// Echoes the buffer as a string. Buffers starting with `bad` decode
    /// to nothing; the buffer `panic` panics.
    struct EchoDecoder;

    impl Decoder for EchoDecoder {
        type Output = String;

        fn decode(
            &mut self,
            buffer: &Bytes,
            _metadata: Option<&ResponseMetadata>,
            _is_final: bool,
        ) -> Option<String> {
            if buffer.as_ref() == b"panic" {
                panic!("decoder blew up");
            }
            if buffer.starts_with(b"bad") {
                return None;
            }
            Some(String::from_utf8_lossy(buffer).into_owned())
        }
    }

    /// Refuses until the buffer holds at least `min_len` bytes.
    struct EchoFactory {
        min_len: usize,
        calls: AtomicUsize,
    }

    impl DecoderFactory for EchoFactory {
        type Decoder = EchoDecoder;

        fn make_decoder(&self, context: &DecodeContext) -> Option<EchoDecoder> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (context.buffer.len() >= self.min_len).then_some(EchoDecoder)
        }
    }

    struct Harness {
        task: IncrementalDecodeTask<EchoFactory>,
        channels: TaskChannels<String>,
        scheduler: ManualScheduler,
        factory: Arc<EchoFactory>,
    }

    impl Harness {
        fn new(config: TaskConfig, min_len: usize) -> Self {
            let scheduler = ManualScheduler::new();
            let factory = Arc::new(EchoFactory {
                min_len,
                calls: AtomicUsize::new(0),
            });
            let (task, channels) = IncrementalDecodeTask::new(
                RequestDescriptor::new("mem://echo"),
                config,
                Arc::clone(&factory),
                Arc::new(scheduler.clone()),
            );
            Self {
                task,
                channels,
                scheduler,
                factory,
            }
        }

        fn progressive() -> Self {
            Self::new(TaskConfig::default(), 1)
        }

        fn partial(&mut self, data: &'static str) {
            self.deliver(DecodeEvent::partial(data.as_bytes()));
        }

        fn complete(&mut self, data: &'static str) {
            self.deliver(DecodeEvent::complete(data.as_bytes()));
        }

        fn deliver(&mut self, event: DecodeEvent) {
            self.task
                .handle(TaskMessage::Upstream(UpstreamSignal::Data(event)));
        }

        /// Hand queued completions to the task, as the runner would.
        fn pump(&mut self) {
            while let Ok(message) = self.channels.mailbox.try_recv() {
                self.task.handle(message);
            }
        }

        fn run_next(&mut self) {
            assert!(self.scheduler.run_next(), "nothing queued");
            self.pump();
        }

        fn outcomes(&mut self) -> Vec<String> {
            let mut out = Vec::new();
            while let Ok(outcome) = self.channels.outcomes.try_recv() {
                out.push(match outcome {
                    Outcome::Value { artifact, is_final } => format!("value({artifact}, {is_final})"),
                    Outcome::Error(err) => format!("error({err})"),
                });
            }
            out
        }

        fn factory_calls(&self) -> usize {
            self.factory.calls.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn progressive_chunks_are_dropped_while_decoding() {
        let mut h = Harness::progressive();
        h.partial("a");
        h.partial("ab");
        h.partial("abc");

        assert_eq!(h.scheduler.submitted(), 1);
        assert_eq!(h.task.stats().events_dropped, 2);
        assert_eq!(h.task.state(), TaskState::Decoding);
    }

    #[test]
    fn dropped_chunk_then_final_emits_value_then_terminal() {
        let mut h = Harness::progressive();
        h.partial("A");
        h.partial("B");
        h.run_next();
        h.complete("AB");
        h.run_next();

        assert_eq!(h.outcomes(), vec!["value(A, false)", "value(AB, true)"]);
        assert_eq!(h.task.state(), TaskState::Completed);
        assert_eq!(h.scheduler.submitted(), 2);
    }

    #[test]
    fn final_event_cancels_in_flight_before_submitting() {
        let mut h = Harness::progressive();
        h.partial("A");
        h.complete("AB");

        assert_eq!(
            h.scheduler.log(),
            vec![
                SchedulerEvent::Submitted(0),
                SchedulerEvent::Cancelled(0),
                SchedulerEvent::Submitted(1),
            ]
        );

        h.run_next(); // skipped
        h.run_next();
        assert_eq!(h.outcomes(), vec!["value(AB, true)"]);
    }

    #[test]
    fn stale_progressive_result_is_discarded() {
        let mut h = Harness::progressive();
        h.partial("A");
        h.complete("AB");

        // op 0 was already running on a worker when it was cancelled.
        assert!(h.scheduler.run_next_even_if_cancelled());
        h.pump();
        assert!(h.outcomes().is_empty());
        assert_eq!(h.task.stats().stale_completions, 1);
        assert!(h.task.is_decoding());

        h.run_next();
        assert_eq!(h.outcomes(), vec!["value(AB, true)"]);
    }

    #[test]
    fn factory_is_retried_until_it_succeeds_then_memoized() {
        let mut h = Harness::new(TaskConfig::default(), 3);
        h.partial("ab");
        assert_eq!(h.factory_calls(), 1);
        assert_eq!(h.scheduler.submitted(), 0);
        assert_eq!(h.task.state(), TaskState::AwaitingDecoder);

        h.complete("abcd");
        h.run_next();

        assert_eq!(h.outcomes(), vec!["value(abcd, true)"]);
        assert_eq!(h.factory_calls(), 2);
        assert_eq!(h.task.decoder_context().map(|c| c.buffer.len()), Some(4));
    }

    #[test]
    fn factory_consulted_once_across_many_events() {
        let mut h = Harness::progressive();
        for chunk in ["a", "ab", "abc"] {
            h.partial(chunk);
            h.run_next();
        }
        h.complete("abcd");
        h.run_next();

        assert_eq!(h.factory_calls(), 1);
        assert_eq!(h.outcomes().len(), 4);
    }

    #[test]
    fn empty_final_buffer_fails_without_decoding() {
        let mut h = Harness::progressive();
        h.complete("");

        assert_eq!(h.outcomes(), vec!["error(decoding failed: final buffer is empty)"]);
        assert_eq!(h.scheduler.submitted(), 0);
        assert_eq!(h.factory_calls(), 0);
        assert_eq!(h.task.state(), TaskState::Failed);
    }

    #[test]
    fn empty_partial_buffer_waits() {
        let mut h = Harness::progressive();
        h.partial("");

        assert!(h.outcomes().is_empty());
        assert_eq!(h.scheduler.submitted(), 0);
        assert_eq!(h.task.state(), TaskState::Idle);
        assert!(!h.task.is_finished());
    }

    #[test]
    fn factory_refusal_on_final_fails() {
        let mut h = Harness::new(TaskConfig::default(), 10);
        h.partial("abc");
        h.complete("abcdef");

        assert_eq!(
            h.outcomes(),
            vec!["error(decoding failed: no decoder could be created for the data)"]
        );
        assert_eq!(h.scheduler.submitted(), 0);
    }

    #[test]
    fn missing_artifact_is_tolerated_until_final() {
        let mut h = Harness::progressive();
        h.partial("bad1");
        h.run_next();
        assert!(h.outcomes().is_empty());
        assert_eq!(h.task.state(), TaskState::Idle);

        h.complete("bad12");
        h.run_next();
        assert_eq!(
            h.outcomes(),
            vec!["error(decoding failed: decoder produced no artifact from the final buffer)"]
        );
    }

    #[test]
    fn panicking_decoder_counts_as_no_artifact() {
        let mut h = Harness::progressive();
        h.complete("panic");
        h.run_next();
        assert_eq!(
            h.outcomes(),
            vec!["error(decoding failed: decoder produced no artifact from the final buffer)"]
        );
    }

    #[test]
    fn progressive_decoding_disabled_decodes_only_final() {
        let mut h = Harness::new(
            TaskConfig {
                progressive_decoding: false,
            },
            1,
        );
        h.partial("a");
        h.partial("ab");
        assert_eq!(h.scheduler.submitted(), 0);
        assert_eq!(h.factory_calls(), 0);

        h.complete("abc");
        h.run_next();
        assert_eq!(h.outcomes(), vec!["value(abc, true)"]);
    }

    #[test]
    fn upstream_failure_is_terminal_and_cancels_decode() {
        let mut h = Harness::progressive();
        h.partial("a");
        h.task.handle(TaskMessage::Upstream(UpstreamSignal::Failed(
            UpstreamError::failed("connection reset"),
        )));

        assert_eq!(h.outcomes(), vec!["error(upstream failed: connection reset)"]);
        assert_eq!(h.scheduler.cancelled(), 1);
        assert_eq!(h.task.state(), TaskState::Failed);
    }

    #[test]
    fn cancel_mid_decode_is_silent_and_idempotent() {
        let mut h = Harness::progressive();
        h.partial("a");
        h.task.cancel();
        h.task.cancel();
        h.task.handle(TaskMessage::Cancel);

        assert_eq!(h.scheduler.cancelled(), 1);
        assert_eq!(h.scheduler.run_all(), 0);
        h.pump();
        h.complete("ab");

        assert!(h.outcomes().is_empty());
        assert_eq!(h.task.state(), TaskState::Cancelled);
        assert_eq!(h.scheduler.submitted(), 1);
    }

    #[test]
    fn cancel_after_completion_is_a_no_op() {
        let mut h = Harness::progressive();
        h.complete("abc");
        h.run_next();
        h.task.cancel();

        assert_eq!(h.task.state(), TaskState::Completed);
        assert_eq!(h.outcomes(), vec!["value(abc, true)"]);
    }

    #[test]
    fn changed_metadata_keeps_existing_decoder() {
        let mut h = Harness::progressive();
        let first = ResponseMetadata::default().with_content_type("text/plain");
        let second = ResponseMetadata::default().with_content_type("text/html");

        h.deliver(DecodeEvent::partial(&b"a"[..]).with_metadata(first));
        h.run_next();
        h.deliver(DecodeEvent::complete(&b"ab"[..]).with_metadata(second));
        h.run_next();

        assert_eq!(h.factory_calls(), 1);
        assert_eq!(h.outcomes(), vec!["value(a, false)", "value(ab, true)"]);
    }

    struct FlagSubscription {
        cancelled: Arc<AtomicBool>,
        _sink: EventSink,
    }

    impl Subscription for FlagSubscription {
        fn cancel(&mut self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    /// Delivers nothing; records whether its subscription was cancelled.
    struct SilentSource(Arc<AtomicBool>);

    impl DataSource for SilentSource {
        fn subscribe(&self, _request: &RequestDescriptor, sink: EventSink) -> Box<dyn Subscription> {
            Box::new(FlagSubscription {
                cancelled: Arc::clone(&self.0),
                _sink: sink,
            })
        }
    }

    #[test]
    fn finishing_releases_the_subscription() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut h = Harness::progressive();
        h.task.start(&SilentSource(Arc::clone(&cancelled)));
        assert!(!cancelled.load(Ordering::SeqCst));

        h.complete("x");
        h.run_next();
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[derive(Default)]
    struct RecordingHook(Mutex<Vec<(DecodeLabel, bool)>>);

    impl DecodeHook for RecordingHook {
        fn will_decode(&self, label: DecodeLabel) {
            self.0.lock().unwrap().push((label, false));
        }

        fn did_decode(&self, label: DecodeLabel, _elapsed: Duration) {
            self.0.lock().unwrap().push((label, true));
        }
    }

    #[test]
    fn hook_sees_each_decode_with_its_label() {
        let hook = Arc::new(RecordingHook::default());
        let mut h = Harness::progressive();
        h.task = h.task.with_hook(hook.clone());

        h.partial("a");
        h.run_next();
        h.complete("ab");
        h.run_next();

        assert_eq!(
            *hook.0.lock().unwrap(),
            vec![
                (DecodeLabel::Progressive, false),
                (DecodeLabel::Progressive, true),
                (DecodeLabel::Final, false),
                (DecodeLabel::Final, true),
            ]
        );
        assert_eq!(h.outcomes(), vec!["value(a, false)", "value(ab, true)"]);
    }

    struct PanickingHook;

    impl DecodeHook for PanickingHook {
        fn will_decode(&self, label: DecodeLabel) {
            assert_ne!(label, DecodeLabel::Progressive, "hook failure");
        }

        fn did_decode(&self, _label: DecodeLabel, _elapsed: Duration) {
            panic!("hook failure");
        }
    }

    #[test]
    fn panicking_hook_does_not_stall_the_task() {
        let mut h = Harness::progressive();
        h.task = h.task.with_hook(Arc::new(PanickingHook));

        h.partial("a");
        h.run_next();
        assert_eq!(h.task.state(), TaskState::Idle);
        h.complete("ab");
        h.run_next();

        assert_eq!(h.outcomes(), vec!["value(a, false)", "value(ab, true)"]);
        assert_eq!(h.task.state(), TaskState::Completed);
    }
}
