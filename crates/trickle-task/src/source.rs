use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, trace};
use trickle_types::{DecodeEvent, RequestDescriptor, ResponseMetadata, UpstreamError};

use crate::message::{TaskMessage, UpstreamSignal};

/// Produces the byte-stream events a decode task consumes.
///
/// A source delivers zero or more non-final events followed by exactly
/// one final event, or fails instead of delivering the final event. Each
/// event carries the whole buffer received so far.
///
/// `subscribe` must not call back into the task: it only posts into the
/// [`EventSink`], which queues onto the task's mailbox. Delivering every
/// event synchronously from inside `subscribe` is allowed.
pub trait DataSource {
    fn subscribe(&self, request: &RequestDescriptor, sink: EventSink) -> Box<dyn Subscription>;
}

/// Handle to an active subscription, owned by the task.
///
/// `cancel` stops further deliveries as far as the source can manage.
/// It must be idempotent.
pub trait Subscription: Send {
    fn cancel(&mut self);
}

trait SignalTarget: Send + Sync + 'static {
    fn deliver(&self, signal: UpstreamSignal) -> bool;
}

impl<A: Send + 'static> SignalTarget for mpsc::UnboundedSender<TaskMessage<A>> {
    fn deliver(&self, signal: UpstreamSignal) -> bool {
        self.send(TaskMessage::Upstream(signal)).is_ok()
    }
}

impl SignalTarget for mpsc::UnboundedSender<UpstreamSignal> {
    fn deliver(&self, signal: UpstreamSignal) -> bool {
        self.send(signal).is_ok()
    }
}

struct SinkInner {
    target: Box<dyn SignalTarget>,
    finished: AtomicBool,
}

impl Drop for SinkInner {
    // Every sink clone gone without a final event or a failure: tell the
    // task instead of leaving it waiting forever.
    fn drop(&mut self) {
        if !self.finished.load(Ordering::Acquire) {
            self.target
                .deliver(UpstreamSignal::Failed(UpstreamError::Closed));
        }
    }
}

/// Where a [`DataSource`] delivers its events.
///
/// Cheap to clone. Once a final event or a failure has gone through, the
/// sink is finished and later deliveries are ignored. If every clone is
/// dropped before that, the task receives [`UpstreamError::Closed`].
///
/// `send` and `fail` return `false` when the delivery was not accepted,
/// either because the sink is finished or because the task is gone.
/// Sources should stop producing at that point.
#[derive(Clone)]
pub struct EventSink {
    inner: Arc<SinkInner>,
}

impl EventSink {
    pub(crate) fn for_task<A: Send + 'static>(mailbox: mpsc::UnboundedSender<TaskMessage<A>>) -> Self {
        Self::from_target(Box::new(mailbox))
    }

    /// A sink feeding a plain channel, for driving sources by hand.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UpstreamSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::from_target(Box::new(tx)), rx)
    }

    fn from_target(target: Box<dyn SignalTarget>) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                target,
                finished: AtomicBool::new(false),
            }),
        }
    }

    pub fn send(&self, event: DecodeEvent) -> bool {
        if event.is_final {
            if self.inner.finished.swap(true, Ordering::AcqRel) {
                return false;
            }
        } else if self.is_finished() {
            return false;
        }
        self.inner.target.deliver(UpstreamSignal::Data(event))
    }

    pub fn fail(&self, error: UpstreamError) -> bool {
        if self.inner.finished.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.target.deliver(UpstreamSignal::Failed(error))
    }

    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::Acquire)
    }
}

/// Subscription backed by an optional spawned tokio task.
///
/// Sources that deliver synchronously return a detached subscription
/// with nothing to stop.
pub struct TaskSubscription {
    handle: Option<AbortHandle>,
}

impl TaskSubscription {
    pub fn detached() -> Self {
        Self { handle: None }
    }

    pub fn spawned(handle: AbortHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl Subscription for TaskSubscription {
    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Replays a fixed list of events.
///
/// Without a delay the events are delivered during `subscribe`. With a
/// delay a tokio task sleeps before each delivery, which makes the replay
/// look like a slow download; that mode needs a tokio runtime.
///
/// ```text
///   ChunkSource::split(data, 4)
///     data = "abcdefghij"
///     → partial("abcd"), partial("abcdefgh"), complete("abcdefghij")
/// ```
#[derive(Clone, Debug)]
pub struct ChunkSource {
    events: Vec<DecodeEvent>,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl ChunkSource {
    pub fn new(events: Vec<DecodeEvent>) -> Self {
        Self {
            events,
            failure: None,
            delay: None,
        }
    }

    /// Cut `data` into accumulated prefixes `chunk_size` bytes apart; the
    /// last event is final and holds all of `data`.
    pub fn split(data: impl Into<Bytes>, chunk_size: usize) -> Self {
        let data = data.into();
        let step = chunk_size.max(1);
        let mut events: Vec<DecodeEvent> = (step..data.len())
            .step_by(step)
            .map(|end| DecodeEvent::partial(data.slice(..end)))
            .collect();
        events.push(DecodeEvent::complete(data));
        Self::new(events)
    }

    /// Fail with `message` after the listed events instead of finishing.
    #[must_use]
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Attach `metadata` to every event.
    #[must_use]
    pub fn with_metadata(mut self, metadata: &ResponseMetadata) -> Self {
        for event in &mut self.events {
            event.response_metadata = Some(metadata.clone());
        }
        self
    }

    pub fn events(&self) -> &[DecodeEvent] {
        &self.events
    }
}

impl DataSource for ChunkSource {
    fn subscribe(&self, request: &RequestDescriptor, sink: EventSink) -> Box<dyn Subscription> {
        debug!(request = %request, events = self.events.len(), "replaying chunks");
        let events = self.events.clone();
        let failure = self.failure.clone();

        let Some(delay) = self.delay else {
            replay(events, failure, &sink);
            return Box::new(TaskSubscription::detached());
        };

        let handle = tokio::spawn(async move {
            for event in events {
                tokio::time::sleep(delay).await;
                if !sink.send(event) {
                    return;
                }
            }
            if let Some(message) = failure {
                sink.fail(UpstreamError::failed(message));
            }
        });
        Box::new(TaskSubscription::spawned(handle.abort_handle()))
    }
}

fn replay(events: Vec<DecodeEvent>, failure: Option<String>, sink: &EventSink) {
    for event in events {
        if !sink.send(event) {
            return;
        }
    }
    if let Some(message) = failure {
        sink.fail(UpstreamError::failed(message));
    }
}

/// Streams any [`AsyncRead`] as a progressive download.
///
/// Reads `chunk_size` bytes at a time and after each chunk delivers the
/// accumulated buffer. End of input delivers the final event; a read
/// error fails the subscription with [`UpstreamError::Io`].
///
/// The reader is consumed by the first subscription. Subscribing again
/// fails immediately.
pub struct ReaderSource<R> {
    reader: Mutex<Option<R>>,
    chunk_size: usize,
    delay: Option<Duration>,
    metadata: Option<ResponseMetadata>,
}

impl<R> ReaderSource<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
            chunk_size: chunk_size.max(1),
            delay: None,
            metadata: None,
        }
    }

    /// Pause between chunks.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: ResponseMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl<R> DataSource for ReaderSource<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    fn subscribe(&self, request: &RequestDescriptor, sink: EventSink) -> Box<dyn Subscription> {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(reader) = reader else {
            sink.fail(UpstreamError::failed("reader source already consumed"));
            return Box::new(TaskSubscription::detached());
        };

        debug!(request = %request, chunk_size = self.chunk_size, "streaming reader");
        let handle = tokio::spawn(pump(
            reader,
            self.chunk_size,
            self.delay,
            self.metadata.clone(),
            sink,
        ));
        Box::new(TaskSubscription::spawned(handle.abort_handle()))
    }
}

async fn pump<R>(
    mut reader: R,
    chunk_size: usize,
    delay: Option<Duration>,
    metadata: Option<ResponseMetadata>,
    sink: EventSink,
) where
    R: AsyncRead + Unpin,
{
    let mut accumulated = BytesMut::new();
    loop {
        let (filled, eof) = match read_chunk(&mut reader, &mut accumulated, chunk_size).await {
            Ok(progress) => progress,
            Err(err) => {
                sink.fail(UpstreamError::Io(err));
                return;
            }
        };
        trace!(filled, total = accumulated.len(), eof, "read chunk");

        if eof {
            let event = DecodeEvent::complete(accumulated.freeze());
            sink.send(with_metadata(event, metadata.as_ref()));
            return;
        }

        let event = DecodeEvent::partial(Bytes::copy_from_slice(&accumulated));
        if !sink.send(with_metadata(event, metadata.as_ref())) {
            return;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Read until `chunk_size` more bytes are buffered or input ends.
async fn read_chunk<R>(
    reader: &mut R,
    buf: &mut BytesMut,
    chunk_size: usize,
) -> std::io::Result<(usize, bool)>
where
    R: AsyncRead + Unpin,
{
    buf.reserve(chunk_size);
    let mut filled = 0;
    while filled < chunk_size {
        let remaining = (chunk_size - filled) as u64;
        let n = (&mut *reader).take(remaining).read_buf(buf).await?;
        if n == 0 {
            return Ok((filled, true));
        }
        filled += n;
    }
    Ok((filled, false))
}

fn with_metadata(event: DecodeEvent, metadata: Option<&ResponseMetadata>) -> DecodeEvent {
    match metadata {
        Some(meta) => event.with_metadata(meta.clone()),
        None => event,
    }
}
