use std::fmt;

use trickle_types::{DecodeEvent, UpstreamError};

/// Identifies one decode submission within a task.
///
/// Ids increase with every submission, so a completion can be matched
/// against the operation the task still considers in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId(pub u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// What an upstream source can deliver.
#[derive(Debug)]
pub enum UpstreamSignal {
    Data(DecodeEvent),
    Failed(UpstreamError),
}

/// Result of one decode, posted back to the task that submitted it.
#[derive(Debug)]
pub struct Completion<A> {
    pub operation: OperationId,
    pub is_final: bool,
    pub output: Option<A>,
}

/// Everything that lands in a task's mailbox.
///
/// The mailbox is the task's only input: upstream deliveries, decode
/// completions and cancellation requests are all handled one at a time,
/// in the order they were posted.
///
/// ```text
///   DataSource ──Upstream──▶ ┌─────────┐
///   Scheduler ──Finished──▶  │ mailbox │ ──▶ IncrementalDecodeTask::handle
///   TaskHandle ──Cancel───▶  └─────────┘
/// ```
#[derive(Debug)]
pub enum TaskMessage<A> {
    Upstream(UpstreamSignal),
    DecodeFinished(Completion<A>),
    Cancel,
}

impl<A> From<UpstreamSignal> for TaskMessage<A> {
    fn from(signal: UpstreamSignal) -> Self {
        Self::Upstream(signal)
    }
}

impl<A> From<Completion<A>> for TaskMessage<A> {
    fn from(completion: Completion<A>) -> Self {
        Self::DecodeFinished(completion)
    }
}
