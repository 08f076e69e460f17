/// Why a final decode attempt produced no artifact.
///
/// Each variant maps to one of the three places the decode task gives up
/// on a final event. Non-final events hitting the same conditions are
/// absorbed silently and never produce one of these.
///
/// ```text
/// ┌────────────────────┬─────────────────────────────────────────────┐
/// │ Variant            │ Raised when                                 │
/// ├────────────────────┼─────────────────────────────────────────────┤
/// │ EmptyData          │ Final buffer is empty, no decode attempted  │
/// │ DecoderUnavailable │ Factory refused to build a decoder          │
/// │ NoArtifact         │ Decoder ran on the final buffer, returned   │
/// │                    │ nothing (or panicked)                       │
/// └────────────────────┴─────────────────────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeFailure {
  #[error("final buffer is empty")]
  EmptyData,

  #[error("no decoder could be created for the data")]
  DecoderUnavailable,

  #[error("decoder produced no artifact from the final buffer")]
  NoArtifact,
}

/// Failure reported by an upstream data source.
///
/// The task forwards these opaquely: it never inspects the variant and
/// never attempts a decode after one.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
  /// Reading from the underlying byte source failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// The source gave up for a reason of its own.
  #[error("{message}")]
  Failed { message: String },

  /// The source stopped delivering without ever sending a final event.
  #[error("upstream closed before the final event")]
  Closed,
}

impl UpstreamError {
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }
}

/// Terminal error of a decode task.
///
/// At most one of these is ever delivered per task, and only as the last
/// outcome.
///
/// ```text
///   TaskError
///   ├── DecodeFailed(DecodeFailure)  ← final decode could not succeed
///   └── Upstream(UpstreamError)      ← source failed, nothing decoded
/// ```
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
  #[error("decoding failed: {0}")]
  DecodeFailed(DecodeFailure),

  #[error("upstream failed: {0}")]
  Upstream(#[from] UpstreamError),
}

impl TaskError {
  /// The decode failure reason, if this is a decode failure.
  pub fn decode_failure(&self) -> Option<DecodeFailure> {
    match self {
      Self::DecodeFailed(reason) => Some(*reason),
      Self::Upstream(_) => None,
    }
  }
}

impl From<DecodeFailure> for TaskError {
  fn from(reason: DecodeFailure) -> Self {
    Self::DecodeFailed(reason)
  }
}
