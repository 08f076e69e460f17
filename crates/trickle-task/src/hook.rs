use std::fmt;
use std::time::Duration;

use tracing::info;

/// Which kind of decode an attempt is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecodeLabel {
    /// Decoding a partial buffer into a preview.
    Progressive,
    /// Decoding the final buffer.
    Final,
}

impl DecodeLabel {
    pub fn for_event(is_final: bool) -> Self {
        if is_final { Self::Final } else { Self::Progressive }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Progressive => "progressive",
            Self::Final => "final",
        }
    }
}

impl fmt::Display for DecodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instrumentation around each decode call.
///
/// Both methods run on the scheduler worker, immediately before and
/// after the decoder is invoked. A task behaves the same with or without
/// a hook installed; hooks observe and never influence the result.
pub trait DecodeHook: Send + Sync {
    fn will_decode(&self, _label: DecodeLabel) {}

    fn did_decode(&self, label: DecodeLabel, elapsed: Duration);
}

/// Hook that reports every decode as an `info` event.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogHook;

impl DecodeHook for LogHook {
    fn did_decode(&self, label: DecodeLabel, elapsed: Duration) {
        info!(kind = %label, elapsed_us = elapsed.as_micros(), "decode timing");
    }
}
