use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide counter backing [`RequestDescriptor::new`].
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies the logical request a decode task works for.
///
/// The descriptor is handed to the upstream source when the task
/// subscribes and is embedded in every [`DecodeContext`](crate::DecodeContext)
/// the task builds, so decoder factories can key their decisions on the
/// request (for example, picking a decoder from the URL extension).
///
/// ```text
/// ┌───────┬────────────────────────────────────────────────────┐
/// │ Field │ Purpose                                            │
/// ├───────┼────────────────────────────────────────────────────┤
/// │ id    │ Unique per process, used to correlate log lines    │
/// │ url   │ Location of the resource being loaded              │
/// │ label │ Optional human-readable tag shown by the CLI       │
/// └───────┴────────────────────────────────────────────────────┘
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct RequestDescriptor {
    pub id: u64,
    pub url: String,
    pub label: Option<String>,
}

impl RequestDescriptor {
    /// Create a descriptor with a fresh process-unique id.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
            url: url.into(),
            label: None,
        }
    }

    /// Attach a human-readable label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl fmt::Display for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "#{} {} ({label})", self.id, self.url),
            None => write!(f, "#{} {}", self.id, self.url),
        }
    }
}
