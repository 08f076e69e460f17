use std::num::NonZeroUsize;

/// Per-task configuration.
///
/// ```text
/// ┌──────────────────────┬──────────────────────────────────────────────┐
/// │ Field                │ Purpose                                      │
/// ├──────────────────────┼──────────────────────────────────────────────┤
/// │ progressive_decoding │ Decode non-final buffers into previews       │
/// └──────────────────────┴──────────────────────────────────────────────┘
/// ```
///
/// With progressive decoding off, every non-final event is dropped and
/// the task decodes exactly once, when the final buffer arrives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskConfig {
    pub progressive_decoding: bool,
}

impl Default for TaskConfig {
    /// Progressive decoding on.
    fn default() -> Self {
        Self {
            progressive_decoding: true,
        }
    }
}

/// Configuration for [`PooledScheduler`](crate::scheduler::PooledScheduler).
///
/// ```text
/// ┌────────────────────────┬────────────────────────────────────────────┐
/// │ Field                  │ Purpose                                    │
/// ├────────────────────────┼────────────────────────────────────────────┤
/// │ max_concurrent_decodes │ Decodes running at once across all tasks   │
/// │                        │ sharing the scheduler (min 1)              │
/// └────────────────────────┴────────────────────────────────────────────┘
/// ```
///
/// The bound is shared by every task submitting to the same scheduler;
/// one task never has more than one decode running regardless.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub max_concurrent_decodes: usize,
}

impl SchedulerConfig {
    /// The configured bound, clamped to at least one.
    pub fn permits(&self) -> usize {
        self.max_concurrent_decodes.max(1)
    }
}

impl Default for SchedulerConfig {
    /// One decode per available CPU.
    fn default() -> Self {
        Self {
            max_concurrent_decodes: std::thread::available_parallelism()
                .map_or(1, NonZeroUsize::get),
        }
    }
}
