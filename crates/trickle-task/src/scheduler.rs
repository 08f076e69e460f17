use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tracing::{error, trace};

use crate::config::SchedulerConfig;

/// A unit of decode work. Runs exactly once, or never if cancelled first.
pub type DecodeWork = Box<dyn FnOnce() + Send + 'static>;

/// Cancellable handle to submitted work.
///
/// Cancelling work that has not started guarantees it never runs.
/// Cancelling work that is already running is best effort: the work may
/// still finish and post its completion, which the task discards as
/// stale. `cancel` is idempotent.
pub trait OperationHandle: Send {
    fn cancel(&self);
}

/// Executes CPU-bound decode work off the task's execution context.
///
/// The scheduler owns the concurrency bound; tasks never see it.
/// `submit` must not run `work` inline on the caller's stack.
pub trait DecodeScheduler: Send + Sync {
    fn submit(&self, work: DecodeWork) -> Box<dyn OperationHandle>;
}

/// Tokio-backed scheduler bounding concurrent decodes with a semaphore.
///
/// ```text
///   submit ──▶ spawn ──▶ acquire permit ──▶ spawn_blocking(work)
///                 ▲              ▲                    │
///            cancel aborts   cancel aborts      runs to completion,
///            (not started)   (still waiting)    permit released after
/// ```
///
/// The permit moves into the blocking closure, so a decode that keeps
/// running after its handle was cancelled still counts against the bound.
pub struct PooledScheduler {
    permits: Arc<Semaphore>,
    runtime: Handle,
}

impl PooledScheduler {
    /// Build a scheduler on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(config: &SchedulerConfig) -> Self {
        Self::with_handle(config, Handle::current())
    }

    pub fn with_handle(config: &SchedulerConfig, runtime: Handle) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(config.permits())),
            runtime,
        }
    }

    /// Permits currently free.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

impl DecodeScheduler for PooledScheduler {
    fn submit(&self, work: DecodeWork) -> Box<dyn OperationHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let permits = Arc::clone(&self.permits);

        let join = self.runtime.spawn(async move {
            let Ok(permit) = permits.acquire_owned().await else {
                return;
            };
            let blocking = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                if flag.load(Ordering::Acquire) {
                    trace!("skipping cancelled decode");
                    return;
                }
                work();
            });
            if let Err(err) = blocking.await {
                error!(error = %err, "decode work did not complete");
            }
        });

        Box::new(PooledHandle {
            cancelled,
            abort: join.abort_handle(),
        })
    }
}

struct PooledHandle {
    cancelled: Arc<AtomicBool>,
    abort: AbortHandle,
}

impl OperationHandle for PooledHandle {
    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.abort.abort();
        }
    }
}
