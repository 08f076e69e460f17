use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::scheduler::{DecodeScheduler, DecodeWork, OperationHandle};

/// What happened to work on a [`ManualScheduler`], in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerEvent {
    Submitted(u64),
    Cancelled(u64),
    Ran(u64),
    /// Dropped unrun because it was cancelled before being started.
    Skipped(u64),
}

struct Job {
    id: u64,
    cancelled: Arc<AtomicBool>,
    work: DecodeWork,
}

#[derive(Default)]
struct State {
    queue: VecDeque<Job>,
    log: Vec<SchedulerEvent>,
    next_id: u64,
}

/// Scheduler that queues work until the caller runs it.
///
/// Nothing executes on its own, which makes every interleaving of
/// upstream events and decode completions reproducible in tests. Work
/// ids count submissions from zero.
///
/// ```text
///   submit ──▶ queue ──run_next()──▶ work()   (or Skipped if cancelled)
///                 │
///                 └─run_next_even_if_cancelled()──▶ work()
/// ```
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<State>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queued jobs that have not been cancelled.
    pub fn pending(&self) -> usize {
        self.lock()
            .queue
            .iter()
            .filter(|job| !job.cancelled.load(Ordering::Acquire))
            .count()
    }

    pub fn submitted(&self) -> usize {
        self.count(|e| matches!(e, SchedulerEvent::Submitted(_)))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|e| matches!(e, SchedulerEvent::Cancelled(_)))
    }

    fn count(&self, pred: impl Fn(&SchedulerEvent) -> bool) -> usize {
        self.lock().log.iter().filter(|e| pred(e)).count()
    }

    /// Everything that happened so far.
    pub fn log(&self) -> Vec<SchedulerEvent> {
        self.lock().log.clone()
    }

    /// Run the oldest queued job. Returns `false` if the queue was empty.
    ///
    /// A cancelled job is dropped unrun and reported as `Skipped`.
    pub fn run_next(&self) -> bool {
        self.run_front(false)
    }

    /// Run the oldest queued job even if it was cancelled, as if it had
    /// already started on a worker when the cancellation arrived.
    pub fn run_next_even_if_cancelled(&self) -> bool {
        self.run_front(true)
    }

    /// Run queued jobs until the queue is empty, including jobs the work
    /// itself submits. Returns how many actually ran.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let before = self.ran();
            if !self.run_next() {
                return ran;
            }
            ran += self.ran() - before;
        }
    }

    fn ran(&self) -> usize {
        self.count(|e| matches!(e, SchedulerEvent::Ran(_)))
    }

    fn run_front(&self, ignore_cancel: bool) -> bool {
        let job = {
            let mut state = self.lock();
            let Some(job) = state.queue.pop_front() else {
                return false;
            };
            let skip = !ignore_cancel && job.cancelled.load(Ordering::Acquire);
            state.log.push(if skip {
                SchedulerEvent::Skipped(job.id)
            } else {
                SchedulerEvent::Ran(job.id)
            });
            if skip {
                return true;
            }
            job
        };
        // Lock released: work may submit again.
        (job.work)();
        true
    }
}

impl DecodeScheduler for ManualScheduler {
    fn submit(&self, work: DecodeWork) -> Box<dyn OperationHandle> {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        let cancelled = Arc::new(AtomicBool::new(false));
        state.queue.push_back(Job {
            id,
            cancelled: Arc::clone(&cancelled),
            work,
        });
        state.log.push(SchedulerEvent::Submitted(id));

        Box::new(ManualHandle {
            id,
            cancelled,
            state: Arc::clone(&self.state),
        })
    }
}

struct ManualHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
    state: Arc<Mutex<State>>,
}

impl OperationHandle for ManualHandle {
    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .log
                .push(SchedulerEvent::Cancelled(self.id));
        }
    }
}
