//! Tick queue with patience buckets and cascading dispatch.
//!
//! # Dispatch model
//!
//! ```text
//! dispatch(ceiling):
//! ┌──────────────────────────────────────────────────────────────┐
//! │  1. Pull pending tasks whose delay is 0                      │
//! │     - patience < ceiling → immediate bucket[patience]        │
//! │     - otherwise          → stays pending (next dispatch)     │
//! │  2. Take the most urgent non-empty bucket as one batch       │
//! │  3. Run the batch; new zero-delay work below the ceiling     │
//! │     lands in a bucket, everything else goes to pending       │
//! │  4. Rescan from the most urgent bucket until all are empty   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Work submitted during a batch never joins that batch, so every
//! contender acting in the same round is registered before any of them
//! observes the round's outcome.

mod task;

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::patience::Patience;

pub use task::{panic_message, Task, TaskFn};

/// Logical time, in ticks.
pub type Tick = i64;

/// Anything that accepts scheduled work.
///
/// Implemented by [`TickQueue`] (inside a dispatch) and by the real-time
/// pacer (from outside one), so callers build work once and hand it to
/// whichever scheduler they hold.
pub trait Submit<S> {
    /// Submits a boxed task at `delay` ticks from now.
    fn submit(&mut self, task: TaskFn<S>, delay: Tick, patience: Patience) -> Result<()>;

    /// Submits a closure at `delay` ticks from now.
    fn schedule<F>(&mut self, f: F, delay: Tick, patience: Patience) -> Result<()>
    where
        F: FnOnce(&mut TickQueue<S>, &mut S) -> Result<()> + 'static,
    {
        self.submit(Box::new(f), delay, patience)
    }
}

/// Counters for one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Tasks executed (including failed ones)
    pub ran: usize,
    /// Tasks that returned an error or panicked
    pub failed: usize,
    /// Immediate batches drained
    pub rounds: usize,
    /// Immediate tasks pushed to the next dispatch by the round limit
    pub deferred: usize,
}

/// Pending delayed work plus the per-tier immediate buckets.
pub struct TickQueue<S> {
    /// Not-yet-dispatched tasks, ascending by remaining delay (FIFO for ties)
    pending: VecDeque<Task<S>>,
    /// Due-now tasks visible to the running dispatch, indexed by tier
    immediates: Vec<VecDeque<Task<S>>>,
    /// Ceiling of the running dispatch (`None` when idle)
    running: Option<Patience>,
    /// Batch limit per dispatch
    max_rounds: usize,
}

impl<S> TickQueue<S> {
    /// Creates an empty queue with the default round limit.
    pub fn new() -> Self {
        Self::with_round_limit(SimConfig::default().max_cascade_rounds)
    }

    /// Creates an empty queue using the configured round limit.
    pub fn from_config(config: &SimConfig) -> Self {
        Self::with_round_limit(config.max_cascade_rounds)
    }

    /// Creates an empty queue that drains at most `max_rounds` batches per
    /// dispatch.
    pub fn with_round_limit(max_rounds: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            immediates: Patience::ALL.iter().map(|_| VecDeque::new()).collect(),
            running: None,
            max_rounds: max_rounds.max(1),
        }
    }

    /// Remaining delay of the earliest pending task.
    pub fn next_time(&self) -> Option<Tick> {
        self.pending.front().map(|t| t.delay)
    }

    /// Total number of queued tasks, pending and immediate.
    pub fn len(&self) -> usize {
        self.pending.len() + self.immediates.iter().map(VecDeque::len).sum::<usize>()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a dispatch is in progress.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Ceiling of the dispatch in progress.
    pub fn running(&self) -> Option<Patience> {
        self.running
    }

    /// Submits `func` to run `delay` ticks from now at `patience`.
    ///
    /// A zero delay inside a dispatch joins the running cascade when
    /// `patience` is below the dispatch ceiling; otherwise it waits for
    /// the next dispatch.
    pub fn submit(&mut self, func: TaskFn<S>, delay: Tick, patience: Patience) -> Result<()> {
        if delay < 0 {
            return Err(SimError::InvalidDelay { delay });
        }
        if !patience.holds_tasks() {
            return Err(SimError::CeilingTier { patience });
        }

        let task = Task::new(func, delay, patience);
        if delay == 0 {
            self.route_immediate(task);
        } else {
            self.insert_pending(task);
        }
        Ok(())
    }

    /// Routes zero-delay work: into the running cascade when strictly below
    /// its ceiling, otherwise to pending for the next dispatch.
    ///
    /// Held work goes after pending tasks that are already due, so held
    /// tasks keep submission (FIFO) order rather than jumping to the front.
    fn route_immediate(&mut self, task: Task<S>) {
        match self.running {
            Some(ceiling) if task.patience < ceiling => {
                self.immediates[task.patience.index()].push_back(task);
            }
            _ => self.insert_pending(task),
        }
    }

    /// Inserts after every pending task due at or before this one.
    fn insert_pending(&mut self, task: Task<S>) {
        let ix = self.pending.partition_point(|t| t.delay <= task.delay);
        self.pending.insert(ix, task);
    }

    /// Moves logical time forward by `by` ticks.
    ///
    /// `by` may not exceed the earliest pending delay, so no task is ever
    /// skipped past its due time.
    pub fn advance(&mut self, by: Tick) -> Result<()> {
        if by < 0 {
            return Err(SimError::NegativeAdvance { by });
        }
        if let Some(next) = self.next_time() {
            if by > next {
                return Err(SimError::OverAdvance { by, next });
            }
        }
        for task in &mut self.pending {
            task.delay = task.delay.saturating_sub(by);
        }
        Ok(())
    }

    /// Runs every due task, and everything they cascade, below `ceiling`.
    ///
    /// Task errors and panics are logged and counted; they never abort the
    /// batch.
    pub fn dispatch(&mut self, state: &mut S, ceiling: Patience) -> Result<DispatchStats> {
        if self.running.is_some() {
            return Err(SimError::Reentrant);
        }
        if self.next_time().is_some_and(|next| next < 0) {
            return Err(SimError::NegativePendingDelay);
        }

        self.running = Some(ceiling);
        self.pull_due(ceiling);

        let mut stats = DispatchStats::default();
        while let Some(tier) = self.most_urgent_bucket() {
            if stats.rounds == self.max_rounds {
                stats.deferred = self.defer_immediates();
                tracing::warn!(
                    "Dispatch hit {} cascade rounds; deferred {} tasks to the next dispatch",
                    self.max_rounds,
                    stats.deferred
                );
                break;
            }
            let batch = std::mem::take(&mut self.immediates[tier]);
            stats.rounds += 1;
            for task in batch {
                self.run_task(task, state, &mut stats);
            }
        }

        self.running = None;
        tracing::debug!(
            "Dispatch complete: {} ran, {} failed, {} rounds",
            stats.ran,
            stats.failed,
            stats.rounds
        );
        Ok(stats)
    }

    /// Splits the zero-delay head of `pending` between the buckets and the
    /// next dispatch.
    fn pull_due(&mut self, ceiling: Patience) {
        let mut held = VecDeque::new();
        while self.pending.front().is_some_and(|t| t.delay == 0) {
            let Some(task) = self.pending.pop_front() else {
                break;
            };
            if task.patience < ceiling {
                self.immediates[task.patience.index()].push_back(task);
            } else {
                held.push_back(task);
            }
        }
        while let Some(task) = held.pop_back() {
            self.pending.push_front(task);
        }
    }

    fn most_urgent_bucket(&self) -> Option<usize> {
        self.immediates.iter().position(|bucket| !bucket.is_empty())
    }

    /// Pushes every immediate task back to pending at delay 0.
    fn defer_immediates(&mut self) -> usize {
        let mut deferred = 0;
        for tier in 0..self.immediates.len() {
            let bucket = std::mem::take(&mut self.immediates[tier]);
            deferred += bucket.len();
            for mut task in bucket {
                task.delay = 0;
                self.insert_pending(task);
            }
        }
        deferred
    }

    fn run_task(&mut self, task: Task<S>, state: &mut S, stats: &mut DispatchStats) {
        let Task { func, patience, .. } = task;
        stats.ran += 1;

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| func(self, state)));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                stats.failed += 1;
                tracing::warn!("Task at {:?} failed: {}", patience, e);
            }
            Err(panic) => {
                stats.failed += 1;
                let msg = task::panic_message(panic.as_ref());
                tracing::error!("Task at {:?} panicked: {}", patience, msg);
            }
        }
    }
}

impl<S> Default for TickQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Submit<S> for TickQueue<S> {
    fn submit(&mut self, task: TaskFn<S>, delay: Tick, patience: Patience) -> Result<()> {
        TickQueue::submit(self, task, delay, patience)
    }
}

impl<S> core::fmt::Debug for TickQueue<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TickQueue")
            .field("pending", &self.pending.len())
            .field(
                "immediate",
                &self.immediates.iter().map(VecDeque::len).sum::<usize>(),
            )
            .field("running", &self.running)
            .field("max_rounds", &self.max_rounds)
            .finish()
    }
}
