//! Real-time pacer: drives a [`TickQueue`] from wall-clock time.
//!
//! # Frame loop
//!
//! ```text
//! loop:
//!   next = queue.next_time()          (none → loop exits, pacer idles)
//!   sleep until zero_time + next * tick
//!   zero_time = wake time             (wall clock if the wake was late)
//!   advance(next); dispatch(Max); on_frame(state)
//! ```
//!
//! Everything runs on the current thread inside a `tokio::task::LocalSet`.
//! The loop suspends only between frames (the sleep, or a yield when it is
//! running late); a frame always runs to completion once entered.

use std::cell::{Cell, RefCell};
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use tilesim_core::queue::panic_message;
use tilesim_core::{
    DispatchStats, Patience, Result, SimConfig, SimError, Submit, TaskFn, Tick, TickQueue,
};

/// What happened in one frame, handed to the frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// 1-based frame counter
    pub frame: u64,
    /// Logical ticks since the pacer was created
    pub clock: Tick,
    /// Ticks advanced to reach this frame
    pub advanced: Tick,
    pub stats: DispatchStats,
}

/// Called once per advance + dispatch cycle, typically to render.
pub type FrameFn<S> = Box<dyn FnMut(&S, &FrameInfo) -> Result<()>>;

struct PacerCore<S> {
    queue: TickQueue<S>,
    state: S,
    /// Wall-clock instant of logical "now"
    zero_time: Instant,
    tick: Duration,
    on_frame: Option<FrameFn<S>>,
}

struct Shared<S> {
    core: RefCell<PacerCore<S>>,
    task: RefCell<Option<JoinHandle<()>>>,
    /// Delay the loop is sleeping towards, relative to `zero_time`
    waiting_for: Cell<Option<Tick>>,
    /// Set by `cancel` and by a fatal frame error; cleared by `start`
    stopped: Cell<bool>,
    clock: Cell<Tick>,
    frames: Cell<u64>,
}

/// Handle to a paced simulation. Clones share the same pacer.
pub struct Pacer<S> {
    shared: Rc<Shared<S>>,
}

impl<S> Clone for Pacer<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<S: 'static> Pacer<S> {
    /// Creates an idle pacer owning `state`.
    pub fn new(config: &SimConfig, state: S) -> Result<Self> {
        config.validate()?;
        let tick = config.tick_duration();
        if tick.is_zero() {
            return Err(SimError::InvalidConfig(format!(
                "seconds_per_tick {} is below clock resolution",
                config.seconds_per_tick
            )));
        }

        let core = PacerCore {
            queue: TickQueue::from_config(config),
            state,
            zero_time: Instant::now(),
            tick,
            on_frame: None,
        };
        Ok(Self {
            shared: Rc::new(Shared {
                core: RefCell::new(core),
                task: RefCell::new(None),
                waiting_for: Cell::new(None),
                stopped: Cell::new(false),
                clock: Cell::new(0),
                frames: Cell::new(0),
            }),
        })
    }

    /// Installs the frame callback, replacing any previous one.
    pub fn on_frame<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&S, &FrameInfo) -> Result<()> + 'static,
    {
        let mut core = self.shared.core.try_borrow_mut().map_err(|_| SimError::Reentrant)?;
        core.on_frame = Some(Box::new(f));
        Ok(())
    }

    /// Submits work from outside a dispatch.
    ///
    /// `delay` counts from the caller's "now": the ticks elapsed since the
    /// loop's reference point are added before queueing. When the pacer is
    /// idle the reference point is reset instead.
    ///
    /// Calling this from inside a frame returns `Reentrant` rather than
    /// forwarding to the running queue; tasks already running inside a
    /// frame submit through the queue they are handed.
    ///
    /// Must be called inside a `LocalSet` unless the pacer is stopped.
    pub fn submit(&self, task: TaskFn<S>, delay: Tick, patience: Patience) -> Result<()> {
        if delay < 0 {
            return Err(SimError::InvalidDelay { delay });
        }

        let effective = {
            let mut core = self.shared.core.try_borrow_mut().map_err(|_| SimError::Reentrant)?;
            let now = Instant::now();
            let effective = if core.queue.is_empty() && !self.is_active() {
                core.zero_time = now;
                delay
            } else {
                delay.saturating_add(elapsed_ticks(
                    now.saturating_duration_since(core.zero_time),
                    core.tick,
                ))
            };
            core.queue.submit(task, effective, patience)?;
            effective
        };

        if self.shared.stopped.get() {
            return Ok(());
        }
        let sooner = match self.shared.waiting_for.get() {
            Some(waiting) => effective < waiting,
            None => !self.is_active(),
        };
        if sooner {
            tracing::trace!("Rescheduling frame loop for delay {}", effective);
            self.restart();
        }
        Ok(())
    }

    /// Launches the frame loop if work is pending, clearing a previous
    /// cancel or fatal error.
    pub fn start(&self) -> Result<()> {
        let pending = self
            .shared
            .core
            .try_borrow()
            .map_err(|_| SimError::Reentrant)?
            .queue
            .next_time()
            .is_some();
        self.shared.stopped.set(false);
        if pending && !self.is_active() {
            self.restart();
        }
        Ok(())
    }

    /// Stops the frame loop. Queued work stays queued until `start`.
    pub fn cancel(&self) {
        self.shared.stopped.set(true);
        self.shared.waiting_for.set(None);
        if let Some(handle) = self.shared.task.borrow_mut().take() {
            handle.abort();
        }
        tracing::debug!("Pacer cancelled");
    }

    /// Whether a frame loop task is alive.
    pub fn is_active(&self) -> bool {
        self.shared
            .task
            .borrow()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.get()
    }

    /// Frames run so far.
    pub fn frames(&self) -> u64 {
        self.shared.frames.get()
    }

    /// Logical ticks since creation.
    pub fn clock(&self) -> Tick {
        self.shared.clock.get()
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> Result<usize> {
        let core = self.shared.core.try_borrow().map_err(|_| SimError::Reentrant)?;
        Ok(core.queue.len())
    }

    /// Read access to the state between frames.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> Result<R> {
        let core = self.shared.core.try_borrow().map_err(|_| SimError::Reentrant)?;
        Ok(f(&core.state))
    }

    /// Write access to the state between frames.
    ///
    /// Meant for setup (spawning entities, registering watchers); placement
    /// changes should still go through write operations.
    pub fn with_state_mut<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R> {
        let mut core = self
            .shared
            .core
            .try_borrow_mut()
            .map_err(|_| SimError::Reentrant)?;
        Ok(f(&mut core.state))
    }

    fn restart(&self) {
        if let Some(handle) = self.shared.task.borrow_mut().take() {
            handle.abort();
        }
        self.shared.waiting_for.set(None);
        let handle = tokio::task::spawn_local(run_loop(Rc::clone(&self.shared)));
        *self.shared.task.borrow_mut() = Some(handle);
    }
}

impl<S: 'static> Submit<S> for Pacer<S> {
    fn submit(&mut self, task: TaskFn<S>, delay: Tick, patience: Patience) -> Result<()> {
        Pacer::submit(self, task, delay, patience)
    }
}

impl<S> core::fmt::Debug for Pacer<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pacer")
            .field("waiting_for", &self.shared.waiting_for.get())
            .field("stopped", &self.shared.stopped.get())
            .finish_non_exhaustive()
    }
}

async fn run_loop<S: 'static>(shared: Rc<Shared<S>>) {
    loop {
        let target = {
            let core = shared.core.borrow();
            core.queue
                .next_time()
                .map(|next| (next, deadline(core.zero_time, core.tick, next)))
        };
        let Some((next, deadline)) = target else {
            tracing::debug!("Tick queue drained, pacer idle");
            break;
        };

        shared.waiting_for.set(Some(next));
        let wake = if Instant::now() >= deadline {
            // Late frames still give the LocalSet a turn, so cancel can run
            tokio::task::yield_now().await;
            Instant::now()
        } else {
            tokio::time::sleep_until(deadline).await;
            deadline
        };
        shared.waiting_for.set(None);

        if let Err(e) = run_frame(&shared, next, wake) {
            tracing::error!("Frame failed, stopping pacer: {}", e);
            shared.stopped.set(true);
            break;
        }
    }
    shared.waiting_for.set(None);
}

fn run_frame<S>(shared: &Shared<S>, next: Tick, wake: Instant) -> Result<()> {
    let mut guard = shared.core.try_borrow_mut().map_err(|_| SimError::Reentrant)?;
    let core = &mut *guard;

    core.zero_time = wake;
    core.queue.advance(next)?;
    shared.clock.set(shared.clock.get() + next);
    let stats = core.queue.dispatch(&mut core.state, Patience::Max)?;
    shared.frames.set(shared.frames.get() + 1);

    let info = FrameInfo {
        frame: shared.frames.get(),
        clock: shared.clock.get(),
        advanced: next,
        stats,
    };
    tracing::trace!("Frame {} at tick {}: {:?}", info.frame, info.clock, info.stats);

    let Some(on_frame) = core.on_frame.as_mut() else {
        return Ok(());
    };
    let state = &core.state;
    match std::panic::catch_unwind(AssertUnwindSafe(|| on_frame(state, &info))) {
        Ok(result) => result,
        Err(panic) => Err(SimError::TaskPanic(panic_message(panic.as_ref()))),
    }
}

/// Wall-clock instant of logical tick `ticks` after `zero_time`.
fn deadline(zero_time: Instant, tick: Duration, ticks: Tick) -> Instant {
    u32::try_from(ticks)
        .ok()
        .and_then(|n| tick.checked_mul(n))
        .and_then(|span| zero_time.checked_add(span))
        .unwrap_or_else(far_future)
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365 * 30)
}

/// Whole ticks contained in `elapsed`.
fn elapsed_ticks(elapsed: Duration, tick: Duration) -> Tick {
    let ticks = elapsed.as_nanos() / tick.as_nanos().max(1);
    Tick::try_from(ticks).unwrap_or(Tick::MAX)
}
