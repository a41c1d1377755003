//! Scheduled task representation.

use std::any::Any;

use crate::error::Result;
use crate::patience::Patience;

use super::{Tick, TickQueue};

/// Body of a scheduled task.
///
/// Tasks receive the queue that is dispatching them, so follow-up work is
/// submitted straight into the running cascade, and the shared state `S`.
pub type TaskFn<S> = Box<dyn FnOnce(&mut TickQueue<S>, &mut S) -> Result<()>>;

/// A unit of deferred work owned by a [`TickQueue`].
pub struct Task<S> {
    pub(crate) func: TaskFn<S>,
    /// Remaining logical delay, relative to the queue's "now"
    pub(crate) delay: Tick,
    pub(crate) patience: Patience,
}

impl<S> Task<S> {
    pub(crate) fn new(func: TaskFn<S>, delay: Tick, patience: Patience) -> Self {
        Self {
            func,
            delay,
            patience,
        }
    }

    /// Remaining logical delay.
    pub fn delay(&self) -> Tick {
        self.delay
    }

    /// Tier the task runs at.
    pub fn patience(&self) -> Patience {
        self.patience
    }
}

impl<S> core::fmt::Debug for Task<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Task")
            .field("delay", &self.delay)
            .field("patience", &self.patience)
            .finish_non_exhaustive()
    }
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
