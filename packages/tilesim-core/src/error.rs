//! Simulation error types.

use thiserror::Error;

use crate::board::EntityId;
use crate::patience::Patience;
use crate::queue::Tick;

/// Scheduler, board and task errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Negative delay requested on submit
    #[error("Delay cannot be negative (got {delay})")]
    InvalidDelay { delay: Tick },

    /// Negative advance of logical time
    #[error("Cannot advance logical time by negative amount {by}")]
    NegativeAdvance { by: Tick },

    /// Advance past the earliest pending task
    #[error("Cannot advance by {by}: next pending task is due in {next}")]
    OverAdvance { by: Tick, next: Tick },

    /// Pending task found with a negative remaining delay
    #[error("Negative remaining delay on a pending task")]
    NegativePendingDelay,

    /// Task submitted at a ceiling-only tier
    #[error("Patience {patience:?} is a dispatch ceiling and cannot hold tasks")]
    CeilingTier { patience: Patience },

    /// Entity missing from the board (never existed or torn down)
    #[error("Entity {0} not found")]
    EntityNotFound(EntityId),

    /// Failure raised by a task body
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// Task panicked while running
    #[error("Task panic: {0}")]
    TaskPanic(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Dispatch or pacer entry point called from inside a running dispatch
    #[error("Re-entrant call while a dispatch or frame is in progress")]
    Reentrant,
}

/// Result type for simulation operations
pub type Result<T> = std::result::Result<T, SimError>;
