//! Deterministic tick scheduling and optimistic claims for a shared tile board.
//!
//! Provides the patience-tiered tick queue, the board arena, write
//! operations, tile claims, outcome aggregation and single-flight guards.

pub mod board;
pub mod claim;
pub mod config;
pub mod error;
pub mod guard;
pub mod ops;
pub mod patience;
pub mod queue;

pub use board::{Board, BoardAccess, EntityId, EntityKind, Pos};
pub use claim::{Claim, ClaimHandle, ClaimStatus, Outcome, OutcomeAggregator};
pub use config::SimConfig;
pub use error::{Result, SimError};
pub use guard::SingleFlight;
pub use ops::WriteOp;
pub use patience::Patience;
pub use queue::{DispatchStats, Submit, TaskFn, Tick, TickQueue};
