//! Priority tiers ("patience") for scheduled work.
//!
//! Lower patience is more urgent. While a dispatch is running under a
//! ceiling, zero-delay work strictly below the ceiling joins the running
//! cascade; anything at or above it waits for the next dispatch.

use serde::{Deserialize, Serialize};

/// Closed, ordered set of scheduling tiers, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Patience {
    /// Claim placement and resolution
    No,
    /// Post-action bookkeeping (round-completion checks and the like)
    Act,
    /// State-mutating write operations and settlements
    Write,
    /// Slow, low-priority follow-up work
    Slow,
    /// Outermost tier. Only used as a dispatch ceiling, never as a task tier.
    Max,
}

impl Patience {
    /// Every tier in urgency order.
    pub const ALL: [Patience; 5] = [
        Patience::No,
        Patience::Act,
        Patience::Write,
        Patience::Slow,
        Patience::Max,
    ];

    /// Tier that state-affecting work (writes, settlements) runs at.
    pub const AFFECT: Patience = Patience::Write;

    /// Bucket index of this tier.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether tasks may be submitted at this tier.
    pub const fn holds_tasks(self) -> bool {
        !matches!(self, Patience::Max)
    }
}
