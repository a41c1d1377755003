//! Optimistic tile claims.
//!
//! A claim places an invisible token on its target tile, then resolves one
//! cascade round later. Tokens that share a tile invalidate each other, so
//! contenders placed in the same round all lose and nobody wins by order.
//!
//! ```text
//! round r   (tier of caller)   run      → token placed, rivals invalidated
//! round r+1 (Patience::No)     resolve  → token torn down
//!                                         won  → wrapped WriteOp applied
//!                                         any  → aggregator, on_resolve
//! ```

mod aggregator;

use std::cell::Cell;
use std::rc::Rc;

use crate::board::{BoardAccess, EntityId, Pos};
use crate::error::Result;
use crate::ops::WriteOp;
use crate::patience::Patience;
use crate::queue::{Submit, TickQueue};

pub use aggregator::{Outcome, OutcomeAggregator};

/// Callback run inside the resolving cascade with the claim's outcome.
pub type ResolveFn<S> = Box<dyn FnOnce(&mut TickQueue<S>, &mut S, bool) -> Result<()>>;

/// Lifecycle of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimStatus {
    /// Not resolved yet
    #[default]
    Pending,
    Won,
    Lost,
}

/// Read-only view of a claim's outcome, usable after the claim has been
/// handed to the scheduler.
#[derive(Debug, Clone)]
pub struct ClaimHandle {
    status: Rc<Cell<ClaimStatus>>,
}

impl ClaimHandle {
    pub fn status(&self) -> ClaimStatus {
        self.status.get()
    }

    /// `None` until resolved.
    pub fn success(&self) -> Option<bool> {
        match self.status.get() {
            ClaimStatus::Pending => None,
            ClaimStatus::Won => Some(true),
            ClaimStatus::Lost => Some(false),
        }
    }
}

/// Contention-checked write on one tile.
pub struct Claim<S> {
    target: Pos,
    op: WriteOp,
    on_resolve: Option<ResolveFn<S>>,
    aggregator: Option<OutcomeAggregator>,
    status: Rc<Cell<ClaimStatus>>,
}

impl<S: BoardAccess + 'static> Claim<S> {
    /// Creates a claim on `target` that applies `op` if it wins.
    /// Touches no state.
    pub fn new(target: Pos, op: WriteOp) -> Self {
        Self {
            target,
            op,
            on_resolve: None,
            aggregator: None,
            status: Rc::new(Cell::new(ClaimStatus::Pending)),
        }
    }

    /// Runs `f` with the outcome right after resolution.
    pub fn on_resolve<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut TickQueue<S>, &mut S, bool) -> Result<()> + 'static,
    {
        self.on_resolve = Some(Box::new(f));
        self
    }

    /// Reports the outcome to `aggregator`.
    pub fn reporting_to(mut self, aggregator: &OutcomeAggregator) -> Self {
        self.aggregator = Some(aggregator.clone());
        self
    }

    pub fn target(&self) -> Pos {
        self.target
    }

    pub fn handle(&self) -> ClaimHandle {
        ClaimHandle {
            status: Rc::clone(&self.status),
        }
    }

    /// Submits `run` at delay zero and `tier`.
    pub fn sched<Q>(self, queue: &mut Q, tier: Patience) -> Result<ClaimHandle>
    where
        Q: Submit<S> + ?Sized,
    {
        let handle = self.handle();
        queue.schedule(move |queue, state| self.run(queue, state), 0, tier)?;
        Ok(handle)
    }

    /// Places the token and schedules resolution for the next round.
    pub fn run(self, queue: &mut TickQueue<S>, state: &mut S) -> Result<()> {
        let token = state.board_mut().place_claim_token(self.target);
        queue.schedule(
            move |queue, state| self.resolve(token, queue, state),
            0,
            Patience::No,
        )
    }

    fn resolve(self, token: EntityId, queue: &mut TickQueue<S>, state: &mut S) -> Result<()> {
        let won = state.board().token_valid(token).unwrap_or(false);
        state.board_mut().teardown(token)?;

        self.status
            .set(if won { ClaimStatus::Won } else { ClaimStatus::Lost });
        tracing::debug!(
            "Claim on {} {}",
            self.target,
            if won { "won" } else { "lost" }
        );

        let applied = if won { self.op.apply(state) } else { Ok(()) };

        if let Some(aggregator) = &self.aggregator {
            let outcome = if won { Outcome::Win } else { Outcome::Loss };
            aggregator.report(queue, outcome)?;
        }
        if let Some(callback) = self.on_resolve {
            callback(queue, state, won)?;
        }
        applied
    }
}

impl<S> core::fmt::Debug for Claim<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Claim")
            .field("target", &self.target)
            .field("op", &self.op)
            .field("status", &self.status.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, EntityKind};

    #[test]
    fn test_claim_resolves_one_round_after_placement() {
        let mut queue = TickQueue::<Board>::new();
        let mut board = Board::new();
        let target = Pos::new(1, -1);
        let seed = board.spawn(EntityKind::Sprite("seed".to_string()));
        let seen_token = Rc::new(Cell::new(false));

        let claim = Claim::new(target, WriteOp::move_to(seed, target));
        let handle = claim.handle();
        let probe = Rc::clone(&seen_token);
        queue
            .schedule(
                move |queue, board: &mut Board| {
                    claim.run(queue, board)?;
                    // Same round: token placed, not yet resolved
                    probe.set(board.claim_tokens(target).count() == 1);
                    Ok(())
                },
                0,
                Patience::No,
            )
            .unwrap();

        let stats = queue.dispatch(&mut board, Patience::Max).unwrap();
        assert!(seen_token.get());
        assert_eq!(stats.rounds, 2);
        assert_eq!(handle.success(), Some(true));
        assert_eq!(board.claim_tokens(target).count(), 0);
        assert_eq!(board.pos(seed), Some(target));
    }

    #[test]
    fn test_handle_is_pending_until_resolved() {
        let mut queue = TickQueue::<Board>::new();
        let mut board = Board::new();
        let id = board.spawn(EntityKind::Sprite("x".to_string()));

        let handle = Claim::new(Pos::ORIGIN, WriteOp::move_to(id, Pos::ORIGIN))
            .sched(&mut queue, Patience::No)
            .unwrap();
        assert_eq!(handle.status(), ClaimStatus::Pending);
        assert_eq!(handle.success(), None);

        queue.dispatch(&mut board, Patience::Max).unwrap();
        assert_eq!(handle.status(), ClaimStatus::Won);
    }
}
