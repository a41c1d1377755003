//! Write operations: the only path that mutates board placement.

use crate::board::{BoardAccess, EntityId, Pos};
use crate::error::Result;
use crate::patience::Patience;
use crate::queue::Submit;

/// A deferred mutation of entity placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Relocate an entity. `None` takes it off the board without tearing it down.
    Move { entity: EntityId, to: Option<Pos> },
    /// Take an entity off the board and drop it.
    Destroy { entity: EntityId },
    /// Children applied strictly in order. No rollback.
    Compound(Vec<WriteOp>),
}

impl WriteOp {
    pub fn move_to(entity: EntityId, to: Pos) -> Self {
        WriteOp::Move {
            entity,
            to: Some(to),
        }
    }

    pub fn lift(entity: EntityId) -> Self {
        WriteOp::Move { entity, to: None }
    }

    pub fn destroy(entity: EntityId) -> Self {
        WriteOp::Destroy { entity }
    }

    /// Runs `self`, then `next`.
    pub fn then(self, next: WriteOp) -> Self {
        match self {
            WriteOp::Compound(mut ops) => {
                ops.push(next);
                WriteOp::Compound(ops)
            }
            op => WriteOp::Compound(vec![op, next]),
        }
    }

    /// Applies the mutation to the board.
    ///
    /// A compound stops at the first failing child; children already
    /// applied stay applied.
    pub fn apply<S: BoardAccess>(&self, state: &mut S) -> Result<()> {
        match self {
            WriteOp::Move { entity, to } => state.board_mut().relocate(*entity, *to),
            WriteOp::Destroy { entity } => state.board_mut().teardown(*entity),
            WriteOp::Compound(ops) => {
                for op in ops {
                    op.apply(state)?;
                }
                Ok(())
            }
        }
    }

    /// Submits `apply` at delay zero and `tier`.
    pub fn sched<S, Q>(self, queue: &mut Q, tier: Patience) -> Result<()>
    where
        S: BoardAccess + 'static,
        Q: Submit<S> + ?Sized,
    {
        queue.schedule(move |_queue, state: &mut S| self.apply(state), 0, tier)
    }
}
