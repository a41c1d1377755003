//! Single-flight rescheduling guard.

use std::cell::Cell;
use std::rc::Rc;

use crate::board::{BoardAccess, EntityId};
use crate::error::Result;
use crate::patience::Patience;
use crate::queue::{Submit, Tick, TickQueue};

/// Keeps at most one live scheduled closure per owner.
///
/// Every [`issue`](Self::issue) bumps a generation counter; a scheduled
/// closure only runs if its generation is still current and the owner is
/// still on the board. Clones share the counter.
#[derive(Debug, Clone)]
pub struct SingleFlight {
    owner: EntityId,
    generation: Rc<Cell<u64>>,
}

impl SingleFlight {
    pub fn new(owner: EntityId) -> Self {
        Self {
            owner,
            generation: Rc::new(Cell::new(0)),
        }
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Generation of the most recently issued closure.
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Supersedes any outstanding closure and schedules `f` in its place.
    pub fn issue<S, Q, F>(&self, queue: &mut Q, f: F, delay: Tick, tier: Patience) -> Result<()>
    where
        S: BoardAccess + 'static,
        Q: Submit<S> + ?Sized,
        F: FnOnce(&mut TickQueue<S>, &mut S) -> Result<()> + 'static,
    {
        let ticket = self.bump();
        let generation = Rc::clone(&self.generation);
        let owner = self.owner;

        queue.schedule(
            move |queue, state: &mut S| {
                if generation.get() != ticket {
                    tracing::trace!("Superseded closure for {} skipped", owner);
                    return Ok(());
                }
                if !state.board().is_live(owner) {
                    tracing::trace!("Closure for torn-down {} skipped", owner);
                    return Ok(());
                }
                f(queue, state)
            },
            delay,
            tier,
        )
    }

    /// Supersedes any outstanding closure without issuing a new one.
    pub fn disarm(&self) {
        self.bump();
    }

    fn bump(&self) -> u64 {
        let next = self.generation.get() + 1;
        self.generation.set(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, EntityKind};
    use crate::ops::WriteOp;

    fn count_into(counter: &Rc<Cell<u32>>) -> impl FnOnce(&mut TickQueue<Board>, &mut Board) -> Result<()> {
        let counter = Rc::clone(counter);
        move |_queue, _board| {
            counter.set(counter.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_disarm_leaves_nothing_runnable() {
        let mut queue = TickQueue::<Board>::new();
        let mut board = Board::new();
        let owner = board.spawn(EntityKind::Actor("a".to_string()));
        let guard = SingleFlight::new(owner);
        let ran = Rc::new(Cell::new(0));

        guard
            .issue(&mut queue, count_into(&ran), 2, Patience::Slow)
            .unwrap();
        guard.disarm();

        queue.advance(2).unwrap();
        queue.dispatch(&mut board, Patience::Max).unwrap();
        assert_eq!(ran.get(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_torn_down_owner_skips_closure() {
        let mut queue = TickQueue::<Board>::new();
        let mut board = Board::new();
        let owner = board.spawn(EntityKind::Actor("a".to_string()));
        let guard = SingleFlight::new(owner);
        let ran = Rc::new(Cell::new(0));

        guard
            .issue(&mut queue, count_into(&ran), 0, Patience::Act)
            .unwrap();
        WriteOp::destroy(owner).apply(&mut board).unwrap();

        queue.dispatch(&mut board, Patience::Max).unwrap();
        assert_eq!(ran.get(), 0);
    }
}
