//! Per-actor outcome aggregation with a single pending settlement.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;
use crate::patience::Patience;
use crate::queue::Submit;

/// Result of one claim, as seen by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
}

#[derive(Debug, Default)]
struct Tally {
    wins: u32,
    losses: u32,
    penalty: u64,
    scheduled: bool,
    settlements: u64,
}

/// Coalesces win/loss reports into one settlement per batch of signals.
///
/// Clones share the same counters, so every claim of an actor can report
/// into one aggregator.
#[derive(Debug, Clone, Default)]
pub struct OutcomeAggregator {
    tally: Rc<RefCell<Tally>>,
}

impl OutcomeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts an outcome and schedules a settlement at the affecting tier
    /// unless one is already in flight.
    pub fn report<S, Q>(&self, queue: &mut Q, outcome: Outcome) -> Result<()>
    where
        S: 'static,
        Q: Submit<S> + ?Sized,
    {
        let needs_settlement = {
            let mut tally = self.tally.borrow_mut();
            match outcome {
                Outcome::Win => tally.wins += 1,
                Outcome::Loss => tally.losses += 1,
            }
            !std::mem::replace(&mut tally.scheduled, true)
        };
        if !needs_settlement {
            return Ok(());
        }

        let aggregator = self.clone();
        let submitted = queue.schedule(
            move |_queue, _state: &mut S| {
                aggregator.settle();
                Ok(())
            },
            0,
            Patience::AFFECT,
        );
        if submitted.is_err() {
            self.tally.borrow_mut().scheduled = false;
        }
        submitted
    }

    fn settle(&self) {
        let mut tally = self.tally.borrow_mut();
        if tally.wins > 0 {
            tally.penalty = 0;
        } else {
            tally.penalty += u64::from(tally.losses);
        }
        tally.wins = 0;
        tally.losses = 0;
        tally.scheduled = false;
        tally.settlements += 1;
    }

    /// Accrued penalty as of the last settlement.
    pub fn penalty(&self) -> u64 {
        self.tally.borrow().penalty
    }

    /// Wins reported since the last settlement.
    pub fn wins(&self) -> u32 {
        self.tally.borrow().wins
    }

    /// Losses reported since the last settlement.
    pub fn losses(&self) -> u32 {
        self.tally.borrow().losses
    }

    pub fn is_scheduled(&self) -> bool {
        self.tally.borrow().scheduled
    }

    /// Number of settlements run so far.
    pub fn settlements(&self) -> u64 {
        self.tally.borrow().settlements
    }
}
