//! Gardening scenario: gardeners seated around the origin race to plant
//! on shared tiles.
//!
//! Each gardener rotates through the six hex directions, claiming one tile
//! per attempt. A won claim plants a seed that grows on a timer; a lost
//! claim throws the provisional seed away and adds to the gardener's
//! frustration, which stretches the wait before the next attempt.

use std::cell::Cell;
use std::rc::Rc;

use serde::Serialize;

use tilesim_core::{
    Board, BoardAccess, Claim, EntityId, EntityKind, OutcomeAggregator, Patience, Pos, Result,
    SingleFlight, Submit, Tick, TickQueue, WriteOp,
};

/// Growth stages, in order.
const STAGES: [&str; 3] = ["seed", "sprout", "bloom"];

/// Frustration beyond this stops stretching the retry delay.
const MAX_BACKOFF: u64 = 8;

/// Scenario timings, in ticks.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub retry: Tick,
    pub grow: Tick,
}

/// Shared simulation state.
#[derive(Default)]
pub struct Garden {
    pub board: Board,
    pub gardeners: Vec<Rc<Gardener>>,
}

impl BoardAccess for Garden {
    fn board(&self) -> &Board {
        &self.board
    }

    fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }
}

/// One actor and its scheduling handles.
pub struct Gardener {
    pub name: String,
    pub id: EntityId,
    pub home: Pos,
    seat: usize,
    attempts: Cell<u64>,
    planted: Cell<u32>,
    frustration: OutcomeAggregator,
    retry: SingleFlight,
    timings: Timings,
}

#[derive(Debug, Serialize)]
pub struct GardenerSummary {
    pub name: String,
    pub attempts: u64,
    pub planted: u32,
    pub frustration: u64,
}

impl Gardener {
    pub fn summary(&self) -> GardenerSummary {
        GardenerSummary {
            name: self.name.clone(),
            attempts: self.attempts.get(),
            planted: self.planted.get(),
            frustration: self.frustration.penalty(),
        }
    }

    /// Next tile to try: rotate through the directions, alternating reach.
    ///
    /// Adjacent seats start half a turn apart, which lines their shared
    /// tiles up on the same attempt.
    fn next_target(&self) -> Pos {
        let n = self.attempts.get();
        self.attempts.set(n + 1);
        let dir = ((n + 3 * self.seat as u64) % 6) as usize;
        let reach = 1 + ((n / 6) % 2) as i32;
        self.home.add(Pos::UNITS[dir].scale(reach))
    }

    fn retry_delay(&self) -> Tick {
        let backoff = self.frustration.penalty().min(MAX_BACKOFF) as Tick;
        self.timings.retry * (1 + backoff)
    }
}

/// Spawns `count` gardeners on rings around the origin.
///
/// Neighbouring seats are two tiles apart, so their reach overlaps and
/// their claims contend.
pub fn seat(garden: &mut Garden, count: usize, timings: Timings) -> Vec<Rc<Gardener>> {
    for i in 0..count {
        let ring = 2 * (1 + (i / 6) as i32);
        let home = Pos::ORIGIN.add(Pos::UNITS[i % 6].scale(ring));
        let name = format!("gardener-{}", i);
        let id = garden.board.spawn(EntityKind::Actor(name.clone()));
        garden.gardeners.push(Rc::new(Gardener {
            name,
            id,
            home,
            seat: i,
            attempts: Cell::new(0),
            planted: Cell::new(0),
            frustration: OutcomeAggregator::new(),
            retry: SingleFlight::new(id),
            timings,
        }));
    }
    garden.gardeners.clone()
}

/// Places a gardener at home and arms its first attempt.
pub fn arrive<Q>(gardener: &Rc<Gardener>, scheduler: &mut Q, stagger: Tick) -> Result<()>
where
    Q: Submit<Garden>,
{
    WriteOp::move_to(gardener.id, gardener.home).sched(scheduler, Patience::Write)?;
    let next = Rc::clone(gardener);
    gardener.retry.issue(
        scheduler,
        move |queue, garden| attempt(next, queue, garden),
        gardener.timings.retry + stagger,
        Patience::Act,
    )
}

fn attempt(gardener: Rc<Gardener>, queue: &mut TickQueue<Garden>, garden: &mut Garden) -> Result<()> {
    let target = gardener.next_target();
    if garden.board.contents(target).next().is_some() {
        return rearm(gardener, queue);
    }

    let seed = garden
        .board
        .spawn(EntityKind::Sprite(STAGES[0].to_string()));
    let owner = Rc::clone(&gardener);
    Claim::new(target, WriteOp::move_to(seed, target))
        .reporting_to(&gardener.frustration)
        .on_resolve(move |queue, _garden: &mut Garden, won| {
            if won {
                owner.planted.set(owner.planted.get() + 1);
                schedule_growth(queue, seed, target, 1, owner.timings.grow)?;
            } else {
                WriteOp::destroy(seed).sched(queue, Patience::Write)?;
            }
            // Slow runs after the Write-tier settlement, so the retry sees
            // this round's frustration
            queue.schedule(move |queue, _garden| rearm(owner, queue), 0, Patience::Slow)
        })
        .sched(queue, Patience::No)?;
    Ok(())
}

fn rearm(gardener: Rc<Gardener>, queue: &mut TickQueue<Garden>) -> Result<()> {
    let delay = gardener.retry_delay();
    let next = Rc::clone(&gardener);
    gardener.retry.issue(
        queue,
        move |queue, garden| attempt(next, queue, garden),
        delay,
        Patience::Act,
    )
}

/// Replaces the plant at `pos` with the next stage after `delay` ticks.
fn schedule_growth(
    queue: &mut TickQueue<Garden>,
    plant: EntityId,
    pos: Pos,
    stage: usize,
    delay: Tick,
) -> Result<()> {
    let Some(name) = STAGES.get(stage).copied() else {
        return Ok(());
    };
    queue.schedule(
        move |queue, garden: &mut Garden| {
            if !garden.board.is_live(plant) {
                return Ok(());
            }
            let grown = garden.board.spawn(EntityKind::Sprite(name.to_string()));
            WriteOp::destroy(plant)
                .then(WriteOp::move_to(grown, pos))
                .apply(garden)?;
            schedule_growth(queue, grown, pos, stage + 1, delay)
        },
        delay,
        Patience::Write,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timings() -> Timings {
        Timings { retry: 2, grow: 3 }
    }

    fn run_until_quiet(queue: &mut TickQueue<Garden>, garden: &mut Garden, ticks: Tick) {
        let mut clock = 0;
        while let Some(next) = queue.next_time() {
            if clock + next > ticks {
                break;
            }
            queue.advance(next).unwrap();
            clock += next;
            queue.dispatch(garden, Patience::Max).unwrap();
        }
    }

    #[test]
    fn test_lone_gardener_plants_and_grows() {
        let mut queue = TickQueue::new();
        let mut garden = Garden::default();
        let gardeners = seat(&mut garden, 1, timings());
        arrive(&gardeners[0], &mut queue, 0).unwrap();

        run_until_quiet(&mut queue, &mut garden, 40);

        let summary = gardeners[0].summary();
        assert!(summary.planted > 0);
        assert_eq!(summary.frustration, 0);
        assert!(garden
            .board
            .render()
            .iter()
            .any(|tile| tile.sprites.iter().any(|s| s == "bloom")));
        assert_eq!(garden.board.pos(gardeners[0].id), Some(gardeners[0].home));
    }

    #[test]
    fn test_neighbours_contend_for_shared_tiles() {
        let mut queue = TickQueue::new();
        let mut garden = Garden::default();
        let gardeners = seat(&mut garden, 6, timings());
        for gardener in &gardeners {
            arrive(gardener, &mut queue, 0).unwrap();
        }

        run_until_quiet(&mut queue, &mut garden, 60);

        // Every tile holds at most one plant
        for tile in garden.board.render() {
            assert_eq!(tile.sprites.len(), 1, "tile {}", tile.pos);
        }
        let total: u32 = gardeners.iter().map(|g| g.summary().planted).sum();
        assert!(total > 0);
    }
}
