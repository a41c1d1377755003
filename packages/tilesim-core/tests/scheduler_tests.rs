//! Tick queue integration tests.
//!
//! Tier gating across dispatches, logical time, and runaway cascades.

use ntest::timeout;

use tilesim_core::{Patience, SimConfig, SimError, Submit, TickQueue};

#[derive(Default)]
struct Trace {
    events: Vec<String>,
}

impl Trace {
    fn log(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }
}

fn mark(name: &'static str) -> impl FnOnce(&mut TickQueue<Trace>, &mut Trace) -> tilesim_core::Result<()> {
    move |_queue, trace| {
        trace.log(name);
        Ok(())
    }
}

#[timeout(1000)]
#[test]
fn test_delay_three_write_task_runs_exactly_once() {
    let mut queue = TickQueue::<Trace>::new();
    let mut trace = Trace::default();
    queue.schedule(mark("grow"), 3, Patience::Write).unwrap();

    queue.advance(3).unwrap();
    queue.dispatch(&mut trace, Patience::Max).unwrap();
    queue.dispatch(&mut trace, Patience::Max).unwrap();

    assert_eq!(trace.events, vec!["grow"]);
}

#[timeout(1000)]
#[test]
fn test_tier_gating_inside_write_dispatch() {
    for tier in [Patience::No, Patience::Act, Patience::Write, Patience::Slow] {
        let mut queue = TickQueue::<Trace>::new();
        let mut trace = Trace::default();

        queue
            .schedule(
                move |queue, trace: &mut Trace| {
                    trace.log("outer");
                    queue.schedule(mark("inner"), 0, tier)
                },
                0,
                Patience::No,
            )
            .unwrap();

        queue.dispatch(&mut trace, Patience::Write).unwrap();
        let joined = trace.events.len() == 2;
        assert_eq!(joined, tier < Patience::Write, "tier {:?}", tier);

        queue.dispatch(&mut trace, Patience::Max).unwrap();
        assert_eq!(trace.events, vec!["outer", "inner"], "tier {:?}", tier);
    }
}

#[timeout(1000)]
#[test]
fn test_stricter_work_completes_before_affecting_work() {
    let mut queue = TickQueue::<Trace>::new();
    let mut trace = Trace::default();

    // Two actors act in the same instant; each schedules a check and a write
    for actor in ["red", "blue"] {
        queue
            .schedule(
                move |queue, trace: &mut Trace| {
                    trace.log(format!("{actor} acts"));
                    queue.schedule(
                        move |_q, trace: &mut Trace| {
                            trace.log(format!("{actor} writes"));
                            Ok(())
                        },
                        0,
                        Patience::Write,
                    )?;
                    queue.schedule(
                        move |_q, trace: &mut Trace| {
                            trace.log(format!("{actor} checks"));
                            Ok(())
                        },
                        0,
                        Patience::No,
                    )
                },
                0,
                Patience::Act,
            )
            .unwrap();
    }

    queue.dispatch(&mut trace, Patience::Max).unwrap();
    assert_eq!(
        trace.events,
        vec![
            "red acts",
            "blue acts",
            "red checks",
            "blue checks",
            "red writes",
            "blue writes"
        ]
    );
}

#[timeout(1000)]
#[test]
fn test_stepping_through_logical_time() {
    let mut queue = TickQueue::<Trace>::new();
    let mut trace = Trace::default();

    queue.schedule(mark("t5"), 5, Patience::Slow).unwrap();
    queue.schedule(mark("t2"), 2, Patience::Write).unwrap();
    queue
        .schedule(
            |queue, trace: &mut Trace| {
                trace.log("t1");
                queue.schedule(mark("t1+3"), 3, Patience::Write)
            },
            1,
            Patience::Act,
        )
        .unwrap();

    let mut clock = 0;
    let mut at = Vec::new();
    while let Some(next) = queue.next_time() {
        queue.advance(next).unwrap();
        clock += next;
        let before = trace.events.len();
        queue.dispatch(&mut trace, Patience::Max).unwrap();
        for event in &trace.events[before..] {
            at.push((clock, event.clone()));
        }
    }

    assert_eq!(
        at,
        vec![
            (1, "t1".to_string()),
            (2, "t2".to_string()),
            (4, "t1+3".to_string()),
            (5, "t5".to_string()),
        ]
    );
}

#[timeout(1000)]
#[test]
fn test_config_round_limit_bounds_self_rescheduling() {
    fn echo(queue: &mut TickQueue<Trace>, trace: &mut Trace) -> tilesim_core::Result<()> {
        trace.log("echo");
        queue.submit(Box::new(echo), 0, Patience::Act)
    }

    let config = SimConfig {
        max_cascade_rounds: 5,
        ..Default::default()
    };
    config.validate().unwrap();

    let mut queue = TickQueue::<Trace>::from_config(&config);
    let mut trace = Trace::default();
    queue.submit(Box::new(echo), 0, Patience::Act).unwrap();

    let stats = queue.dispatch(&mut trace, Patience::Max).unwrap();
    assert_eq!(stats.rounds, 5);
    assert_eq!(stats.deferred, 1);
    assert_eq!(trace.events.len(), 5);
    assert_eq!(queue.len(), 1);
}

#[timeout(1000)]
#[test]
fn test_invalid_submissions_leave_queue_untouched() {
    let mut queue = TickQueue::<Trace>::new();

    assert!(matches!(
        queue.schedule(mark("x"), -3, Patience::No),
        Err(SimError::InvalidDelay { delay: -3 })
    ));
    assert!(matches!(
        queue.schedule(mark("x"), 0, Patience::Max),
        Err(SimError::CeilingTier { .. })
    ));
    assert!(queue.is_empty());
    assert_eq!(queue.next_time(), None);
}
