//! Headless gardening simulation.
//!
//! Seats gardeners around a shared hex board, runs the pacer for a fixed
//! wall-clock span and logs a JSON summary every few frames.

mod garden;

use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tokio::task::LocalSet;

use garden::{Garden, GardenerSummary, Timings};
use tilesim_core::{SimConfig, Tick};
use tilesim_runtime::{FrameInfo, Pacer};

/// Command-line arguments for the demo.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Wall-clock seconds per logical tick
    #[arg(long, default_value_t = 0.01)]
    seconds_per_tick: f64,

    /// Immediate batches per dispatch before leftover work is deferred
    #[arg(long, default_value_t = 10_000)]
    max_cascade_rounds: usize,

    /// Number of gardeners
    #[arg(short, long, default_value_t = 6)]
    gardeners: usize,

    /// Base ticks between planting attempts
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(i64).range(1..))]
    retry_ticks: i64,

    /// Ticks between growth stages
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(i64).range(1..))]
    grow_ticks: i64,

    /// Log a summary every N frames
    #[arg(long, default_value_t = 10)]
    log_every: u64,

    /// How long to run, in milliseconds
    #[arg(long, default_value_t = 3000)]
    run_ms: u64,
}

#[derive(Serialize)]
struct FrameSummary {
    frame: u64,
    clock: Tick,
    ran: usize,
    failed: usize,
    tiles: usize,
    gardeners: Vec<GardenerSummary>,
}

impl FrameSummary {
    fn new(garden: &Garden, info: &FrameInfo) -> Self {
        Self {
            frame: info.frame,
            clock: info.clock,
            ran: info.stats.ran,
            failed: info.stats.failed,
            tiles: garden.board.render().len(),
            gardeners: garden.gardeners.iter().map(|g| g.summary()).collect(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt::init();

    let config = SimConfig {
        seconds_per_tick: args.seconds_per_tick,
        max_cascade_rounds: args.max_cascade_rounds,
    };
    config.validate()?;

    LocalSet::new().run_until(run(args, config)).await
}

async fn run(args: Args, config: SimConfig) -> anyhow::Result<()> {
    let timings = Timings {
        retry: args.retry_ticks,
        grow: args.grow_ticks,
    };
    let mut pacer = Pacer::new(&config, Garden::default())?;
    let gardeners = pacer.with_state_mut(|garden| garden::seat(garden, args.gardeners, timings))?;

    let log_every = args.log_every.max(1);
    pacer.on_frame(move |garden: &Garden, info| {
        if info.frame % log_every == 0 {
            match serde_json::to_string(&FrameSummary::new(garden, info)) {
                Ok(json) => tracing::info!("{}", json),
                Err(e) => tracing::warn!("Failed to encode frame summary: {}", e),
            }
        }
        Ok(())
    })?;

    for (i, gardener) in gardeners.iter().enumerate() {
        garden::arrive(gardener, &mut pacer, i as Tick)?;
    }
    tracing::info!(
        "Running {} gardeners for {} ms at {} s/tick",
        gardeners.len(),
        args.run_ms,
        config.seconds_per_tick
    );

    tokio::time::sleep(Duration::from_millis(args.run_ms)).await;
    pacer.cancel();

    let (board, summaries) = pacer.with_state(|garden| {
        let board = serde_json::to_string(&garden.board.render());
        let summaries: Vec<GardenerSummary> = garden.gardeners.iter().map(|g| g.summary()).collect();
        (board, summaries)
    })?;
    tracing::info!(
        "Stopped after {} frames, {} ticks",
        pacer.frames(),
        pacer.clock()
    );
    tracing::info!("Final board: {}", board?);
    tracing::info!("Gardeners: {}", serde_json::to_string(&summaries)?);

    Ok(())
}
