//! # engine_app
//!
//! Runs the health/damage demo on the ECS runtime.
//!
//! ## Startup Sequence
//!
//! 1. Load the optional JSON config (`--config`) and apply flag overrides.
//! 2. Register every type, build the world, and register the systems.
//! 3. Run the tick loop until a system requests a stop or the tick limit is
//!    reached.
//! 4. Log final world statistics as JSON.

mod config;
mod demo;
mod tick;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use demo::{HazardSystem, WatchdogSystem};
use tick::TickLoop;

#[derive(Parser)]
#[command(name = "engine_app", about = "Single-threaded ECS runtime demo")]
struct Args {
    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of ticks to run (0 = unlimited)
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Target ticks per second
    #[arg(long)]
    tick_rate: Option<f64>,

    /// Players spawned at startup
    #[arg(long)]
    players: Option<u32>,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            Config::load(path)?
        }
        None => Config::default(),
    };
    if let Some(max_ticks) = args.max_ticks {
        config.tick.max_ticks = max_ticks;
    }
    if let Some(tick_rate) = args.tick_rate {
        config.tick.tick_rate = tick_rate;
    }
    if let Some(players) = args.players {
        config.demo.players = players;
    }
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!(?config, "engine starting");

    let (world, scheduler) = demo::build(&config.demo)?;
    let mut tick_loop = TickLoop::new(config.tick, world, scheduler);
    info!(
        systems = ?tick_loop.scheduler().order(),
        stats = %serde_json::to_string(&tick_loop.world().stats())?,
        "world populated"
    );
    let reason = tick_loop.run();

    let ticks = tick_loop.ticks();
    let (world, scheduler) = tick_loop.into_parts();
    let hits = scheduler.get::<HazardSystem>().map_or(0, HazardSystem::hits);
    let deaths = scheduler.get::<WatchdogSystem>().map_or(0, WatchdogSystem::deaths);
    info!(
        ?reason,
        ticks,
        hits,
        deaths,
        stats = %serde_json::to_string(&world.stats())?,
        "engine shut down"
    );
    Ok(())
}
