//! Tick loop driving the scheduler.
//!
//! Each iteration runs one sweep and then sleeps for the sweep's advisory
//! hint, bounded below by `min_sleep_ms` and capped by the configured tick
//! rate. The loop ends on [`Wake::Terminate`] or after `max_ticks` sweeps.

use std::time::{Duration, Instant};

use engine_ecs::World;
use engine_system::{PriorityScheduler, Wake};
use tracing::{debug, info, warn};

use crate::config::TickConfig;

/// Why [`TickLoop::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A stop was requested by a system or the driver.
    Terminated,
    /// The configured tick limit was reached.
    TickLimit,
}

/// Owns the world and the scheduler and runs sweeps until told to stop.
#[derive(Debug)]
pub struct TickLoop {
    /// Sweeps run by this loop.
    ticks: u64,
    config: TickConfig,
    world: World,
    scheduler: PriorityScheduler,
}

impl TickLoop {
    /// Create a tick loop over a populated world and finalized scheduler.
    #[must_use]
    pub fn new(config: TickConfig, world: World, scheduler: PriorityScheduler) -> Self {
        Self {
            ticks: 0,
            config,
            world,
            scheduler,
        }
    }

    /// Returns the number of sweeps run so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Returns a reference to the world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Returns a reference to the scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &PriorityScheduler {
        &self.scheduler
    }

    /// Run one sweep.
    pub fn tick(&mut self) -> Wake {
        self.ticks += 1;
        let wake = self.scheduler.update(&mut self.world);
        debug!(tick = self.ticks, ?wake, "tick done");
        wake
    }

    /// Longest the loop may sleep between sweeps, from the tick rate.
    fn budget(&self) -> Option<Duration> {
        (self.config.tick_rate > 0.0).then(|| Duration::from_secs_f64(1.0 / self.config.tick_rate))
    }

    /// How long to wait before the next sweep, or `None` to stop.
    #[must_use]
    pub fn pacing(&self, wake: Wake) -> Option<Duration> {
        let floor = Duration::from_millis(self.config.min_sleep_ms);
        let budget = self.budget();
        let wanted = match wake {
            Wake::Terminate => return None,
            Wake::After(hint) => match budget {
                Some(budget) => hint.min(budget),
                None => hint,
            },
            Wake::Idle => budget.unwrap_or(floor),
        };
        Some(wanted.max(floor))
    }

    /// Run sweeps until a stop is requested or the tick limit is reached.
    pub fn run(&mut self) -> StopReason {
        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            min_sleep_ms = self.config.min_sleep_ms,
            systems = self.scheduler.len(),
            "starting tick loop"
        );

        loop {
            let start = Instant::now();
            let wake = self.tick();

            let Some(wait) = self.pacing(wake) else {
                info!(ticks = self.ticks, "tick loop stopped");
                return StopReason::Terminated;
            };
            if self.config.max_ticks > 0 && self.ticks >= self.config.max_ticks {
                info!(ticks = self.ticks, "tick loop complete");
                return StopReason::TickLimit;
            }

            let elapsed = start.elapsed();
            if elapsed < wait {
                std::thread::sleep(wait - elapsed);
            } else if self.budget().is_some_and(|budget| elapsed > budget) {
                warn!(
                    tick = self.ticks,
                    elapsed_ms = elapsed.as_millis() as u64,
                    wait_ms = wait.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
    }

    /// Tear the loop apart, returning the world and the scheduler.
    #[must_use]
    pub fn into_parts(self) -> (World, PriorityScheduler) {
        (self.world, self.scheduler)
    }
}
