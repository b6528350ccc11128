//! Fixed-timestep tick loop.
//!
//! Each tick:
//!
//! 1. Advance the tick counter.
//! 2. Run one engine update with the fixed `dt`.
//! 3. Publish a [`TickReport`] to subscribers.
//! 4. Sleep for the rest of the tick budget.

use std::time::{Duration, Instant};

use engine_ecs::Engine;
use engine_signal::Signal;
use tracing::{debug, info, warn};

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
    /// Stop once the engine holds no entities.
    pub stop_when_empty: bool,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
            stop_when_empty: false,
        }
    }
}

/// Published after every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tick_id: u64,
    /// Registered entities after the tick.
    pub entities: usize,
}

/// Drives an [`Engine`] at a fixed rate.
#[derive(Debug)]
pub struct TickLoop {
    /// Current tick counter.
    tick_id: u64,
    config: TickConfig,
    engine: Engine,
    reports: Signal<TickReport>,
}

impl TickLoop {
    #[must_use]
    pub fn new(config: TickConfig, engine: Engine) -> Self {
        Self {
            tick_id: 0,
            config,
            engine,
            reports: Signal::new(),
        }
    }

    /// Returns the current tick counter.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// The signal every [`TickReport`] is dispatched through.
    #[must_use]
    pub fn reports(&self) -> &Signal<TickReport> {
        &self.reports
    }

    /// Run one tick of the simulation.
    pub fn tick(&mut self, dt: f64) -> engine_ecs::Result<()> {
        self.tick_id += 1;
        debug!(tick_id = self.tick_id, dt, "tick start");

        self.engine.update(dt)?;

        self.reports.dispatch(&TickReport {
            tick_id: self.tick_id,
            entities: self.engine.entity_count(),
        });
        Ok(())
    }

    /// Run until the tick limit is hit or, if configured, the engine is
    /// empty.
    pub fn run(&mut self) -> engine_ecs::Result<()> {
        let tick_duration = Duration::from_secs_f64(1.0 / self.config.tick_rate);
        let dt = tick_duration.as_secs_f64();
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();

            self.tick(dt)?;

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "tick loop complete");
                break;
            }
            if self.config.stop_when_empty && self.engine.entity_count() == 0 {
                info!(ticks = tick_count, "no entities left");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
        Ok(())
    }
}
