//! # engine_app
//!
//! Runs a small simulation on the entity engine at a fixed timestep: a ring of
//! entities flies outward from the origin, and each is removed when its
//! lifetime runs out.
//!
//! ## Startup Sequence
//!
//! 1. Load the optional JSON config, then apply command-line overrides.
//! 2. Register the movement and expiry systems and the spawn logger.
//! 3. Spawn the entities and enter the tick loop until they have all expired
//!    or the tick limit is hit.

mod config;
mod demo;
mod tick;

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Result;
use clap::Parser;
use engine_ecs::Engine;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use tick::{TickConfig, TickLoop, TickReport};

#[derive(Parser)]
#[command(name = "engine_app", about = "Fixed-timestep entity engine demo")]
struct Args {
    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target ticks per second
    #[arg(long)]
    tick_rate: Option<f64>,

    /// Maximum number of ticks to run (0 = unlimited)
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Number of entities to spawn
    #[arg(long)]
    spawn_count: Option<usize>,
}

impl Args {
    fn resolve(self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        if let Some(tick_rate) = self.tick_rate {
            config.tick_rate = tick_rate;
        }
        if let Some(max_ticks) = self.max_ticks {
            config.max_ticks = max_ticks;
        }
        if let Some(spawn_count) = self.spawn_count {
            config.spawn_count = spawn_count;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let config = Args::parse().resolve()?;
    info!(?config, "engine demo starting");

    let mut engine = Engine::new();
    engine.add(demo::movement_system())?;
    engine.add(demo::expiry_system())?;
    engine.add_entity_listener(Rc::new(demo::SpawnLogger));
    demo::spawn(&mut engine, config.spawn_count, config.lifetime)?;

    let tick_config = TickConfig {
        tick_rate: config.tick_rate,
        max_ticks: config.max_ticks,
        stop_when_empty: true,
    };
    let mut tick_loop = TickLoop::new(tick_config, engine);
    let rate = config.tick_rate.round().max(1.0) as u64;
    tick_loop.reports().connect(move |report: &TickReport| {
        if report.tick_id % rate == 0 {
            info!(tick_id = report.tick_id, entities = report.entities, "status");
        }
    });

    tick_loop.run()?;

    let expired = tick_loop
        .engine()
        .get_system::<demo::ExpirySystem>()?
        .processor()
        .expired();
    tick_loop.engine_mut().dispose()?;

    info!(ticks = tick_loop.tick_id(), expired, "engine demo shut down");
    Ok(())
}
