//! Demo simulation: entities fly outward from the origin and expire.

use std::f32::consts::TAU;

use engine_ecs::{
    Component, EcsError, Engine, Entity, EntityFamily, EntityId, EntityListener, EntityProcessor,
    IteratingSystem,
};
use glam::Vec2;
use tracing::{debug, info};

/// Units per second of every spawned entity.
const SPEED: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position(pub Vec2);

impl Component for Position {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity(pub Vec2);

impl Component for Velocity {}

/// Seconds left before the entity is removed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lifetime(pub f64);

impl Component for Lifetime {}

/// Integrates velocity into position.
pub struct Movement;

impl EntityProcessor for Movement {
    fn process_entity(
        &mut self,
        engine: &mut Engine,
        entity: EntityId,
        dt: f64,
    ) -> engine_ecs::Result<()> {
        let Some(mut entity) = engine.entity_mut(entity) else {
            return Ok(());
        };
        let velocity = entity.get_component::<Velocity>()?.0;
        entity.get_component_mut::<Position>()?.0 += velocity * dt as f32;
        Ok(())
    }
}

pub type MovementSystem = IteratingSystem<Movement>;

#[must_use]
pub fn movement_system() -> MovementSystem {
    IteratingSystem::new(EntityFamily::of::<(Position, Velocity)>(), Movement)
}

/// Counts down [`Lifetime`]s and removes entities whose time is up.
#[derive(Debug, Default)]
pub struct Expiry {
    expired: u64,
}

impl Expiry {
    #[must_use]
    pub fn expired(&self) -> u64 {
        self.expired
    }
}

impl EntityProcessor for Expiry {
    fn process_entity(
        &mut self,
        engine: &mut Engine,
        entity: EntityId,
        dt: f64,
    ) -> engine_ecs::Result<()> {
        let remaining = {
            let mut handle = engine
                .entity_mut(entity)
                .ok_or(EcsError::EntityNotFound(entity))?;
            let lifetime = handle.get_component_mut::<Lifetime>()?;
            lifetime.0 -= dt;
            lifetime.0
        };
        if remaining <= 0.0 {
            // Deferred until every system has run this tick.
            engine.remove_entity(entity)?;
            self.expired += 1;
        }
        Ok(())
    }
}

pub type ExpirySystem = IteratingSystem<Expiry>;

#[must_use]
pub fn expiry_system() -> ExpirySystem {
    IteratingSystem::new(EntityFamily::of::<(Lifetime,)>(), Expiry::default())
}

/// Logs entities as they come and go.
pub struct SpawnLogger;

impl EntityListener for SpawnLogger {
    fn entity_added(&self, engine: &mut Engine, entity: EntityId) {
        debug!(?entity, total = engine.entity_count(), "entity spawned");
    }

    fn entity_removed(&self, engine: &mut Engine, entity: EntityId) {
        let position = engine
            .entity(entity)
            .and_then(|e| e.get_component::<Position>().ok())
            .map(|p| p.0);
        info!(?entity, ?position, "entity expired");
    }
}

/// Spawn `count` entities on a ring, moving outward, with lifetimes evenly
/// staggered up to `lifetime` seconds.
pub fn spawn(engine: &mut Engine, count: usize, lifetime: f64) -> engine_ecs::Result<Vec<EntityId>> {
    (0..count)
        .map(|i| {
            let direction = Vec2::from_angle(TAU * i as f32 / count as f32);
            let entity = Entity::new()
                .with(Position(Vec2::ZERO))
                .with(Velocity(direction * SPEED))
                .with(Lifetime(lifetime * (i + 1) as f64 / count as f64));
            engine.add_entity(entity)
        })
        .collect()
}
