//! A system that processes every member of one [`EntityFamily`] per update.

use crate::engine::Engine;
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::family::EntityFamily;
use crate::system::{EngineSystem, SystemBase};
use crate::view::ViewId;

/// Per-entity logic run by an [`IteratingSystem`].
pub trait EntityProcessor: 'static {
    /// Process one member of the system's family.
    ///
    /// # Errors
    ///
    /// An error aborts the rest of the pass.
    fn process_entity(&mut self, engine: &mut Engine, entity: EntityId, dt: f64) -> Result<()>;
}

/// Runs an [`EntityProcessor`] over the live view of a family.
///
/// The view is captured when the system is added to an engine and released
/// when it is removed. Entities added or removed by the processor are
/// deferred by the engine, so the view is stable for the whole pass.
///
/// ```rust
/// use engine_ecs::{Component, Engine, Entity, EntityFamily, EntityId, EntityProcessor,
///     IteratingSystem, Result};
///
/// struct Counter(u32);
/// impl Component for Counter {}
///
/// struct Increment;
///
/// impl EntityProcessor for Increment {
///     fn process_entity(&mut self, engine: &mut Engine, entity: EntityId, _dt: f64) -> Result<()> {
///         if let Some(mut entity) = engine.entity_mut(entity) {
///             entity.get_component_mut::<Counter>()?.0 += 1;
///         }
///         Ok(())
///     }
/// }
///
/// let mut engine = Engine::new();
/// engine.add(IteratingSystem::new(EntityFamily::of::<(Counter,)>(), Increment)).unwrap();
/// let id = engine.add_entity(Entity::new().with(Counter(0))).unwrap();
///
/// engine.update(0.016).unwrap();
/// engine.update(0.016).unwrap();
/// assert_eq!(engine.entity(id).unwrap().get_component::<Counter>().unwrap().0, 2);
/// ```
pub struct IteratingSystem<P> {
    base: SystemBase,
    family: EntityFamily,
    view: Option<ViewId>,
    processor: P,
}

impl<P: EntityProcessor> IteratingSystem<P> {
    #[must_use]
    pub fn new(family: EntityFamily, processor: P) -> Self {
        Self {
            base: SystemBase::default(),
            family,
            view: None,
            processor,
        }
    }

    #[must_use]
    pub fn family(&self) -> &EntityFamily {
        &self.family
    }

    /// The current members of the family, or nothing while detached.
    #[must_use]
    pub fn entities<'e>(&self, engine: &'e Engine) -> &'e [EntityId] {
        self.view.and_then(|view| engine.view(view)).unwrap_or(&[])
    }

    #[must_use]
    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut P {
        &mut self.processor
    }
}

impl<P: EntityProcessor> EngineSystem for IteratingSystem<P> {
    fn base(&self) -> &SystemBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SystemBase {
        &mut self.base
    }

    fn added_to_engine(&mut self, engine: &mut Engine) {
        self.view = Some(engine.view_id(&self.family));
    }

    fn removed_from_engine(&mut self, _engine: &mut Engine) {
        self.view = None;
    }

    fn update(&mut self, engine: &mut Engine, dt: f64) -> Result<()> {
        let view = self.view.ok_or(EcsError::NotRegistered)?;
        // Indexed: the view cannot stay borrowed while the processor holds the engine.
        let mut index = 0;
        while let Some(entity) = engine.view(view).and_then(|ids| ids.get(index)).copied() {
            self.processor.process_entity(engine, entity, dt)?;
            index += 1;
        }
        Ok(())
    }
}
