//! Core [`Component`] trait, per-entity component slots and the context
//! handed to activation hooks.
//!
//! Components are attached to exactly one [`Entity`](crate::Entity), which
//! owns them. They are activated when their entity is registered with an
//! [`Engine`](crate::Engine) and deactivated when it is removed. The flag is
//! tracked by the owning slot, not by the component, so hooks run exactly once
//! per activation/deactivation pair.
//!
//! # Examples
//!
//! ```rust
//! use engine_ecs::{Capability, Component, ComponentContext};
//!
//! const DAMAGEABLE: Capability = Capability::from_name("Damageable");
//!
//! struct Health {
//!     current: f32,
//! }
//!
//! impl Component for Health {
//!     fn capabilities(&self) -> &[Capability] {
//!         &[DAMAGEABLE]
//!     }
//!
//!     fn activate(&mut self, _ctx: &ComponentContext<'_>) {
//!         self.current = self.current.max(1.0);
//!     }
//! }
//! ```

use crate::capability::{AsAny, Capability};
use crate::engine::EngineId;
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::system::{EngineSystem, SystemRegistry};

/// A unit of data and behaviour attachable to one entity.
///
/// Both hooks default to doing nothing.
pub trait Component: AsAny {
    /// Abstract capabilities this component provides besides its own type.
    ///
    /// Should not list another concrete type's [`Capability::of`]; typed
    /// lookups expect the first match for a type's capability to be of that
    /// type.
    fn capabilities(&self) -> &[Capability] {
        &[]
    }

    /// Called when the owning entity is activated.
    fn activate(&mut self, _ctx: &ComponentContext<'_>) {}

    /// Called when the owning entity is deactivated.
    fn deactivate(&mut self, _ctx: &ComponentContext<'_>) {}
}

/// A component attached to an entity, together with its activation flag.
pub(crate) struct ComponentSlot {
    capability: Capability,
    component: Box<dyn Component>,
    activated: bool,
}

impl ComponentSlot {
    pub(crate) fn new<T: Component>(component: T) -> Self {
        Self {
            capability: Capability::of::<T>(),
            component: Box::new(component),
            activated: false,
        }
    }

    pub(crate) fn component(&self) -> &dyn Component {
        &*self.component
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.component().type_name()
    }

    /// Returns `true` if the component is of, or advertises, `capability`.
    pub(crate) fn provides(&self, capability: Capability) -> bool {
        self.capability == capability || self.component.capabilities().contains(&capability)
    }

    pub(crate) fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.component().as_any().downcast_ref()
    }

    pub(crate) fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        let component: &mut dyn Component = &mut *self.component;
        component.as_any_mut().downcast_mut()
    }

    pub(crate) fn is_activated(&self) -> bool {
        self.activated
    }

    /// Run the activation hook and mark the component active.
    pub(crate) fn activate(&mut self, ctx: &ComponentContext<'_>) -> Result<()> {
        if self.activated {
            return Err(EcsError::ComponentAlreadyActive);
        }
        self.component.activate(ctx);
        self.activated = true;
        Ok(())
    }

    /// Run the deactivation hook and mark the component inactive.
    pub(crate) fn deactivate(&mut self, ctx: &ComponentContext<'_>) -> Result<()> {
        if !self.activated {
            return Err(EcsError::ComponentNotActive);
        }
        self.component.deactivate(ctx);
        self.activated = false;
        Ok(())
    }
}

/// Where an entity is being (de)activated: its id and engine, if any, and the
/// engine's systems.
#[derive(Clone, Copy, Default)]
pub(crate) struct ActivationScope<'a> {
    pub(crate) entity: Option<EntityId>,
    pub(crate) engine: Option<EngineId>,
    pub(crate) systems: Option<&'a SystemRegistry>,
}

impl<'a> ActivationScope<'a> {
    pub(crate) fn new(entity: EntityId, engine: EngineId, systems: &'a SystemRegistry) -> Self {
        Self {
            entity: Some(entity),
            engine: Some(engine),
            systems: Some(systems),
        }
    }
}

/// Context available to [`Component::activate`] and
/// [`Component::deactivate`].
///
/// Gives access to the owning entity's other components and to the systems
/// of the engine the entity is registered with.
pub struct ComponentContext<'a> {
    scope: ActivationScope<'a>,
    before: &'a [ComponentSlot],
    after: &'a [ComponentSlot],
}

impl<'a> ComponentContext<'a> {
    pub(crate) fn new(
        scope: ActivationScope<'a>,
        before: &'a [ComponentSlot],
        after: &'a [ComponentSlot],
    ) -> Self {
        Self {
            scope,
            before,
            after,
        }
    }

    /// The id of the owning entity, if it is held by an engine.
    #[must_use]
    pub fn entity(&self) -> Option<EntityId> {
        self.scope.entity
    }

    /// The engine the owning entity is registered with.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NotRegistered`] outside of an engine.
    pub fn engine(&self) -> Result<EngineId> {
        self.scope.engine.ok_or(EcsError::NotRegistered)
    }

    /// Returns `true` if a sibling component of type `T` is attached. The
    /// component running the hook is not a sibling of itself.
    #[must_use]
    pub fn has_component<T: Component>(&self) -> bool {
        self.siblings().any(|slot| slot.downcast_ref::<T>().is_some())
    }

    /// Retrieve the first sibling component of type `T`, in attachment order.
    ///
    /// The component running the hook is excluded from the search, since it
    /// is already borrowed as `&mut self`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotFound`] if no sibling matches.
    pub fn get_component<T: Component>(&self) -> Result<&'a T> {
        let (before, after) = (self.before, self.after);
        before
            .iter()
            .chain(after)
            .find_map(ComponentSlot::downcast_ref::<T>)
            .ok_or_else(|| EcsError::ComponentNotFound(std::any::type_name::<T>().to_string()))
    }

    /// Retrieve a system of the owning entity's engine.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NotRegistered`] outside of an engine, or
    /// [`EcsError::SystemNotFound`] if no system of type `T` is registered.
    pub fn get_system<T: EngineSystem>(&self) -> Result<&'a T> {
        let systems = self.scope.systems.ok_or(EcsError::NotRegistered)?;
        systems
            .get::<T>()
            .ok_or_else(|| EcsError::SystemNotFound(std::any::type_name::<T>().to_string()))
    }

    fn siblings(&self) -> impl Iterator<Item = &'a ComponentSlot> {
        self.before.iter().chain(self.after)
    }
}
