//! [`Entity`]: an ordered bag of components with an activation lifecycle.
//!
//! An entity is built outside any engine, then handed to
//! [`Engine::add_entity`](crate::Engine::add_entity), which gives it an
//! [`EntityId`]. While registered it is reachable through the engine only, so
//! its component list cannot change under the engine's views.
//!
//! Attaching a component moves it into the entity, so one component instance
//! can never be attached twice:
//!
//! ```compile_fail
//! use engine_ecs::{Component, Entity};
//!
//! struct Position;
//! impl Component for Position {}
//!
//! let position = Position;
//! let first = Entity::new().with(position);
//! let second = Entity::new().with(position);
//! ```

use std::any::type_name;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Deref;

use slotmap::new_key_type;

use crate::capability::Capability;
use crate::component::{ActivationScope, Component, ComponentContext, ComponentSlot};
use crate::engine::EngineId;
use crate::error::{EcsError, Result};

new_key_type! {
    /// Slot of an entity in one engine's arena.
    pub(crate) struct EntityKey;
}

/// Handle to an entity held by an [`Engine`](crate::Engine).
///
/// Only the engine that issued the handle resolves it. Every other engine
/// treats it as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    engine: EngineId,
    key: EntityKey,
}

impl EntityId {
    pub(crate) fn new(engine: EngineId, key: EntityKey) -> Self {
        Self { engine, key }
    }

    /// The engine that issued this handle.
    #[must_use]
    pub fn engine(&self) -> EngineId {
        self.engine
    }

    pub(crate) fn key(&self) -> EntityKey {
        self.key
    }
}

/// An ordered collection of components.
///
/// Components are kept in attachment order; lookups by type or capability
/// return the first match in that order.
#[derive(Default)]
pub struct Entity {
    components: Vec<ComponentSlot>,
    /// Capability -> index of the first component providing it. Never
    /// invalidated, components are not removable.
    cache: RefCell<HashMap<Capability, usize>>,
    activated: bool,
    engine: Option<EngineId>,
}

impl Entity {
    /// Create an entity with no components.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`add_component`](Self::add_component).
    ///
    /// An owned entity is never registered or active, so this cannot fail.
    #[must_use]
    pub fn with<T: Component>(mut self, component: T) -> Self {
        debug_assert!(!self.activated, "owned entity is active");
        self.components.push(ComponentSlot::new(component));
        self
    }

    /// Attach a component.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityActivated`] if the entity is active.
    pub fn add_component<T: Component>(&mut self, component: T) -> Result<()> {
        if self.activated {
            return Err(EcsError::EntityActivated);
        }
        self.components.push(ComponentSlot::new(component));
        Ok(())
    }

    /// Returns `true` if a component of type `T` is attached.
    #[must_use]
    pub fn has_component<T: Component>(&self) -> bool {
        self.has_capability(Capability::of::<T>())
    }

    /// Returns `true` if any component is of, or advertises, `capability`.
    #[must_use]
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.cache.borrow().contains_key(&capability)
            || self.components.iter().any(|slot| slot.provides(capability))
    }

    /// Retrieve the first component of type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotFound`] if none is attached.
    pub fn get_component<T: Component>(&self) -> Result<&T> {
        self.find(Capability::of::<T>())
            .and_then(|index| self.components[index].downcast_ref::<T>())
            .ok_or_else(not_found::<T>)
    }

    /// Mutable variant of [`get_component`](Self::get_component).
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotFound`] if none is attached.
    pub fn get_component_mut<T: Component>(&mut self) -> Result<&mut T> {
        let index = self.find(Capability::of::<T>()).ok_or_else(not_found::<T>)?;
        self.components[index]
            .downcast_mut::<T>()
            .ok_or_else(not_found::<T>)
    }

    /// Retrieve the first component providing `capability`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotFound`] if no component provides it.
    pub fn get_by_capability(&self, capability: Capability) -> Result<&dyn Component> {
        self.find(capability)
            .map(|index| self.components[index].component())
            .ok_or_else(|| EcsError::ComponentNotFound(format!("{capability:?}")))
    }

    /// All components of type `T`, in attachment order.
    #[must_use]
    pub fn get_all_components<T: Component>(&self) -> Vec<&T> {
        self.components
            .iter()
            .filter_map(ComponentSlot::downcast_ref::<T>)
            .collect()
    }

    /// All components providing `capability`, in attachment order.
    #[must_use]
    pub fn get_all_by_capability(&self, capability: Capability) -> Vec<&dyn Component> {
        self.components
            .iter()
            .filter(|slot| slot.provides(capability))
            .map(ComponentSlot::component)
            .collect()
    }

    /// Iterate over every component in attachment order.
    pub fn components(&self) -> impl Iterator<Item = &dyn Component> {
        self.components.iter().map(ComponentSlot::component)
    }

    /// Returns the number of attached components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` while the entity is registered with an engine.
    #[must_use]
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// The engine this entity is registered with, if any.
    #[must_use]
    pub fn engine(&self) -> Option<EngineId> {
        self.engine
    }

    pub(crate) fn set_engine(&mut self, engine: Option<EngineId>) {
        self.engine = engine;
    }

    /// Activate every inactive component, in attachment order.
    pub(crate) fn activate(&mut self, scope: ActivationScope<'_>) -> Result<()> {
        if self.activated {
            return Err(EcsError::EntityAlreadyActive);
        }
        for index in 0..self.components.len() {
            let (before, rest) = self.components.split_at_mut(index);
            let Some((slot, after)) = rest.split_first_mut() else {
                break;
            };
            if !slot.is_activated() {
                slot.activate(&ComponentContext::new(scope, before, after))?;
            }
        }
        self.activated = true;
        Ok(())
    }

    /// Deactivate every active component, in reverse attachment order.
    pub(crate) fn deactivate(&mut self, scope: ActivationScope<'_>) -> Result<()> {
        if !self.activated {
            return Err(EcsError::EntityNotActive);
        }
        for index in (0..self.components.len()).rev() {
            let (before, rest) = self.components.split_at_mut(index);
            let Some((slot, after)) = rest.split_first_mut() else {
                continue;
            };
            if slot.is_activated() {
                slot.deactivate(&ComponentContext::new(scope, before, after))?;
            }
        }
        self.activated = false;
        Ok(())
    }

    fn find(&self, capability: Capability) -> Option<usize> {
        if let Some(&index) = self.cache.borrow().get(&capability) {
            return Some(index);
        }
        let index = self
            .components
            .iter()
            .position(|slot| slot.provides(capability))?;
        self.cache.borrow_mut().insert(capability, index);
        Some(index)
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.components.iter().map(ComponentSlot::type_name).collect();
        f.debug_struct("Entity")
            .field("components", &names)
            .field("activated", &self.activated)
            .field("engine", &self.engine)
            .finish()
    }
}

fn not_found<T>() -> EcsError {
    EcsError::ComponentNotFound(type_name::<T>().to_string())
}

/// Mutable access to an entity held by an engine.
///
/// Hands out mutable components but never the entity itself, so it cannot be
/// swapped out or deactivated behind the engine's back.
pub struct EntityMut<'a> {
    entity: &'a mut Entity,
}

impl<'a> EntityMut<'a> {
    pub(crate) fn new(entity: &'a mut Entity) -> Self {
        Self { entity }
    }

    /// See [`Entity::get_component_mut`].
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotFound`] if none is attached.
    pub fn get_component_mut<T: Component>(&mut self) -> Result<&mut T> {
        self.entity.get_component_mut()
    }

    /// Attach a component to an entity that is not yet registered, such as
    /// one added while the engine is updating.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityActivated`] once the entity is registered.
    pub fn add_component<T: Component>(&mut self, component: T) -> Result<()> {
        self.entity.add_component(component)
    }
}

impl Deref for EntityMut<'_> {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        self.entity
    }
}
