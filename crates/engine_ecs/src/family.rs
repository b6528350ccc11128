//! [`EntityFamily`]: a membership predicate over entities.
//!
//! A family is a set of capabilities; an entity is a member when it provides
//! every one of them. The empty family matches every entity.
//!
//! Families compare by value, so two families built from the same
//! capabilities share one view in the engine regardless of order.
//!
//! ```rust
//! use engine_ecs::{Component, Entity, EntityFamily};
//!
//! struct Position;
//! impl Component for Position {}
//! struct Velocity;
//! impl Component for Velocity {}
//!
//! let moving = EntityFamily::of::<(Position, Velocity)>();
//! assert_eq!(moving, EntityFamily::of::<(Velocity, Position)>());
//!
//! let entity = Entity::new().with(Position).with(Velocity);
//! assert!(moving.is_member(&entity));
//! assert!(!moving.is_member(&Entity::new().with(Position)));
//! ```

use std::collections::BTreeSet;

use crate::capability::Capability;
use crate::component::Component;
use crate::entity::Entity;

/// An immutable set of required capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityFamily {
    required: BTreeSet<Capability>,
}

impl EntityFamily {
    /// Create a family requiring every capability in `capabilities`.
    ///
    /// Duplicates are ignored.
    #[must_use]
    pub fn create<I>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = Capability>,
    {
        Self {
            required: capabilities.into_iter().collect(),
        }
    }

    /// Create a family requiring each component type of the tuple `S`.
    #[must_use]
    pub fn of<S: ComponentSet>() -> Self {
        Self::create(S::capabilities())
    }

    /// The family every entity belongs to.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Returns a copy of this family that additionally requires `capability`.
    #[must_use]
    pub fn with(mut self, capability: Capability) -> Self {
        self.required.insert(capability);
        self
    }

    /// Returns `true` if `entity` provides every required capability.
    #[must_use]
    pub fn is_member(&self, entity: &Entity) -> bool {
        self.required.iter().all(|&cap| entity.has_capability(cap))
    }

    /// Returns `true` if `capability` is required.
    #[must_use]
    pub fn requires(&self, capability: Capability) -> bool {
        self.required.contains(&capability)
    }

    /// The required capabilities, in ascending order.
    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.required.iter().copied()
    }

    /// Returns the number of required capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.required.len()
    }

    /// Returns `true` if this family matches every entity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }
}

/// A tuple of component types, used by [`EntityFamily::of`].
pub trait ComponentSet {
    /// The capability of each component type in the tuple.
    fn capabilities() -> Vec<Capability>;
}

impl ComponentSet for () {
    fn capabilities() -> Vec<Capability> {
        Vec::new()
    }
}

macro_rules! impl_component_set {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            fn capabilities() -> Vec<Capability> {
                vec![$(Capability::of::<$name>()),+]
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);
