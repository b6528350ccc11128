//! # engine_ecs
//!
//! An entity-component-system runtime. Entities are ordered bags of
//! components, systems are per-tick logic, and the [`Engine`] owns both and
//! drives the update cycle.
//!
//! This crate provides:
//!
//! - [`Component`] trait and [`Capability`] tags for type and capability lookup.
//! - [`Entity`]: ordered components with an activation lifecycle.
//! - [`EntityFamily`]: the set of capabilities an entity must provide.
//! - [`EngineSystem`] and [`IteratingSystem`]: per-tick logic.
//! - [`Engine`]: entity arena, live per-family views, deferred mutation and
//!   [`EntityListener`] notifications.

pub mod capability;
pub mod command;
pub mod component;
pub mod engine;
pub mod entity;
pub mod error;
pub mod family;
pub mod iterating;
pub mod listener;
pub mod system;
pub mod view;

pub use capability::{AsAny, Capability};
pub use command::Command;
pub use component::{Component, ComponentContext};
pub use engine::{Engine, EngineId};
pub use entity::{Entity, EntityId, EntityMut};
pub use error::{EcsError, ErrorKind, Result};
pub use family::{ComponentSet, EntityFamily};
pub use iterating::{EntityProcessor, IteratingSystem};
pub use listener::EntityListener;
pub use system::{EngineSystem, SystemBase, SystemId};
pub use view::ViewId;
