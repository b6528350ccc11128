//! Engine systems and the registry that stores them.
//!
//! A system is per-tick logic. Systems run in registration order on every
//! [`Engine::update`](crate::Engine::update); disabled systems are skipped.
//! During its own `update` or lifecycle hook a system is checked out of the
//! registry, which is how it can receive `&mut Engine`.

use crate::capability::{AsAny, Capability};
use crate::engine::{Engine, EngineId};
use crate::error::Result;

/// Stable handle returned by [`Engine::add_system`](crate::Engine::add_system).
///
/// Scoped to the issuing engine, like [`EntityId`](crate::EntityId).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId {
    engine: EngineId,
    index: u64,
}

impl SystemId {
    /// The engine that issued this handle.
    #[must_use]
    pub fn engine(&self) -> EngineId {
        self.engine
    }
}

/// State shared by every system: the enabled flag and the engine back-ref.
#[derive(Debug, Clone)]
pub struct SystemBase {
    enabled: bool,
    engine: Option<EngineId>,
}

impl Default for SystemBase {
    fn default() -> Self {
        Self {
            enabled: true,
            engine: None,
        }
    }
}

impl SystemBase {
    pub(crate) fn set_engine(&mut self, engine: Option<EngineId>) {
        self.engine = engine;
    }
}

/// Per-tick logic driven by an [`Engine`].
///
/// Implementors embed a [`SystemBase`] and expose it through
/// [`base`](Self::base)/[`base_mut`](Self::base_mut); everything else has a
/// default.
pub trait EngineSystem: AsAny {
    fn base(&self) -> &SystemBase;

    fn base_mut(&mut self) -> &mut SystemBase;

    /// Abstract capabilities this system provides besides its own type.
    fn capabilities(&self) -> &[Capability] {
        &[]
    }

    /// Called after the system was registered with `engine`.
    fn added_to_engine(&mut self, _engine: &mut Engine) {}

    /// Called before the system is unregistered from `engine`.
    fn removed_from_engine(&mut self, _engine: &mut Engine) {}

    /// Advance by `dt` seconds.
    ///
    /// # Errors
    ///
    /// An error stops the current update pass; deferred operations still run.
    fn update(&mut self, _engine: &mut Engine, _dt: f64) -> Result<()> {
        Ok(())
    }

    /// Called after [`set_enabled`](Self::set_enabled) flipped the flag.
    fn enabled_state_changed(&mut self) {}

    /// Enable or disable the system. Does nothing if the state is unchanged.
    fn set_enabled(&mut self, enabled: bool) {
        if self.base().enabled == enabled {
            return;
        }
        self.base_mut().enabled = enabled;
        self.enabled_state_changed();
    }

    fn is_enabled(&self) -> bool {
        self.base().enabled
    }

    /// The engine this system is registered with, if any.
    fn engine(&self) -> Option<EngineId> {
        self.base().engine
    }

    fn name(&self) -> &'static str {
        self.type_name()
    }
}

/// Returns `true` if `system` is of, or advertises, `capability`.
pub(crate) fn provides(system: &dyn EngineSystem, capability: Capability) -> bool {
    system.own_capability() == capability || system.capabilities().contains(&capability)
}

struct SystemEntry {
    id: SystemId,
    /// `None` while checked out.
    system: Option<Box<dyn EngineSystem>>,
}

/// Ordered storage for an engine's systems.
#[derive(Default)]
pub(crate) struct SystemRegistry {
    entries: Vec<SystemEntry>,
    next_id: u64,
}

impl SystemRegistry {
    pub(crate) fn push(&mut self, engine: EngineId, system: Box<dyn EngineSystem>) -> SystemId {
        let id = SystemId {
            engine,
            index: self.next_id,
        };
        self.next_id += 1;
        self.entries.push(SystemEntry {
            id,
            system: Some(system),
        });
        id
    }

    /// Remove a system that is not checked out.
    pub(crate) fn remove(&mut self, id: SystemId) -> Option<Box<dyn EngineSystem>> {
        let pos = self
            .entries
            .iter()
            .position(|entry| entry.id == id && entry.system.is_some())?;
        self.entries.remove(pos).system
    }

    pub(crate) fn contains(&self, id: SystemId) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.id == id && entry.system.is_some())
    }

    pub(crate) fn check_out(&mut self, id: SystemId) -> Option<Box<dyn EngineSystem>> {
        self.entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .and_then(|entry| entry.system.take())
    }

    /// Return a checked-out system. Dropped if its entry is gone.
    pub(crate) fn check_in(&mut self, id: SystemId, system: Box<dyn EngineSystem>) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.id == id) {
            entry.system = Some(system);
        }
    }

    /// Returns `true` while any system is checked out.
    pub(crate) fn has_checked_out(&self) -> bool {
        self.entries.iter().any(|entry| entry.system.is_none())
    }

    /// Ids of all systems in registration order.
    pub(crate) fn ids(&self) -> Vec<SystemId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    pub(crate) fn get<T: EngineSystem>(&self) -> Option<&T> {
        self.iter().find_map(|system| system.as_any().downcast_ref())
    }

    pub(crate) fn get_mut<T: EngineSystem>(&mut self) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .filter_map(|entry| entry.system.as_deref_mut())
            .find_map(|system| system.as_any_mut().downcast_mut())
    }

    pub(crate) fn find(&self, capability: Capability) -> Option<&dyn EngineSystem> {
        self.iter().find(|system| provides(*system, capability))
    }

    pub(crate) fn at(&self, index: usize) -> Option<&dyn EngineSystem> {
        self.entries
            .get(index)
            .and_then(|entry| entry.system.as_deref())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn iter(&self) -> impl Iterator<Item = &dyn EngineSystem> {
        self.entries
            .iter()
            .filter_map(|entry| entry.system.as_deref())
    }
}

impl std::fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.iter().map(|system| system.name()).collect();
        f.debug_struct("SystemRegistry")
            .field("systems", &names)
            .finish()
    }
}
