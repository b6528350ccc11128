//! The [`Engine`]: owner of entities, systems and per-family views.
//!
//! # Update cycle
//!
//! [`Engine::update`] runs every enabled system in registration order. While
//! it runs, structural entity mutations ([`add_entity`](Engine::add_entity),
//! [`remove_entity`](Engine::remove_entity), [`remove_all`](Engine::remove_all))
//! are queued as [`Command`]s and applied FIFO once the system pass is over,
//! so no view changes under a system mid-pass. Adding or removing systems,
//! taking entities and disposing are refused outright while updating.
//!
//! ```rust
//! use engine_ecs::{Component, Engine, Entity, EntityFamily};
//!
//! struct Position;
//! impl Component for Position {}
//! struct Velocity;
//! impl Component for Velocity {}
//!
//! let mut engine = Engine::new();
//! let e1 = engine.add_entity(Entity::new().with(Position).with(Velocity)).unwrap();
//! let _e2 = engine.add_entity(Entity::new().with(Position)).unwrap();
//!
//! let moving = EntityFamily::of::<(Position, Velocity)>();
//! assert_eq!(engine.get_entities(&moving), [e1]);
//!
//! engine.remove_entity(e1).unwrap();
//! assert!(engine.get_entities(&moving).is_empty());
//! ```

use std::any::type_name;
use std::collections::VecDeque;
use std::rc::Rc;

use engine_signal::ListenerList;
use slotmap::SlotMap;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::capability::Capability;
use crate::command::Command;
use crate::component::ActivationScope;
use crate::entity::{Entity, EntityId, EntityKey, EntityMut};
use crate::error::{EcsError, Result};
use crate::family::EntityFamily;
use crate::listener::EntityListener;
use crate::system::{EngineSystem, SystemId, SystemRegistry};
use crate::view::{ViewCache, ViewId};

/// Unique identity of an [`Engine`], used as the back-reference held by
/// registered entities and systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineId(Uuid);

impl EngineId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying v4 UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for EngineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Entity and system container driving the update cycle.
pub struct Engine {
    id: EngineId,
    /// Registered entities plus those pending a deferred add.
    arena: SlotMap<EntityKey, Entity>,
    /// Registered entities, in registration order.
    entities: Vec<EntityId>,
    views: ViewCache,
    systems: SystemRegistry,
    listeners: ListenerList<dyn EntityListener>,
    commands: VecDeque<Command>,
    updating: bool,
}

impl Engine {
    /// Create an empty engine with a fresh [`EngineId`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: EngineId::new(),
            arena: SlotMap::with_key(),
            entities: Vec::new(),
            views: ViewCache::default(),
            systems: SystemRegistry::default(),
            listeners: ListenerList::new(),
            commands: VecDeque::new(),
            updating: false,
        }
    }

    /// The identity stamped into every handle this engine issues.
    #[must_use]
    pub fn id(&self) -> EngineId {
        self.id
    }

    /// Returns `true` while [`update`](Self::update) is running.
    #[must_use]
    pub fn is_updating(&self) -> bool {
        self.updating
    }

    // --- Entities ---

    /// Take ownership of `entity` and register it.
    ///
    /// The id is valid immediately. While updating, registration (activation,
    /// view insertion and listener notification) is deferred to the end of
    /// the cycle.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AlreadyRegistered`] if the entity is active or
    /// bound to an engine.
    pub fn add_entity(&mut self, entity: Entity) -> Result<EntityId> {
        if entity.is_activated() || entity.engine().is_some() {
            return Err(EcsError::AlreadyRegistered);
        }
        let id = EntityId::new(self.id, self.arena.insert(entity));
        if self.updating {
            trace!(engine = %self.id, entity = ?id, "deferring entity add");
            self.commands.push_back(Command::Add(id));
            return Ok(id);
        }
        self.register_or_discard(id)?;
        Ok(id)
    }

    /// Remove and drop a registered entity.
    ///
    /// Unknown ids, including ids issued by another engine, are ignored. While updating, removal is deferred to the
    /// end of the cycle.
    ///
    /// # Errors
    ///
    /// Propagates deactivation failures.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<()> {
        if self.updating {
            trace!(engine = %self.id, entity = ?id, "deferring entity removal");
            self.commands.push_back(Command::Remove(id));
            return Ok(());
        }
        if !self.contains_entity(id) {
            warn!(engine = %self.id, entity = ?id, "ignoring removal of unregistered entity");
            return Ok(());
        }
        self.unregister(id).map(drop)
    }

    /// Remove a registered entity and hand it back, deactivated and detached,
    /// so it can be registered again with this or another engine.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UpdateInProgress`] while updating and
    /// [`EcsError::EntityNotFound`] if `id` is not registered.
    pub fn take_entity(&mut self, id: EntityId) -> Result<Entity> {
        if self.updating {
            return Err(EcsError::UpdateInProgress("take entity"));
        }
        if !self.contains_entity(id) {
            return Err(EcsError::EntityNotFound(id));
        }
        self.unregister(id)?.ok_or(EcsError::EntityNotFound(id))
    }

    /// Remove every registered entity, first to last. Deferred while
    /// updating.
    ///
    /// # Errors
    ///
    /// Propagates deactivation failures.
    pub fn remove_all(&mut self) -> Result<()> {
        if self.updating {
            trace!(engine = %self.id, "deferring removal of all entities");
            self.commands.push_back(Command::RemoveAll);
            return Ok(());
        }
        self.unregister_all()
    }

    /// A registered entity, or one pending a deferred add.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.arena.get(self.key(id)?)
    }

    /// Mutable access to the components of a registered or pending entity.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<EntityMut<'_>> {
        let key = self.key(id)?;
        self.arena.get_mut(key).map(EntityMut::new)
    }

    /// Returns `true` if `id` is registered with this engine.
    #[must_use]
    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.entity(id)
            .is_some_and(|entity| entity.engine() == Some(self.id))
    }

    /// Registered entities in registration order.
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Commands queued during the current update, oldest first.
    pub fn pending_commands(&self) -> impl ExactSizeIterator<Item = &Command> {
        self.commands.iter()
    }

    // --- Views ---

    /// The live members of `family`, in registration order.
    ///
    /// The view is built on first request and kept up to date afterwards.
    pub fn get_entities(&mut self, family: &EntityFamily) -> &[EntityId] {
        let id = self.view_id(family);
        self.views.get(id).unwrap_or(&[])
    }

    /// A durable handle to the live view of `family`, built on first request.
    pub fn view_id(&mut self, family: &EntityFamily) -> ViewId {
        if let Some(id) = self.views.lookup(family) {
            return id;
        }
        let members: Vec<_> = self
            .entities
            .iter()
            .copied()
            .filter(|&id| self.entity(id).is_some_and(|e| family.is_member(e)))
            .collect();
        trace!(engine = %self.id, members = members.len(), "building family view");
        self.views.insert(family.clone(), members)
    }

    /// The members of a view obtained from [`view_id`](Self::view_id).
    ///
    /// `None` once the view was dropped by [`dispose`](Self::dispose).
    #[must_use]
    pub fn view(&self, id: ViewId) -> Option<&[EntityId]> {
        self.views.get(id)
    }

    #[must_use]
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    // --- Systems ---

    /// Register a system and fire its [`EngineSystem::added_to_engine`] hook.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UpdateInProgress`] while updating.
    pub fn add_system(&mut self, mut system: Box<dyn EngineSystem>) -> Result<SystemId> {
        if self.updating {
            return Err(EcsError::UpdateInProgress("add system"));
        }
        system.base_mut().set_engine(Some(self.id));
        let name = system.name();
        let id = self.systems.push(self.id, system);
        debug!(engine = %self.id, system = name, "system added");
        self.with_system(id, |system, engine| system.added_to_engine(engine));
        Ok(id)
    }

    /// Generic convenience for [`add_system`](Self::add_system).
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UpdateInProgress`] while updating.
    pub fn add<S: EngineSystem>(&mut self, system: S) -> Result<SystemId> {
        self.add_system(Box::new(system))
    }

    /// Fire the system's [`EngineSystem::removed_from_engine`] hook, then
    /// unregister it and hand it back.
    ///
    /// Entities are not touched.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UpdateInProgress`] while updating and
    /// [`EcsError::SystemNotFound`] if `id` is not registered with this
    /// engine.
    pub fn remove_system(&mut self, id: SystemId) -> Result<Box<dyn EngineSystem>> {
        if self.updating {
            return Err(EcsError::UpdateInProgress("remove system"));
        }
        if !self.systems.contains(id) {
            return Err(EcsError::SystemNotFound(format!("{id:?}")));
        }
        self.detach_system(id)
            .ok_or_else(|| EcsError::SystemNotFound(format!("{id:?}")))
    }

    /// The first registered system of type `T`.
    ///
    /// A system is not visible to itself while its own hook or update runs.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if none is registered.
    pub fn get_system<T: EngineSystem>(&self) -> Result<&T> {
        self.systems.get::<T>().ok_or_else(system_not_found::<T>)
    }

    /// Mutable variant of [`get_system`](Self::get_system).
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if none is registered.
    pub fn get_system_mut<T: EngineSystem>(&mut self) -> Result<&mut T> {
        self.systems.get_mut::<T>().ok_or_else(system_not_found::<T>)
    }

    #[must_use]
    pub fn has_system<T: EngineSystem>(&self) -> bool {
        self.systems.get::<T>().is_some()
    }

    /// The first registered system of, or advertising, `capability`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if none matches.
    pub fn find_system(&self, capability: Capability) -> Result<&dyn EngineSystem> {
        self.systems
            .find(capability)
            .ok_or_else(|| EcsError::SystemNotFound(format!("{capability:?}")))
    }

    #[must_use]
    pub fn has_system_capability(&self, capability: Capability) -> bool {
        self.systems.find(capability).is_some()
    }

    /// The system at `index` in registration order.
    #[must_use]
    pub fn system_at(&self, index: usize) -> Option<&dyn EngineSystem> {
        self.systems.at(index)
    }

    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    // --- Listeners ---

    /// Register a listener. Adding the same instance twice is a usage error
    /// caught by a debug assertion.
    pub fn add_entity_listener(&mut self, listener: Rc<dyn EntityListener>) {
        debug_assert!(
            !self.listeners.contains(&listener),
            "entity listener already added"
        );
        self.listeners.add(listener);
    }

    /// Returns `true` if the listener was registered.
    pub fn remove_entity_listener(&mut self, listener: &Rc<dyn EntityListener>) -> bool {
        self.listeners.remove(listener)
    }

    // --- Update cycle ---

    /// Run one update cycle: every enabled system, then every deferred
    /// command.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UpdateInProgress`] when called from within an
    /// update. Otherwise returns the first failure of the cycle. A failing
    /// system ends the system pass, but deferred commands are still applied.
    pub fn update(&mut self, dt: f64) -> Result<()> {
        if self.updating {
            return Err(EcsError::UpdateInProgress("update"));
        }
        self.updating = true;
        trace!(engine = %self.id, dt, systems = self.systems.len(), "update");

        let mut result = Ok(());
        for id in self.systems.ids() {
            let Some(mut system) = self.systems.check_out(id) else {
                continue;
            };
            let outcome = if system.is_enabled() {
                system.update(self, dt)
            } else {
                Ok(())
            };
            let name = system.name();
            self.systems.check_in(id, system);
            if let Err(err) = outcome {
                warn!(engine = %self.id, system = name, %err, "system update failed");
                result = Err(err);
                break;
            }
        }

        let drained = self.drain_commands();
        self.updating = false;
        result.and(drained)
    }

    /// Tear everything down: deactivate and drop every entity without
    /// notifying listeners, drop all views, then remove systems last to
    /// first. The engine stays usable.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UpdateInProgress`] while updating and
    /// [`EcsError::SystemBusy`] when called from a system hook. Nothing is
    /// torn down in either case.
    pub fn dispose(&mut self) -> Result<()> {
        if self.updating {
            return Err(EcsError::UpdateInProgress("dispose"));
        }
        if self.systems.has_checked_out() {
            return Err(EcsError::SystemBusy("dispose"));
        }
        debug!(
            engine = %self.id,
            entities = self.entities.len(),
            systems = self.systems.len(),
            "disposing engine"
        );
        for &id in &self.entities {
            let scope = ActivationScope::new(id, self.id, &self.systems);
            if let Some(entity) = self.arena.get_mut(id.key()) {
                if entity.is_activated() {
                    entity.deactivate(scope)?;
                }
                entity.set_engine(None);
            }
        }
        self.entities.clear();
        self.arena.clear();
        self.views.clear();
        self.commands.clear();

        // A hook may remove other systems; those ids are skipped.
        for id in self.systems.ids().into_iter().rev() {
            self.detach_system(id);
        }
        Ok(())
    }

    fn drain_commands(&mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(command) = self.commands.pop_front() {
            trace!(engine = %self.id, ?command, "applying deferred command");
            let outcome = match command {
                Command::Add(id) => self.register_or_discard(id),
                Command::Remove(id) => self.unregister(id).map(drop),
                Command::RemoveAll => self.unregister_all(),
            };
            if let Err(err) = outcome {
                if first_error.is_none() {
                    first_error = Some(err);
                } else {
                    error!(engine = %self.id, ?command, %err, "deferred command failed");
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Register a stored entity, dropping it from the arena if that fails.
    fn register_or_discard(&mut self, id: EntityId) -> Result<()> {
        let result = self.register(id);
        if result.is_err() {
            self.arena.remove(id.key());
        }
        result
    }

    fn register(&mut self, id: EntityId) -> Result<()> {
        let scope = ActivationScope::new(id, self.id, &self.systems);
        let entity = self
            .arena
            .get_mut(id.key())
            .ok_or(EcsError::EntityNotFound(id))?;
        if entity.engine().is_some() {
            return Err(EcsError::AlreadyRegistered);
        }
        entity.set_engine(Some(self.id));
        if let Err(err) = entity.activate(scope) {
            entity.set_engine(None);
            return Err(err);
        }
        self.entities.push(id);
        self.views.entity_added(id, entity);
        debug!(
            engine = %self.id,
            entity = ?id,
            components = entity.component_count(),
            "entity added"
        );

        for listener in self.listeners.snapshot().iter() {
            listener.entity_added(self, id);
        }
        Ok(())
    }

    /// Tear down a registered entity and take it out of the arena. `None` if
    /// it is not registered, or was removed by a listener.
    fn unregister(&mut self, id: EntityId) -> Result<Option<Entity>> {
        if !self.contains_entity(id) {
            return Ok(None);
        }
        for listener in self.listeners.snapshot().iter() {
            listener.entity_removed(self, id);
        }
        if !self.contains_entity(id) {
            return Ok(None);
        }

        let scope = ActivationScope::new(id, self.id, &self.systems);
        let Some(entity) = self.arena.get_mut(id.key()) else {
            return Ok(None);
        };
        entity.deactivate(scope)?;
        entity.set_engine(None);
        if let Some(pos) = self.entities.iter().position(|&e| e == id) {
            self.entities.remove(pos);
        }
        self.views.entity_removed(id);
        debug!(engine = %self.id, entity = ?id, "entity removed");
        Ok(self.arena.remove(id.key()))
    }

    fn unregister_all(&mut self) -> Result<()> {
        debug!(engine = %self.id, entities = self.entities.len(), "removing all entities");
        while let Some(&id) = self.entities.first() {
            self.unregister(id)?;
        }
        Ok(())
    }

    /// Fire the removal hook, then unregister and detach the system. `None`
    /// if it is not registered.
    fn detach_system(&mut self, id: SystemId) -> Option<Box<dyn EngineSystem>> {
        self.with_system(id, |system, engine| system.removed_from_engine(engine));
        let mut system = self.systems.remove(id)?;
        system.base_mut().set_engine(None);
        debug!(engine = %self.id, system = system.name(), "system removed");
        Some(system)
    }

    /// Arena key of `id`, if this engine issued it.
    fn key(&self, id: EntityId) -> Option<EntityKey> {
        (id.engine() == self.id).then(|| id.key())
    }

    /// Run `f` with the system checked out, so it can borrow the engine.
    fn with_system(&mut self, id: SystemId, f: impl FnOnce(&mut dyn EngineSystem, &mut Engine)) {
        if let Some(mut system) = self.systems.check_out(id) {
            f(&mut *system, self);
            self.systems.check_in(id, system);
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.id)
            .field("entities", &self.entities.len())
            .field("views", &self.views.len())
            .field("systems", &self.systems)
            .field("listeners", &self.listeners.len())
            .field("pending", &self.commands.len())
            .field("updating", &self.updating)
            .finish()
    }
}

fn system_not_found<T>() -> EcsError {
    EcsError::SystemNotFound(type_name::<T>().to_string())
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::component::{Component, ComponentContext};
    use crate::system::SystemBase;

    type Log = Rc<RefCell<Vec<String>>>;

    #[derive(Debug, PartialEq)]
    struct Position(f32, f32);
    impl Component for Position {}

    struct Velocity;
    impl Component for Velocity {}

    struct Spawner;
    impl Component for Spawner {}

    /// A system driven by a closure that logs its lifecycle hooks.
    struct Scripted<F> {
        base: SystemBase,
        name: &'static str,
        log: Log,
        run: F,
    }

    fn scripted<F>(name: &'static str, log: &Log, run: F) -> Scripted<F>
    where
        F: FnMut(&mut Engine) -> Result<()> + 'static,
    {
        Scripted {
            base: SystemBase::default(),
            name,
            log: Rc::clone(log),
            run,
        }
    }

    impl<F> EngineSystem for Scripted<F>
    where
        F: FnMut(&mut Engine) -> Result<()> + 'static,
    {
        fn base(&self) -> &SystemBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut SystemBase {
            &mut self.base
        }

        fn added_to_engine(&mut self, _engine: &mut Engine) {
            self.log.borrow_mut().push(format!("added {}", self.name));
        }

        fn removed_from_engine(&mut self, _engine: &mut Engine) {
            self.log.borrow_mut().push(format!("removed {}", self.name));
        }

        fn update(&mut self, engine: &mut Engine, _dt: f64) -> Result<()> {
            self.log.borrow_mut().push(format!("update {}", self.name));
            (self.run)(engine)
        }
    }

    const TICKING: Capability = Capability::from_name("Ticking");

    #[derive(Default)]
    struct Ticker {
        base: SystemBase,
        ticks: u32,
        last_dt: f64,
    }

    impl EngineSystem for Ticker {
        fn base(&self) -> &SystemBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut SystemBase {
            &mut self.base
        }

        fn capabilities(&self) -> &[Capability] {
            &[TICKING]
        }

        fn update(&mut self, _engine: &mut Engine, dt: f64) -> Result<()> {
            self.ticks += 1;
            self.last_dt = dt;
            Ok(())
        }
    }

    /// Logs notifications with the entity's activation state at that time.
    struct Recorder {
        log: Log,
    }

    impl EntityListener for Recorder {
        fn entity_added(&self, engine: &mut Engine, entity: EntityId) {
            let active = engine.entity(entity).is_some_and(Entity::is_activated);
            self.log.borrow_mut().push(format!("entity added active={active}"));
        }

        fn entity_removed(&self, engine: &mut Engine, entity: EntityId) {
            let active = engine.entity(entity).is_some_and(Entity::is_activated);
            self.log.borrow_mut().push(format!("entity removed active={active}"));
        }
    }

    fn recorder(log: &Log) -> Rc<dyn EntityListener> {
        Rc::new(Recorder {
            log: Rc::clone(log),
        })
    }

    /// Registers an extra entity whenever a `Spawner` entity is added.
    struct SpawnOnAdd;

    impl EntityListener for SpawnOnAdd {
        fn entity_added(&self, engine: &mut Engine, entity: EntityId) {
            let spawns = engine
                .entity(entity)
                .is_some_and(|e| e.has_component::<Spawner>());
            if spawns {
                engine
                    .add_entity(Entity::new().with(Position(0.0, 0.0)))
                    .unwrap();
            }
        }

        fn entity_removed(&self, _engine: &mut Engine, _entity: EntityId) {}
    }

    #[test]
    fn test_add_entity_registers_and_activates() {
        let mut engine = Engine::new();
        let id = engine.add_entity(Entity::new().with(Position(1.0, 2.0))).unwrap();

        let entity = engine.entity(id).unwrap();
        assert!(entity.is_activated());
        assert_eq!(entity.engine(), Some(engine.id()));
        assert!(engine.contains_entity(id));
        assert_eq!(engine.entities(), [id]);
        assert_eq!(engine.entity_count(), 1);
    }

    #[test]
    fn test_add_entity_rejects_bound_entities() {
        let mut engine = Engine::new();

        let mut active = Entity::new();
        active.activate(ActivationScope::default()).unwrap();
        assert!(matches!(
            engine.add_entity(active),
            Err(EcsError::AlreadyRegistered)
        ));

        let mut bound = Entity::new();
        bound.set_engine(Some(Engine::new().id()));
        assert!(matches!(
            engine.add_entity(bound),
            Err(EcsError::AlreadyRegistered)
        ));
        assert_eq!(engine.entity_count(), 0);
    }

    #[test]
    fn test_family_view_scenario() {
        let mut engine = Engine::new();
        let e1 = engine
            .add_entity(Entity::new().with(Position(0.0, 0.0)).with(Velocity))
            .unwrap();
        let _e2 = engine.add_entity(Entity::new().with(Position(0.0, 0.0))).unwrap();

        let family = EntityFamily::of::<(Position, Velocity)>();
        assert_eq!(engine.get_entities(&family), [e1]);

        engine.remove_entity(e1).unwrap();
        assert!(engine.get_entities(&family).is_empty());
        assert!(engine.entity(e1).is_none());
    }

    #[test]
    fn test_views_track_registration() {
        let mut engine = Engine::new();
        let family = EntityFamily::of::<(Position,)>();
        let view = engine.view_id(&family);
        assert_eq!(engine.view_id(&EntityFamily::of::<(Position,)>()), view);
        assert_eq!(engine.view_count(), 1);

        let a = engine.add_entity(Entity::new().with(Position(0.0, 0.0))).unwrap();
        let _ = engine.add_entity(Entity::new().with(Velocity)).unwrap();
        let c = engine.add_entity(Entity::new().with(Position(1.0, 1.0))).unwrap();
        assert_eq!(engine.view(view).unwrap(), [a, c]);

        engine.remove_entity(a).unwrap();
        assert_eq!(engine.view(view).unwrap(), [c]);
    }

    #[test]
    fn test_remove_unknown_entity_is_ignored() {
        let mut engine = Engine::new();
        let id = engine.add_entity(Entity::new()).unwrap();
        engine.remove_entity(id).unwrap();
        engine.remove_entity(id).unwrap();
        assert_eq!(engine.entity_count(), 0);
    }

    #[test]
    fn test_removal_during_update_is_deferred() {
        let mut engine = Engine::new();
        let log: Log = Rc::default();
        let family = EntityFamily::of::<(Position,)>();
        let id = engine.add_entity(Entity::new().with(Position(0.0, 0.0))).unwrap();
        let sizes = Rc::new(RefCell::new(Vec::new()));

        let (f, s) = (family.clone(), Rc::clone(&sizes));
        engine
            .add(scripted("remover", &log, move |engine| {
                engine.remove_entity(id)?;
                s.borrow_mut().push(engine.get_entities(&f).len());
                assert!(engine.contains_entity(id));
                Ok(())
            }))
            .unwrap();
        let (f, s) = (family.clone(), Rc::clone(&sizes));
        engine
            .add(scripted("observer", &log, move |engine| {
                s.borrow_mut().push(engine.get_entities(&f).len());
                Ok(())
            }))
            .unwrap();

        engine.update(0.1).unwrap();

        assert_eq!(*sizes.borrow(), [1, 1]);
        assert!(engine.get_entities(&family).is_empty());
        assert!(!engine.contains_entity(id));
        assert!(engine.entity(id).is_none());
        assert_eq!(engine.pending_commands().len(), 0);
    }

    #[test]
    fn test_remove_all_during_update() {
        let mut engine = Engine::new();
        let log: Log = Rc::default();
        let family = EntityFamily::of::<(Position,)>();
        for _ in 0..3 {
            engine.add_entity(Entity::new().with(Position(0.0, 0.0))).unwrap();
        }
        assert_eq!(engine.get_entities(&family).len(), 3);

        engine
            .add(scripted("clear", &log, |engine| {
                engine.remove_all()?;
                assert_eq!(engine.entity_count(), 3);
                Ok(())
            }))
            .unwrap();
        engine.update(0.1).unwrap();

        assert_eq!(engine.entity_count(), 0);
        assert!(engine.get_entities(&family).is_empty());
        assert!(engine.get_entities(&EntityFamily::all()).is_empty());
    }

    #[test]
    fn test_commands_apply_in_fifo_order() {
        let mut engine = Engine::new();
        let log: Log = Rc::default();
        engine.add_entity_listener(recorder(&log));
        let queued = Rc::new(RefCell::new(Vec::new()));

        let q = Rc::clone(&queued);
        engine
            .add(scripted("churn", &log, move |engine| {
                if engine.entity_count() == 0 {
                    let id = engine.add_entity(Entity::new())?;
                    engine.remove_entity(id)?;
                    q.borrow_mut().extend(engine.pending_commands().copied());
                    assert!(engine.entity(id).is_some());
                    assert!(!engine.contains_entity(id));
                }
                Ok(())
            }))
            .unwrap();
        engine.update(0.1).unwrap();

        let queued = queued.borrow();
        let [Command::Add(added), Command::Remove(removed)] = queued[..] else {
            panic!("unexpected queue {queued:?}");
        };
        assert_eq!(added, removed);
        assert_eq!(engine.entity_count(), 0);
        assert!(engine.entity(added).is_none());
        assert_eq!(
            *log.borrow(),
            [
                "added churn",
                "update churn",
                "entity added active=true",
                "entity removed active=true",
            ]
        );
    }

    #[test]
    fn test_listener_mutations_drain_in_same_update() {
        let mut engine = Engine::new();
        let log: Log = Rc::default();
        engine.add_entity_listener(Rc::new(SpawnOnAdd));
        engine
            .add(scripted("spawn", &log, |engine| {
                if engine.entity_count() == 0 {
                    engine.add_entity(Entity::new().with(Spawner))?;
                }
                Ok(())
            }))
            .unwrap();

        engine.update(0.1).unwrap();

        assert_eq!(engine.entity_count(), 2);
        assert_eq!(engine.get_entities(&EntityFamily::of::<(Position,)>()).len(), 1);
    }

    #[test]
    fn test_listener_notification_order() {
        let mut engine = Engine::new();
        let log: Log = Rc::default();
        let listener = recorder(&log);
        engine.add_entity_listener(Rc::clone(&listener));

        let id = engine.add_entity(Entity::new()).unwrap();
        engine.remove_entity(id).unwrap();
        assert!(engine.remove_entity_listener(&listener));
        assert!(!engine.remove_entity_listener(&listener));
        engine.add_entity(Entity::new()).unwrap();

        assert_eq!(
            *log.borrow(),
            ["entity added active=true", "entity removed active=true"]
        );
    }

    #[test]
    fn test_update_reentry_fails() {
        let mut engine = Engine::new();
        let log: Log = Rc::default();
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let ticker = engine.add(Ticker::default()).unwrap();
        let entity = engine.add_entity(Entity::new()).unwrap();

        let o = Rc::clone(&outcomes);
        engine
            .add(scripted("nested", &log, move |engine| {
                let mut o = o.borrow_mut();
                o.push(engine.update(0.1).unwrap_err().to_string());
                o.push(engine.add(Ticker::default()).unwrap_err().to_string());
                if let Err(err) = engine.remove_system(ticker) {
                    o.push(err.to_string());
                }
                o.push(engine.take_entity(entity).unwrap_err().to_string());
                o.push(engine.dispose().unwrap_err().to_string());
                assert!(engine.is_updating());
                Ok(())
            }))
            .unwrap();
        engine.update(0.1).unwrap();

        assert_eq!(
            *outcomes.borrow(),
            [
                "cannot update while updating",
                "cannot add system while updating",
                "cannot remove system while updating",
                "cannot take entity while updating",
                "cannot dispose while updating",
            ]
        );
        assert!(!engine.is_updating());
        assert!(engine.has_system::<Ticker>());
        assert!(engine.contains_entity(entity));
    }

    #[test]
    fn test_entity_ids_are_scoped_to_their_engine() {
        let mut a = Engine::new();
        let mut b = Engine::new();
        let from_a = a.add_entity(Entity::new().with(Position(1.0, 0.0))).unwrap();
        let in_b = b.add_entity(Entity::new().with(Position(2.0, 0.0))).unwrap();

        assert_ne!(from_a, in_b);
        assert_eq!(from_a.engine(), a.id());
        assert!(!b.contains_entity(from_a));
        assert!(b.entity(from_a).is_none());
        assert!(b.entity_mut(from_a).is_none());
        assert!(matches!(
            b.take_entity(from_a),
            Err(EcsError::EntityNotFound(missing)) if missing == from_a
        ));

        b.remove_entity(from_a).unwrap();
        assert!(b.contains_entity(in_b));
        assert_eq!(b.entities(), [in_b]);
        assert!(a.contains_entity(from_a));
    }

    #[test]
    fn test_deferred_removal_of_foreign_id_is_ignored() {
        let mut a = Engine::new();
        let mut b = Engine::new();
        let log: Log = Rc::default();
        let from_a = a.add_entity(Entity::new()).unwrap();
        let in_b = b.add_entity(Entity::new()).unwrap();

        b.add(scripted("remover", &log, move |engine| engine.remove_entity(from_a)))
            .unwrap();
        b.update(0.1).unwrap();

        assert!(b.contains_entity(in_b));
        assert_eq!(b.entity_count(), 1);
    }

    #[test]
    fn test_system_ids_are_scoped_to_their_engine() {
        let mut a = Engine::new();
        let mut b = Engine::new();
        let from_a = a.add(Ticker::default()).unwrap();
        let in_b = b.add(Ticker::default()).unwrap();

        assert_ne!(from_a, in_b);
        assert_eq!(from_a.engine(), a.id());
        assert!(matches!(
            b.remove_system(from_a),
            Err(EcsError::SystemNotFound(_))
        ));
        assert_eq!(b.system_count(), 1);
        assert!(b.has_system::<Ticker>());
        assert!(a.remove_system(from_a).is_ok());
    }

    #[test]
    fn test_system_failure_stops_pass_but_drains() {
        let mut engine = Engine::new();
        let log: Log = Rc::default();
        let id = engine.add_entity(Entity::new()).unwrap();

        engine
            .add(scripted("failing", &log, move |engine| {
                engine.remove_entity(id)?;
                Err(EcsError::NotRegistered)
            }))
            .unwrap();
        engine.add(scripted("skipped", &log, |_| Ok(()))).unwrap();

        assert!(matches!(engine.update(0.1), Err(EcsError::NotRegistered)));
        assert!(!engine.is_updating());
        assert!(!engine.contains_entity(id));
        assert_eq!(
            *log.borrow(),
            ["added failing", "added skipped", "update failing"]
        );
    }

    #[test]
    fn test_disabled_systems_are_skipped() {
        let mut engine = Engine::new();
        engine.add(Ticker::default()).unwrap();
        engine.update(0.25).unwrap();

        engine.get_system_mut::<Ticker>().unwrap().set_enabled(false);
        engine.update(0.5).unwrap();

        let ticker = engine.get_system::<Ticker>().unwrap();
        assert_eq!(ticker.ticks, 1);
        assert_eq!(ticker.last_dt, 0.25);
    }

    #[test]
    fn test_system_lookup() {
        let mut engine = Engine::new();
        let log: Log = Rc::default();
        assert!(matches!(
            engine.get_system::<Ticker>(),
            Err(EcsError::SystemNotFound(_))
        ));

        engine.add(scripted("first", &log, |_| Ok(()))).unwrap();
        let id = engine.add(Ticker::default()).unwrap();

        assert!(engine.has_system::<Ticker>());
        assert!(engine.has_system_capability(TICKING));
        assert!(engine.find_system(TICKING).unwrap().name().ends_with("Ticker"));
        assert!(engine.find_system(Capability::of::<Ticker>()).is_ok());
        assert!(engine.find_system(Capability::from_name("Audio")).is_err());
        assert!(engine.system_at(1).unwrap().name().ends_with("Ticker"));
        assert_eq!(engine.system_count(), 2);
        assert_eq!(
            engine.system_at(0).unwrap().engine(),
            Some(engine.id())
        );

        let removed = engine.remove_system(id).unwrap();
        assert!(removed.engine().is_none());
        assert!(!engine.has_system::<Ticker>());
        assert!(matches!(
            engine.remove_system(id),
            Err(EcsError::SystemNotFound(_))
        ));
    }

    #[test]
    fn test_remove_system_leaves_entities() {
        let mut engine = Engine::new();
        let system = engine.add(Ticker::default()).unwrap();
        let entity = engine.add_entity(Entity::new()).unwrap();

        engine.remove_system(system).unwrap();

        assert!(engine.contains_entity(entity));
        assert!(engine.entity(entity).unwrap().is_activated());
    }

    #[test]
    fn test_dispose_removes_systems_in_reverse() {
        let mut engine = Engine::new();
        let log: Log = Rc::default();
        for name in ["a", "b", "c"] {
            engine.add(scripted(name, &log, |_| Ok(()))).unwrap();
        }
        engine.add_entity_listener(recorder(&log));
        let id = engine.add_entity(Entity::new().with(Position(0.0, 0.0))).unwrap();
        let view = engine.view_id(&EntityFamily::all());
        log.borrow_mut().clear();

        engine.dispose().unwrap();

        assert_eq!(*log.borrow(), ["removed c", "removed b", "removed a"]);
        assert_eq!(engine.system_count(), 0);
        assert_eq!(engine.entity_count(), 0);
        assert!(engine.entity(id).is_none());
        assert!(engine.view(view).is_none());

        // Still usable afterwards.
        let id = engine.add_entity(Entity::new()).unwrap();
        assert!(engine.contains_entity(id));
    }

    /// Tries to dispose its engine from its own registration hook.
    struct DisposeOnAdd {
        base: SystemBase,
        outcome: Rc<RefCell<Option<String>>>,
    }

    impl EngineSystem for DisposeOnAdd {
        fn base(&self) -> &SystemBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut SystemBase {
            &mut self.base
        }

        fn added_to_engine(&mut self, engine: &mut Engine) {
            let outcome = engine.dispose().err().map(|err| err.to_string());
            *self.outcome.borrow_mut() = outcome;
        }
    }

    #[test]
    fn test_dispose_from_system_hook_is_refused() {
        let mut engine = Engine::new();
        let log: Log = Rc::default();
        engine.add(scripted("a", &log, |_| Ok(()))).unwrap();
        let entity = engine.add_entity(Entity::new()).unwrap();
        let outcome = Rc::new(RefCell::new(None));

        engine
            .add(DisposeOnAdd {
                base: SystemBase::default(),
                outcome: Rc::clone(&outcome),
            })
            .unwrap();

        assert_eq!(
            outcome.borrow().as_deref(),
            Some("cannot dispose while a system hook is running")
        );
        assert_eq!(engine.system_count(), 2);
        assert!(engine.contains_entity(entity));

        engine.dispose().unwrap();
        assert_eq!(engine.system_count(), 0);
        assert_eq!(engine.entity_count(), 0);
        assert!(!engine.has_system::<DisposeOnAdd>());
        assert_eq!(*log.borrow(), ["added a", "removed a"]);
    }

    #[test]
    fn test_take_entity_allows_reuse() {
        let mut first = Engine::new();
        let mut second = Engine::new();
        let id = first.add_entity(Entity::new().with(Position(3.0, 4.0))).unwrap();

        let entity = first.take_entity(id).unwrap();
        assert!(!entity.is_activated());
        assert!(entity.engine().is_none());
        assert!(matches!(
            first.take_entity(id),
            Err(EcsError::EntityNotFound(missing)) if missing == id
        ));

        let moved = second.add_entity(entity).unwrap();
        let entity = second.entity(moved).unwrap();
        assert_eq!(entity.engine(), Some(second.id()));
        assert_eq!(entity.get_component::<Position>().unwrap(), &Position(3.0, 4.0));
    }

    /// Records what its activation hook could see.
    #[derive(Default)]
    struct HookWitness {
        saw_ticker: Rc<Cell<bool>>,
        saw_engine: Rc<Cell<bool>>,
    }

    impl Component for HookWitness {
        fn activate(&mut self, ctx: &ComponentContext<'_>) {
            self.saw_ticker.set(ctx.get_system::<Ticker>().is_ok());
            self.saw_engine.set(ctx.engine().is_ok() && ctx.entity().is_some());
        }
    }

    #[test]
    fn test_component_hooks_see_engine_systems() {
        let mut engine = Engine::new();
        engine.add(Ticker::default()).unwrap();
        let witness = HookWitness::default();
        let (ticker, bound) = (Rc::clone(&witness.saw_ticker), Rc::clone(&witness.saw_engine));

        engine.add_entity(Entity::new().with(witness)).unwrap();

        assert!(ticker.get());
        assert!(bound.get());
    }

    #[test]
    fn test_entity_mut_guard() {
        let mut engine = Engine::new();
        let id = engine.add_entity(Entity::new().with(Position(0.0, 0.0))).unwrap();

        let mut entity = engine.entity_mut(id).unwrap();
        entity.get_component_mut::<Position>().unwrap().0 = 7.0;
        assert!(matches!(
            entity.add_component(Velocity),
            Err(EcsError::EntityActivated)
        ));

        assert_eq!(engine.entity(id).unwrap().get_component::<Position>().unwrap().0, 7.0);
    }
}
