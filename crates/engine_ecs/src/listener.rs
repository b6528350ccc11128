//! Observers of entity registration and removal.

use crate::engine::Engine;
use crate::entity::EntityId;

/// Notified after an entity is registered and before it is torn down.
///
/// Both callbacks receive the engine mutably. Entity mutations made from a
/// callback during an update are deferred like any other.
pub trait EntityListener {
    /// The entity is registered, active and present in every matching view.
    fn entity_added(&self, engine: &mut Engine, entity: EntityId);

    /// The entity is about to be deactivated and removed. It is still
    /// registered and its components are readable.
    fn entity_removed(&self, engine: &mut Engine, entity: EntityId);
}
