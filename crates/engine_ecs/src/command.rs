//! Entity mutations deferred while the engine is updating.

use crate::entity::EntityId;

/// A queued entity mutation, applied in FIFO order once the system pass of
/// the current update is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Register an entity already stored in the engine.
    Add(EntityId),
    /// Remove a registered entity. Ignored if it is gone by then.
    Remove(EntityId),
    /// Remove every registered entity.
    RemoveAll,
}
