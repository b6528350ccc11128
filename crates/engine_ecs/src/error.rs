//! Error types for entity, component and engine operations.
//!
//! Every failure is a usage error surfaced to the immediate caller. There is
//! no retry or recovery inside the engine.

use crate::entity::EntityId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EcsError>;

/// Broad classification of an [`EcsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An operation was attempted in a state that does not allow it.
    State,
    /// An argument was unacceptable for the operation.
    Argument,
    /// A lookup found no match.
    NotFound,
}

/// Errors raised by the entity engine.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// Components can only be added to entities that are not yet active.
    #[error("cannot add component to activated entity")]
    EntityActivated,

    /// The entity was activated twice.
    #[error("entity already activated")]
    EntityAlreadyActive,

    /// The entity was deactivated while inactive.
    #[error("entity not activated")]
    EntityNotActive,

    /// A component was activated twice.
    #[error("component already activated")]
    ComponentAlreadyActive,

    /// A component was deactivated while inactive.
    #[error("component not activated")]
    ComponentNotActive,

    /// The entity already belongs to an engine.
    #[error("entity already added to an engine")]
    AlreadyRegistered,

    /// The operation is not allowed while the engine is updating.
    #[error("cannot {0} while updating")]
    UpdateInProgress(&'static str),

    /// The operation is not allowed while a system hook is running.
    #[error("cannot {0} while a system hook is running")]
    SystemBusy(&'static str),

    /// The operation needs an engine, but the caller is not attached to one.
    #[error("not attached to an engine")]
    NotRegistered,

    /// No component matched the requested type or capability.
    #[error("component not found: {0}")]
    ComponentNotFound(String),

    /// No system matched the requested type or capability.
    #[error("system not found: {0}")]
    SystemNotFound(String),

    /// The entity id passed in does not refer to an entity registered with
    /// this engine.
    #[error("entity not found: {0:?}")]
    EntityNotFound(EntityId),
}

impl EcsError {
    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EntityActivated
            | Self::EntityAlreadyActive
            | Self::EntityNotActive
            | Self::ComponentAlreadyActive
            | Self::ComponentNotActive
            | Self::AlreadyRegistered
            | Self::UpdateInProgress(_)
            | Self::SystemBusy(_)
            | Self::NotRegistered => ErrorKind::State,
            Self::EntityNotFound(_) => ErrorKind::Argument,
            Self::ComponentNotFound(_) | Self::SystemNotFound(_) => ErrorKind::NotFound,
        }
    }
}
