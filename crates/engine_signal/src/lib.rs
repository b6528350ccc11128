//! # engine_signal
//!
//! Decoupled, synchronous one-to-many notification for the entity engine.
//!
//! This crate provides:
//!
//! - [`ListenerList`]: an ordered listener collection with copy-on-write
//!   snapshots, so listeners may add or remove listeners (themselves included)
//!   while a dispatch is in progress.
//! - [`Signal`]: a typed event channel delivering a value to every registered
//!   [`SignalListener`] in registration order.
//!
//! The crate is independent of the entity model; `engine_ecs` reuses
//! [`ListenerList`] for its entity listeners.

pub mod listeners;
pub mod signal;

pub use listeners::{ListenerList, Snapshot};
pub use signal::{Signal, SignalListener};
