//! Typed one-to-many event channel.
//!
//! A [`Signal`] delivers a value to every registered [`SignalListener`],
//! synchronously and in registration order. Registration goes through `&self`
//! so listeners can hold a reference to the signal and (un)register listeners
//! from inside [`SignalListener::receive`].
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use engine_signal::Signal;
//!
//! let signal = Signal::<u32>::new();
//! let total = Rc::new(Cell::new(0));
//!
//! let sink = Rc::clone(&total);
//! let handle = signal.connect(move |value| sink.set(sink.get() + *value));
//!
//! signal.dispatch(&3);
//! signal.dispatch(&4);
//! assert_eq!(total.get(), 7);
//!
//! signal.remove_signal_listener(&handle);
//! signal.dispatch(&100);
//! assert_eq!(total.get(), 7);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::listeners::ListenerList;

/// Receives values dispatched through a [`Signal`].
pub trait SignalListener<T> {
    /// Called once per dispatch with the dispatched value.
    fn receive(&self, value: &T);
}

impl<T, F> SignalListener<T> for F
where
    F: Fn(&T),
{
    fn receive(&self, value: &T) {
        self(value);
    }
}

/// A typed event channel with snapshot-at-dispatch-start semantics.
///
/// Listeners added during a dispatch are first notified by the next dispatch.
/// Listeners removed during a dispatch still receive the value being
/// dispatched, since the dispatch iterates the set that existed when it began.
pub struct Signal<T> {
    listeners: RefCell<ListenerList<dyn SignalListener<T>>>,
}

impl<T> Signal<T> {
    /// Create a signal with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(ListenerList::new()),
        }
    }

    /// Register a listener.
    ///
    /// Registering the same listener instance twice is a usage error and is
    /// caught by a debug assertion.
    pub fn add_signal_listener(&self, listener: Rc<dyn SignalListener<T>>) {
        let mut listeners = self.listeners.borrow_mut();
        debug_assert!(
            !listeners.contains(&listener),
            "signal listener already added"
        );
        listeners.add(listener);
    }

    /// Register a closure and return the handle needed to remove it again.
    pub fn connect<F>(&self, f: F) -> Rc<dyn SignalListener<T>>
    where
        F: Fn(&T) + 'static,
        T: 'static,
    {
        let listener: Rc<dyn SignalListener<T>> = Rc::new(f);
        self.add_signal_listener(Rc::clone(&listener));
        listener
    }

    /// Unregister a listener.
    ///
    /// Returns `true` if the listener was registered.
    pub fn remove_signal_listener(&self, listener: &Rc<dyn SignalListener<T>>) -> bool {
        self.listeners.borrow_mut().remove(listener)
    }

    /// Deliver `value` to every listener registered at the time of the call.
    pub fn dispatch(&self, value: &T) {
        // The borrow must end before listeners run; they may (un)register.
        let snapshot = self.listeners.borrow().snapshot();
        trace!(listeners = snapshot.len(), "dispatching signal");
        for listener in snapshot.iter() {
            listener.receive(value);
        }
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
