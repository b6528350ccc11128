//! Copy-on-write listener storage.
//!
//! A dispatch takes a [`Snapshot`] of the list and iterates that. Mutating the
//! list while a snapshot is alive clones the underlying vector first, so the
//! in-flight dispatch keeps seeing the set it started with.

use std::rc::Rc;

/// A point-in-time view of a [`ListenerList`].
pub type Snapshot<L> = Rc<Vec<Rc<L>>>;

/// An ordered collection of shared listeners with snapshot iteration.
///
/// Listeners are compared by identity (the address of their allocation), not
/// by value.
pub struct ListenerList<L: ?Sized> {
    entries: Rc<Vec<Rc<L>>>,
}

impl<L: ?Sized> ListenerList<L> {
    /// Create an empty listener list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Rc::new(Vec::new()),
        }
    }

    /// Append a listener. Listeners are notified in the order they were added.
    pub fn add(&mut self, listener: Rc<L>) {
        Rc::make_mut(&mut self.entries).push(listener);
    }

    /// Remove a listener by identity.
    ///
    /// Returns `true` if the listener was registered.
    pub fn remove(&mut self, listener: &Rc<L>) -> bool {
        let Some(pos) = self.position(listener) else {
            return false;
        };
        Rc::make_mut(&mut self.entries).remove(pos);
        true
    }

    /// Returns `true` if this exact listener instance is registered.
    #[must_use]
    pub fn contains(&self, listener: &Rc<L>) -> bool {
        self.position(listener).is_some()
    }

    /// Returns the listeners registered right now.
    ///
    /// The snapshot is unaffected by later calls to [`add`](Self::add) or
    /// [`remove`](Self::remove).
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<L> {
        Rc::clone(&self.entries)
    }

    /// Remove every listener.
    pub fn clear(&mut self) {
        self.entries = Rc::new(Vec::new());
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, listener: &Rc<L>) -> Option<usize> {
        self.entries
            .iter()
            .position(|l| std::ptr::addr_eq(Rc::as_ptr(l), Rc::as_ptr(listener)))
    }
}

impl<L: ?Sized> Default for ListenerList<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> Clone for ListenerList<L> {
    fn clone(&self) -> Self {
        Self {
            entries: Rc::clone(&self.entries),
        }
    }
}

impl<L: ?Sized> std::fmt::Debug for ListenerList<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerList")
            .field("len", &self.entries.len())
            .finish()
    }
}
