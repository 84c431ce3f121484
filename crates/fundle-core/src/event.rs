//! Typed publish/subscribe channel.
//!
//! Every reactive piece of fundle (model instances, model classes,
//! collections, components) composes an [`EventBus`] instead of rolling its
//! own dispatch.
//!
//! # Invariants
//!
//! 1. Listeners are invoked in registration order.
//! 2. No `RefCell` borrow is held while a listener runs, so a listener may
//!    emit, subscribe or unsubscribe on the same bus.
//! 3. The listener list is snapshotted before dispatch. Listeners added
//!    during a dispatch are not called for that event; listeners removed
//!    during a dispatch are not called after their removal.
//! 4. Dropping a [`Subscription`] detaches its listener.
//!
//! # Failure Modes
//!
//! - Emitting on a bus with no listeners is a no-op.
//! - Dropping a `Subscription` after its bus is gone is a no-op.
//! - A panicking listener propagates to the emitter; later listeners in
//!   that dispatch do not run.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// An event that can be routed by kind.
pub trait Topic: 'static {
    /// Discriminant used for filtered subscriptions.
    type Kind: Copy + Eq + fmt::Debug + 'static;

    /// The kind of this event.
    fn kind(&self) -> Self::Kind;
}

type Callback<E> = Rc<dyn Fn(&E)>;

struct ListenerSlot<E: Topic> {
    id: u64,
    filter: Option<E::Kind>,
    callback: Callback<E>,
}

struct BusState<E: Topic> {
    next_id: u64,
    listeners: Vec<ListenerSlot<E>>,
}

impl<E: Topic> BusState<E> {
    fn contains(&self, id: u64) -> bool {
        self.listeners.iter().any(|slot| slot.id == id)
    }
}

trait Detach {
    fn detach(&self, id: u64) -> bool;
    fn attached(&self, id: u64) -> bool;
}

impl<E: Topic> Detach for RefCell<BusState<E>> {
    fn attached(&self, id: u64) -> bool {
        self.borrow().contains(id)
    }

    fn detach(&self, id: u64) -> bool {
        let mut state = self.borrow_mut();
        let before = state.listeners.len();
        state.listeners.retain(|slot| slot.id != id);
        state.listeners.len() != before
    }
}

/// A single-threaded, re-entrant event channel.
///
/// Cloning an `EventBus` yields another handle to the same listener list.
pub struct EventBus<E: Topic> {
    state: Rc<RefCell<BusState<E>>>,
}

impl<E: Topic> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<E: Topic> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Topic> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<E: Topic> EventBus<E> {
    /// Create a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(BusState {
                next_id: 1,
                listeners: Vec::new(),
            })),
        }
    }

    /// Listen to every event on this bus.
    pub fn subscribe(&self, callback: impl Fn(&E) + 'static) -> Subscription {
        self.register(None, Rc::new(callback))
    }

    /// Listen to events of one kind.
    pub fn on(&self, kind: E::Kind, callback: impl Fn(&E) + 'static) -> Subscription {
        self.register(Some(kind), Rc::new(callback))
    }

    fn register(&self, filter: Option<E::Kind>, callback: Callback<E>) -> Subscription {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id;
            state.next_id += 1;
            state.listeners.push(ListenerSlot {
                id,
                filter,
                callback,
            });
            id
        };
        let weak: Weak<RefCell<BusState<E>>> = Rc::downgrade(&self.state);
        Subscription { bus: weak, id }
    }

    /// Deliver `event` to every matching listener. Returns how many ran.
    pub fn emit(&self, event: &E) -> usize {
        let kind = event.kind();
        let snapshot: Vec<(u64, Callback<E>)> = self
            .state
            .borrow()
            .listeners
            .iter()
            .filter(|slot| slot.filter.is_none_or(|wanted| wanted == kind))
            .map(|slot| (slot.id, Rc::clone(&slot.callback)))
            .collect();

        tracing::trace!(?kind, listeners = snapshot.len(), "event bus dispatch");

        let mut delivered = 0;
        for (id, callback) in snapshot {
            // Removed by an earlier listener in this same dispatch.
            if !self.state.borrow().contains(id) {
                continue;
            }
            callback(event);
            delivered += 1;
        }
        delivered
    }

    /// Number of attached listeners, filtered or not.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    /// Number of listeners that would receive an event of `kind`.
    #[must_use]
    pub fn listener_count_for(&self, kind: E::Kind) -> usize {
        self.state
            .borrow()
            .listeners
            .iter()
            .filter(|slot| slot.filter.is_none_or(|wanted| wanted == kind))
            .count()
    }

    /// Whether `self` and `other` share a listener list.
    #[must_use]
    pub fn same_bus(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

/// RAII guard for a bus listener. Dropping it detaches the listener.
#[must_use = "dropping a Subscription detaches the listener immediately"]
pub struct Subscription {
    bus: Weak<dyn Detach>,
    id: u64,
}

impl Subscription {
    /// Detach now. Returns `false` if the listener was already gone.
    pub fn unsubscribe(self) -> bool {
        self.detach_inner()
    }

    /// Whether the listener is still attached.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.bus.upgrade().is_some_and(|bus| bus.attached(self.id))
    }

    fn detach_inner(&self) -> bool {
        match self.bus.upgrade() {
            Some(bus) => bus.detach(self.id),
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach_inner();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("bus_alive", &(self.bus.strong_count() > 0))
            .finish()
    }
}
