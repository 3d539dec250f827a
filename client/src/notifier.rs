//! Change notification for re-render hooks.
//!
//! Observers are stored as `Rc<dyn Fn(&Change)>` and the list is snapshotted
//! before every notification, so an observer may subscribe or unsubscribe
//! from inside its own callback:
//!   - an observer removed during a notification is still called in that round,
//!   - an observer added during a notification is first called on the next one.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use replica_shared::BroadcastKind;

/// Returned by [`ChangeNotifier::subscribe`], used to unsubscribe.
pub type SubscriptionId = u64;

type Observer = Rc<dyn Fn(&Change)>;

/// What settled before a notification fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeCause {
    /// The Channel reported an established connection
    Connected,
    /// A full refresh replaced storage
    Refreshed,
    /// A single record was fetched into storage
    Retrieved,
    /// A create request was acknowledged
    Created,
    /// A bulk update request was acknowledged
    Updated,
    /// A collection-wide delete request was acknowledged
    DeletedAll,
    /// A field write on an entity was confirmed
    EntityWritten,
    /// An entity-scoped update request was acknowledged
    EntityUpdated,
    /// An entity-scoped delete request was acknowledged
    EntityDeleted,
    /// A broadcast of the given kind was applied to storage
    Reconciled(BroadcastKind),
    /// A request settled with an error
    Failed,
}

/// Passed to observers after every observable mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    pub collection: String,
    pub cause: ChangeCause,
}

struct NotifierInner {
    observers: RefCell<Vec<(SubscriptionId, Observer)>>,
    next_id: Cell<SubscriptionId>,
}

/// Observer list owned by a Client and shared with its collections and
/// entities. Starts with zero observers. Notifications may be redundant;
/// observers must tolerate being called more often than strictly needed.
#[derive(Clone)]
pub struct ChangeNotifier {
    inner: Rc<NotifierInner>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(NotifierInner {
                observers: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
            }),
        }
    }

    pub fn subscribe(&self, observer: impl Fn(&Change) + 'static) -> SubscriptionId {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .observers
            .borrow_mut()
            .push((id, Rc::new(observer)));
        id
    }

    /// Returns whether an observer was registered under `id`.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.inner.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }

    pub(crate) fn notify(&self, collection: &str, cause: ChangeCause) {
        let snapshot: Vec<Observer> = self
            .inner
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        if snapshot.is_empty() {
            return;
        }

        let change = Change {
            collection: collection.to_string(),
            cause,
        };
        for observer in snapshot {
            observer(&change);
        }
    }
}
