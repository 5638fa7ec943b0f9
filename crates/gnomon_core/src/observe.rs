//! # Change Notification
//!
//! Explicit subscribe/unsubscribe fan-out used by every observable in the
//! scene model.
//!
//! Handlers are invoked synchronously, in subscription order, on the thread
//! that performed the change. The handler list is snapshotted before
//! dispatch, so a handler may subscribe, unsubscribe, or trigger a nested
//! change on the same observable without a borrow conflict.
//!
//! Nothing is unhooked automatically: whoever subscribes owns the returned
//! [`SubscriptionId`] and must hand it back to [`Subscribers::unsubscribe`]
//! during teardown.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Handle returned by [`Subscribers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<E> = Rc<dyn Fn(&E)>;

/// Ordered list of change handlers for events of type `E`.
pub struct Subscribers<E> {
    next_id: Cell<u64>,
    handlers: RefCell<Vec<(SubscriptionId, Handler<E>)>>,
}

impl<E: 'static> Subscribers<E> {
    /// Creates an empty subscriber list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            handlers: RefCell::new(Vec::new()),
        }
    }

    /// Registers a handler and returns the id needed to remove it.
    pub fn subscribe(&self, handler: impl Fn(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((id, Rc::new(handler)));
        id
    }

    /// Removes a handler. Returns false if the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(sub, _)| *sub != id);
        handlers.len() != before
    }

    /// Invokes every handler with `event`. Returns the number invoked.
    pub fn notify(&self, event: &E) -> usize {
        let snapshot: Vec<Handler<E>> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();

        for handler in &snapshot {
            handler(event);
        }
        snapshot.len()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// Returns true if nobody is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }

    /// Drops every subscription.
    pub fn clear(&self) {
        self.handlers.borrow_mut().clear();
    }
}

impl<E: 'static> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.handlers.borrow().len())
            .finish()
    }
}
