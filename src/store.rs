//! Store
//!
//! A [`Store`] owns the current snapshot of some state, applies actions to it
//! through a pure [`Reducer`], and tells every subscribed [`Observer`] about
//! each new snapshot. Snapshots are immutable and shared behind an [`Arc`], so
//! readers can hold on to one while the store moves on.

use std::{fmt, sync::Arc};

use smallvec::SmallVec;
use tracing::trace;

/// Pure state transition: the next state from the current one plus an action.
pub trait Reducer: Sized {
    /// Actions understood by this state.
    type Action: fmt::Debug;

    /// Produce the next state. Must not touch anything outside `self` and `action`.
    #[must_use]
    fn reduce(&self, action: Self::Action) -> Self;
}

/// Receives every snapshot produced by a [`Store`].
pub trait Observer<S> {
    /// Called once per dispatched action, after the new snapshot is in place.
    fn on_change(&mut self, snapshot: &S);
}

impl<S, F> Observer<S> for F
where
    F: FnMut(&S),
{
    fn on_change(&mut self, snapshot: &S) {
        (*self)(snapshot);
    }
}

/// Handle returned by [`Store::subscribe`], used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscription<S> = (SubscriptionId, Box<dyn Observer<S>>);

/// Mutable holder around an immutable snapshot.
pub struct Store<S: Reducer> {
    state: Arc<S>,
    observers: SmallVec<[Subscription<S>; 2]>,
    next_subscription: u64,
}

impl<S: Reducer> Store<S> {
    /// Create a store starting from `initial`.
    pub fn new(initial: S) -> Self {
        Self {
            state: Arc::new(initial),
            observers: SmallVec::new(),
            next_subscription: 0,
        }
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<S> {
        Arc::clone(&self.state)
    }

    /// Borrow the current state without taking a snapshot handle.
    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Apply `action`, swap in the resulting snapshot and notify observers in
    /// subscription order.
    pub fn dispatch(&mut self, action: S::Action) -> Arc<S> {
        trace!(?action, observers = self.observers.len(), "dispatching action");

        let next = Arc::new(self.state.reduce(action));

        self.state = Arc::clone(&next);

        for (_, observer) in &mut self.observers {
            observer.on_change(&next);
        }

        next
    }

    /// Register an observer for all future snapshots.
    pub fn subscribe(&mut self, observer: impl Observer<S> + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);

        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));

        id
    }

    /// Remove an observer. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();

        self.observers.retain(|(subscribed, _)| *subscribed != id);

        self.observers.len() != before
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl<S: Reducer + Default> Default for Store<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: Reducer + fmt::Debug> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.state)
            .field("observers", &self.observers.len())
            .finish()
    }
}
