use std::cell::{Cell, RefCell};
use std::rc::Rc;

use derive_more::Display;

/// Handle returned by [`PendingRequests::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display(fmt = "observer#{}", _0)]
pub struct ObserverId(u64);

type Observer = Rc<dyn Fn(usize)>;

#[derive(Default)]
struct PendingState {
    count: Cell<usize>,
    next_id: Cell<u64>,
    observers: RefCell<Vec<(ObserverId, Observer)>>,
}

/// Number of in-flight requests, shared by everything holding a clone.
///
/// Observers are called with the new count after every change. Clones share
/// the same counter, so construct one per dashboard and pass it down.
#[derive(Clone, Default)]
pub struct PendingRequests {
    state: Rc<PendingState>,
}

impl std::fmt::Debug for PendingRequests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequests")
            .field("count", &self.count())
            .field("observers", &self.state.observers.borrow().len())
            .finish()
    }
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.state.count.get()
    }

    pub fn is_idle(&self) -> bool {
        self.count() == 0
    }

    /// Mark one request as started; the count drops again when the guard is dropped.
    pub fn begin(&self) -> PendingGuard {
        self.set(self.count() + 1);
        PendingGuard { pending: self.clone() }
    }

    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(usize) + 'static,
    {
        let id = ObserverId(self.state.next_id.get());
        self.state.next_id.set(id.0 + 1);
        self.state.observers.borrow_mut().push((id, Rc::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.state.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    fn set(&self, count: usize) {
        self.state.count.set(count);
        // Snapshot so observers may subscribe or unsubscribe while being notified.
        let observers: Vec<Observer> =
            self.state.observers.borrow().iter().map(|(_, o)| Rc::clone(o)).collect();
        for observer in observers {
            observer(count);
        }
    }
}

/// RAII marker for one in-flight request.
#[must_use = "the request is counted only while the guard is alive"]
pub struct PendingGuard {
    pending: PendingRequests,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let count = self.pending.count().saturating_sub(1);
        self.pending.set(count);
    }
}
