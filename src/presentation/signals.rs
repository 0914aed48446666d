use leptos::*;

use crate::application::loading::{ObserverId, PendingRequests};
use crate::application::pipeline::DashboardFrame;

/// Reactive view state for a Leptos dashboard.
#[derive(Clone, Copy)]
pub struct DashboardSignals {
    pub pending: RwSignal<usize>,
    pub frame: RwSignal<Option<DashboardFrame>>,
    pub last_error: RwSignal<Option<String>>,
}

impl Default for DashboardSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardSignals {
    pub fn new() -> Self {
        Self {
            pending: create_rw_signal(0),
            frame: create_rw_signal(None),
            last_error: create_rw_signal(None),
        }
    }

    /// Mirror the counter into `pending`; returns the subscription so the view can detach.
    pub fn bind_pending(&self, requests: &PendingRequests) -> ObserverId {
        let pending = self.pending;
        pending.set(requests.count());
        requests.subscribe(move |count| pending.set(count))
    }

    pub fn publish(&self, frame: DashboardFrame) {
        self.last_error.set(None);
        self.frame.set(Some(frame));
    }

    pub fn fail(&self, message: impl Into<String>) {
        self.last_error.set(Some(message.into()));
    }

    pub fn is_loading(&self) -> bool {
        self.pending.get() > 0
    }
}
