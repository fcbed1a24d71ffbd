//! State shared between the session and its subscriptions.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::registry::{PoseCache, TrackableRegistry};
use crate::tracker::TrackerSubscription;

/// Shared core state: the trackable registry, the pose cache, and the set
/// of subscribed trackers.
///
/// All mutation happens at most once per rendered frame on the thread that
/// drives [`ArSession::update`](crate::session::ArSession::update); the
/// locks exist so subscriptions and views can hold a reference without
/// tying their lifetime to the session borrow.
pub struct SharedState {
    /// The stable-ID registry. The session writes once per frame;
    /// everything else reads.
    pub registry: RwLock<TrackableRegistry>,

    /// Matrix cache for renderer queries.
    pub poses: RwLock<PoseCache>,

    /// Currently subscribed trackers, fan-out order = subscription order.
    trackers: RwLock<Vec<Arc<TrackerSubscription>>>,
}

impl SharedState {
    /// Create empty shared state.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            registry: RwLock::new(TrackableRegistry::new()),
            poses: RwLock::new(PoseCache::new()),
            trackers: RwLock::new(Vec::new()),
        })
    }

    /// Subscribe a tracker. Subscribing twice is a no-op.
    pub(crate) fn add_tracker(&self, tracker: Arc<TrackerSubscription>) {
        let mut trackers = self.trackers.write();
        if !trackers.iter().any(|t| Arc::ptr_eq(t, &tracker)) {
            trackers.push(tracker);
        }
    }

    /// Unsubscribe a tracker. Unknown trackers are ignored.
    pub(crate) fn remove_tracker(&self, tracker: &Arc<TrackerSubscription>) {
        self.trackers
            .write()
            .retain(|t| !Arc::ptr_eq(t, tracker));
    }

    /// Snapshot of the subscription list, for lock-free fan-out.
    pub(crate) fn trackers_snapshot(&self) -> Vec<Arc<TrackerSubscription>> {
        self.trackers.read().clone()
    }
}
