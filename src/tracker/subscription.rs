//! Tracker subscriptions: cached views plus creation fan-out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::perception::TrackableKind;
use crate::registry::TrackableId;
use crate::session::{ArSession, SharedState};
use crate::tracker::observer::TrackableObserver;
use crate::tracker::view::TrackableView;

/// Which trackable kinds a tracker cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerScope {
    /// Everything the registry tracks.
    #[default]
    All,
    /// Planes only.
    Planes,
    /// Recognized images only.
    Images,
}

impl TrackerScope {
    fn matches(&self, kind: TrackableKind) -> bool {
        match self {
            TrackerScope::All => true,
            TrackerScope::Planes => kind.is_plane(),
            TrackerScope::Images => kind == TrackableKind::Image,
        }
    }
}

/// One independent observer of the shared registry.
///
/// Several trackers may share one registry (say, one scoped to planes and
/// one to images); each owns its own view cache, observer and cleanup
/// cadence. Caches are keyed by stable id only, so they stay valid across
/// registry mutation.
pub struct TrackerSubscription {
    shared: Arc<SharedState>,
    scope: TrackerScope,
    views: Mutex<HashMap<TrackableId, Arc<TrackableView>>>,
    observer: Mutex<Option<Box<dyn TrackableObserver>>>,
    missing_observer_logged: AtomicBool,
}

impl TrackerSubscription {
    /// Create an unsubscribed tracker over the shared registry.
    pub fn new(shared: Arc<SharedState>, scope: TrackerScope) -> Arc<Self> {
        Arc::new(Self {
            shared,
            scope,
            views: Mutex::new(HashMap::new()),
            observer: Mutex::new(None),
            missing_observer_logged: AtomicBool::new(false),
        })
    }

    /// Supply (or clear) the creation observer.
    pub fn set_observer(&self, observer: Option<Box<dyn TrackableObserver>>) {
        *self.observer.lock() = observer;
    }

    /// Start receiving events: discard views whose trackable already
    /// stopped, then subscribe. Starting twice is a no-op.
    pub fn start(self: &Arc<Self>) {
        self.cleanup();
        self.shared.add_tracker(self.clone());
    }

    /// Stop receiving events. The view cache is kept.
    pub fn stop(self: &Arc<Self>) {
        self.shared.remove_tracker(self);
    }

    /// Drop cached views whose underlying entry is gone.
    fn cleanup(&self) {
        let registry = self.shared.registry.read();
        self.views
            .lock()
            .retain(|&id, _| registry.get(id).is_some());
    }

    /// Number of active trackables in this tracker's scope.
    pub fn count(&self) -> usize {
        let registry = self.shared.registry.read();
        registry
            .active_ids()
            .filter(|&id| {
                registry
                    .get(id)
                    .is_some_and(|record| self.scope.matches(record.kind))
            })
            .count()
    }

    /// View over the trackable at a registry active-list index.
    ///
    /// The index is only meaningful until the next update; the returned
    /// view stays valid beyond that. Out-of-range indices and trackables
    /// outside this tracker's scope yield `None`.
    pub fn get(&self, index: usize) -> Option<Arc<TrackableView>> {
        let id = self.shared.registry.read().id_at(index)?;
        self.get_by_id(id)
    }

    /// View over a stable id. Repeated calls return the same cached view.
    pub fn get_by_id(&self, id: TrackableId) -> Option<Arc<TrackableView>> {
        if let Some(view) = self.views.lock().get(&id) {
            return Some(view.clone());
        }

        let kind = self.shared.registry.read().get(id)?.kind;
        if !self.scope.matches(kind) {
            return None;
        }

        let view = TrackableView::new(self.shared.clone(), id);
        self.views.lock().insert(id, view.clone());
        Some(view)
    }

    /// Resolve a screen point to a view, recording the originating hit on
    /// it for later anchor creation.
    pub fn get_at(&self, session: &mut ArSession, x: f32, y: f32) -> Option<Arc<TrackableView>> {
        let candidates = session.hit_test(x, y);
        for candidate in candidates {
            let id = match session.resolve_hit(&candidate) {
                Some(id) => id,
                None => continue,
            };
            if let Some(view) = self.get_by_id(id) {
                view.record_hit(candidate);
                return Some(view);
            }
        }
        None
    }

    /// Removal event from the session: drop the cached view.
    pub(crate) fn handle_removed(&self, id: TrackableId) {
        self.views.lock().remove(&id);
    }

    /// Creation event from the session: invoke the observer exactly once
    /// for this id, if one is registered and the kind is in scope.
    pub(crate) fn notify_created(&self, id: TrackableId) {
        let in_scope = {
            let registry = self.shared.registry.read();
            registry
                .get(id)
                .is_some_and(|record| self.scope.matches(record.kind))
        };
        if !in_scope {
            return;
        }

        // The observer runs without the slot lock held, so user code may
        // call set_observer from inside the callback.
        let taken = self.observer.lock().take();
        let mut observer = match taken {
            Some(observer) => observer,
            None => {
                if !self.missing_observer_logged.swap(true, Ordering::Relaxed) {
                    warn!("no observer registered, trackable notifications disabled");
                }
                return;
            }
        };

        if let Some(view) = self.get_by_id(id) {
            observer.trackable_created(&view);
        }

        let mut slot = self.observer.lock();
        if slot.is_none() {
            *slot = Some(observer);
        }
    }
}

impl std::fmt::Debug for TrackerSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerSubscription")
            .field("scope", &self.scope)
            .field("cached_views", &self.views.lock().len())
            .finish()
    }
}
