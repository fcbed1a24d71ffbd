//! The creation-notification capability.

use std::sync::Arc;

use crate::tracker::view::TrackableView;

/// Receives one call per newly created trackable, in detection order
/// within each frame.
///
/// Supplied at setup via
/// [`TrackerSubscription::set_observer`](crate::tracker::TrackerSubscription::set_observer);
/// leaving it unset is a configuration choice that disables notifications
/// for that tracker (logged once, not an error).
pub trait TrackableObserver {
    /// A trackable entered the registry this frame.
    fn trackable_created(&mut self, view: &Arc<TrackableView>);
}

impl<F: FnMut(&Arc<TrackableView>)> TrackableObserver for F {
    fn trackable_created(&mut self, view: &Arc<TrackableView>) {
        self(view)
    }
}
