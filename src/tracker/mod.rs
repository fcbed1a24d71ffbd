//! Observer fan-out and stable-ID-keyed views over the registry.

pub mod observer;
pub mod subscription;
pub mod view;

pub use observer::TrackableObserver;
pub use subscription::{TrackerScope, TrackerSubscription};
pub use view::TrackableView;
