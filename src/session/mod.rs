//! Session context: the single owner of the AR core's state.
//!
//! The session replaces any process-wide registries with one explicitly
//! constructed object whose lifetime matches the AR session, passed (via
//! [`SharedState`]) to every component at setup.

pub mod config;
pub mod context;
pub mod shared;

pub use config::SessionConfig;
pub use context::ArSession;
pub use shared::SharedState;
