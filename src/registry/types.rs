//! Stable ID types handed out to application code.
//!
//! Both IDs are allocated monotonically starting at 1 and never reused
//! within a session; `0` is reserved and never assigned, so it is free to
//! act as an "empty" sentinel at FFI-ish call sites. Application code must
//! hold IDs, never active-list indices; only the ID survives a frame.

/// Unique application-facing identifier for a trackable.
///
/// Lightweight handle for cross-referencing without Arc/Rc; the engine's
/// own object identity is hidden behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackableId(pub u32);

impl TrackableId {
    /// Create a new TrackableId with the given value.
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TrackableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Unique application-facing identifier for an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(pub u32);

impl AnchorId {
    /// Create a new AnchorId with the given value.
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AnchorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "A{}", self.0)
    }
}
