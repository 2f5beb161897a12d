//! Presence tracking.
//!
//! The registry owns the user -> open connections map; the tracker derives
//! online/offline edges from it. Both are plain in-memory structures with no I/O.

pub mod registry;
pub mod tracker;

pub use registry::ConnectionRegistry;
pub use tracker::{PresenceTracker, PresenceTransition};
