use std::sync::Arc;
use std::time::Duration;

use crate::presence::{ConnectionRegistry, PresenceTracker};
use crate::relay::enrich::ProfileStore;
use crate::relay::EventRelay;
use crate::ws::lifecycle::ConnectionLifecycle;
use crate::ws::router::ChannelRouter;

/// Ping/pong timing for connection liveness.
#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

/// Shared application state passed to all handlers via axum State extractor.
///
/// Every piece of relay state hangs off one freshly constructed
/// `ConnectionRegistry`; nothing lives in process-wide globals.
#[derive(Clone)]
pub struct AppState {
    /// Presence edges over the connection registry
    pub tracker: Arc<PresenceTracker>,
    /// Per-user fan-out channels
    pub router: Arc<ChannelRouter>,
    /// Handshake and teardown
    pub lifecycle: Arc<ConnectionLifecycle>,
    /// Inbound event dispatch
    pub relay: Arc<EventRelay>,
    pub heartbeat: Heartbeat,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        enrichment_timeout: Duration,
        heartbeat: Heartbeat,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let tracker = Arc::new(PresenceTracker::new(registry));
        let router = Arc::new(ChannelRouter::new());
        let lifecycle = Arc::new(ConnectionLifecycle::new(tracker.clone(), router.clone()));
        let relay = Arc::new(EventRelay::new(router.clone(), store, enrichment_timeout));

        Self {
            tracker,
            router,
            lifecycle,
            relay,
            heartbeat,
        }
    }
}
