use std::sync::Arc;

use tokio::task::JoinHandle;

use pinzo_core::{ChangeLog, MemoryStore, SharedRecordStore};

use crate::auth::SharedAuthService;
use crate::cdc::start_processor;
use crate::config::ServerConfig;
use crate::gate::SessionGate;
use crate::relay::ChangeRelay;

/// Application state shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub store: SharedRecordStore,
    pub relay: ChangeRelay,
    pub auth: SharedAuthService,
    pub gate: Arc<SessionGate>,
    pub config: ServerConfig,
}

impl AppState {
    /// Wire an in-memory store to a fresh relay through the CDC processor.
    ///
    /// Must be called inside a Tokio runtime. The returned handle is the CDC
    /// task; it stops once the store is dropped.
    pub fn new(config: ServerConfig, auth: SharedAuthService) -> (Self, JoinHandle<()>) {
        let changelog = Arc::new(ChangeLog::new());
        let relay = ChangeRelay::with_buffer(config.subscriber_buffer);
        let cdc = start_processor(&changelog, relay.clone());
        let store: SharedRecordStore = Arc::new(MemoryStore::with_changelog(changelog));

        (Self::from_parts(store, relay, auth, config), cdc)
    }

    /// Assemble state from already-wired parts.
    pub fn from_parts(
        store: SharedRecordStore,
        relay: ChangeRelay,
        auth: SharedAuthService,
        config: ServerConfig,
    ) -> Self {
        Self {
            gate: Arc::new(SessionGate::new(auth.clone(), &config)),
            store,
            relay,
            auth,
            config,
        }
    }
}
