use crate::{config::RelayConfig, registry::Registry};
use sketchrelay_shared::{ConnectionId, WsMessage};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;

pub type SharedRegistry = Arc<RwLock<Registry>>;

/// One connection's outbound queue sender.
#[derive(Clone)]
pub struct PeerHandle {
    pub tx: mpsc::UnboundedSender<WsMessage>,
}

pub type Peers = Arc<RwLock<HashMap<ConnectionId, PeerHandle>>>;

#[derive(Clone)]
pub struct AppState {
    pub registry: SharedRegistry,
    pub peers: Peers,
    /// Delay between a disconnect and the settled occupancy recompute.
    pub settle_delay: Duration,
    pub empty_room_ttl_secs: u64,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(relay: &RelayConfig) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::new())),
            peers: Arc::new(RwLock::new(HashMap::new())),
            settle_delay: Duration::from_millis(relay.settle_delay_ms),
            empty_room_ttl_secs: relay.empty_room_ttl_secs,
            shutdown: CancellationToken::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&RelayConfig::default())
    }
}
