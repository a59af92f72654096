//! Result store for the discovery fan-out.
//!
//! Fetch tasks never touch the result map. They hold a [`ServerInfoSink`]
//! and send every parsed [`ServerInfo`] to a single collector task that owns
//! the map exclusively. The collector finishes once every sink is dropped,
//! so awaiting [`Collector::finish`] is the completion barrier: the map is
//! only handed out after all writers are gone.

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, trace, warn};

use crate::protocol::message::ServerInfo;
use crate::utils::metrics::global_metrics;

/// Pending inserts buffered before writers wait on the collector
pub const COLLECTOR_CAPACITY: usize = 512;

/// Server infos keyed by server address
#[derive(Debug, Clone, Default)]
pub struct ServerInfoSet {
    servers: HashMap<SocketAddr, ServerInfo>,
}

impl ServerInfoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `info`, replacing an older record of the same server.
    ///
    /// Returns `true` if the server was not known before.
    pub fn insert(&mut self, info: ServerInfo) -> bool {
        self.servers.insert(info.address, info).is_none()
    }

    pub fn get(&self, address: &SocketAddr) -> Option<&ServerInfo> {
        self.servers.get(address)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// All collected records, in no particular order
    pub fn values(self) -> Vec<ServerInfo> {
        self.servers.into_values().collect()
    }
}

/// Write handle given to fetch tasks
#[derive(Debug, Clone)]
pub struct ServerInfoSink {
    tx: mpsc::Sender<ServerInfo>,
}

impl ServerInfoSink {
    pub async fn insert(&self, info: ServerInfo) {
        let address = info.address;
        if self.tx.send(info).await.is_err() {
            warn!(%address, "Collector closed, dropping server info");
        }
    }
}

/// Collector task plus the first sink
#[derive(Debug)]
pub struct Collector {
    sink: ServerInfoSink,
    task: JoinHandle<ServerInfoSet>,
}

impl Collector {
    /// Start the collector task on the current runtime
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::channel::<ServerInfo>(COLLECTOR_CAPACITY);

        let task = tokio::spawn(async move {
            let mut servers = ServerInfoSet::new();
            while let Some(info) = rx.recv().await {
                let address = info.address;
                if servers.insert(info) {
                    global_metrics().server_discovered();
                    trace!(%address, "Server collected");
                } else {
                    trace!(%address, "Server info replaced");
                }
            }
            servers
        });

        Self {
            sink: ServerInfoSink { tx },
            task,
        }
    }

    /// Another write handle
    pub fn sink(&self) -> ServerInfoSink {
        self.sink.clone()
    }

    /// Drop the first sink and wait until every other sink is gone and
    /// all pending inserts are applied.
    pub async fn finish(self) -> ServerInfoSet {
        drop(self.sink);
        match self.task.await {
            Ok(servers) => servers,
            Err(e) => {
                error!(error = %e, "Collector task failed");
                ServerInfoSet::new()
            }
        }
    }
}
