//! Server discovery across all master servers.
//!
//! ```text
//! master 1 ──► list ──► server a ──► info ─┐
//!          └──────────► server b ──► info ─┤
//! master 2 ──► list ──► server c ──► info ─┼──► collector ──► Vec<ServerInfo>
//! master 3 ──✗ (timed out, contributes nothing)
//! ```
//!
//! One task per master server, one nested task per reported game server.
//! Every task owns its socket. Failures stay local to the task that hit
//! them: the fan-out never fails as a whole, it returns whatever it found.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::config::BrowserConfig;
use crate::core::packet::RequestKind;
use crate::error::{BrowserError, Result};
use crate::protocol::handshake::{fetch, RetryPolicy};
use crate::protocol::message::{
    parse_server_count, parse_server_info, parse_server_list, ServerInfo,
};
use crate::service::collector::{Collector, ServerInfoSink};
use crate::transport::{SocketBuffers, UdpTransport};
use crate::utils::metrics::{global_metrics, Timer};

/// Client for master servers and game servers
#[derive(Debug, Clone)]
pub struct Browser {
    config: BrowserConfig,
    policy: Arc<RetryPolicy>,
    bind: SocketAddr,
}

impl Browser {
    /// Create a browser from a validated configuration
    pub fn new(config: BrowserConfig) -> Result<Self> {
        config.validate_strict()?;

        let bind = config.transport.bind_address.parse().map_err(|e| {
            BrowserError::ConfigError(format!(
                "Invalid bind address '{}': {e}",
                config.transport.bind_address
            ))
        })?;

        Ok(Self {
            policy: Arc::new(RetryPolicy::from_config(&config)),
            config,
            bind,
        })
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Discover all servers with the configured default budgets
    pub async fn server_infos(&self) -> Vec<ServerInfo> {
        self.server_infos_with_timeouts(
            self.config.discovery.master_timeout,
            self.config.discovery.server_timeout,
        )
        .await
    }

    /// Query every master server for its list, then every listed server
    /// for its info. Each master exchange gets `master_timeout`, each game
    /// server exchange `server_timeout`.
    ///
    /// Never fails: unreachable or misbehaving peers simply contribute
    /// nothing. Servers listed by several masters appear once.
    #[instrument(skip(self), fields(
        masters = self.config.discovery.master_servers.len(),
        master_timeout_ms = master_timeout.as_millis() as u64,
        server_timeout_ms = server_timeout.as_millis() as u64,
    ))]
    pub async fn server_infos_with_timeouts(
        &self,
        master_timeout: Duration,
        server_timeout: Duration,
    ) -> Vec<ServerInfo> {
        let _timer = Timer::start("server_infos");
        let collector = Collector::spawn();

        let mut masters = JoinSet::new();
        for master in &self.config.discovery.master_servers {
            masters.spawn(fetch_servers_from_master(
                master.clone(),
                self.bind,
                Arc::clone(&self.policy),
                master_timeout,
                server_timeout,
                collector.sink(),
            ));
        }

        while let Some(joined) = masters.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Master server task failed");
            }
        }

        let servers = collector.finish().await;
        info!(servers = servers.len(), "Discovery finished");
        servers.values()
    }

    /// Fetch the info of the server at `ip:port` with the configured
    /// server budget
    pub async fn server_info(&self, ip: &str, port: i64) -> Result<ServerInfo> {
        self.server_info_with_timeout(ip, port, self.config.discovery.server_timeout)
            .await
    }

    /// Fetch the info of the server at `ip:port` within `timeout`.
    ///
    /// # Errors
    /// - [`BrowserError::InvalidIp`] if `ip` is not an IP address
    /// - [`BrowserError::InvalidPort`] if `port` is outside `0..=65535`
    /// - any exchange or parse error of the query itself
    pub async fn server_info_with_timeout(
        &self,
        ip: &str,
        port: i64,
        timeout: Duration,
    ) -> Result<ServerInfo> {
        let ip: IpAddr = ip
            .parse()
            .map_err(|_| BrowserError::InvalidIp(ip.to_string()))?;
        let port = u16::try_from(port).map_err(|_| BrowserError::InvalidPort(port))?;

        query_server_info(
            SocketAddr::new(ip, port),
            self.bind,
            &self.policy,
            timeout.max(self.policy.min_timeout),
        )
        .await
    }

    /// Ask one master server for the addresses it knows
    #[instrument(skip(self), fields(timeout_ms = timeout.as_millis() as u64))]
    pub async fn server_list(&self, master: SocketAddr, timeout: Duration) -> Result<Vec<SocketAddr>> {
        query_server_list(master, self.bind, &self.policy, timeout).await
    }

    /// Ask one master server how many servers are registered with it
    #[instrument(skip(self), fields(timeout_ms = timeout.as_millis() as u64))]
    pub async fn server_count(&self, master: SocketAddr, timeout: Duration) -> Result<u16> {
        let buffers = SocketBuffers::master(self.policy.max_response_size);
        let mut transport = UdpTransport::connect(self.bind, master, buffers).await?;
        let response = fetch(RequestKind::ServerCount, &mut transport, timeout, &self.policy).await?;
        parse_server_count(&response)
    }
}

impl Default for Browser {
    fn default() -> Self {
        Self {
            policy: Arc::new(RetryPolicy::default()),
            config: BrowserConfig::default(),
            bind: SocketAddr::from(([0, 0, 0, 0], 0)),
        }
    }
}

async fn query_server_list(
    master: SocketAddr,
    bind: SocketAddr,
    policy: &RetryPolicy,
    timeout: Duration,
) -> Result<Vec<SocketAddr>> {
    let buffers = SocketBuffers::master(policy.max_response_size);
    let mut transport = UdpTransport::connect(bind, master, buffers).await?;
    let response = fetch(RequestKind::ServerList, &mut transport, timeout, policy).await?;
    parse_server_list(&response)
}

async fn query_server_info(
    server: SocketAddr,
    bind: SocketAddr,
    policy: &RetryPolicy,
    timeout: Duration,
) -> Result<ServerInfo> {
    let buffers = SocketBuffers::game_server(policy.max_response_size, timeout);
    let mut transport = UdpTransport::connect(bind, server, buffers).await?;
    let response = fetch(RequestKind::ServerInfo, &mut transport, timeout, policy).await?;
    parse_server_info(&response, server)
}

async fn resolve(master: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(master)
        .await?
        .next()
        .ok_or_else(|| BrowserError::InvalidIp(master.to_string()))
}

/// First-level task: list one master's servers and query each of them.
/// Completes only after all of its second-level tasks completed.
#[instrument(skip(bind, policy, master_timeout, server_timeout, sink))]
async fn fetch_servers_from_master(
    master: String,
    bind: SocketAddr,
    policy: Arc<RetryPolicy>,
    master_timeout: Duration,
    server_timeout: Duration,
    sink: ServerInfoSink,
) {
    let address = match resolve(&master).await {
        Ok(address) => address,
        Err(e) => {
            debug!(error = %e, "Master server did not resolve");
            return;
        }
    };

    let servers = match query_server_list(address, bind, &policy, master_timeout).await {
        Ok(servers) => servers,
        Err(e) => {
            debug!(%address, error = %e, "Master server query failed");
            return;
        }
    };

    global_metrics().master_server_answered();
    debug!(%address, servers = servers.len(), "Master server answered");

    let mut infos = JoinSet::new();
    for server in servers {
        infos.spawn(fetch_server_info_from_address(
            server,
            bind,
            Arc::clone(&policy),
            server_timeout,
            sink.clone(),
        ));
    }

    while let Some(joined) = infos.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Server info task failed");
        }
    }
}

/// Second-level task: query one game server and hand its info to the
/// collector.
#[instrument(skip(bind, policy, timeout, sink))]
async fn fetch_server_info_from_address(
    server: SocketAddr,
    bind: SocketAddr,
    policy: Arc<RetryPolicy>,
    timeout: Duration,
    sink: ServerInfoSink,
) {
    match query_server_info(server, bind, &policy, timeout).await {
        Ok(info) => sink.insert(info).await,
        Err(e) => debug!(error = %e, "Server info query failed"),
    }
}
