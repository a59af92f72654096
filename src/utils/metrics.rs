//! Observability and Metrics
//!
//! Counters for the retry engine and the discovery fan-out.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Global metrics collector for browser operations
#[derive(Debug)]
pub struct Metrics {
    /// Exchanges started (token and typed)
    pub exchanges_total: AtomicU64,
    /// Exchanges that produced a response
    pub exchanges_success: AtomicU64,
    /// Exchanges that ran out of time
    pub exchanges_timed_out: AtomicU64,
    /// Exchanges aborted by a failed write
    pub exchanges_failed: AtomicU64,
    /// Datagrams sent, burst copies included
    pub datagrams_sent: AtomicU64,
    /// Datagrams received
    pub datagrams_received: AtomicU64,
    /// Total bytes sent
    pub bytes_sent: AtomicU64,
    /// Total bytes received
    pub bytes_received: AtomicU64,
    /// Received datagrams of the wrong type or size
    pub mismatched_responses: AtomicU64,
    /// Master servers that returned a server list
    pub master_servers_answered: AtomicU64,
    /// Game servers whose info was collected
    pub servers_discovered: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            exchanges_total: AtomicU64::new(0),
            exchanges_success: AtomicU64::new(0),
            exchanges_timed_out: AtomicU64::new(0),
            exchanges_failed: AtomicU64::new(0),
            datagrams_sent: AtomicU64::new(0),
            datagrams_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            mismatched_responses: AtomicU64::new(0),
            master_servers_answered: AtomicU64::new(0),
            servers_discovered: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn exchange_started(&self) {
        self.exchanges_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn exchange_succeeded(&self) {
        self.exchanges_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn exchange_timed_out(&self) {
        self.exchanges_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn exchange_failed(&self) {
        self.exchanges_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a datagram sent
    pub fn datagram_sent(&self, byte_count: u64) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a datagram received
    pub fn datagram_received(&self, byte_count: u64) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn response_mismatched(&self) {
        self.mismatched_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn master_server_answered(&self) {
        self.master_servers_answered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn server_discovered(&self) {
        self.servers_discovered.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            exchanges_total: self.exchanges_total.load(Ordering::Relaxed),
            exchanges_success: self.exchanges_success.load(Ordering::Relaxed),
            exchanges_timed_out: self.exchanges_timed_out.load(Ordering::Relaxed),
            exchanges_failed: self.exchanges_failed.load(Ordering::Relaxed),
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            mismatched_responses: self.mismatched_responses.load(Ordering::Relaxed),
            master_servers_answered: self.master_servers_answered.load(Ordering::Relaxed),
            servers_discovered: self.servers_discovered.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            exchanges_total = snapshot.exchanges_total,
            exchanges_success = snapshot.exchanges_success,
            exchanges_timed_out = snapshot.exchanges_timed_out,
            exchanges_failed = snapshot.exchanges_failed,
            datagrams_sent = snapshot.datagrams_sent,
            datagrams_received = snapshot.datagrams_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            mismatched_responses = snapshot.mismatched_responses,
            master_servers_answered = snapshot.master_servers_answered,
            servers_discovered = snapshot.servers_discovered,
            uptime_seconds = snapshot.uptime_seconds,
            "Browser metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub exchanges_total: u64,
    pub exchanges_success: u64,
    pub exchanges_timed_out: u64,
    pub exchanges_failed: u64,
    pub datagrams_sent: u64,
    pub datagrams_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub mismatched_responses: u64,
    pub master_servers_answered: u64,
    pub servers_discovered: u64,
    pub uptime_seconds: u64,
}

/// Global metrics instance (lazy static for simplicity)
static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
