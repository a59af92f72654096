//! # Utility Modules
//!
//! Supporting utilities shared by the exchange engine and the discovery
//! fan-out.
//!
//! ## Components
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe observability counters
//! - **Timeout**: Exchange budgets and per-attempt timeout progression

pub mod logging;
pub mod metrics;
pub mod timeout;

pub use logging::init_logging;
pub use metrics::global_metrics;
