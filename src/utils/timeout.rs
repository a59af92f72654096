//! Time budget helpers shared by the retry engine and the fan-out.

use std::time::Duration;
use tokio::time::Instant;

/// Smallest total budget an exchange is allowed to run with, and the
/// initial per-attempt read timeout.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(35);

/// Default budget for one master-server exchange
pub const TIMEOUT_MASTER_SERVERS: Duration = Duration::from_secs(5);

/// Default budget for one game-server exchange
pub const TIMEOUT_SERVERS: Duration = Duration::from_secs(16);

/// Wall-clock budget of a single exchange
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    begin: Instant,
    total: Duration,
}

impl Budget {
    /// Start a budget now, raising `total` to `floor` when it is smaller
    pub fn start(total: Duration, floor: Duration) -> Self {
        Self {
            begin: Instant::now(),
            total: total.max(floor),
        }
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn elapsed(&self) -> Duration {
        self.begin.elapsed()
    }

    /// Time left, zero once the budget is spent
    pub fn remaining(&self) -> Duration {
        self.total.saturating_sub(self.begin.elapsed())
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Next per-attempt timeout: double it, unless that would overrun the
/// budget, in which case the final attempt gets exactly what is left.
pub fn next_attempt_timeout(current: Duration, remaining: Duration) -> Duration {
    if remaining <= current {
        remaining
    } else {
        current.saturating_mul(2)
    }
}
