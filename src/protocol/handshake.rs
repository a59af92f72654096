//! Token handshake and typed request/response exchanges.
//!
//! Every query is two exchanges over the same transport: a token request
//! answered by a token response, then a typed request carrying that token
//! answered by the typed response. Both run the same adaptive retry loop:
//!
//! 1. give up with [`BrowserError::Timeout`] once the budget is spent
//! 2. set the read deadline to the current per-attempt timeout
//! 3. send a burst of identical requests to offset datagram loss
//! 4. wait for one datagram and accept it if it has the expected type
//! 5. double the per-attempt timeout (or shrink it to what is left) and
//!    grow the burst
//!
//! There is no attempt limit, only the wall-clock budget. A short or failed
//! write aborts the exchange at once; a missing, short or mismatched
//! response is retried.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument, trace};

use crate::config::{BrowserConfig, MAX_BUFFER_SIZE, MIN_BUFFER_SIZE, TOKEN_RESPONSE_SIZE};
use crate::core::packet::{self, RequestKind, Token};
use crate::error::{BrowserError, Result};
use crate::protocol::message::parse_token;
use crate::transport::Transport;
use crate::utils::metrics::global_metrics;
use crate::utils::timeout::{next_attempt_timeout, Budget, MIN_TIMEOUT};

/// Tuning of the retry loop
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Budget floor and first per-attempt read timeout
    pub min_timeout: Duration,
    /// Burst multiplier per token attempt
    pub token_burst_growth: f64,
    /// Burst multiplier per typed attempt
    pub request_burst_growth: f64,
    /// Upper bound on copies per attempt
    pub max_burst: usize,
    /// Receive buffer size
    pub max_response_size: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_timeout: MIN_TIMEOUT,
            token_burst_growth: 1.2,
            request_burst_growth: 2.0,
            max_burst: 1024,
            max_response_size: MAX_BUFFER_SIZE,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            min_timeout: config.retry.min_timeout,
            token_burst_growth: config.retry.token_burst_growth,
            request_burst_growth: config.retry.request_burst_growth,
            max_burst: config.retry.max_burst,
            max_response_size: config.transport.max_buffer_size.max(MIN_BUFFER_SIZE),
        }
    }

    /// Copies sent for the accumulated burst factor `burst`
    fn burst_copies(&self, burst: f64) -> usize {
        (burst.floor() as usize).clamp(1, self.max_burst.max(1))
    }
}

/// Send `payload` once, failing unless the whole datagram went out
async fn send_request<T: Transport>(transport: &mut T, payload: &[u8]) -> Result<()> {
    let written = transport.send(payload).await?;
    if written != payload.len() {
        return Err(BrowserError::InvalidWrite);
    }
    global_metrics().datagram_sent(written as u64);
    Ok(())
}

/// Accept a datagram as token response if it has exactly the token size
fn accept_token(response: &[u8]) -> Result<()> {
    if response.len() != TOKEN_RESPONSE_SIZE {
        return Err(BrowserError::InvalidResponseMessage);
    }
    Ok(())
}

/// Accept a datagram if it classifies as the response to `kind`
fn accept_typed(kind: RequestKind, response: &[u8]) -> Result<()> {
    if response.is_empty() {
        return Err(BrowserError::InvalidResponseMessage);
    }
    if packet::classify(response)? != kind.response_kind() {
        return Err(BrowserError::RequestResponseMismatch);
    }
    Ok(())
}

/// The retry loop shared by both exchanges
async fn exchange<T, F>(
    transport: &mut T,
    request: &[u8],
    timeout: Duration,
    burst_growth: f64,
    policy: &RetryPolicy,
    accept: F,
) -> Result<Vec<u8>>
where
    T: Transport,
    F: Fn(&[u8]) -> Result<()> + Send,
{
    let metrics = global_metrics();
    metrics.exchange_started();

    let budget = Budget::start(timeout, policy.min_timeout);
    let mut attempt_timeout = policy.min_timeout;
    let mut burst = 1.0_f64;
    let mut buffer = vec![0u8; policy.max_response_size];
    let mut attempt = 0u32;

    loop {
        if budget.is_exhausted() {
            metrics.exchange_timed_out();
            debug!(attempts = attempt, budget_ms = budget.total().as_millis() as u64, "Exchange timed out");
            return Err(BrowserError::Timeout);
        }

        transport.set_read_deadline(Instant::now() + attempt_timeout);

        let copies = policy.burst_copies(burst);
        for _ in 0..copies {
            if let Err(e) = send_request(transport, request).await {
                metrics.exchange_failed();
                debug!(error = %e, attempt, "Write failed, aborting exchange");
                return Err(e);
            }
        }

        match transport.recv(&mut buffer).await {
            Ok(read) => {
                metrics.datagram_received(read as u64);
                match accept(&buffer[..read]) {
                    Ok(()) => {
                        metrics.exchange_succeeded();
                        trace!(attempt, bytes = read, "Response accepted");
                        buffer.truncate(read);
                        return Ok(buffer);
                    }
                    Err(e) => {
                        metrics.response_mismatched();
                        trace!(attempt, bytes = read, error = %e, "Response rejected");
                    }
                }
            }
            Err(e) => {
                trace!(
                    attempt,
                    copies,
                    timeout_ms = attempt_timeout.as_millis() as u64,
                    error = %e,
                    "No response"
                );
            }
        }

        attempt_timeout = next_attempt_timeout(attempt_timeout, budget.remaining());
        burst *= burst_growth;
        attempt += 1;
    }
}

/// Obtain a raw token response within `timeout`.
///
/// Budgets below the policy's minimum are raised to it. The burst of
/// token requests grows by `token_burst_growth` per attempt.
#[instrument(level = "debug", skip(transport, policy), fields(timeout_ms = timeout.as_millis() as u64))]
pub async fn fetch_token<T: Transport>(
    transport: &mut T,
    timeout: Duration,
    policy: &RetryPolicy,
) -> Result<Vec<u8>> {
    let request = packet::token_request(packet::new_client_token());
    exchange(
        transport,
        &request,
        timeout,
        policy.token_burst_growth,
        policy,
        accept_token,
    )
    .await
}

/// Obtain the response to `kind` authorized by `token` within `timeout`.
///
/// Datagrams of any other type are treated as lost and retried, even when
/// a server keeps answering with the wrong type.
#[instrument(level = "debug", skip(token, transport, policy), fields(kind = %kind, timeout_ms = timeout.as_millis() as u64))]
pub async fn fetch_with_token<T: Transport>(
    kind: RequestKind,
    token: &Token,
    transport: &mut T,
    timeout: Duration,
    policy: &RetryPolicy,
) -> Result<Vec<u8>> {
    let request = packet::request(kind, token);
    exchange(
        transport,
        &request,
        timeout,
        policy.request_burst_growth,
        policy,
        move |response| accept_typed(kind, response),
    )
    .await
}

/// Token exchange followed by the typed exchange for `kind`, sharing one
/// `timeout`. The typed exchange gets whatever the token exchange left.
#[instrument(level = "debug", skip(transport, policy), fields(kind = %kind, timeout_ms = timeout.as_millis() as u64))]
pub async fn fetch<T: Transport>(
    kind: RequestKind,
    transport: &mut T,
    timeout: Duration,
    policy: &RetryPolicy,
) -> Result<Vec<u8>> {
    let begin = Instant::now();

    let response = fetch_token(transport, timeout, policy).await?;
    let token = parse_token(&response)?;

    let remaining = timeout.saturating_sub(begin.elapsed());
    fetch_with_token(kind, &token, transport, remaining, policy).await
}
