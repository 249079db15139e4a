//! Bounded-retry setup helper and the four-phase graceful shutdown
//! protocol. Retry is sequential with fixed backoff — exponential
//! backoff buys little here, since every setup step waits on a
//! local resource (a port, a channel) rather than a remote one.

use std::future::Future;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::SetupError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_secs(1),
        }
    }
}

/// Run `step` up to `cfg.attempts` times, sleeping `cfg.delay` between
/// failures. `name` is only used for logging and the eventual
/// [`SetupError`].
pub async fn retry_with_backoff<F, Fut, T>(
    name: &'static str,
    cfg: &RetryConfig,
    mut step: F,
) -> Result<T, SetupError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut last_err = None;
    for attempt in 1..=cfg.attempts {
        match step().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::warn!(step = name, attempt, error = %err, "setup step failed, retrying");
                last_err = Some(err);
                if attempt < cfg.attempts {
                    tokio::time::sleep(cfg.delay).await;
                }
            }
        }
    }
    Err(SetupError {
        step: name,
        attempts: cfg.attempts,
        source: last_err.expect("loop runs at least once"),
    })
}

/// Run the four-phase graceful shutdown protocol. Sets the drain flag,
/// waits for the load balancer grace period, polls for the connection
/// counter to go quiet, then closes the listener and the sink. Returns
/// the sink's close error, if any — the listener's own close is
/// infallible here, so the sink is the only source of a close failure.
pub async fn graceful_shutdown(
    state: &AppState,
    listener_cancel: &tokio_util::sync::CancellationToken,
) -> Result<(), crate::error::CloseError> {
    state.drain.store(true, Ordering::SeqCst);
    tracing::info!("drain flag set, health checks will now 404");

    // max_wait is measured from phase 2 start, before the min_wait sleep,
    // so total shutdown time is capped at max_wait rather than min_wait + max_wait.
    let max_deadline = Instant::now() + state.config.graceful_max_wait;
    tokio::time::sleep(state.config.graceful_min_wait).await;

    let mut last_total = state.counters.total_connections();
    let mut quiet_since = Instant::now();

    loop {
        if Instant::now() >= max_deadline {
            tracing::warn!("graceful shutdown hard ceiling reached, closing regardless");
            break;
        }
        tokio::time::sleep(state.config.graceful_check_interval).await;

        let total = state.counters.total_connections();
        if total != last_total {
            last_total = total;
            quiet_since = Instant::now();
        } else if Instant::now().duration_since(quiet_since) >= state.config.graceful_silent_time {
            break;
        }
    }

    listener_cancel.cancel();
    state.sink.close(state.config.sink_shutdown_timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

    #[tokio::test]
    async fn retry_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let cfg = RetryConfig {
            attempts: 5,
            delay: Duration::from_millis(1),
        };
        let result = retry_with_backoff("test-step", &cfg, || {
            let n = calls.fetch_add(1, AtomicOrdering::SeqCst) + 1;
            async move {
                if n < 3 {
                    anyhow::bail!("not yet")
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn retry_exhausts_and_returns_setup_error() {
        let cfg = RetryConfig {
            attempts: 2,
            delay: Duration::from_millis(1),
        };
        let result: Result<(), SetupError> =
            retry_with_backoff("always-fails", &cfg, || async { anyhow::bail!("nope") }).await;
        let err = result.unwrap_err();
        assert_eq!(err.step, "always-fails");
        assert_eq!(err.attempts, 2);
    }
}
