//! Periodic self-reporting task: logs a counter snapshot at a fixed
//! interval (`SF_REPORT_INTERVAL`) until cancelled. A full self-metrics
//! client that posts to an external collector is out of scope here;
//! this logs the same snapshot `/debug/vars` exposes.

use tokio_util::sync::CancellationToken;

use crate::counters::Counters;

pub async fn run(counters: Counters, interval: std::time::Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // first tick fires immediately; skip it

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snap = counters.snapshot();
                tracing::info!(
                    active_connections = snap.active_connections,
                    total_connections = snap.total_connections,
                    dropped_items = snap.dropped_items,
                    backpressure_errors = snap.backpressure_errors,
                    not_found = snap.not_found,
                    "self report"
                );
            }
            () = cancel.cancelled() => {
                tracing::debug!("self-reporting task stopping");
                break;
            }
        }
    }
}
