//! `GET /healthz`. Bypasses the data middleware chain entirely — no
//! token required, no latency bucket — it is wired directly onto the
//! router rather than behind `data_pipeline`.

use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub async fn healthz(State(state): State<AppState>) -> Response {
    if state.drain.load(Ordering::Relaxed) {
        (StatusCode::NOT_FOUND, "graceful shutdown").into_response()
    } else {
        state.counters.incr_health_ok();
        (StatusCode::OK, "OK").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::counters::Counters;
    use crate::sink::AsyncSink;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn test_state() -> AppState {
        let cfg = Config {
            listen: "127.0.0.1:0".into(),
            token_header: "X-SF-Token".into(),
            graceful_min_wait: Duration::from_millis(0),
            graceful_max_wait: Duration::from_secs(1),
            graceful_check_interval: Duration::from_millis(10),
            graceful_silent_time: Duration::from_millis(10),
            dp_endpoint: "http://127.0.0.1:9".into(),
            event_endpoint: "http://127.0.0.1:9".into(),
            sink_shutdown_timeout: Duration::from_millis(50),
            num_draining_threads: 0,
            channel_size: 10,
            max_drain_size: 10,
            log_dir: None,
            report_interval: Duration::from_secs(10),
        };
        let counters = Counters::new();
        let sink = AsyncSink::spawn(&cfg, counters.clone());
        AppState::new(cfg, sink, counters, CancellationToken::new())
    }

    #[tokio::test]
    async fn returns_ok_while_not_draining() {
        let state = test_state();
        let resp = healthz(State(state.clone())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(state.counters.active_connections(), 0);
    }

    #[tokio::test]
    async fn returns_404_once_draining() {
        let state = test_state();
        state.drain.store(true, std::sync::atomic::Ordering::SeqCst);
        let resp = healthz(State(state)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn increments_health_ok_counter_only_on_success() {
        let state = test_state();
        healthz(State(state.clone())).await;
        healthz(State(state.clone())).await;
        assert_eq!(state.counters.snapshot().health_checks_ok, 2);

        state.drain.store(true, std::sync::atomic::Ordering::SeqCst);
        healthz(State(state.clone())).await;
        assert_eq!(state.counters.snapshot().health_checks_ok, 2);
    }
}
