use std::process::ExitCode;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use sfx_proxy::config::Config;
use sfx_proxy::counters::Counters;
use sfx_proxy::lifecycle::{self, RetryConfig};
use sfx_proxy::sink::AsyncSink;
use sfx_proxy::state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::load();
    let _log_guard = init_tracing(config.log_dir.as_deref());

    let retry = RetryConfig::default();
    let counters = Counters::new();
    let sink = AsyncSink::spawn(&config, counters.clone());

    let listen_addr = config.listen.clone();
    let listener = match lifecycle::retry_with_backoff("bind http listener", &retry, || {
        let addr = listen_addr.clone();
        async move { tokio::net::TcpListener::bind(&addr).await.map_err(anyhow::Error::from) }
    })
    .await
    {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, "setup failed, aborting startup");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(addr = %config.listen, "listening");

    let cancel = CancellationToken::new();
    let state = AppState::new(config, sink, counters.clone(), cancel.clone());

    let telemetry_handle = tokio::spawn(sfx_proxy::telemetry::run(
        counters,
        state.config.report_interval,
        cancel.clone(),
    ));

    let router = sfx_proxy::app(state.clone());
    let serve_cancel = cancel.clone();
    let serve_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { serve_cancel.cancelled().await })
            .await
    });

    shutdown_signal().await;
    tracing::info!("shutdown signal received, beginning graceful drain");

    let close_result = lifecycle::graceful_shutdown(&state, &cancel).await;

    if let Err(err) = serve_handle.await {
        tracing::error!(error = %err, "http server task panicked");
    }
    telemetry_handle.abort();

    match close_result {
        Ok(()) => {
            tracing::info!("sfx-proxy stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "shutdown completed with a close error");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_dir: Option<&str>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = EnvFilter::try_from_env("POPS_LOG").unwrap_or_else(|_| "info".into());

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sfx-proxy.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
            None
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
