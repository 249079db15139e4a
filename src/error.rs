use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors surfaced to the HTTP client. Response bodies are plain text —
/// this proxy's clients are metrics agents, not browsers, so there is no
/// JSON envelope to wrap a one-word status in.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("queue full, try again")]
    Backpressure,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body): (StatusCode, String) = match &self {
            Self::Decode(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".into()),
            Self::Backpressure => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "queue full, retry with backoff".into(),
            ),
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
            }
        };

        (status, body).into_response()
    }
}

/// A setup step exhausted its retry budget during startup.
#[derive(Debug, thiserror::Error)]
#[error("setup step {step} failed after {attempts} attempts: {source}")]
pub struct SetupError {
    pub step: &'static str,
    pub attempts: u32,
    #[source]
    pub source: anyhow::Error,
}

/// Raised while closing a subsystem during graceful shutdown. `Close`
/// collects every subsystem's error and returns only the first — the
/// remainder are logged so a partial shutdown is never silent.
#[derive(Debug, thiserror::Error)]
pub enum CloseError {
    #[error("listener close failed: {0}")]
    Listener(anyhow::Error),

    #[error("sink close incomplete: {0} items discarded after shutdown deadline")]
    SinkIncomplete(usize),
}
