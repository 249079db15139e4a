//! The data-endpoint middleware chain: token extraction, a logging span,
//! `Connection: close` injection while draining, and request/latency
//! counters. Implemented as a single `axum::middleware::from_fn_with_state`
//! layer rather than a `FromRequestParts` extractor, since the later
//! stages (counters, the close header) must still run on the 401 path
//! that a failed extractor would short-circuit.

use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::header::{self, AUTHORIZATION};
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use tracing::Instrument;

use crate::error::ApiError;
use crate::state::AppState;

/// The token a submission was authenticated under. Stashed in request
/// extensions by [`data_pipeline`] so handlers can read it without
/// re-parsing headers.
#[derive(Debug, Clone)]
pub struct RequestToken(pub String);

pub async fn data_pipeline(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let start = Instant::now();
    state.counters.conn_start();

    let response = match extract_token(request.headers(), &request, &state.config.token_header) {
        Some(token) => {
            let span = tracing::info_span!(
                "request",
                token = %redact(&token),
                path = %request.uri().path(),
            );
            request.extensions_mut().insert(RequestToken(token));
            next.run(request).instrument(span).await
        }
        None => ApiError::Unauthorized.into_response(),
    };

    let elapsed = start.elapsed();
    state.counters.conn_end(elapsed.as_nanos() as u64);
    state.counters.observe_latency(elapsed.as_nanos() as u64);

    let mut response = response;
    if state.drain.load(Ordering::Relaxed) {
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("close"));
    }
    response
}

fn extract_token(headers: &axum::http::HeaderMap, _request: &Request, header_name: &str) -> Option<String> {
    if let Some(token) = extract_header_token(headers, header_name) {
        return Some(token);
    }
    extract_basic_auth_token(headers)
}

fn extract_header_token(headers: &axum::http::HeaderMap, header_name: &str) -> Option<String> {
    let value = headers.get(header_name)?.to_str().ok()?;
    if value.is_empty() {
        return None;
    }
    Some(value.to_owned())
}

fn extract_basic_auth_token(headers: &axum::http::HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    if !username.is_empty() && username != "auth" {
        return None;
    }
    if password.is_empty() {
        return None;
    }
    Some(password.to_owned())
}

fn redact(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    format!("{visible}…")
}

/// Pull the token a request authenticated under straight from `Parts`
/// (e.g. from inside a decoder handler), given the extension the pipeline
/// stashed.
pub fn token_from_parts(parts: &Parts) -> Option<&str> {
    parts.extensions.get::<RequestToken>().map(|t| t.0.as_str())
}
