//! The four data-plane endpoint handlers: pick a decoder by content-type,
//! run the per-protocol counter decorator, then hand the decoded items
//! to the async sink.

use axum::body::{Body, Bytes};
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::decode::{Decoder, is_protobuf_content_type};
use crate::error::ApiError;
use crate::middleware::RequestToken;
use crate::sink::SubmitError;
use crate::state::AppState;

pub async fn datapoint_v1(
    State(state): State<AppState>,
    Extension(RequestToken(token)): Extension<RequestToken>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let decoder = state.decoders.datapoint_v1(is_protobuf_content_type(&headers));
    respond(&state, &token, decoder, &body).await
}

pub async fn datapoint_v2(
    State(state): State<AppState>,
    Extension(RequestToken(token)): Extension<RequestToken>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let decoder = state.decoders.datapoint_v2(is_protobuf_content_type(&headers));
    respond(&state, &token, decoder, &body).await
}

pub async fn event_v2(
    State(state): State<AppState>,
    Extension(RequestToken(token)): Extension<RequestToken>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let decoder = state.decoders.event_v2(is_protobuf_content_type(&headers));
    respond(&state, &token, decoder, &body).await
}

pub async fn collectd(
    State(state): State<AppState>,
    Extension(RequestToken(token)): Extension<RequestToken>,
    body: Bytes,
) -> Response {
    let decoder = state.decoders.collectd();
    respond(&state, &token, decoder, &body).await
}

async fn respond(state: &AppState, token: &str, decoder: &dyn Decoder, body: &[u8]) -> Response {
    let protocol = decoder.protocol();
    match decoder.decode(body) {
        Ok(items) => match state.sink.submit(token, items, &state.cancel).await {
            Ok(enqueued) => {
                state.counters.incr_incoming(protocol, enqueued as u64);
                ok_response()
            }
            Err(SubmitError::QueueFull(enqueued)) => {
                state.counters.incr_incoming(protocol, enqueued as u64);
                state.counters.incr_backpressure();
                ApiError::Backpressure.into_response()
            }
            Err(SubmitError::Closed) => ApiError::Backpressure.into_response(),
        },
        Err(message) => {
            state.counters.incr_decode_error(protocol);
            ApiError::Decode(message).into_response()
        }
    }
}

fn ok_response() -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json; charset=UTF-8")
        .body(Body::from("OK"))
        .expect("static response is well-formed")
}
