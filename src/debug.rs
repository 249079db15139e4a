//! `GET /debug/vars`: a JSON snapshot of every counter, folded into the
//! main router rather than run as a separate introspection listener.

use axum::Json;
use axum::extract::State;

use crate::counters::CountersSnapshot;
use crate::state::AppState;

pub async fn debug_vars(State(state): State<AppState>) -> Json<CountersSnapshot> {
    Json(state.counters.snapshot())
}
