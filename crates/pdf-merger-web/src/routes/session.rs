//! Session reset route.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;

use crate::helpers::{RouteResult, parse_session_id};
use crate::state::AppState;

/// Discard a session and its uploads. Repeating the call is harmless.
pub async fn clear_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<StatusCode> {
    let id = parse_session_id(&session_id)?;
    state.merger.clear(&id).await;
    Ok(StatusCode::NO_CONTENT)
}
