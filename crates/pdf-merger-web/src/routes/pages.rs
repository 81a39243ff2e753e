//! Page routes - full HTML page renders.

use axum::extract::State;
use std::sync::Arc;

use crate::state::AppState;
use crate::templates::IndexTemplate;

/// Landing page with upload form and file list.
pub async fn index(State(state): State<Arc<AppState>>) -> IndexTemplate {
    IndexTemplate::new(&state.merger)
}
