//! Preference routes (dark mode).

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use pdf_merger_core::{Preferences, SessionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::helpers::RouteResult;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct PreferencesQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Deserialize)]
pub struct PreferencesUpdate {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub preferences: Preferences,
}

#[derive(Serialize)]
pub struct PreferencesResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub preferences: Preferences,
}

/// Preferences of a session; defaults for unknown or missing sessions.
pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PreferencesQuery>, QueryRejection>,
) -> RouteResult<Json<Preferences>> {
    let Query(query) = query?;
    let preferences = match query.session_id.as_deref().map(str::parse::<SessionId>) {
        Some(Ok(id)) => state.merger.get_preferences(&id).await,
        _ => Preferences::default(),
    };
    Ok(Json(preferences))
}

/// Store preferences, starting a session if the caller has none yet.
pub async fn set_preferences(
    State(state): State<Arc<AppState>>,
    update: Result<Json<PreferencesUpdate>, JsonRejection>,
) -> RouteResult<Json<PreferencesResponse>> {
    let Json(update) = update?;
    let id = state
        .merger
        .set_preferences(update.session_id.as_deref(), update.preferences)
        .await;

    Ok(Json(PreferencesResponse {
        session_id: id.to_string(),
        preferences: update.preferences,
    }))
}
