//! Phrase lookup endpoint used by the practice page

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::PhraseLookup;

#[derive(Debug, Default, Deserialize)]
pub struct AslVideoQuery {
    #[serde(default)]
    pub q: String,
}

/// GET /api/asl-video/?q=
///
/// `{video, segments}` for the phrase, or 400 `{"error": ...}` when the
/// query is empty or has no usable words.
pub async fn asl_video(
    State(state): State<AppState>,
    Query(query): Query<AslVideoQuery>,
) -> Result<Json<PhraseLookup>, ApiError> {
    state
        .lookup_service
        .phrase_lookup(&query.q)
        .await
        .map(Json)
        .map_err(|e| ApiError::bad_request(e.to_string()))
}
