use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use pitstop_core::report::{self, ApplyRequest};

use super::{join_error, SprintQuery};
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/recommendations — run the rule table and persist the results.
pub async fn get_recommendations(
    State(app): State<AppState>,
    Query(q): Query<SprintQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let config = app.config();
    let result = tokio::task::spawn_blocking(move || {
        let out = report::recommendations(&config, &store, q.sprint_id.as_deref(), q.refresh, Utc::now())?;
        Ok::<_, pitstop_core::PitstopError>(serde_json::to_value(out)?)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(result))
}

/// POST /api/recommendations/apply — record a decision on one recommendation.
pub async fn apply_recommendation(
    State(app): State<AppState>,
    Json(body): Json<ApplyRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if body.recommendation_id.trim().is_empty() {
        return Err(AppError::bad_request("recommendationId is required"));
    }
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let out = report::apply_recommendation(&store, body, Utc::now())?;
        Ok::<_, pitstop_core::PitstopError>(serde_json::to_value(out)?)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(result))
}
