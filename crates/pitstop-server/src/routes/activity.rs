use axum::extract::{Query, State};
use axum::Json;
use pitstop_core::PitstopError;
use serde::Deserialize;

use super::join_error;
use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(default)]
    limit: Option<usize>,
}

/// GET /api/activities?limit — recent activity feed, newest first.
pub async fn list_activities(
    State(app): State<AppState>,
    Query(q): Query<ActivityQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let items = store.recent_activities(limit)?;
        Ok::<_, PitstopError>(serde_json::to_value(items)?)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementQuery {
    #[serde(default)]
    sprint_id: Option<String>,
}

/// GET /api/achievements?sprintId
pub async fn list_achievements(
    State(app): State<AppState>,
    Query(q): Query<AchievementQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let items = store.achievements(q.sprint_id.as_deref())?;
        Ok::<_, PitstopError>(serde_json::to_value(items)?)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(result))
}
