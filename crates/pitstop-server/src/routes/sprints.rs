use axum::extract::{Path, State};
use axum::Json;
use pitstop_core::PitstopError;

use super::join_error;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/sprints — all known sprints, newest first.
pub async fn list_sprints(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let sprints = store.list_sprints()?;
        Ok::<_, PitstopError>(serde_json::to_value(sprints)?)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(result))
}

/// GET /api/sprints/active
pub async fn get_active_sprint(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let sprint = store.active_sprint()?.ok_or(PitstopError::NoActiveSprint)?;
        Ok::<_, PitstopError>(serde_json::to_value(sprint)?)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(result))
}

/// GET /api/sprints/{id}
pub async fn get_sprint(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let sprint = store.get_sprint(&id)?;
        Ok::<_, PitstopError>(serde_json::to_value(sprint)?)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(result))
}

/// GET /api/sprints/{id}/issues
pub async fn list_sprint_issues(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        // 404 for an unknown sprint rather than an empty list
        store.get_sprint(&id)?;
        let issues = store.issues_for_sprint(&id)?;
        Ok::<_, PitstopError>(serde_json::to_value(issues)?)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(result))
}

/// GET /api/sprints/{id}/snapshots — metrics history, oldest first.
pub async fn list_sprint_snapshots(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let snapshots = store.snapshots_for_sprint(&id)?;
        Ok::<_, PitstopError>(serde_json::to_value(snapshots)?)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(result))
}
