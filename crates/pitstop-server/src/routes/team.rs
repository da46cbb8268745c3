use axum::extract::State;
use axum::Json;
use pitstop_core::model::{Activity, TeamMember};
use pitstop_core::PitstopError;

use super::join_error;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/team
pub async fn list_team(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let team = store.list_team()?;
        Ok::<_, PitstopError>(serde_json::to_value(team)?)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(result))
}

/// POST /api/team — create or replace a member by id.
pub async fn upsert_member(
    State(app): State<AppState>,
    Json(member): Json<TeamMember>,
) -> Result<Json<serde_json::Value>, AppError> {
    if member.id.trim().is_empty() || member.name.trim().is_empty() {
        return Err(AppError::bad_request("team member needs a non-empty id and name"));
    }
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        store.upsert_member(&member)?;
        store.record_activity(&Activity::new(
            None,
            "team",
            format!("{} saved with capacity {}", member.name, member.capacity),
        ))?;
        Ok::<_, PitstopError>(serde_json::to_value(member)?)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(result))
}
