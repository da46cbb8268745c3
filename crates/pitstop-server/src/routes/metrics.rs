use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;

use super::{join_error, SprintQuery};
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/sprint-metrics — compute metrics for the active (or given) sprint.
///
/// Every call appends a snapshot to the sprint's history and awards any
/// achievements the new numbers qualify for.
pub async fn get_sprint_metrics(
    State(app): State<AppState>,
    Query(q): Query<SprintQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let config = app.config();
    let result = tokio::task::spawn_blocking(move || {
        let report = pitstop_core::report::sprint_metrics(
            &config,
            &store,
            q.sprint_id.as_deref(),
            q.refresh,
            Utc::now(),
        )?;
        Ok::<_, pitstop_core::PitstopError>(serde_json::to_value(report)?)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(result))
}
