use axum::extract::{Path, State};
use axum::Json;
use pitstop_core::model::Activity;
use pitstop_core::store::IssueUpdate;
use pitstop_core::PitstopError;

use super::join_error;
use crate::error::AppError;
use crate::state::AppState;

/// PATCH /api/issues/{id} — update status, points, assignee or blocked reason.
pub async fn update_issue(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<IssueUpdate>,
) -> Result<Json<serde_json::Value>, AppError> {
    if body.is_empty() {
        return Err(AppError::bad_request(
            "nothing to update: provide status, storyPoints, assigneeId or blockedReason",
        ));
    }
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let before = store.get_issue(&id)?;
        let issue = store.update_issue(&id, body)?;
        if issue.status != before.status {
            store.record_activity(&Activity::new(
                issue.sprint_id.as_deref(),
                "status_change",
                format!("{} moved from {} to {}", issue.key, before.status, issue.status),
            ))?;
        }
        Ok::<_, PitstopError>(serde_json::to_value(issue)?)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(result))
}
