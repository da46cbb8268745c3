use axum::extract::State;
use axum::Json;
use pitstop_core::source::{DataSource, SourceChain, TrackerSource};
use pitstop_core::tracker::JiraClient;
use pitstop_core::PitstopError;

use super::join_error;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/tracker/status — whether a tracker is configured. Never calls out.
pub async fn tracker_status(State(app): State<AppState>) -> Json<serde_json::Value> {
    let config = app.config();
    let body = match &config.tracker {
        Some(t) => serde_json::json!({
            "configured": true,
            "baseUrl": t.base_url,
            "boardId": t.board_id,
            "tokenPresent": t.api_token().is_some(),
        }),
        None => serde_json::json!({
            "configured": false,
            "baseUrl": null,
            "boardId": null,
            "tokenPresent": false,
        }),
    };
    Json(body)
}

/// POST /api/sync — pull the active sprint from the tracker into the store.
///
/// Unlike the read endpoints there is no fallback: a failed sync is reported
/// as 503 so the caller knows the cache was not refreshed.
pub async fn sync(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let config = app.config();
    let Some(tracker) = config.tracker.clone() else {
        return Ok(Json(serde_json::json!({
            "configured": false,
            "message": "No issue tracker configured; serving cached or demo data.",
        })));
    };
    if tracker.api_token().is_none() {
        return Ok(Json(serde_json::json!({
            "configured": false,
            "message": format!(
                "Tracker credentials missing: set {} to sync; serving cached or demo data.",
                tracker.api_token_env
            ),
        })));
    }

    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || {
        let client = JiraClient::new(&tracker, config.team.default_capacity)?;
        let sources: Vec<Box<dyn DataSource>> = vec![Box::new(TrackerSource::new(client))];
        let loaded = SourceChain::new(sources).load_and_cache(&store, None)?;
        Ok::<_, PitstopError>(serde_json::json!({
            "configured": true,
            "source": loaded.source,
            "sprintId": loaded.data.sprint.id,
            "issues": loaded.data.issues.len(),
            "members": loaded.data.team.len(),
        }))
    })
    .await
    .map_err(join_error)??;

    Ok(Json(result))
}
