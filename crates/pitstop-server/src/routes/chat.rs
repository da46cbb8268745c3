use axum::extract::State;
use axum::Json;
use chrono::Utc;
use pitstop_core::{advisor, assistant, metrics, report};
use serde::Deserialize;

use super::join_error;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    message: String,
    #[serde(default)]
    sprint_id: Option<String>,
}

/// POST /api/chat — templated answer about the current sprint.
///
/// Read-only: no snapshot is appended and no recommendation persisted.
pub async fn chat(
    State(app): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    if body.message.trim().is_empty() {
        return Err(AppError::bad_request("message must not be empty"));
    }
    let store = app.store.clone();
    let config = app.config();
    let result = tokio::task::spawn_blocking(move || {
        let data = report::load(&config, &store, body.sprint_id.as_deref(), false)?.data;
        let m = metrics::compute(&data.sprint, &data.issues, &data.team, Utc::now(), &config.scoring);
        let recs = advisor::recommend(&m, &data.issues, &data.team, &config.rules);
        let reply = assistant::reply(&body.message, &m, &recs);
        Ok::<_, pitstop_core::PitstopError>(serde_json::to_value(reply)?)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(result))
}
