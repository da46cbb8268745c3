use axum::extract::State;
use axum::Json;
use pitstop_core::config::{RuleThresholds, ScoringConfig};
use pitstop_core::PitstopError;

use super::join_error;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/config — the loaded `.pitstop/config.yaml` plus validation warnings.
pub async fn get_config(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let config = app.config();
    Ok(Json(serde_json::json!({
        "config": config,
        "warnings": config.validate(),
    })))
}

#[derive(serde::Deserialize)]
pub struct UpdateConfigBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    scoring: Option<ScoringConfig>,
    #[serde(default)]
    rules: Option<RuleThresholds>,
}

/// PATCH /api/config — update project name, scoring or rule thresholds.
///
/// The new config is validated before it is written; error-level problems
/// reject the whole update and leave both disk and memory untouched.
pub async fn update_config(
    State(app): State<AppState>,
    Json(body): Json<UpdateConfigBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut config = app.config();
    if let Some(name) = body.name {
        let name = name.trim().to_string();
        if !name.is_empty() {
            config.project.name = name;
        }
    }
    if let Some(scoring) = body.scoring {
        config.scoring = scoring;
    }
    if let Some(rules) = body.rules {
        config.rules = rules;
    }

    let root = app.root.clone();
    let saved = tokio::task::spawn_blocking(move || {
        config.ensure_valid()?;
        config.save(&root)?;
        Ok::<_, PitstopError>(config)
    })
    .await
    .map_err(join_error)??;

    let json = serde_json::json!({
        "config": saved,
        "warnings": saved.validate(),
    });
    match app.config.write() {
        Ok(mut guard) => *guard = saved,
        Err(poisoned) => *poisoned.into_inner() = saved,
    }
    tracing::info!("config updated");
    Ok(Json(json))
}
