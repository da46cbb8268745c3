pub mod activity;
pub mod chat;
pub mod config;
pub mod health;
pub mod issues;
pub mod metrics;
pub mod recommendations;
pub mod sprints;
pub mod team;
pub mod tracker;

use serde::Deserialize;

/// `?sprintId=...&refresh=true`, shared by the computed endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintQuery {
    #[serde(default)]
    pub sprint_id: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

fn join_error(e: tokio::task::JoinError) -> crate::error::AppError {
    crate::error::AppError(anyhow::anyhow!("task join error: {e}"))
}
