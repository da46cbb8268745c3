//! End-to-end operations shared by the HTTP server and the CLI: load sprint
//! data through the source chain, score it, advise on it, persist the results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::achievements;
use crate::advisor::{self, AffectedTask};
use crate::config::Config;
use crate::error::{PitstopError, Result};
use crate::metrics::{self, SprintMetrics};
use crate::model::{Achievement, Activity, StoredRecommendation};
use crate::source::{Loaded, SourceChain, SourceKind};
use crate::store::Store;
use crate::types::{Priority, RecommendationStatus};

/// Load a sprint. The tracker is consulted on `refresh`, or when the store
/// has nothing cached yet.
pub fn load(config: &Config, store: &Store, sprint_id: Option<&str>, refresh: bool) -> Result<Loaded> {
    let use_tracker = refresh || store.is_empty()?;
    SourceChain::standard(config, store, use_tracker).load_and_cache(store, sprint_id)
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub sprint_id: String,
    pub sprint_name: String,
    pub source: SourceKind,
    #[serde(flatten)]
    pub metrics: SprintMetrics,
    pub snapshot_id: i64,
    pub new_achievements: Vec<Achievement>,
}

/// Compute metrics, append a snapshot, and award any achievements crossed.
pub fn sprint_metrics(
    config: &Config,
    store: &Store,
    sprint_id: Option<&str>,
    refresh: bool,
    now: DateTime<Utc>,
) -> Result<MetricsReport> {
    let Loaded { data, source } = load(config, store, sprint_id, refresh)?;
    let metrics = metrics::compute(&data.sprint, &data.issues, &data.team, now, &config.scoring);

    let snapshot = store.append_snapshot(&data.sprint.id, &metrics, now)?;
    let new_achievements = store.award(&achievements::evaluate(&data.sprint.id, &metrics, now))?;
    for a in &new_achievements {
        store.record_activity(&Activity::new(
            Some(&data.sprint.id),
            "achievement",
            format!("Achievement unlocked: {}", a.title),
        ))?;
    }

    Ok(MetricsReport {
        sprint_id: data.sprint.id,
        sprint_name: data.sprint.name,
        source,
        metrics,
        snapshot_id: snapshot.id,
        new_achievements,
    })
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationView {
    pub id: String,
    pub rule: String,
    pub title: String,
    pub problem: String,
    pub solution: String,
    pub priority: Priority,
    pub success_probability: u32,
    pub status: RecommendationStatus,
    pub affected_tasks: Vec<AffectedTask>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationReport {
    pub recommendations: Vec<RecommendationView>,
    pub sprint_id: String,
    pub source: SourceKind,
    pub generated_at: DateTime<Utc>,
}

/// Generate, persist and return recommendations for a sprint.
pub fn recommendations(
    config: &Config,
    store: &Store,
    sprint_id: Option<&str>,
    refresh: bool,
    now: DateTime<Utc>,
) -> Result<RecommendationReport> {
    let Loaded { data, source } = load(config, store, sprint_id, refresh)?;
    let metrics = metrics::compute(&data.sprint, &data.issues, &data.team, now, &config.scoring);
    let recs = advisor::recommend(&metrics, &data.issues, &data.team, &config.rules);
    let stored = store.save_recommendations(&data.sprint.id, &recs, now)?;

    let recommendations = recs
        .into_iter()
        .zip(stored)
        .map(|(rec, row)| RecommendationView {
            id: row.id,
            rule: rec.rule,
            title: rec.title,
            problem: rec.problem,
            solution: rec.solution,
            priority: rec.priority,
            success_probability: rec.success_probability,
            status: row.status,
            affected_tasks: rec.affected_tasks,
        })
        .collect();

    Ok(RecommendationReport {
        recommendations,
        sprint_id: data.sprint.id,
        source,
        generated_at: now,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    pub recommendation_id: String,
    /// "apply" (default) or "dismiss".
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    pub success: bool,
    pub message: String,
    pub details: serde_json::Value,
}

/// Record a decision on a recommendation. Only its stored status changes.
pub fn apply_recommendation(store: &Store, req: ApplyRequest, now: DateTime<Utc>) -> Result<ApplyResult> {
    let status = match req.action.as_deref().unwrap_or("apply") {
        "apply" | "applied" => RecommendationStatus::Applied,
        "dismiss" | "dismissed" => RecommendationStatus::Dismissed,
        other => return Err(PitstopError::InvalidStatus(format!("unknown action '{other}'"))),
    };
    let rec: StoredRecommendation = store.set_recommendation_status(&req.recommendation_id, status, now)?;

    let verb = match status {
        RecommendationStatus::Dismissed => "Dismissed",
        _ => "Applied",
    };
    let message = format!("{verb} recommendation: {}", rec.title);
    // The status is already committed; the feed entry is best-effort.
    if let Err(e) = store.record_activity(&Activity::new(
        Some(&rec.sprint_id),
        "recommendation_applied",
        message.clone(),
    )) {
        tracing::warn!(id = %rec.id, error = %e, "failed to record apply activity");
    }
    tracing::info!(id = %rec.id, status = %rec.status, "recommendation updated");

    Ok(ApplyResult {
        success: true,
        message,
        details: serde_json::json!({
            "recommendationId": rec.id,
            "rule": rec.rule,
            "status": rec.status,
            "appliedAt": rec.applied_at,
            "parameters": req.parameters,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;

    fn seeded() -> (Config, Store) {
        let store = Store::open_in_memory().unwrap();
        fixture::seed(&store, Utc::now()).unwrap();
        (Config::new("demo"), store)
    }

    #[test]
    fn metrics_report_appends_snapshot_each_call() {
        let (config, store) = seeded();
        let first = sprint_metrics(&config, &store, None, false, Utc::now()).unwrap();
        let second = sprint_metrics(&config, &store, None, false, Utc::now()).unwrap();
        assert_eq!(first.source, SourceKind::Cache);
        assert!(second.snapshot_id > first.snapshot_id);
        assert_eq!(store.snapshots_for_sprint(&first.sprint_id).unwrap().len(), 2);
    }

    #[test]
    fn metrics_report_json_flattens_metrics() {
        let (config, store) = seeded();
        let report = sprint_metrics(&config, &store, None, false, Utc::now()).unwrap();
        let v = serde_json::to_value(&report).unwrap();
        for key in ["healthScore", "teamMetrics", "idealProgress", "sprintId", "source"] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
        assert_eq!(v["source"], "cache");
    }

    #[test]
    fn achievements_are_awarded_once() {
        let (config, store) = seeded();
        let sprint = store.active_sprint().unwrap().unwrap();
        for issue in store.issues_for_sprint(&sprint.id).unwrap() {
            store
                .update_issue(
                    &issue.id,
                    crate::store::IssueUpdate {
                        status: Some(crate::types::IssueStatus::Done),
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        let first = sprint_metrics(&config, &store, None, false, Utc::now()).unwrap();
        assert!(first.new_achievements.iter().any(|a| a.code == "sprint_complete"));
        let second = sprint_metrics(&config, &store, None, false, Utc::now()).unwrap();
        assert!(second.new_achievements.is_empty());
    }

    #[test]
    fn recommendations_carry_stable_ids() {
        let (config, store) = seeded();
        let a = recommendations(&config, &store, None, false, Utc::now()).unwrap();
        let b = recommendations(&config, &store, None, false, Utc::now()).unwrap();
        let ids_a: Vec<_> = a.recommendations.iter().map(|r| r.id.clone()).collect();
        let ids_b: Vec<_> = b.recommendations.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
        assert!(ids_a.iter().all(|id| id.starts_with(fixture::DEMO_SPRINT_ID)));
    }

    #[test]
    fn apply_then_regenerate_keeps_status() {
        let (config, store) = seeded();
        let report = recommendations(&config, &store, None, false, Utc::now()).unwrap();
        let Some(first) = report.recommendations.first() else {
            panic!("demo sprint should produce at least one recommendation");
        };

        let result = apply_recommendation(
            &store,
            ApplyRequest {
                recommendation_id: first.id.clone(),
                action: None,
                parameters: None,
            },
            Utc::now(),
        )
        .unwrap();
        assert!(result.success);
        assert_eq!(result.details["status"], "applied");

        let again = recommendations(&config, &store, None, false, Utc::now()).unwrap();
        let same = again.recommendations.iter().find(|r| r.id == first.id).unwrap();
        assert_eq!(same.status, RecommendationStatus::Applied);
        assert_eq!(store.recent_activities(5).unwrap()[0].kind, "recommendation_applied");
    }

    #[test]
    fn apply_succeeds_when_activity_feed_write_fails() {
        let (config, store) = seeded();
        let report = recommendations(&config, &store, None, false, Utc::now()).unwrap();
        let id = report.recommendations[0].id.clone();

        store.lock().execute_batch("DROP TABLE activities").unwrap();

        let result = apply_recommendation(
            &store,
            ApplyRequest {
                recommendation_id: id.clone(),
                action: Some("dismiss".into()),
                parameters: None,
            },
            Utc::now(),
        )
        .unwrap();
        assert!(result.success);
        assert_eq!(
            store.get_recommendation(&id).unwrap().status,
            RecommendationStatus::Dismissed
        );
    }

    #[test]
    fn apply_rejects_unknown_action_and_id() {
        let (_, store) = seeded();
        let bad_action = ApplyRequest {
            recommendation_id: "x".into(),
            action: Some("explode".into()),
            parameters: None,
        };
        assert!(matches!(
            apply_recommendation(&store, bad_action, Utc::now()),
            Err(PitstopError::InvalidStatus(_))
        ));
        let missing = ApplyRequest {
            recommendation_id: "ghost".into(),
            action: None,
            parameters: None,
        };
        assert!(matches!(
            apply_recommendation(&store, missing, Utc::now()),
            Err(PitstopError::RecommendationNotFound(_))
        ));
    }
}
