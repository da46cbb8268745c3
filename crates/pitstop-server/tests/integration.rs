use axum::http::StatusCode;
use chrono::Utc;
use http_body_util::BodyExt;
use pitstop_core::config::{Config, TrackerConfig};
use pitstop_core::fixture;
use pitstop_core::store::Store;
use pitstop_server::state::AppState;
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write a config into `dir` and build a router over a fresh store,
/// optionally seeded with the demo sprint.
fn init_project(dir: &TempDir, seed: bool) -> axum::Router {
    let config = Config::new("test-project");
    config.save(dir.path()).unwrap();
    let store = Store::open(&config.store_path(dir.path())).unwrap();
    if seed {
        fixture::seed(&store, Utc::now()).unwrap();
    }
    pitstop_server::build_router(AppState::new(dir.path().to_path_buf(), config, store))
}

async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&b).unwrap()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, None).await
}

async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, Some(body)).await
}

async fn patch_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "PATCH", uri, Some(body)).await
}

// ---------------------------------------------------------------------------
// Health & routing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_ok() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, false);
    let (status, json) = get(app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, false);
    let (status, json) = get(app, "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("/api/nope"));
}

// ---------------------------------------------------------------------------
// Sprint metrics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sprint_metrics_has_dashboard_shape() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, true);
    let (status, json) = get(app, "/api/sprint-metrics").await;

    assert_eq!(status, StatusCode::OK);
    for key in [
        "healthScore",
        "velocity",
        "completionPercentage",
        "totalPoints",
        "completedPoints",
        "issuesTotal",
        "issuesCompleted",
        "issuesInProgress",
        "blockersCount",
        "daysRemaining",
        "idealProgress",
    ] {
        assert!(json[key].is_u64(), "{key} should be a non-negative integer: {json}");
    }
    for key in ["healthScore", "completionPercentage", "idealProgress"] {
        assert!(json[key].as_u64().unwrap() <= 100, "{key} out of range");
    }
    let member = &json["teamMetrics"][0];
    for key in ["id", "name", "load", "taskCount", "completionRate"] {
        assert!(!member[key].is_null(), "teamMetrics entry missing {key}");
    }
    assert_eq!(json["source"], "cache");
    assert_eq!(json["sprintId"], fixture::DEMO_SPRINT_ID);
}

#[tokio::test]
async fn sprint_metrics_falls_back_to_fixture_on_empty_store() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, false);
    let (status, json) = get(app, "/api/sprint-metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["source"], "fixture");
}

#[tokio::test]
async fn each_metrics_call_appends_a_snapshot() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, true);
    get(app.clone(), "/api/sprint-metrics").await;
    get(app.clone(), "/api/sprint-metrics").await;

    let uri = format!("/api/sprints/{}/snapshots", fixture::DEMO_SPRINT_ID);
    let (status, json) = get(app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    let snaps = json.as_array().unwrap();
    assert_eq!(snaps.len(), 2);
    assert!(snaps[0]["recordedAt"].is_string());
}

#[tokio::test]
async fn unknown_sprint_id_is_404() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, true);
    let (status, json) = get(app, "/api/sprint-metrics?sprintId=missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].is_string());
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn recommendations_have_contract_shape() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, true);
    let (status, json) = get(app, "/api/recommendations").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sprintId"], fixture::DEMO_SPRINT_ID);
    assert!(json["generatedAt"].is_string());
    let recs = json["recommendations"].as_array().unwrap();
    assert!(!recs.is_empty());
    for rec in recs {
        for key in ["id", "title", "problem", "solution", "priority", "successProbability"] {
            assert!(!rec[key].is_null(), "recommendation missing {key}");
        }
        assert!(rec["successProbability"].as_u64().unwrap() <= 100);
        for task in rec["affectedTasks"].as_array().unwrap() {
            assert!(task["id"].is_string() && task["key"].is_string() && task["summary"].is_string());
        }
    }
}

#[tokio::test]
async fn apply_recommendation_updates_status() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, true);
    let (_, json) = get(app.clone(), "/api/recommendations").await;
    let id = json["recommendations"][0]["id"].as_str().unwrap().to_string();

    let (status, out) = post_json(
        app.clone(),
        "/api/recommendations/apply",
        serde_json::json!({ "recommendationId": id, "action": "apply", "parameters": {} }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["success"], true);
    assert_eq!(out["details"]["status"], "applied");

    let (_, again) = get(app, "/api/recommendations").await;
    let same = again["recommendations"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"] == id.as_str())
        .unwrap();
    assert_eq!(same["status"], "applied");
}

#[tokio::test]
async fn apply_unknown_recommendation_is_404() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, true);
    let (status, json) = post_json(
        app,
        "/api/recommendations/apply",
        serde_json::json!({ "recommendationId": "ghost" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("ghost"));
}

// ---------------------------------------------------------------------------
// Sprints, issues, team
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sprint_listing_and_issues() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, true);

    let (status, json) = get(app.clone(), "/api/sprints").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);

    let (status, json) = get(app.clone(), "/api/sprints/active").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "active");

    let uri = format!("/api/sprints/{}/issues", fixture::DEMO_SPRINT_ID);
    let (status, json) = get(app.clone(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 10);

    let (status, _) = get(app, "/api/sprints/nope/issues").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn no_active_sprint_is_404() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, false);
    let (status, _) = get(app, "/api/sprints/active").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_issue_status_records_activity() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, true);

    let (status, json) = patch_json(
        app.clone(),
        "/api/issues/demo-2",
        serde_json::json!({ "status": "blocked", "blockedReason": "waiting on legal" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "blocked");
    assert_eq!(json["blockedReason"], "waiting on legal");

    let (_, feed) = get(app, "/api/activities?limit=5").await;
    assert_eq!(feed[0]["kind"], "status_change");
}

#[tokio::test]
async fn patch_issue_rejects_bad_input() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, true);

    let (status, _) = patch_json(app.clone(), "/api/issues/demo-2", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = patch_json(
        app.clone(),
        "/api/issues/demo-2",
        serde_json::json!({ "status": "exploded" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = patch_json(
        app,
        "/api/issues/ghost",
        serde_json::json!({ "status": "done" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn team_upsert_then_list() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, false);

    let (status, json) = post_json(
        app.clone(),
        "/api/team",
        serde_json::json!({ "id": "zoe", "name": "Zoe Park", "capacity": 12 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["role"], "developer");
    assert_eq!(json["active"], true);

    let (_, team) = get(app.clone(), "/api/team").await;
    assert_eq!(team[0]["capacity"], 12);

    let (status, _) = post_json(app, "/api/team", serde_json::json!({ "id": "x", "name": " " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn achievements_endpoint_lists_awards() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, true);
    get(app.clone(), "/api/sprint-metrics").await;
    let (status, json) = get(app, "/api/achievements").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.is_array());
}

// ---------------------------------------------------------------------------
// Tracker, config, chat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tracker_unconfigured() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, false);

    let (status, json) = get(app.clone(), "/api/tracker/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["configured"], false);

    let (status, json) = post_json(app, "/api/sync", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["configured"], false);
}

#[tokio::test]
async fn sync_without_token_reports_not_configured() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::new("test-project");
    config.tracker = Some(TrackerConfig {
        base_url: "http://127.0.0.1:9".into(),
        email: "bot@example.com".into(),
        api_token_env: "PITSTOP_SYNC_TOKEN_NEVER_SET".into(),
        board_id: 7,
        story_points_field: "customfield_10016".into(),
        timeout_secs: 1,
    });
    config.save(dir.path()).unwrap();
    let store = Store::open(&config.store_path(dir.path())).unwrap();
    let app = pitstop_server::build_router(AppState::new(dir.path().to_path_buf(), config, store));

    let (status, json) = get(app.clone(), "/api/tracker/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["configured"], true);
    assert_eq!(json["tokenPresent"], false);

    let (status, json) = post_json(app, "/api/sync", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["configured"], false);
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("PITSTOP_SYNC_TOKEN_NEVER_SET"));
}

#[tokio::test]
async fn config_get_and_patch() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, false);

    let (status, json) = get(app.clone(), "/api/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["config"]["project"]["name"], "test-project");
    assert!(json["warnings"].as_array().unwrap().is_empty());

    let (status, json) = patch_json(
        app.clone(),
        "/api/config",
        serde_json::json!({ "name": "renamed" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["config"]["project"]["name"], "renamed");
    assert_eq!(Config::load(dir.path()).unwrap().project.name, "renamed");

    let (_, json) = get(app, "/api/config").await;
    assert_eq!(json["config"]["project"]["name"], "renamed");
}

#[tokio::test]
async fn config_patch_rejects_inverted_thresholds() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, false);
    let (status, json) = patch_json(
        app,
        "/api/config",
        serde_json::json!({ "rules": { "overloaded_ratio": 1.0, "underloaded_ratio": 2.0 } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("underloaded_ratio"));
    assert_eq!(Config::load(dir.path()).unwrap().rules.overloaded_ratio, 1.5);
}

#[tokio::test]
async fn chat_answers_blocker_questions() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir, true);
    let (status, json) = post_json(
        app.clone(),
        "/api/chat",
        serde_json::json!({ "message": "What is blocked right now?" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["topic"], "blockers");
    assert!(json["reply"].as_str().unwrap().contains("1 issue"));

    let (status, _) = post_json(app, "/api/chat", serde_json::json!({ "message": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
