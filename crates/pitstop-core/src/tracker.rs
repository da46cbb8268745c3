//! Jira Agile REST adapter: active sprint, its issues, and the team derived
//! from assignees.
//!
//! The client is blocking. Async callers must construct and use it inside
//! `spawn_blocking`.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::TrackerConfig;
use crate::error::{PitstopError, Result};
use crate::model::{Issue, Sprint, SprintData, TeamMember};
use crate::types::{IssueStatus, Priority, SprintStatus};

const PAGE_SIZE: u32 = 100;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SprintPage {
    #[serde(default)]
    values: Vec<JiraSprint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraSprint {
    id: u64,
    name: String,
    state: String,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    goal: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssuePage {
    #[serde(default)]
    issues: Vec<JiraIssue>,
    #[serde(default)]
    start_at: u32,
    #[serde(default)]
    total: u32,
}

#[derive(Debug, Deserialize)]
struct JiraIssue {
    id: String,
    key: String,
    fields: JiraFields,
}

#[derive(Debug, Deserialize)]
struct JiraFields {
    #[serde(default)]
    summary: String,
    status: JiraStatus,
    #[serde(default)]
    priority: Option<Named>,
    #[serde(default)]
    assignee: Option<JiraUser>,
    #[serde(default)]
    updated: Option<String>,
    /// Custom fields, including the configurable story-points field.
    #[serde(flatten)]
    extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraStatus {
    name: String,
    #[serde(default)]
    status_category: Option<StatusCategory>,
}

#[derive(Debug, Deserialize)]
struct StatusCategory {
    key: String,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraUser {
    account_id: String,
    display_name: String,
    #[serde(default)]
    email_address: Option<String>,
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Map a Jira status to ours. A flag or a status named like "blocked" wins;
/// otherwise the status category decides.
pub fn map_status(name: &str, category: Option<&str>, flagged: bool) -> IssueStatus {
    let lower = name.to_lowercase();
    if flagged || lower.contains("block") {
        return IssueStatus::Blocked;
    }
    match category {
        Some("done") => IssueStatus::Done,
        Some("indeterminate") if lower.contains("review") => IssueStatus::Review,
        Some("indeterminate") => IssueStatus::InProgress,
        _ => IssueStatus::Todo,
    }
}

fn map_sprint_state(state: &str) -> SprintStatus {
    state.parse().unwrap_or(SprintStatus::Planned)
}

/// Jira emits both RFC 3339 and `+0000`-style offsets.
fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn is_flagged(extra: &HashMap<String, serde_json::Value>) -> bool {
    match extra.get("flagged") {
        Some(serde_json::Value::Array(items)) => !items.is_empty(),
        Some(serde_json::Value::Bool(b)) => *b,
        _ => false,
    }
}

fn story_points(extra: &HashMap<String, serde_json::Value>, field: &str) -> u32 {
    extra
        .get(field)
        .and_then(serde_json::Value::as_f64)
        .filter(|p| p.is_finite() && *p > 0.0)
        .map(|p| p.round() as u32)
        .unwrap_or(0)
}

fn to_sprint(raw: JiraSprint, now: DateTime<Utc>) -> Sprint {
    let start_date = raw.start_date.as_deref().and_then(parse_ts).unwrap_or(now);
    let end_date = raw
        .end_date
        .as_deref()
        .and_then(parse_ts)
        .unwrap_or(start_date + chrono::Duration::days(14));
    Sprint {
        id: raw.id.to_string(),
        name: raw.name,
        start_date,
        end_date,
        goal: raw.goal.filter(|g| !g.trim().is_empty()),
        status: map_sprint_state(&raw.state),
    }
}

fn to_issue(raw: JiraIssue, sprint_id: &str, points_field: &str, now: DateTime<Utc>) -> Issue {
    let f = raw.fields;
    let status = map_status(
        &f.status.name,
        f.status.status_category.as_ref().map(|c| c.key.as_str()),
        is_flagged(&f.extra),
    );
    let updated_at = f.updated.as_deref().and_then(parse_ts).unwrap_or(now);
    let blocked = status == IssueStatus::Blocked;
    Issue {
        id: raw.id,
        key: raw.key,
        summary: f.summary,
        sprint_id: Some(sprint_id.to_string()),
        status,
        story_points: story_points(&f.extra, points_field),
        priority: f
            .priority
            .and_then(|p| p.name.parse().ok())
            .unwrap_or(Priority::Medium),
        assignee_id: f.assignee.as_ref().map(|a| a.account_id.clone()),
        blocked_reason: blocked.then(|| f.status.name.clone()),
        blocked_at: blocked.then_some(updated_at),
        updated_at,
    }
}

// ---------------------------------------------------------------------------
// JiraClient
// ---------------------------------------------------------------------------

pub struct JiraClient {
    http: Client,
    base_url: String,
    email: String,
    token: String,
    board_id: u64,
    points_field: String,
    default_capacity: u32,
}

impl JiraClient {
    /// Build a client from config. Fails with `TrackerNotConfigured` when the
    /// token environment variable is unset.
    pub fn new(cfg: &TrackerConfig, default_capacity: u32) -> Result<Self> {
        let token = cfg.api_token().ok_or(PitstopError::TrackerNotConfigured)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            email: cfg.email.clone(),
            token,
            board_id: cfg.board_id,
            points_field: cfg.story_points_field.clone(),
            default_capacity,
        })
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .basic_auth(&self.email, Some(&self.token))
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PitstopError::TrackerUnavailable(format!(
                "GET {path} returned {status}"
            )));
        }
        Ok(resp.json()?)
    }

    fn fetch_sprint(&self, sprint_id: Option<&str>) -> Result<JiraSprint> {
        match sprint_id {
            Some(id) => self.get(&format!("/rest/agile/1.0/sprint/{id}"), &[]),
            None => {
                let page: SprintPage = self.get(
                    &format!("/rest/agile/1.0/board/{}/sprint", self.board_id),
                    &[("state", "active".to_string())],
                )?;
                page.values
                    .into_iter()
                    .next()
                    .ok_or(PitstopError::NoActiveSprint)
            }
        }
    }

    fn fetch_issues(&self, sprint_id: &str) -> Result<Vec<JiraIssue>> {
        let fields = format!("summary,status,priority,assignee,updated,flagged,{}", self.points_field);
        let mut all = Vec::new();
        let mut start_at = 0u32;
        loop {
            let page: IssuePage = self.get(
                &format!("/rest/agile/1.0/sprint/{sprint_id}/issue"),
                &[
                    ("fields", fields.clone()),
                    ("startAt", start_at.to_string()),
                    ("maxResults", PAGE_SIZE.to_string()),
                ],
            )?;
            let fetched = page.issues.len() as u32;
            all.extend(page.issues);
            start_at = page.start_at + fetched;
            if fetched == 0 || start_at >= page.total {
                break;
            }
        }
        Ok(all)
    }

    /// Fetch a sprint (by id, or the board's active sprint) with its issues
    /// and the members assigned to them.
    pub fn fetch_sprint_data(&self, sprint_id: Option<&str>) -> Result<SprintData> {
        let now = Utc::now();
        let sprint = to_sprint(self.fetch_sprint(sprint_id)?, now);
        let raw = self.fetch_issues(&sprint.id)?;

        let mut team: Vec<TeamMember> = Vec::new();
        for user in raw.iter().filter_map(|i| i.fields.assignee.as_ref()) {
            if team.iter().any(|m| m.id == user.account_id) {
                continue;
            }
            let mut member = TeamMember::new(&user.account_id, &user.display_name);
            member.capacity = self.default_capacity;
            member.email = user.email_address.clone();
            team.push(member);
        }

        let issues: Vec<Issue> = raw
            .into_iter()
            .map(|i| to_issue(i, &sprint.id, &self.points_field, now))
            .collect();

        tracing::info!(
            sprint = %sprint.id,
            issues = issues.len(),
            members = team.len(),
            "fetched sprint from tracker"
        );
        Ok(SprintData {
            sprint,
            issues,
            team,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const TOKEN_ENV: &str = "PITSTOP_TEST_TRACKER_TOKEN";

    fn cfg(base_url: String) -> TrackerConfig {
        std::env::set_var(TOKEN_ENV, "secret");
        TrackerConfig {
            base_url,
            email: "ci@example.com".into(),
            api_token_env: TOKEN_ENV.into(),
            board_id: 7,
            story_points_field: "customfield_10016".into(),
            timeout_secs: 2,
        }
    }

    const ACTIVE_SPRINT: &str = r#"{"values":[{"id":42,"name":"Sprint 42","state":"active",
        "startDate":"2026-03-02T09:00:00.000Z","endDate":"2026-03-16T09:00:00.000Z","goal":"Checkout v2"}]}"#;

    const ISSUES: &str = r#"{"startAt":0,"maxResults":100,"total":3,"issues":[
        {"id":"1001","key":"PIT-1","fields":{"summary":"Payment form",
            "status":{"name":"Done","statusCategory":{"key":"done"}},
            "priority":{"name":"High"},
            "assignee":{"accountId":"u1","displayName":"Ada","emailAddress":"ada@example.com"},
            "updated":"2026-03-04T10:00:00.000+0000","customfield_10016":5.0}},
        {"id":"1002","key":"PIT-2","fields":{"summary":"Refund flow",
            "status":{"name":"Code Review","statusCategory":{"key":"indeterminate"}},
            "priority":{"name":"Highest"},
            "assignee":{"accountId":"u1","displayName":"Ada"},
            "customfield_10016":3}},
        {"id":"1003","key":"PIT-3","fields":{"summary":"Vendor SDK",
            "status":{"name":"Blocked","statusCategory":{"key":"indeterminate"}},
            "assignee":null,"customfield_10016":null}}
    ]}"#;

    #[test]
    fn map_status_covers_categories() {
        assert_eq!(map_status("Done", Some("done"), false), IssueStatus::Done);
        assert_eq!(map_status("In Progress", Some("indeterminate"), false), IssueStatus::InProgress);
        assert_eq!(map_status("In Review", Some("indeterminate"), false), IssueStatus::Review);
        assert_eq!(map_status("To Do", Some("new"), false), IssueStatus::Todo);
        assert_eq!(map_status("Blocked", Some("indeterminate"), false), IssueStatus::Blocked);
        assert_eq!(map_status("In Progress", Some("indeterminate"), true), IssueStatus::Blocked);
        assert_eq!(map_status("Whatever", None, false), IssueStatus::Todo);
    }

    #[test]
    fn parse_ts_accepts_both_offset_styles() {
        assert!(parse_ts("2026-03-02T09:00:00.000Z").is_some());
        assert!(parse_ts("2026-03-04T10:00:00.000+0000").is_some());
        assert!(parse_ts("yesterday").is_none());
    }

    #[test]
    fn fetches_active_sprint_issues_and_team() {
        let mut server = mockito::Server::new();
        let sprint_mock = server
            .mock("GET", "/rest/agile/1.0/board/7/sprint")
            .match_query(Matcher::UrlEncoded("state".into(), "active".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(ACTIVE_SPRINT)
            .create();
        let issues_mock = server
            .mock("GET", "/rest/agile/1.0/sprint/42/issue")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(ISSUES)
            .create();

        let client = JiraClient::new(&cfg(server.url()), 25).unwrap();
        let data = client.fetch_sprint_data(None).unwrap();

        sprint_mock.assert();
        issues_mock.assert();
        assert_eq!(data.sprint.id, "42");
        assert_eq!(data.sprint.status, SprintStatus::Active);
        assert_eq!(data.sprint.goal.as_deref(), Some("Checkout v2"));
        assert_eq!(data.issues.len(), 3);

        let review = &data.issues[1];
        assert_eq!(review.status, IssueStatus::Review);
        assert_eq!(review.priority, Priority::Critical);
        assert_eq!(review.story_points, 3);

        let blocked = &data.issues[2];
        assert_eq!(blocked.status, IssueStatus::Blocked);
        assert_eq!(blocked.story_points, 0);
        assert!(blocked.assignee_id.is_none());
        assert!(blocked.blocked_at.is_some());

        assert_eq!(data.team.len(), 1);
        assert_eq!(data.team[0].name, "Ada");
        assert_eq!(data.team[0].capacity, 25);
    }

    #[test]
    fn server_error_maps_to_tracker_unavailable() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/rest/agile/1.0/board/7/sprint")
            .match_query(Matcher::Any)
            .with_status(503)
            .create();
        let client = JiraClient::new(&cfg(server.url()), 20).unwrap();
        assert!(matches!(
            client.fetch_sprint_data(None),
            Err(PitstopError::TrackerUnavailable(_))
        ));
    }

    #[test]
    fn board_without_active_sprint() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/rest/agile/1.0/board/7/sprint")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"values":[]}"#)
            .create();
        let client = JiraClient::new(&cfg(server.url()), 20).unwrap();
        assert!(matches!(
            client.fetch_sprint_data(None),
            Err(PitstopError::NoActiveSprint)
        ));
    }

    #[test]
    fn missing_token_is_not_configured() {
        let mut c = cfg("http://localhost".into());
        c.api_token_env = "PITSTOP_TEST_TOKEN_THAT_IS_NEVER_SET".into();
        assert!(matches!(
            JiraClient::new(&c, 20),
            Err(PitstopError::TrackerNotConfigured)
        ));
    }
}
