//! Entities persisted by the store and consumed by the metrics module.
//!
//! Field names serialize in camelCase to match the dashboard's JSON contract.

use crate::types::{IssueStatus, Priority, RecommendationStatus, SprintStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sprint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sprint {
    pub id: String,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    pub status: SprintStatus,
}

// ---------------------------------------------------------------------------
// Issue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub key: String,
    pub summary: String,
    #[serde(default)]
    pub sprint_id: Option<String>,
    pub status: IssueStatus,
    #[serde(default)]
    pub story_points: u32,
    pub priority: Priority,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    pub fn new(id: impl Into<String>, key: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            summary: summary.into(),
            sprint_id: None,
            status: IssueStatus::Todo,
            story_points: 0,
            priority: Priority::Medium,
            assignee_id: None,
            blocked_reason: None,
            blocked_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.status.is_done()
    }

    /// Move the issue to `status`, keeping the blocked bookkeeping consistent.
    pub fn set_status(&mut self, status: IssueStatus, reason: Option<String>) {
        let now = Utc::now();
        if status == IssueStatus::Blocked {
            if self.status != IssueStatus::Blocked {
                self.blocked_at = Some(now);
            }
            if reason.is_some() {
                self.blocked_reason = reason;
            }
        } else {
            self.blocked_at = None;
            self.blocked_reason = None;
        }
        self.status = status;
        self.updated_at = now;
    }
}

// ---------------------------------------------------------------------------
// TeamMember
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    #[serde(default = "default_role")]
    pub role: String,
    /// Weekly capacity in story points.
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

pub fn default_role() -> String {
    "developer".to_string()
}

pub fn default_capacity() -> u32 {
    20
}

fn default_active() -> bool {
    true
}

impl TeamMember {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: default_role(),
            capacity: default_capacity(),
            active: true,
            email: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SprintData — what every data source yields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintData {
    pub sprint: Sprint,
    pub issues: Vec<Issue>,
    pub team: Vec<TeamMember>,
}

// ---------------------------------------------------------------------------
// MetricsSnapshot
// ---------------------------------------------------------------------------

/// Append-only record of the aggregate numbers at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub id: i64,
    pub sprint_id: String,
    pub health_score: u32,
    pub velocity: u32,
    pub completion_percentage: u32,
    pub blockers_count: u32,
    pub average_load: u32,
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// StoredRecommendation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecommendation {
    pub id: String,
    pub sprint_id: String,
    pub rule: String,
    pub title: String,
    pub problem: String,
    pub solution: String,
    pub priority: Priority,
    pub success_probability: u32,
    pub affected_issue_ids: Vec<String>,
    pub status: RecommendationStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub applied_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Activity / Achievement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    #[serde(default)]
    pub sprint_id: Option<String>,
    /// "sync", "status_change", "recommendation_applied", ...
    pub kind: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn new(sprint_id: Option<&str>, kind: &str, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sprint_id: sprint_id.map(str::to_string),
            kind: kind.to_string(),
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub sprint_id: String,
    pub code: String,
    pub title: String,
    pub description: String,
    pub awarded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_an_issue_stamps_blocked_at() {
        let mut issue = Issue::new("1", "PIT-1", "Login page");
        issue.set_status(IssueStatus::Blocked, Some("waiting on API".into()));
        assert!(issue.blocked_at.is_some());
        assert_eq!(issue.blocked_reason.as_deref(), Some("waiting on API"));

        issue.set_status(IssueStatus::InProgress, None);
        assert!(issue.blocked_at.is_none());
        assert!(issue.blocked_reason.is_none());
    }

    #[test]
    fn team_member_defaults_apply_when_fields_missing() {
        let m: TeamMember = serde_json::from_str(r#"{"id":"u1","name":"Ada"}"#).unwrap();
        assert_eq!(m.capacity, 20);
        assert_eq!(m.role, "developer");
        assert!(m.active);
    }

    #[test]
    fn issue_serializes_camel_case() {
        let mut issue = Issue::new("1", "PIT-1", "Login page");
        issue.story_points = 5;
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["storyPoints"], 5);
        assert!(json.get("blockedReason").is_none());
    }
}
