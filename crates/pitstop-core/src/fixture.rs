//! Built-in demo sprint. Last resort of the source chain and the seed data
//! written by `pitstop init`.

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::model::{Issue, Sprint, SprintData, TeamMember};
use crate::store::Store;
use crate::types::{IssueStatus, Priority, SprintStatus};

pub const DEMO_SPRINT_ID: &str = "demo-sprint";

const TEAM: &[(&str, &str, &str, u32)] = &[
    ("alex", "Alex Rivera", "developer", 20),
    ("sam", "Sam Chen", "developer", 20),
    ("jordan", "Jordan Lee", "developer", 15),
    ("taylor", "Taylor Kim", "qa", 10),
];

// (key, summary, status, points, priority, assignee)
const ISSUES: &[(&str, &str, IssueStatus, u32, Priority, Option<&str>)] = &[
    ("PIT-101", "Checkout page redesign", IssueStatus::Done, 5, Priority::High, Some("alex")),
    ("PIT-102", "Payment provider integration", IssueStatus::InProgress, 8, Priority::Critical, Some("alex")),
    ("PIT-103", "Order confirmation email", IssueStatus::Done, 3, Priority::Medium, Some("sam")),
    ("PIT-104", "Inventory sync job", IssueStatus::Blocked, 5, Priority::High, Some("sam")),
    ("PIT-105", "Discount code validation", IssueStatus::Review, 3, Priority::Medium, Some("jordan")),
    ("PIT-106", "Cart persistence across devices", IssueStatus::Todo, 13, Priority::Medium, Some("alex")),
    ("PIT-107", "Checkout regression suite", IssueStatus::InProgress, 5, Priority::High, Some("taylor")),
    ("PIT-108", "Update footer links", IssueStatus::Todo, 1, Priority::Low, None),
    ("PIT-109", "Address autocomplete", IssueStatus::Todo, 3, Priority::Low, Some("jordan")),
    ("PIT-110", "Guest checkout analytics", IssueStatus::Done, 2, Priority::Low, Some("sam")),
];

/// The demo sprint, anchored so that `now` falls on day five of fourteen.
pub fn demo_data(now: DateTime<Utc>) -> SprintData {
    let start = now - Duration::days(5);
    let sprint = Sprint {
        id: DEMO_SPRINT_ID.to_string(),
        name: "Demo Sprint".to_string(),
        start_date: start,
        end_date: start + Duration::days(14),
        goal: Some("Launch the new checkout flow".to_string()),
        status: SprintStatus::Active,
    };

    let team = TEAM
        .iter()
        .map(|(id, name, role, capacity)| TeamMember {
            role: (*role).to_string(),
            capacity: *capacity,
            ..TeamMember::new(*id, *name)
        })
        .collect();

    let issues = ISSUES
        .iter()
        .enumerate()
        .map(|(n, (key, summary, status, points, priority, assignee))| {
            let mut issue = Issue::new(format!("demo-{}", n + 1), *key, *summary);
            issue.sprint_id = Some(DEMO_SPRINT_ID.to_string());
            issue.story_points = *points;
            issue.priority = *priority;
            issue.assignee_id = assignee.map(str::to_string);
            issue.updated_at = start + Duration::days(n as i64 % 5);
            if *status == IssueStatus::Blocked {
                issue.blocked_reason = Some("Waiting on warehouse API credentials".to_string());
                issue.blocked_at = Some(start + Duration::days(2));
            }
            issue.status = *status;
            issue
        })
        .collect();

    SprintData {
        sprint,
        issues,
        team,
    }
}

/// Write the demo sprint into an empty store. Returns whether anything was written.
pub fn seed(store: &Store, now: DateTime<Utc>) -> Result<bool> {
    if !store.is_empty()? {
        return Ok(false);
    }
    store.replace_sprint_data(&demo_data(now))?;
    tracing::info!(sprint = DEMO_SPRINT_ID, "seeded demo sprint");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_data_is_internally_consistent() {
        let d = demo_data(Utc::now());
        assert_eq!(d.sprint.status, SprintStatus::Active);
        assert_eq!(d.issues.len(), ISSUES.len());
        for issue in &d.issues {
            assert_eq!(issue.sprint_id.as_deref(), Some(DEMO_SPRINT_ID));
            if let Some(a) = &issue.assignee_id {
                assert!(d.team.iter().any(|m| &m.id == a), "{a} not in team");
            }
            assert_eq!(issue.status == IssueStatus::Blocked, issue.blocked_at.is_some());
        }
    }

    #[test]
    fn seed_only_writes_into_empty_store() {
        let store = Store::open_in_memory().unwrap();
        assert!(seed(&store, Utc::now()).unwrap());
        assert!(!seed(&store, Utc::now()).unwrap());
        assert_eq!(store.issues_for_sprint(DEMO_SPRINT_ID).unwrap().len(), ISSUES.len());
    }
}
