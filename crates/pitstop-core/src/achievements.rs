//! Badges awarded when a freshly computed snapshot crosses a milestone.

use crate::metrics::SprintMetrics;
use crate::model::Achievement;
use chrono::{DateTime, Utc};

pub struct AchievementRule {
    pub code: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub earned: fn(&SprintMetrics) -> bool,
}

pub fn default_achievements() -> Vec<AchievementRule> {
    vec![
        AchievementRule {
            code: "healthy_sprint",
            title: "Smooth Sailing",
            description: "Sprint health reached 80 or more.",
            earned: |m| m.health_score >= 80,
        },
        AchievementRule {
            code: "blocker_free",
            title: "Clear Track",
            description: "No blocked issues in a non-empty sprint.",
            earned: |m| m.issues_total > 0 && m.blockers_count == 0,
        },
        AchievementRule {
            code: "sprint_complete",
            title: "Chequered Flag",
            description: "Every story point in the sprint is done.",
            earned: |m| m.total_points > 0 && m.completion_percentage == 100,
        },
    ]
}

/// Achievements `metrics` qualifies for. The store ignores ones already held.
pub fn evaluate(sprint_id: &str, metrics: &SprintMetrics, now: DateTime<Utc>) -> Vec<Achievement> {
    default_achievements()
        .into_iter()
        .filter(|rule| (rule.earned)(metrics))
        .map(|rule| Achievement {
            sprint_id: sprint_id.to_string(),
            code: rule.code.to_string(),
            title: rule.title.to_string(),
            description: rule.description.to_string(),
            awarded_at: now,
        })
        .collect()
}
