//! Templated sprint assistant. Keyword routing over the current metrics and
//! recommendations; no model calls, no randomness.

use crate::advisor::Recommendation;
use crate::metrics::SprintMetrics;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Health,
    Blockers,
    Velocity,
    Team,
    Recommendations,
    Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub topic: Topic,
    pub reply: String,
    pub suggestions: Vec<String>,
}

const KEYWORDS: &[(Topic, &[&str])] = &[
    (Topic::Blockers, &["block", "stuck", "impediment"]),
    (Topic::Velocity, &["velocity", "speed", "pace", "points"]),
    (Topic::Team, &["team", "load", "capacity", "overload", "who"]),
    (Topic::Recommendations, &["recommend", "suggest", "advice", "should", "fix"]),
    (Topic::Health, &["health", "score", "status", "risk"]),
];

pub fn classify(question: &str) -> Topic {
    let q = question.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| q.contains(w)))
        .map(|(topic, _)| *topic)
        .unwrap_or(Topic::Summary)
}

fn health_label(score: u32) -> &'static str {
    match score {
        80..=100 => "healthy",
        60..=79 => "needs attention",
        _ => "at risk",
    }
}

pub fn reply(question: &str, metrics: &SprintMetrics, recs: &[Recommendation]) -> ChatReply {
    let topic = classify(question);
    let reply = match topic {
        Topic::Health => format!(
            "Sprint health is {}/100 ({}). Completion is {}% against an ideal of {}%.",
            metrics.health_score,
            health_label(metrics.health_score),
            metrics.completion_percentage,
            metrics.ideal_progress
        ),
        Topic::Blockers => match metrics.blockers_count {
            0 => "Nothing is blocked right now.".to_string(),
            n => format!(
                "{n} issue(s) are blocked. Clearing them is the quickest way to lift the health score."
            ),
        },
        Topic::Velocity => format!(
            "Velocity is {} of {} story points with {} day(s) remaining.",
            metrics.velocity, metrics.total_points, metrics.days_remaining
        ),
        Topic::Team => match metrics.team_metrics.first() {
            Some(top) => format!(
                "{} carries the highest load at {}% of capacity; team average is {}%.",
                top.name, top.load, metrics.average_load
            ),
            None => "No active team members are assigned to this sprint.".to_string(),
        },
        Topic::Recommendations => match recs.first() {
            Some(first) => format!(
                "{} recommendation(s). Start with \"{}\": {}",
                recs.len(),
                first.title,
                first.solution
            ),
            None => "No pit-stop needed: every rule is within its threshold.".to_string(),
        },
        Topic::Summary => format!(
            "{} of {} issues done ({}%), {} in progress, {} blocked. Health {}/100.",
            metrics.issues_completed,
            metrics.issues_total,
            metrics.completion_percentage,
            metrics.issues_in_progress,
            metrics.blockers_count,
            metrics.health_score
        ),
    };

    let suggestions = recs.iter().take(3).map(|r| r.title.clone()).collect();
    ChatReply {
        topic,
        reply,
        suggestions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::metrics;
    use crate::model::Sprint;
    use crate::types::SprintStatus;
    use chrono::{Duration, Utc};

    fn empty_metrics() -> SprintMetrics {
        let now = Utc::now();
        let sprint = Sprint {
            id: "s".into(),
            name: "S".into(),
            start_date: now - Duration::days(2),
            end_date: now + Duration::days(8),
            goal: None,
            status: SprintStatus::Active,
        };
        metrics::compute(&sprint, &[], &[], now, &ScoringConfig::default())
    }

    #[test]
    fn classify_routes_keywords() {
        assert_eq!(classify("Why are we blocked?"), Topic::Blockers);
        assert_eq!(classify("what's our velocity"), Topic::Velocity);
        assert_eq!(classify("Who is overloaded on the team"), Topic::Team);
        assert_eq!(classify("What should we do?"), Topic::Recommendations);
        assert_eq!(classify("How's the health score"), Topic::Health);
        assert_eq!(classify("hello"), Topic::Summary);
    }

    #[test]
    fn reply_without_team_or_recommendations() {
        let m = empty_metrics();
        let team = reply("team load?", &m, &[]);
        assert!(team.reply.contains("No active team members"));
        let recs = reply("any recommendations", &m, &[]);
        assert!(recs.reply.contains("No pit-stop needed"));
        assert!(recs.suggestions.is_empty());
    }

    #[test]
    fn reply_is_deterministic() {
        let m = empty_metrics();
        assert_eq!(reply("status", &m, &[]), reply("status", &m, &[]));
    }
}
