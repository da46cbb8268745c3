//! Sprint metrics and the weighted health score.
//!
//! Everything here is a pure function of `(sprint, issues, team, now, config)`:
//! no I/O, no clock reads. Callers pass `now` explicitly so results are
//! reproducible.

use crate::config::ScoringConfig;
use crate::model::{Issue, Sprint, TeamMember};
use crate::types::IssueStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DAY_MS: f64 = 86_400_000.0;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberMetrics {
    pub id: String,
    pub name: String,
    /// Open story points as a percentage of capacity. Not clamped: 150 means
    /// half again over capacity.
    pub load: u32,
    pub task_count: u32,
    pub completion_rate: u32,
    pub assigned_points: u32,
    pub capacity: u32,
}

/// The six clamped sub-scores that feed the health score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthBreakdown {
    pub progress_on_track: f64,
    pub no_blockers: f64,
    pub team_balance: f64,
    pub velocity_health: f64,
    pub scope_progress: f64,
    pub burndown_health: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintMetrics {
    pub health_score: u32,
    pub velocity: u32,
    pub completion_percentage: u32,
    pub total_points: u32,
    pub completed_points: u32,
    pub issues_total: u32,
    pub issues_completed: u32,
    pub issues_in_progress: u32,
    pub issues_todo: u32,
    pub blockers_count: u32,
    pub days_total: u32,
    pub days_elapsed: u32,
    pub days_remaining: u32,
    pub ideal_progress: u32,
    pub average_load: u32,
    pub overloaded_count: u32,
    pub underutilized_count: u32,
    pub team_metrics: Vec<MemberMetrics>,
    pub breakdown: HealthBreakdown,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn clamp_score(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 100.0)
    }
}

/// `round(100 * part / whole)`, 0 when `whole` is 0.
fn percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (100.0 * part as f64 / whole as f64).round() as u32
}

/// Whole days from `from` to `to`, rounded up. Negative when `to` is earlier.
fn ceil_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    ((to - from).num_milliseconds() as f64 / DAY_MS).ceil() as i64
}

// ---------------------------------------------------------------------------
// Time progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeProgress {
    pub total_days: u32,
    pub elapsed_days: u32,
    pub remaining_days: u32,
    pub ideal_progress: u32,
}

pub fn time_progress(sprint: &Sprint, now: DateTime<Utc>) -> TimeProgress {
    let total = ceil_days(sprint.start_date, sprint.end_date).max(0);
    let elapsed = ceil_days(sprint.start_date, now);
    let remaining = ceil_days(now, sprint.end_date).max(0);

    let ideal = if total == 0 {
        if elapsed >= total {
            100
        } else {
            0
        }
    } else {
        (100.0 * elapsed as f64 / total as f64).round().clamp(0.0, 100.0) as u32
    };

    TimeProgress {
        total_days: total as u32,
        elapsed_days: elapsed.max(0) as u32,
        remaining_days: remaining as u32,
        ideal_progress: ideal,
    }
}

// ---------------------------------------------------------------------------
// Issue aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssueTotals {
    pub total: u32,
    pub completed: u32,
    pub in_progress: u32,
    pub todo: u32,
    pub blocked: u32,
    pub total_points: u32,
    pub completed_points: u32,
}

pub fn issue_totals(issues: &[Issue]) -> IssueTotals {
    let mut t = IssueTotals::default();
    for issue in issues {
        t.total += 1;
        t.total_points = t.total_points.saturating_add(issue.story_points);
        match issue.status {
            IssueStatus::Done => {
                t.completed += 1;
                t.completed_points = t.completed_points.saturating_add(issue.story_points);
            }
            IssueStatus::InProgress | IssueStatus::Review => t.in_progress += 1,
            IssueStatus::Todo => t.todo += 1,
            IssueStatus::Blocked => t.blocked += 1,
        }
    }
    t
}

// ---------------------------------------------------------------------------
// Per-member load
// ---------------------------------------------------------------------------

/// Load for each active member, highest first. Unassigned issues are ignored.
pub fn member_metrics(issues: &[Issue], team: &[TeamMember]) -> Vec<MemberMetrics> {
    let mut out: Vec<MemberMetrics> = team
        .iter()
        .filter(|m| m.active)
        .map(|member| {
            let mine = issues
                .iter()
                .filter(|i| i.assignee_id.as_deref() == Some(member.id.as_str()));
            let mut task_count = 0u32;
            let mut done_count = 0u32;
            let mut open_points = 0u32;
            for issue in mine {
                task_count += 1;
                if issue.is_done() {
                    done_count += 1;
                } else {
                    open_points = open_points.saturating_add(issue.story_points);
                }
            }
            MemberMetrics {
                id: member.id.clone(),
                name: member.name.clone(),
                load: percent(open_points, member.capacity),
                task_count,
                completion_rate: percent(done_count, task_count),
                assigned_points: open_points,
                capacity: member.capacity,
            }
        })
        .collect();

    out.sort_by(|a, b| b.load.cmp(&a.load).then_with(|| a.name.cmp(&b.name)));
    out
}

// ---------------------------------------------------------------------------
// Health score
// ---------------------------------------------------------------------------

pub struct HealthInputs {
    pub completion_percentage: u32,
    pub ideal_progress: u32,
    pub blocked: u32,
    pub overloaded: u32,
    pub underutilized: u32,
    pub velocity: u32,
    pub total_points: u32,
}

pub fn health_breakdown(inputs: &HealthInputs, cfg: &ScoringConfig) -> HealthBreakdown {
    let completion = inputs.completion_percentage as f64;
    let deviation = completion - inputs.ideal_progress as f64;

    let velocity_ratio = if inputs.total_points > 0 {
        inputs.velocity as f64 / inputs.total_points as f64
    } else {
        0.0
    };

    HealthBreakdown {
        progress_on_track: clamp_score(cfg.progress_baseline + deviation),
        no_blockers: clamp_score(100.0 - cfg.blocker_penalty * inputs.blocked as f64),
        team_balance: clamp_score(
            100.0
                - cfg.overload_penalty * inputs.overloaded as f64
                - cfg.underutilized_penalty * inputs.underutilized as f64,
        ),
        velocity_health: clamp_score(cfg.velocity_multiplier * velocity_ratio),
        scope_progress: clamp_score(completion),
        burndown_health: clamp_score(100.0 - deviation.abs()),
    }
}

pub fn health_score(b: &HealthBreakdown, cfg: &ScoringConfig) -> u32 {
    let w = &cfg.weights;
    let weighted = w.progress_on_track * b.progress_on_track
        + w.no_blockers * b.no_blockers
        + w.team_balance * b.team_balance
        + w.velocity_health * b.velocity_health
        + w.scope_progress * b.scope_progress
        + w.burndown_health * b.burndown_health;
    clamp_score(weighted).round() as u32
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn compute(
    sprint: &Sprint,
    issues: &[Issue],
    team: &[TeamMember],
    now: DateTime<Utc>,
    cfg: &ScoringConfig,
) -> SprintMetrics {
    let time = time_progress(sprint, now);
    let totals = issue_totals(issues);
    let completion = percent(totals.completed_points, totals.total_points).min(100);
    let members = member_metrics(issues, team);

    let overloaded = members
        .iter()
        .filter(|m| m.load > cfg.overload_threshold)
        .count() as u32;
    let underutilized = members
        .iter()
        .filter(|m| m.load < cfg.underutilized_threshold)
        .count() as u32;
    let average_load = if members.is_empty() {
        0
    } else {
        let sum: u64 = members.iter().map(|m| m.load as u64).sum();
        (sum as f64 / members.len() as f64).round() as u32
    };

    let breakdown = health_breakdown(
        &HealthInputs {
            completion_percentage: completion,
            ideal_progress: time.ideal_progress,
            blocked: totals.blocked,
            overloaded,
            underutilized,
            velocity: totals.completed_points,
            total_points: totals.total_points,
        },
        cfg,
    );

    SprintMetrics {
        health_score: health_score(&breakdown, cfg),
        velocity: totals.completed_points,
        completion_percentage: completion,
        total_points: totals.total_points,
        completed_points: totals.completed_points,
        issues_total: totals.total,
        issues_completed: totals.completed,
        issues_in_progress: totals.in_progress,
        issues_todo: totals.todo,
        blockers_count: totals.blocked,
        days_total: time.total_days,
        days_elapsed: time.elapsed_days,
        days_remaining: time.remaining_days,
        ideal_progress: time.ideal_progress,
        average_load,
        overloaded_count: overloaded,
        underutilized_count: underutilized,
        team_metrics: members,
        breakdown,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
