use crate::config::RuleThresholds;
use crate::metrics::SprintMetrics;
use crate::model::{Issue, TeamMember};
use crate::rules::default_rules;
use crate::types::Priority;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Workload spread
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberWorkload {
    pub id: String,
    pub name: String,
    pub open_tasks: u32,
    pub open_points: u32,
}

/// Members compared against the team mean on open task count and open points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkloadSpread {
    pub mean_tasks: f64,
    pub mean_points: f64,
    pub overloaded: Vec<MemberWorkload>,
    pub underloaded: Vec<MemberWorkload>,
}

impl WorkloadSpread {
    pub fn measure(issues: &[Issue], team: &[TeamMember], thresholds: &RuleThresholds) -> Self {
        let loads: Vec<MemberWorkload> = team
            .iter()
            .filter(|m| m.active)
            .map(|m| {
                let open = issues
                    .iter()
                    .filter(|i| !i.is_done() && i.assignee_id.as_deref() == Some(m.id.as_str()));
                let (tasks, points) = open.fold((0u32, 0u32), |(t, p), i| {
                    (t + 1, p.saturating_add(i.story_points))
                });
                MemberWorkload {
                    id: m.id.clone(),
                    name: m.name.clone(),
                    open_tasks: tasks,
                    open_points: points,
                }
            })
            .collect();

        if loads.is_empty() {
            return Self::default();
        }

        let n = loads.len() as f64;
        let mean_tasks = loads.iter().map(|l| l.open_tasks as f64).sum::<f64>() / n;
        let mean_points = loads.iter().map(|l| l.open_points as f64).sum::<f64>() / n;

        let high = thresholds.overloaded_ratio;
        let low = thresholds.underloaded_ratio;
        let mut overloaded = Vec::new();
        let mut underloaded = Vec::new();
        for l in loads {
            let tasks = l.open_tasks as f64;
            let points = l.open_points as f64;
            if tasks > high * mean_tasks || points > high * mean_points {
                overloaded.push(l);
            } else if tasks < low * mean_tasks || points < low * mean_points {
                underloaded.push(l);
            }
        }

        Self {
            mean_tasks,
            mean_points,
            overloaded,
            underloaded,
        }
    }
}

// ---------------------------------------------------------------------------
// RuleContext
// ---------------------------------------------------------------------------

pub struct RuleContext<'a> {
    pub metrics: &'a SprintMetrics,
    pub issues: &'a [Issue],
    pub team: &'a [TeamMember],
    pub thresholds: &'a RuleThresholds,
    pub workload: WorkloadSpread,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        metrics: &'a SprintMetrics,
        issues: &'a [Issue],
        team: &'a [TeamMember],
        thresholds: &'a RuleThresholds,
    ) -> Self {
        Self {
            metrics,
            issues,
            team,
            thresholds,
            workload: WorkloadSpread::measure(issues, team, thresholds),
        }
    }
}

/// What a matched rule is about: the sprint as a whole, or one issue.
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    Sprint,
    Issue(Issue),
}

// ---------------------------------------------------------------------------
// Recommendation (output)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedTask {
    pub id: String,
    pub key: String,
    pub summary: String,
}

impl From<&Issue> for AffectedTask {
    fn from(issue: &Issue) -> Self {
        Self {
            id: issue.id.clone(),
            key: issue.key.clone(),
            summary: issue.summary.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub rule: String,
    pub title: String,
    pub problem: String,
    pub solution: String,
    pub priority: Priority,
    pub success_probability: u32,
    pub affected_tasks: Vec<AffectedTask>,
    /// Set when the rule fired for a single issue rather than the sprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A fn-pointer rule: `subjects` decides whether (and for what) the rule
/// fires; the template fns render one recommendation per subject.
pub struct Rule {
    pub id: &'static str,
    pub priority: Priority,
    pub success_probability: u32,
    pub subjects: fn(&RuleContext) -> Vec<Subject>,
    pub title: fn(&RuleContext, &Subject) -> String,
    pub problem: fn(&RuleContext, &Subject) -> String,
    pub solution: fn(&RuleContext, &Subject) -> String,
    pub affected: fn(&RuleContext, &Subject) -> Vec<AffectedTask>,
}

// ---------------------------------------------------------------------------
// Advisor
// ---------------------------------------------------------------------------

pub struct Advisor {
    rules: Vec<Rule>,
}

impl Default for Advisor {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl Advisor {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id).collect()
    }

    /// Evaluate every rule in declaration order. Output order is rule order,
    /// then subject order within a rule; never re-sorted by priority.
    pub fn evaluate(&self, ctx: &RuleContext) -> Vec<Recommendation> {
        let mut out = Vec::new();
        for rule in &self.rules {
            let subjects = (rule.subjects)(ctx);
            if !subjects.is_empty() {
                tracing::debug!(rule = rule.id, matches = subjects.len(), "rule matched");
            }
            for subject in &subjects {
                out.push(Recommendation {
                    rule: rule.id.to_string(),
                    title: (rule.title)(ctx, subject),
                    problem: (rule.problem)(ctx, subject),
                    solution: (rule.solution)(ctx, subject),
                    priority: rule.priority,
                    success_probability: rule.success_probability.min(100),
                    affected_tasks: (rule.affected)(ctx, subject),
                    issue_id: match subject {
                        Subject::Issue(issue) => Some(issue.id.clone()),
                        Subject::Sprint => None,
                    },
                });
            }
        }
        out
    }
}

/// Run the default rule table against computed metrics.
pub fn recommend(
    metrics: &SprintMetrics,
    issues: &[Issue],
    team: &[TeamMember],
    thresholds: &RuleThresholds,
) -> Vec<Recommendation> {
    let ctx = RuleContext::new(metrics, issues, team, thresholds);
    Advisor::default().evaluate(&ctx)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
