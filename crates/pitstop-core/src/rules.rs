use crate::advisor::{AffectedTask, Rule, RuleContext, Subject};
use crate::model::Issue;
use crate::types::{IssueStatus, Priority};

// ---------------------------------------------------------------------------
// Helper macro for concise rule definitions
// ---------------------------------------------------------------------------

macro_rules! rule {
    (
        id: $id:expr,
        priority: $priority:expr,
        success_probability: $prob:expr,
        subjects: $subjects:expr,
        title: $title:expr,
        problem: $problem:expr,
        solution: $solution:expr
        $(, affected: $affected:expr)?
    ) => {
        Rule {
            id: $id,
            priority: $priority,
            success_probability: $prob,
            subjects: $subjects,
            title: $title,
            problem: $problem,
            solution: $solution,
            affected: {
                #[allow(unused_assignments, unused_mut)]
                let mut v: fn(&RuleContext, &Subject) -> Vec<AffectedTask> = no_affected;
                $(v = $affected;)?
                v
            },
        }
    };
}

// ---------------------------------------------------------------------------
// Condition helpers
// ---------------------------------------------------------------------------

fn no_affected(_: &RuleContext, _: &Subject) -> Vec<AffectedTask> {
    Vec::new()
}

fn sprint_if(cond: bool) -> Vec<Subject> {
    if cond {
        vec![Subject::Sprint]
    } else {
        Vec::new()
    }
}

fn tasks(issues: &[&Issue]) -> Vec<AffectedTask> {
    issues.iter().map(|i| AffectedTask::from(*i)).collect()
}

fn subject_issue(subject: &Subject) -> Option<&Issue> {
    match subject {
        Subject::Issue(issue) => Some(issue),
        Subject::Sprint => None,
    }
}

/// Points by which completion trails the ideal burndown (negative when ahead).
fn progress_gap(ctx: &RuleContext) -> i64 {
    ctx.metrics.ideal_progress as i64 - ctx.metrics.completion_percentage as i64
}

fn is_scope_at_risk(ctx: &RuleContext) -> bool {
    ctx.metrics.issues_total > 0
        && (ctx.metrics.completion_percentage as i64)
            < ctx.metrics.ideal_progress as i64 - ctx.thresholds.scope_risk_margin as i64
}

fn descoping_candidates<'a>(ctx: &RuleContext<'a>) -> Vec<&'a Issue> {
    ctx.issues
        .iter()
        .filter(|i| i.priority == Priority::Low && !i.is_done())
        .collect()
}

fn blocked_issues<'a>(ctx: &RuleContext<'a>) -> Vec<&'a Issue> {
    ctx.issues
        .iter()
        .filter(|i| i.status == IssueStatus::Blocked)
        .collect()
}

/// Open, unblocked issues held by overloaded members: the ones that can move.
fn movable_issues<'a>(ctx: &RuleContext<'a>) -> Vec<&'a Issue> {
    let overloaded = &ctx.workload.overloaded;
    ctx.issues
        .iter()
        .filter(|i| {
            !i.is_done()
                && i.status != IssueStatus::Blocked
                && i
                    .assignee_id
                    .as_deref()
                    .is_some_and(|a| overloaded.iter().any(|m| m.id == a))
        })
        .collect()
}

fn unassigned_open_issues<'a>(ctx: &RuleContext<'a>) -> Vec<&'a Issue> {
    ctx.issues
        .iter()
        .filter(|i| !i.is_done() && i.assignee_id.is_none())
        .collect()
}

fn large_open_issues(ctx: &RuleContext) -> Vec<Subject> {
    let mut large: Vec<&Issue> = ctx
        .issues
        .iter()
        .filter(|i| !i.is_done() && i.story_points > ctx.thresholds.large_task_points)
        .collect();
    large.sort_by(|a, b| b.story_points.cmp(&a.story_points).then_with(|| a.key.cmp(&b.key)));
    large
        .into_iter()
        .take(ctx.thresholds.large_task_limit)
        .map(|i| Subject::Issue(i.clone()))
        .collect()
}

fn names(members: &[crate::advisor::MemberWorkload]) -> String {
    members
        .iter()
        .map(|m| m.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Default rules (declaration order is output order)
// ---------------------------------------------------------------------------

pub fn default_rules() -> Vec<Rule> {
    vec![
        // 1. Completion trails the ideal burndown by more than the margin
        rule! {
            id: "scope_risk",
            priority: Priority::Critical,
            success_probability: 85,
            subjects: |ctx| sprint_if(is_scope_at_risk(ctx)),
            title: |_, _| "Sprint scope at risk".to_string(),
            problem: |ctx, _| format!(
                "Completion is {}% while the ideal burndown is at {}% ({} points behind).",
                ctx.metrics.completion_percentage,
                ctx.metrics.ideal_progress,
                progress_gap(ctx)
            ),
            solution: |ctx, _| {
                let candidates = descoping_candidates(ctx);
                if candidates.is_empty() {
                    "Renegotiate the sprint goal with the product owner; no low-priority work is left to drop.".to_string()
                } else {
                    let points = candidates
                        .iter()
                        .fold(0u32, |acc, i| acc.saturating_add(i.story_points));
                    format!(
                        "Move {} low-priority unfinished issue(s) ({} points) back to the backlog.",
                        candidates.len(),
                        points
                    )
                }
            },
            affected: |ctx, _| tasks(&descoping_candidates(ctx))
        },
        // 2. Too many blocked issues
        rule! {
            id: "blocked_tasks",
            priority: Priority::High,
            success_probability: 90,
            subjects: |ctx| sprint_if(ctx.metrics.blockers_count > ctx.thresholds.max_blocked),
            title: |ctx, _| format!("Unblock {} stalled issues", ctx.metrics.blockers_count),
            problem: |ctx, _| {
                let points = blocked_issues(ctx)
                    .iter()
                    .fold(0u32, |acc, i| acc.saturating_add(i.story_points));
                format!(
                    "{} issues ({} points) are blocked and cannot progress.",
                    ctx.metrics.blockers_count, points
                )
            },
            solution: |_, _| "Hold a focused unblocking session today and assign an owner to each blocker.".to_string(),
            affected: |ctx, _| tasks(&blocked_issues(ctx))
        },
        // 3. Some members far above the team mean while others sit far below
        rule! {
            id: "rebalance",
            priority: Priority::Medium,
            success_probability: 75,
            subjects: |ctx| sprint_if(
                !ctx.workload.overloaded.is_empty() && !ctx.workload.underloaded.is_empty()
            ),
            title: |_, _| "Rebalance team workload".to_string(),
            problem: |ctx, _| format!(
                "{} carry well above the team average ({:.1} tasks, {:.1} points) while {} are well below it.",
                names(&ctx.workload.overloaded),
                ctx.workload.mean_tasks,
                ctx.workload.mean_points,
                names(&ctx.workload.underloaded)
            ),
            solution: |ctx, _| format!(
                "Reassign open work from {} to {}.",
                names(&ctx.workload.overloaded),
                names(&ctx.workload.underloaded)
            ),
            affected: |ctx, _| tasks(&movable_issues(ctx))
        },
        // 4. One recommendation per oversized open issue, biggest first
        rule! {
            id: "split_large_task",
            priority: Priority::Medium,
            success_probability: 70,
            subjects: large_open_issues,
            title: |_, subject| match subject_issue(subject) {
                Some(issue) => format!("Split {} ({} points)", issue.key, issue.story_points),
                None => "Split large task".to_string(),
            },
            problem: |ctx, subject| match subject_issue(subject) {
                Some(issue) => format!(
                    "'{}' is estimated at {} points, above the {}-point limit for a single task.",
                    issue.summary, issue.story_points, ctx.thresholds.large_task_points
                ),
                None => String::new(),
            },
            solution: |_, _| "Break it into smaller, independently shippable tasks.".to_string(),
            affected: |_, subject| subject_issue(subject).map(AffectedTask::from).into_iter().collect()
        },
        // 5. Far behind past the midpoint
        rule! {
            id: "add_resources",
            priority: Priority::High,
            success_probability: 60,
            subjects: |ctx| sprint_if(
                ctx.metrics.completion_percentage < ctx.thresholds.resources_completion_below
                    && ctx.metrics.ideal_progress > ctx.thresholds.resources_ideal_above
            ),
            title: |_, _| "Add capacity to the sprint".to_string(),
            problem: |ctx, _| format!(
                "Only {}% complete with {} day(s) remaining.",
                ctx.metrics.completion_percentage, ctx.metrics.days_remaining
            ),
            solution: |_, _| "Pull in an additional developer or pair on the largest open items.".to_string(),
            affected: |ctx, _| tasks(&unassigned_open_issues(ctx))
        },
    ]
}
