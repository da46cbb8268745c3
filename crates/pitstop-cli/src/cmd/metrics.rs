use crate::output::{print_fields, print_json, print_table};
use pitstop_core::report;
use std::path::Path;

pub fn run(root: &Path, sprint: Option<&str>, refresh: bool, json: bool) -> anyhow::Result<()> {
    let (config, store) = super::open_project(root)?;
    let r = report::sprint_metrics(&config, &store, sprint, refresh, chrono::Utc::now())?;
    store.close()?;

    if json {
        return print_json(&r);
    }

    let m = &r.metrics;
    print_fields(&[
        ("Sprint", format!("{} ({}, from {})", r.sprint_name, r.sprint_id, r.source)),
        ("Health", format!("{}/100", m.health_score)),
        (
            "Completion",
            format!("{}% (ideal {}%)", m.completion_percentage, m.ideal_progress),
        ),
        ("Velocity", format!("{} of {} points", m.velocity, m.total_points)),
        (
            "Issues",
            format!(
                "{} done, {} in progress, {} to do, {} blocked",
                m.issues_completed, m.issues_in_progress, m.issues_todo, m.blockers_count
            ),
        ),
        (
            "Days",
            format!("{} elapsed, {} remaining", m.days_elapsed, m.days_remaining),
        ),
    ]);

    if !m.team_metrics.is_empty() {
        println!();
        let rows = m
            .team_metrics
            .iter()
            .map(|t| {
                vec![
                    t.name.clone(),
                    format!("{}%", t.load),
                    t.task_count.to_string(),
                    format!("{}%", t.completion_rate),
                ]
            })
            .collect();
        print_table(&["MEMBER", "LOAD", "TASKS", "DONE"], rows);
    }

    for a in &r.new_achievements {
        println!("\nAchievement unlocked: {} ({})", a.title, a.description);
    }
    Ok(())
}
