use crate::output::{print_json, print_table};
use pitstop_core::PitstopError;
use std::path::Path;

pub fn run(root: &Path, sprint: Option<&str>, json: bool) -> anyhow::Result<()> {
    let (_, store) = super::open_project(root)?;
    let sprint_id = match sprint {
        Some(id) => id.to_string(),
        None => store.active_sprint()?.ok_or(PitstopError::NoActiveSprint)?.id,
    };
    let snapshots = store.snapshots_for_sprint(&sprint_id)?;
    store.close()?;

    if json {
        return print_json(&snapshots);
    }
    if snapshots.is_empty() {
        println!("No snapshots for sprint {sprint_id}. Run `pitstop metrics` to record one.");
        return Ok(());
    }

    let rows = snapshots
        .iter()
        .map(|s| {
            vec![
                s.recorded_at.format("%Y-%m-%d %H:%M").to_string(),
                s.health_score.to_string(),
                format!("{}%", s.completion_percentage),
                s.velocity.to_string(),
                s.blockers_count.to_string(),
                format!("{}%", s.average_load),
            ]
        })
        .collect();
    print_table(
        &["RECORDED", "HEALTH", "DONE", "VELOCITY", "BLOCKED", "AVG LOAD"],
        rows,
    );
    Ok(())
}
