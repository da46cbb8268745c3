use crate::output::{print_json, print_table};
use pitstop_core::report::{self, ApplyRequest};
use std::path::Path;

pub fn run(root: &Path, sprint: Option<&str>, refresh: bool, json: bool) -> anyhow::Result<()> {
    let (config, store) = super::open_project(root)?;
    let r = report::recommendations(&config, &store, sprint, refresh, chrono::Utc::now())?;
    store.close()?;

    if json {
        return print_json(&r);
    }
    if r.recommendations.is_empty() {
        println!("No pit-stop needed for sprint {}.", r.sprint_id);
        return Ok(());
    }

    let rows = r
        .recommendations
        .iter()
        .map(|rec| {
            vec![
                rec.id.clone(),
                rec.priority.to_string(),
                format!("{}%", rec.success_probability),
                rec.status.to_string(),
                rec.title.clone(),
            ]
        })
        .collect();
    print_table(&["ID", "PRIORITY", "SUCCESS", "STATUS", "TITLE"], rows);

    for rec in &r.recommendations {
        println!("\n{}\n  problem:  {}\n  solution: {}", rec.title, rec.problem, rec.solution);
        if !rec.affected_tasks.is_empty() {
            let keys: Vec<&str> = rec.affected_tasks.iter().map(|t| t.key.as_str()).collect();
            println!("  affects:  {}", keys.join(", "));
        }
    }
    Ok(())
}

pub fn apply(root: &Path, id: &str, dismiss: bool, json: bool) -> anyhow::Result<()> {
    let (_, store) = super::open_project(root)?;
    let req = ApplyRequest {
        recommendation_id: id.to_string(),
        action: Some(if dismiss { "dismiss" } else { "apply" }.to_string()),
        parameters: None,
    };
    let result = report::apply_recommendation(&store, req, chrono::Utc::now())?;
    store.close()?;

    if json {
        print_json(&result)?;
    } else {
        println!("{}", result.message);
    }
    Ok(())
}
