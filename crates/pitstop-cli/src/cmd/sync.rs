use crate::output::{print_fields, print_json};
use pitstop_core::source::{DataSource, SourceChain, TrackerSource};
use pitstop_core::tracker::JiraClient;
use pitstop_core::PitstopError;
use std::path::Path;

pub fn run(root: &Path, sprint: Option<&str>, json: bool) -> anyhow::Result<()> {
    let (config, store) = super::open_project(root)?;
    let tracker = config.tracker.as_ref().ok_or(PitstopError::TrackerNotConfigured)?;
    let client = JiraClient::new(tracker, config.team.default_capacity)?;

    let sources: Vec<Box<dyn DataSource>> = vec![Box::new(TrackerSource::new(client))];
    let loaded = SourceChain::new(sources).load_and_cache(&store, sprint)?;
    let data = &loaded.data;

    if json {
        print_json(&serde_json::json!({
            "source": loaded.source,
            "sprintId": data.sprint.id,
            "sprintName": data.sprint.name,
            "issues": data.issues.len(),
            "members": data.team.len(),
        }))?;
    } else {
        print_fields(&[
            ("Sprint", format!("{} ({})", data.sprint.name, data.sprint.id)),
            ("Issues", data.issues.len().to_string()),
            ("Members", data.team.len().to_string()),
        ]);
    }
    store.close()?;
    Ok(())
}
