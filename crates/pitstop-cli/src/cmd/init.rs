use anyhow::Context;
use pitstop_core::{config::Config, fixture, io, paths, store::Store};
use std::path::Path;

pub fn run(root: &Path, name: Option<&str>, no_demo: bool) -> anyhow::Result<()> {
    let project_name = name
        .map(str::to_string)
        .or_else(|| root.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "project".to_string());

    println!("Initializing pitstop in: {}", root.display());

    let dir = paths::pitstop_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let config_path = paths::config_path(root);
    let config = if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        Config::load(root).context("failed to load existing config")?
    } else {
        let cfg = Config::new(&project_name);
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
        cfg
    };

    let store_path = config.store_path(root);
    let existed = store_path.exists();
    let store = Store::open(&store_path)
        .with_context(|| format!("failed to open store at {}", store_path.display()))?;
    println!(
        "  {} {}",
        if existed { "exists: " } else { "created:" },
        config.store.path.display()
    );

    if !no_demo && fixture::seed(&store, chrono::Utc::now())? {
        println!("  seeded:  demo sprint '{}'", fixture::DEMO_SPRINT_ID);
    }
    store.close()?;

    println!("\nNext: `pitstop metrics` or `pitstop serve`.");
    Ok(())
}
