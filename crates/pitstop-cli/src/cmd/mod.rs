pub mod config;
pub mod init;
pub mod metrics;
pub mod recommend;
pub mod serve;
pub mod snapshots;
pub mod sync;

use anyhow::Context;
use pitstop_core::config::Config;
use pitstop_core::store::Store;
use std::path::Path;

/// Load config and open the store for an initialized project.
pub fn open_project(root: &Path) -> anyhow::Result<(Config, Store)> {
    let config = Config::load(root).context("failed to load config")?;
    config.ensure_valid()?;
    let path = config.store_path(root);
    let store = Store::open(&path).with_context(|| format!("failed to open store at {}", path.display()))?;
    Ok((config, store))
}
