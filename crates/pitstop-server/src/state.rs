use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use pitstop_core::config::Config;
use pitstop_core::store::Store;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub store: Arc<Store>,
    pub config: Arc<RwLock<Config>>,
}

impl AppState {
    pub fn new(root: PathBuf, config: Config, store: Store) -> Self {
        Self {
            root,
            store: Arc::new(store),
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Load config from `root` and open the store it points at.
    pub fn open(root: PathBuf) -> pitstop_core::Result<Self> {
        let config = Config::load(&root)?;
        config.ensure_valid()?;
        let store = Store::open(&config.store_path(&root))?;
        Ok(Self::new(root, config, store))
    }

    /// Snapshot of the current config. Handlers work on a copy so the lock is
    /// never held across a blocking call.
    pub fn config(&self) -> Config {
        self.config
            .read()
            .map(|c| c.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}
