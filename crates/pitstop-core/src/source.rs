//! Where sprint data comes from: the tracker, the local store, or the demo
//! fixture, tried in that order.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{PitstopError, Result};
use crate::fixture;
use crate::model::{Activity, SprintData};
use crate::store::Store;
use crate::tracker::JiraClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Tracker,
    Cache,
    Fixture,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Tracker => "tracker",
            SourceKind::Cache => "cache",
            SourceKind::Fixture => "fixture",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait DataSource {
    fn kind(&self) -> SourceKind;

    /// Load a sprint by id, or the active sprint when `sprint_id` is `None`.
    fn load(&self, sprint_id: Option<&str>) -> Result<SprintData>;
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

pub struct TrackerSource {
    client: JiraClient,
}

impl TrackerSource {
    pub fn new(client: JiraClient) -> Self {
        Self { client }
    }
}

impl DataSource for TrackerSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Tracker
    }

    fn load(&self, sprint_id: Option<&str>) -> Result<SprintData> {
        self.client.fetch_sprint_data(sprint_id)
    }
}

pub struct CacheSource<'a> {
    store: &'a Store,
}

impl<'a> CacheSource<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

impl DataSource for CacheSource<'_> {
    fn kind(&self) -> SourceKind {
        SourceKind::Cache
    }

    fn load(&self, sprint_id: Option<&str>) -> Result<SprintData> {
        self.store.load_sprint_data(sprint_id)
    }
}

pub struct FixtureSource;

impl DataSource for FixtureSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Fixture
    }

    fn load(&self, sprint_id: Option<&str>) -> Result<SprintData> {
        match sprint_id {
            Some(id) if id != fixture::DEMO_SPRINT_ID => {
                Err(PitstopError::SprintNotFound(id.to_string()))
            }
            _ => Ok(fixture::demo_data(Utc::now())),
        }
    }
}

// ---------------------------------------------------------------------------
// SourceChain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Loaded {
    pub data: SprintData,
    pub source: SourceKind,
}

pub struct SourceChain<'a> {
    sources: Vec<Box<dyn DataSource + 'a>>,
}

impl<'a> SourceChain<'a> {
    pub fn new(sources: Vec<Box<dyn DataSource + 'a>>) -> Self {
        Self { sources }
    }

    /// Tracker (when configured and `use_tracker`), then store, then fixture.
    pub fn standard(config: &Config, store: &'a Store, use_tracker: bool) -> Self {
        let mut sources: Vec<Box<dyn DataSource + 'a>> = Vec::with_capacity(3);
        if use_tracker {
            if let Some(tracker) = &config.tracker {
                match JiraClient::new(tracker, config.team.default_capacity) {
                    Ok(client) => sources.push(Box::new(TrackerSource::new(client))),
                    Err(e) => tracing::warn!(error = %e, "tracker source skipped"),
                }
            }
        }
        sources.push(Box::new(CacheSource::new(store)));
        sources.push(Box::new(FixtureSource));
        Self { sources }
    }

    pub fn kinds(&self) -> Vec<SourceKind> {
        self.sources.iter().map(|s| s.kind()).collect()
    }

    /// First source to succeed wins. When all fail, the last error is returned.
    pub fn load(&self, sprint_id: Option<&str>) -> Result<Loaded> {
        let mut last_err = None;
        for source in &self.sources {
            match source.load(sprint_id) {
                Ok(data) => {
                    return Ok(Loaded {
                        data,
                        source: source.kind(),
                    })
                }
                Err(e) => {
                    tracing::warn!(source = %source.kind(), error = %e, "data source failed, falling back");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| PitstopError::NoDataSource("no sources configured".into())))
    }

    /// Load and, when the data came from the tracker, write it through to the
    /// store and record the sync.
    pub fn load_and_cache(&self, store: &Store, sprint_id: Option<&str>) -> Result<Loaded> {
        let loaded = self.load(sprint_id)?;
        if loaded.source == SourceKind::Tracker {
            store.replace_sprint_data(&loaded.data)?;
            store.record_activity(&Activity::new(
                Some(&loaded.data.sprint.id),
                "sync",
                format!(
                    "Synced {} issue(s) for {} from the tracker",
                    loaded.data.issues.len(),
                    loaded.data.sprint.name
                ),
            ))?;
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Failing {
        kind: SourceKind,
        calls: Rc<Cell<u32>>,
    }

    impl DataSource for Failing {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        fn load(&self, _: Option<&str>) -> Result<SprintData> {
            self.calls.set(self.calls.get() + 1);
            Err(PitstopError::TrackerUnavailable("connection refused".into()))
        }
    }

    struct Fixed(SourceKind);

    impl DataSource for Fixed {
        fn kind(&self) -> SourceKind {
            self.0
        }

        fn load(&self, _: Option<&str>) -> Result<SprintData> {
            Ok(fixture::demo_data(Utc::now()))
        }
    }

    #[test]
    fn first_success_wins_in_order() {
        let calls = Rc::new(Cell::new(0));
        let sources: Vec<Box<dyn DataSource>> = vec![
            Box::new(Failing {
                kind: SourceKind::Tracker,
                calls: Rc::clone(&calls),
            }),
            Box::new(Fixed(SourceKind::Cache)),
            Box::new(Fixed(SourceKind::Fixture)),
        ];
        let chain = SourceChain::new(sources);
        let loaded = chain.load(None).unwrap();
        assert_eq!(loaded.source, SourceKind::Cache);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn all_failing_returns_last_error() {
        let failing: Box<dyn DataSource> = Box::new(Failing {
            kind: SourceKind::Tracker,
            calls: Rc::new(Cell::new(0)),
        });
        let chain = SourceChain::new(vec![failing]);
        assert!(matches!(chain.load(None), Err(PitstopError::TrackerUnavailable(_))));
        assert!(matches!(
            SourceChain::new(Vec::new()).load(None),
            Err(PitstopError::NoDataSource(_))
        ));
    }

    #[test]
    fn empty_store_falls_back_to_fixture() {
        let store = Store::open_in_memory().unwrap();
        let chain = SourceChain::standard(&Config::new("demo"), &store, true);
        assert_eq!(chain.kinds(), vec![SourceKind::Cache, SourceKind::Fixture]);
        let loaded = chain.load(None).unwrap();
        assert_eq!(loaded.source, SourceKind::Fixture);
        assert_eq!(loaded.data.sprint.id, fixture::DEMO_SPRINT_ID);
    }

    #[test]
    fn seeded_store_serves_from_cache() {
        let store = Store::open_in_memory().unwrap();
        fixture::seed(&store, Utc::now()).unwrap();
        let chain = SourceChain::standard(&Config::new("demo"), &store, false);
        assert_eq!(chain.load(None).unwrap().source, SourceKind::Cache);
    }

    #[test]
    fn unknown_sprint_is_not_found_after_every_fallback() {
        let store = Store::open_in_memory().unwrap();
        let chain = SourceChain::standard(&Config::new("demo"), &store, false);
        assert!(matches!(
            chain.load(Some("nope")),
            Err(PitstopError::SprintNotFound(_))
        ));
    }

    #[test]
    fn unreachable_tracker_falls_back_without_caching() {
        std::env::set_var("PITSTOP_TEST_SOURCE_TOKEN", "t");
        let mut config = Config::new("demo");
        config.tracker = Some(TrackerConfig {
            base_url: "http://127.0.0.1:9".into(),
            email: "x@example.com".into(),
            api_token_env: "PITSTOP_TEST_SOURCE_TOKEN".into(),
            board_id: 1,
            story_points_field: "customfield_10016".into(),
            timeout_secs: 1,
        });
        let store = Store::open_in_memory().unwrap();
        let chain = SourceChain::standard(&config, &store, true);
        assert_eq!(chain.kinds()[0], SourceKind::Tracker);

        let loaded = chain.load_and_cache(&store, None).unwrap();
        assert_eq!(loaded.source, SourceKind::Fixture);
        assert!(store.is_empty().unwrap());
        assert!(store.recent_activities(10).unwrap().is_empty());
    }
}
