use crate::error::{PitstopError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// HealthWeights
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthWeights {
    #[serde(default = "default_w_progress")]
    pub progress_on_track: f64,
    #[serde(default = "default_w_blockers")]
    pub no_blockers: f64,
    #[serde(default = "default_w_balance")]
    pub team_balance: f64,
    #[serde(default = "default_w_velocity")]
    pub velocity_health: f64,
    #[serde(default = "default_w_scope")]
    pub scope_progress: f64,
    #[serde(default = "default_w_burndown")]
    pub burndown_health: f64,
}

fn default_w_progress() -> f64 {
    0.25
}

fn default_w_blockers() -> f64 {
    0.20
}

fn default_w_balance() -> f64 {
    0.15
}

fn default_w_velocity() -> f64 {
    0.15
}

fn default_w_scope() -> f64 {
    0.15
}

fn default_w_burndown() -> f64 {
    0.10
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            progress_on_track: default_w_progress(),
            no_blockers: default_w_blockers(),
            team_balance: default_w_balance(),
            velocity_health: default_w_velocity(),
            scope_progress: default_w_scope(),
            burndown_health: default_w_burndown(),
        }
    }
}

impl HealthWeights {
    pub fn sum(&self) -> f64 {
        self.progress_on_track
            + self.no_blockers
            + self.team_balance
            + self.velocity_health
            + self.scope_progress
            + self.burndown_health
    }
}

// ---------------------------------------------------------------------------
// ScoringConfig
// ---------------------------------------------------------------------------

/// Constants of the health-score formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: HealthWeights,
    /// Score given to a sprint exactly on its ideal burndown.
    #[serde(default = "default_progress_baseline")]
    pub progress_baseline: f64,
    #[serde(default = "default_blocker_penalty")]
    pub blocker_penalty: f64,
    #[serde(default = "default_overload_penalty")]
    pub overload_penalty: f64,
    #[serde(default = "default_underutilized_penalty")]
    pub underutilized_penalty: f64,
    /// A member is overloaded when load is strictly above this.
    #[serde(default = "default_overload_threshold")]
    pub overload_threshold: u32,
    /// A member is underutilized when load is strictly below this.
    #[serde(default = "default_underutilized_threshold")]
    pub underutilized_threshold: u32,
    #[serde(default = "default_velocity_multiplier")]
    pub velocity_multiplier: f64,
}

fn default_progress_baseline() -> f64 {
    70.0
}

fn default_blocker_penalty() -> f64 {
    25.0
}

fn default_overload_penalty() -> f64 {
    20.0
}

fn default_underutilized_penalty() -> f64 {
    10.0
}

fn default_overload_threshold() -> u32 {
    100
}

fn default_underutilized_threshold() -> u32 {
    30
}

fn default_velocity_multiplier() -> f64 {
    150.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: HealthWeights::default(),
            progress_baseline: default_progress_baseline(),
            blocker_penalty: default_blocker_penalty(),
            overload_penalty: default_overload_penalty(),
            underutilized_penalty: default_underutilized_penalty(),
            overload_threshold: default_overload_threshold(),
            underutilized_threshold: default_underutilized_threshold(),
            velocity_multiplier: default_velocity_multiplier(),
        }
    }
}

// ---------------------------------------------------------------------------
// RuleThresholds
// ---------------------------------------------------------------------------

/// Trigger points for the recommendation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleThresholds {
    /// Scope risk fires when completion trails ideal progress by more than this.
    #[serde(default = "default_scope_risk_margin")]
    pub scope_risk_margin: u32,
    /// Blocked-tasks fires when the blocked count exceeds this.
    #[serde(default = "default_max_blocked")]
    pub max_blocked: u32,
    #[serde(default = "default_overloaded_ratio")]
    pub overloaded_ratio: f64,
    #[serde(default = "default_underloaded_ratio")]
    pub underloaded_ratio: f64,
    /// Issues with more points than this are candidates for splitting.
    #[serde(default = "default_large_task_points")]
    pub large_task_points: u32,
    #[serde(default = "default_large_task_limit")]
    pub large_task_limit: usize,
    #[serde(default = "default_resources_completion_below")]
    pub resources_completion_below: u32,
    #[serde(default = "default_resources_ideal_above")]
    pub resources_ideal_above: u32,
}

fn default_scope_risk_margin() -> u32 {
    15
}

fn default_max_blocked() -> u32 {
    2
}

fn default_overloaded_ratio() -> f64 {
    1.5
}

fn default_underloaded_ratio() -> f64 {
    0.5
}

fn default_large_task_points() -> u32 {
    8
}

fn default_large_task_limit() -> usize {
    2
}

fn default_resources_completion_below() -> u32 {
    40
}

fn default_resources_ideal_above() -> u32 {
    50
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            scope_risk_margin: default_scope_risk_margin(),
            max_blocked: default_max_blocked(),
            overloaded_ratio: default_overloaded_ratio(),
            underloaded_ratio: default_underloaded_ratio(),
            large_task_points: default_large_task_points(),
            large_task_limit: default_large_task_limit(),
            resources_completion_below: default_resources_completion_below(),
            resources_ideal_above: default_resources_ideal_above(),
        }
    }
}

// ---------------------------------------------------------------------------
// TrackerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// e.g. "https://acme.atlassian.net"
    pub base_url: String,
    pub email: String,
    /// Name of the environment variable holding the API token. The token
    /// itself never lives in the config file.
    #[serde(default = "default_token_env")]
    pub api_token_env: String,
    pub board_id: u64,
    #[serde(default = "default_story_points_field")]
    pub story_points_field: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_token_env() -> String {
    "JIRA_API_TOKEN".to_string()
}

fn default_story_points_field() -> String {
    "customfield_10016".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl TrackerConfig {
    pub fn api_token(&self) -> Option<String> {
        std::env::var(&self.api_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Small sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3141
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Relative paths resolve against the project root.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(paths::DEFAULT_DB_FILE)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamConfig {
    #[serde(default = "crate::model::default_capacity")]
    pub default_capacity: u32,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            default_capacity: crate::model::default_capacity(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub team: TeamConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub rules: RuleThresholds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker: Option<TrackerConfig>,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
            },
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            team: TeamConfig::default(),
            scoring: ScoringConfig::default(),
            rules: RuleThresholds::default(),
            tracker: None,
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(PitstopError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Absolute location of the SQLite store for this project.
    pub fn store_path(&self, root: &Path) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            root.join(&self.store.path)
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let sum = self.scoring.weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "scoring.weights sum to {sum:.3}, not 1.0; health scores will be skewed"
                ),
            });
        }

        if self.team.default_capacity == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "team.default_capacity is 0; synced members would never carry load"
                    .to_string(),
            });
        }

        let r = &self.rules;
        if r.underloaded_ratio >= r.overloaded_ratio {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "rules.underloaded_ratio ({}) must be below rules.overloaded_ratio ({})",
                    r.underloaded_ratio, r.overloaded_ratio
                ),
            });
        }

        if self.scoring.underutilized_threshold >= self.scoring.overload_threshold {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "scoring.underutilized_threshold must be below scoring.overload_threshold"
                    .to_string(),
            });
        }

        if let Some(tracker) = &self.tracker {
            if tracker.base_url.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "tracker.base_url is empty".to_string(),
                });
            }
            if tracker.api_token().is_none() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "environment variable '{}' is not set; sync will fall back to cached data",
                        tracker.api_token_env
                    ),
                });
            }
            if tracker.timeout_secs == 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: "tracker.timeout_secs is 0; requests will fail immediately".to_string(),
                });
            }
        }

        warnings
    }

    /// Error-level warnings become a hard failure.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PitstopError::InvalidConfig(errors.join("; ")))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::new("test-project");
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.version, 1);
    }

    #[test]
    fn minimal_yaml_gets_documented_defaults() {
        let cfg: Config = serde_yaml::from_str("project:\n  name: demo\n").unwrap();
        assert_eq!(cfg.server.port, 3141);
        assert_eq!(cfg.team.default_capacity, 20);
        assert_eq!(cfg.scoring.progress_baseline, 70.0);
        assert_eq!(cfg.scoring.weights.progress_on_track, 0.25);
        assert_eq!(cfg.rules.max_blocked, 2);
        assert_eq!(cfg.rules.large_task_points, 8);
        assert!(cfg.tracker.is_none());
    }

    #[test]
    fn partial_weights_fill_in_defaults() {
        let yaml = "project:\n  name: demo\nscoring:\n  weights:\n    no_blockers: 0.3\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.scoring.weights.no_blockers, 0.3);
        assert_eq!(cfg.scoring.weights.burndown_health, 0.10);
    }

    #[test]
    fn default_weights_sum_to_one() {
        let w = HealthWeights::default();
        assert!((w.sum() - 1.0).abs() < 1e-9);
        assert!(Config::new("x").validate().is_empty());
    }

    #[test]
    fn validate_flags_skewed_weights() {
        let mut cfg = Config::new("x");
        cfg.scoring.weights.no_blockers = 0.5;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
        assert!(warnings[0].message.contains("sum"));
        assert!(cfg.ensure_valid().is_ok());
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let mut cfg = Config::new("x");
        cfg.team.default_capacity = 0;
        assert!(matches!(
            cfg.ensure_valid(),
            Err(PitstopError::InvalidConfig(msg)) if msg.contains("default_capacity")
        ));
    }

    #[test]
    fn validate_warns_about_missing_token_env() {
        let mut cfg = Config::new("x");
        cfg.tracker = Some(TrackerConfig {
            base_url: "https://example.atlassian.net".into(),
            email: "bot@example.com".into(),
            api_token_env: "PITSTOP_TEST_TOKEN_THAT_IS_NEVER_SET".into(),
            board_id: 7,
            story_points_field: default_story_points_field(),
            timeout_secs: 10,
        });
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("PITSTOP_TEST_TOKEN_THAT_IS_NEVER_SET")));
    }

    #[test]
    fn load_uninitialized_returns_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(PitstopError::NotInitialized)
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("saved");
        cfg.rules.large_task_points = 13;
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.rules.large_task_points, 13);
        assert_eq!(loaded.project.name, "saved");
    }

    #[test]
    fn store_path_resolves_against_root() {
        let cfg = Config::new("x");
        let root = Path::new("/srv/team");
        assert_eq!(
            cfg.store_path(root),
            PathBuf::from("/srv/team/.pitstop/pitstop.db")
        );
    }
}
