use thiserror::Error;

#[derive(Debug, Error)]
pub enum PitstopError {
    #[error("not initialized: run 'pitstop init'")]
    NotInitialized,

    #[error("sprint not found: {0}")]
    SprintNotFound(String),

    #[error("issue not found: {0}")]
    IssueNotFound(String),

    #[error("team member not found: {0}")]
    MemberNotFound(String),

    #[error("recommendation not found: {0}")]
    RecommendationNotFound(String),

    #[error("no active sprint")]
    NoActiveSprint,

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid priority: {0}")]
    InvalidPriority(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("issue tracker not configured: add a 'tracker' section to .pitstop/config.yaml")]
    TrackerNotConfigured,

    #[error("issue tracker unavailable: {0}")]
    TrackerUnavailable(String),

    #[error("no data source could provide sprint data: {0}")]
    NoDataSource(String),

    #[error(transparent)]
    Store(#[from] rusqlite::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PitstopError>;
