use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PitstopError;

// ---------------------------------------------------------------------------
// SprintStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SprintStatus {
    Planned,
    Active,
    Completed,
    Cancelled,
}

impl SprintStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SprintStatus::Planned => "planned",
            SprintStatus::Active => "active",
            SprintStatus::Completed => "completed",
            SprintStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SprintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SprintStatus {
    type Err = PitstopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" | "future" => Ok(SprintStatus::Planned),
            "active" => Ok(SprintStatus::Active),
            "completed" | "closed" => Ok(SprintStatus::Completed),
            "cancelled" => Ok(SprintStatus::Cancelled),
            _ => Err(PitstopError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// IssueStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Todo,
    InProgress,
    Review,
    Done,
    Blocked,
}

impl IssueStatus {
    pub fn all() -> &'static [IssueStatus] {
        &[
            IssueStatus::Todo,
            IssueStatus::InProgress,
            IssueStatus::Review,
            IssueStatus::Done,
            IssueStatus::Blocked,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::Todo => "todo",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::Review => "review",
            IssueStatus::Done => "done",
            IssueStatus::Blocked => "blocked",
        }
    }

    pub fn is_done(self) -> bool {
        self == IssueStatus::Done
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IssueStatus {
    type Err = PitstopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(IssueStatus::Todo),
            "in_progress" => Ok(IssueStatus::InProgress),
            "review" => Ok(IssueStatus::Review),
            "done" => Ok(IssueStatus::Done),
            "blocked" => Ok(IssueStatus::Blocked),
            _ => Err(PitstopError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Shared by issues and generated recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = PitstopError;

    /// Accepts Jira's names ("Highest", "Lowest", ...) as well as our own.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" | "highest" | "blocker" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" | "lowest" | "trivial" | "minor" => Ok(Priority::Low),
            _ => Err(PitstopError::InvalidPriority(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// RecommendationStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Pending,
    Applied,
    Dismissed,
}

impl RecommendationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Applied => "applied",
            RecommendationStatus::Dismissed => "dismissed",
        }
    }
}

impl fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecommendationStatus {
    type Err = PitstopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecommendationStatus::Pending),
            "applied" => Ok(RecommendationStatus::Applied),
            "dismissed" => Ok(RecommendationStatus::Dismissed),
            _ => Err(PitstopError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
