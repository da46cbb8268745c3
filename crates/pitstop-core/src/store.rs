//! SQLite persistence for sprints, issues, team, snapshots, recommendations,
//! activities and achievements.
//!
//! # Lifecycle
//!
//! A `Store` is constructed once at startup with [`Store::open`] and handed to
//! whoever needs it; there is no process-wide handle. The schema is migrated
//! on open using the `user_version` pragma. [`Store::close`] flushes and
//! releases the connection on shutdown.
//!
//! Timestamps are stored as UTC milliseconds; enums as their snake_case names.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;

use crate::advisor::Recommendation;
use crate::error::{PitstopError, Result};
use crate::metrics::SprintMetrics;
use crate::model::{
    Achievement, Activity, Issue, MetricsSnapshot, Sprint, SprintData, StoredRecommendation,
    TeamMember,
};
use crate::types::{IssueStatus, RecommendationStatus, SprintStatus};

const SCHEMA_VERSION: i64 = 2;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > SCHEMA_VERSION {
        tracing::warn!(version, "store schema is newer than this binary");
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sprints (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            start_date INTEGER NOT NULL,
            end_date INTEGER NOT NULL,
            goal TEXT,
            status TEXT NOT NULL CHECK(status IN ('planned', 'active', 'completed', 'cancelled'))
        );

        CREATE TABLE IF NOT EXISTS team_members (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'developer',
            capacity INTEGER NOT NULL DEFAULT 20 CHECK(capacity >= 0),
            active INTEGER NOT NULL DEFAULT 1,
            email TEXT
        );

        CREATE TABLE IF NOT EXISTS issues (
            id TEXT PRIMARY KEY,
            key TEXT NOT NULL,
            summary TEXT NOT NULL,
            sprint_id TEXT REFERENCES sprints(id) ON DELETE SET NULL,
            status TEXT NOT NULL CHECK(status IN ('todo', 'in_progress', 'review', 'done', 'blocked')),
            story_points INTEGER NOT NULL DEFAULT 0 CHECK(story_points >= 0),
            priority TEXT NOT NULL DEFAULT 'medium' CHECK(priority IN ('critical', 'high', 'medium', 'low')),
            assignee_id TEXT,
            blocked_reason TEXT,
            blocked_at INTEGER,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS metrics_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sprint_id TEXT NOT NULL,
            health_score INTEGER NOT NULL,
            velocity INTEGER NOT NULL,
            completion_percentage INTEGER NOT NULL,
            blockers_count INTEGER NOT NULL,
            average_load INTEGER NOT NULL,
            recorded_at INTEGER NOT NULL
        );

        CREATE TRIGGER IF NOT EXISTS metrics_snapshots_append_only
        BEFORE UPDATE ON metrics_snapshots
        BEGIN
            SELECT RAISE(ABORT, 'metrics snapshots are append-only');
        END;

        CREATE TABLE IF NOT EXISTS recommendations (
            id TEXT PRIMARY KEY,
            sprint_id TEXT NOT NULL,
            rule TEXT NOT NULL,
            title TEXT NOT NULL,
            problem TEXT NOT NULL,
            solution TEXT NOT NULL,
            priority TEXT NOT NULL,
            success_probability INTEGER NOT NULL DEFAULT 0,
            affected_issue_ids TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending', 'applied', 'dismissed')),
            created_at INTEGER NOT NULL,
            applied_at INTEGER
        );

        CREATE TABLE IF NOT EXISTS activities (
            id TEXT PRIMARY KEY,
            sprint_id TEXT,
            kind TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS achievements (
            sprint_id TEXT NOT NULL,
            code TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            awarded_at INTEGER NOT NULL,
            PRIMARY KEY (sprint_id, code)
        );
        ",
    )
}

fn apply_migration_2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_issues_sprint ON issues(sprint_id);
        CREATE INDEX IF NOT EXISTS idx_snapshots_sprint_time ON metrics_snapshots(sprint_id, recorded_at);
        CREATE INDEX IF NOT EXISTS idx_recommendations_sprint ON recommendations(sprint_id);
        CREATE INDEX IF NOT EXISTS idx_activities_created ON activities(created_at);
        ",
    )
}

// ---------------------------------------------------------------------------
// Column helpers
// ---------------------------------------------------------------------------

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn parse_col<T>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T: FromStr<Err = PitstopError>,
{
    raw.parse()
        .map_err(|e: PitstopError| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn sprint_from_row(row: &Row) -> rusqlite::Result<Sprint> {
    Ok(Sprint {
        id: row.get(0)?,
        name: row.get(1)?,
        start_date: from_millis(row.get(2)?),
        end_date: from_millis(row.get(3)?),
        goal: row.get(4)?,
        status: parse_col::<SprintStatus>(5, row.get(5)?)?,
    })
}

const SPRINT_COLUMNS: &str = "id, name, start_date, end_date, goal, status";

fn issue_from_row(row: &Row) -> rusqlite::Result<Issue> {
    Ok(Issue {
        id: row.get(0)?,
        key: row.get(1)?,
        summary: row.get(2)?,
        sprint_id: row.get(3)?,
        status: parse_col(4, row.get(4)?)?,
        story_points: row.get(5)?,
        priority: parse_col(6, row.get(6)?)?,
        assignee_id: row.get(7)?,
        blocked_reason: row.get(8)?,
        blocked_at: row.get::<_, Option<i64>>(9)?.map(from_millis),
        updated_at: from_millis(row.get(10)?),
    })
}

const ISSUE_COLUMNS: &str = "id, key, summary, sprint_id, status, story_points, priority, \
                             assignee_id, blocked_reason, blocked_at, updated_at";

fn member_from_row(row: &Row) -> rusqlite::Result<TeamMember> {
    Ok(TeamMember {
        id: row.get(0)?,
        name: row.get(1)?,
        role: row.get(2)?,
        capacity: row.get(3)?,
        active: row.get(4)?,
        email: row.get(5)?,
    })
}

fn snapshot_from_row(row: &Row) -> rusqlite::Result<MetricsSnapshot> {
    Ok(MetricsSnapshot {
        id: row.get(0)?,
        sprint_id: row.get(1)?,
        health_score: row.get(2)?,
        velocity: row.get(3)?,
        completion_percentage: row.get(4)?,
        blockers_count: row.get(5)?,
        average_load: row.get(6)?,
        recorded_at: from_millis(row.get(7)?),
    })
}

fn recommendation_from_row(row: &Row) -> rusqlite::Result<StoredRecommendation> {
    let affected: String = row.get(8)?;
    let affected_issue_ids: Vec<String> = serde_json::from_str(&affected)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;
    Ok(StoredRecommendation {
        id: row.get(0)?,
        sprint_id: row.get(1)?,
        rule: row.get(2)?,
        title: row.get(3)?,
        problem: row.get(4)?,
        solution: row.get(5)?,
        priority: parse_col(6, row.get(6)?)?,
        success_probability: row.get(7)?,
        affected_issue_ids,
        status: parse_col::<RecommendationStatus>(9, row.get(9)?)?,
        created_at: from_millis(row.get(10)?),
        applied_at: row.get::<_, Option<i64>>(11)?.map(from_millis),
    })
}

const RECOMMENDATION_COLUMNS: &str = "id, sprint_id, rule, title, problem, solution, priority, \
                                      success_probability, affected_issue_ids, status, created_at, applied_at";

fn upsert_sprint_with_conn(conn: &Connection, sprint: &Sprint) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO sprints (id, name, start_date, end_date, goal, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            start_date = excluded.start_date,
            end_date = excluded.end_date,
            goal = excluded.goal,
            status = excluded.status",
        params![
            sprint.id,
            sprint.name,
            to_millis(sprint.start_date),
            to_millis(sprint.end_date),
            sprint.goal,
            sprint.status.as_str(),
        ],
    )?;
    Ok(())
}

fn upsert_issue_with_conn(conn: &Connection, issue: &Issue) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO issues (id, key, summary, sprint_id, status, story_points, priority,
                             assignee_id, blocked_reason, blocked_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
            key = excluded.key,
            summary = excluded.summary,
            sprint_id = excluded.sprint_id,
            status = excluded.status,
            story_points = excluded.story_points,
            priority = excluded.priority,
            assignee_id = excluded.assignee_id,
            blocked_reason = excluded.blocked_reason,
            blocked_at = excluded.blocked_at,
            updated_at = excluded.updated_at",
        params![
            issue.id,
            issue.key,
            issue.summary,
            issue.sprint_id,
            issue.status.as_str(),
            issue.story_points,
            issue.priority.as_str(),
            issue.assignee_id,
            issue.blocked_reason,
            issue.blocked_at.map(to_millis),
            to_millis(issue.updated_at),
        ],
    )?;
    Ok(())
}

fn upsert_member_with_conn(conn: &Connection, member: &TeamMember) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO team_members (id, name, role, capacity, active, email)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            role = excluded.role,
            capacity = excluded.capacity,
            active = excluded.active,
            email = excluded.email",
        params![
            member.id,
            member.name,
            member.role,
            member.capacity,
            member.active,
            member.email,
        ],
    )?;
    Ok(())
}

/// Insert a member seen in synced data. Known members only get their name and
/// email refreshed; role, capacity and active stay as set locally.
fn merge_member_with_conn(conn: &Connection, member: &TeamMember) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO team_members (id, name, role, capacity, active, email)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            email = COALESCE(excluded.email, team_members.email)",
        params![
            member.id,
            member.name,
            member.role,
            member.capacity,
            member.active,
            member.email,
        ],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// IssueUpdate
// ---------------------------------------------------------------------------

/// Partial update for one issue. An empty `assignee_id` unassigns.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueUpdate {
    #[serde(default)]
    pub status: Option<IssueStatus>,
    #[serde(default)]
    pub story_points: Option<u32>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub blocked_reason: Option<String>,
}

impl IssueUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.story_points.is_none()
            && self.assignee_id.is_none()
            && self.blocked_reason.is_none()
    }

    pub fn apply(self, issue: &mut Issue) {
        if let Some(points) = self.story_points {
            issue.story_points = points;
        }
        if let Some(assignee) = self.assignee_id {
            issue.assignee_id = Some(assignee).filter(|a| !a.is_empty());
        }
        match self.status {
            Some(status) => issue.set_status(status, self.blocked_reason),
            None => {
                if issue.status == IssueStatus::Blocked && self.blocked_reason.is_some() {
                    issue.blocked_reason = self.blocked_reason;
                }
                issue.updated_at = Utc::now();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database at `path` and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        initialize_schema(&conn)?;
        tracing::debug!(path = %path.display(), "store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        conn.close().map_err(|(_, e)| PitstopError::Store(e))
    }

    /// Every statement is atomic on its own, so a panic in another holder
    /// leaves nothing half-written; recover the guard instead of failing.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -----------------------------------------------------------------------
    // Sprints
    // -----------------------------------------------------------------------

    pub fn upsert_sprint(&self, sprint: &Sprint) -> Result<()> {
        upsert_sprint_with_conn(&self.lock(), sprint)?;
        Ok(())
    }

    pub fn get_sprint(&self, id: &str) -> Result<Sprint> {
        self.lock()
            .query_row(
                &format!("SELECT {SPRINT_COLUMNS} FROM sprints WHERE id = ?1"),
                params![id],
                sprint_from_row,
            )
            .optional()?
            .ok_or_else(|| PitstopError::SprintNotFound(id.to_string()))
    }

    /// Newest first.
    pub fn list_sprints(&self) -> Result<Vec<Sprint>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SPRINT_COLUMNS} FROM sprints ORDER BY start_date DESC, id"
        ))?;
        let rows = stmt.query_map([], sprint_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The most recently started active sprint, if any.
    pub fn active_sprint(&self) -> Result<Option<Sprint>> {
        Ok(self
            .lock()
            .query_row(
                &format!(
                    "SELECT {SPRINT_COLUMNS} FROM sprints WHERE status = 'active'
                     ORDER BY start_date DESC LIMIT 1"
                ),
                [],
                sprint_from_row,
            )
            .optional()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        let count: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM sprints", [], |row| row.get(0))?;
        Ok(count == 0)
    }

    // -----------------------------------------------------------------------
    // Issues
    // -----------------------------------------------------------------------

    pub fn upsert_issue(&self, issue: &Issue) -> Result<()> {
        upsert_issue_with_conn(&self.lock(), issue)?;
        Ok(())
    }

    pub fn get_issue(&self, id: &str) -> Result<Issue> {
        self.lock()
            .query_row(
                &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1"),
                params![id],
                issue_from_row,
            )
            .optional()?
            .ok_or_else(|| PitstopError::IssueNotFound(id.to_string()))
    }

    pub fn issues_for_sprint(&self, sprint_id: &str) -> Result<Vec<Issue>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ISSUE_COLUMNS} FROM issues WHERE sprint_id = ?1 ORDER BY key, id"
        ))?;
        let rows = stmt.query_map(params![sprint_id], issue_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Load, patch and write back one issue. Last writer wins.
    pub fn update_issue(&self, id: &str, update: IssueUpdate) -> Result<Issue> {
        let mut issue = self.get_issue(id)?;
        update.apply(&mut issue);
        self.upsert_issue(&issue)?;
        Ok(issue)
    }

    // -----------------------------------------------------------------------
    // Team
    // -----------------------------------------------------------------------

    pub fn upsert_member(&self, member: &TeamMember) -> Result<()> {
        upsert_member_with_conn(&self.lock(), member)?;
        Ok(())
    }

    pub fn get_member(&self, id: &str) -> Result<TeamMember> {
        self.lock()
            .query_row(
                "SELECT id, name, role, capacity, active, email FROM team_members WHERE id = ?1",
                params![id],
                member_from_row,
            )
            .optional()?
            .ok_or_else(|| PitstopError::MemberNotFound(id.to_string()))
    }

    pub fn list_team(&self) -> Result<Vec<TeamMember>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, role, capacity, active, email FROM team_members ORDER BY name, id",
        )?;
        let rows = stmt.query_map([], member_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // -----------------------------------------------------------------------
    // Bulk sprint data
    // -----------------------------------------------------------------------

    /// Overwrite everything known about one sprint in a single transaction:
    /// the sprint row and its full issue set. Members it mentions are added,
    /// but existing members keep their local capacity, role and active flag.
    pub fn replace_sprint_data(&self, data: &SprintData) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        upsert_sprint_with_conn(&tx, &data.sprint)?;
        tx.execute(
            "DELETE FROM issues WHERE sprint_id = ?1",
            params![data.sprint.id],
        )?;
        for issue in &data.issues {
            upsert_issue_with_conn(&tx, issue)?;
        }
        for member in &data.team {
            merge_member_with_conn(&tx, member)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Sprint (by id, or the active one), its issues, and the whole team.
    pub fn load_sprint_data(&self, sprint_id: Option<&str>) -> Result<SprintData> {
        let sprint = match sprint_id {
            Some(id) => self.get_sprint(id)?,
            None => self.active_sprint()?.ok_or(PitstopError::NoActiveSprint)?,
        };
        let issues = self.issues_for_sprint(&sprint.id)?;
        let team = self.list_team()?;
        Ok(SprintData {
            sprint,
            issues,
            team,
        })
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Append a snapshot. The returned row is exactly what a later read yields.
    pub fn append_snapshot(
        &self,
        sprint_id: &str,
        metrics: &SprintMetrics,
        recorded_at: DateTime<Utc>,
    ) -> Result<MetricsSnapshot> {
        let recorded_ms = to_millis(recorded_at);
        let conn = self.lock();
        conn.execute(
            "INSERT INTO metrics_snapshots (sprint_id, health_score, velocity, completion_percentage,
                                            blockers_count, average_load, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                sprint_id,
                metrics.health_score,
                metrics.velocity,
                metrics.completion_percentage,
                metrics.blockers_count,
                metrics.average_load,
                recorded_ms,
            ],
        )?;
        Ok(MetricsSnapshot {
            id: conn.last_insert_rowid(),
            sprint_id: sprint_id.to_string(),
            health_score: metrics.health_score,
            velocity: metrics.velocity,
            completion_percentage: metrics.completion_percentage,
            blockers_count: metrics.blockers_count,
            average_load: metrics.average_load,
            recorded_at: from_millis(recorded_ms),
        })
    }

    /// Oldest first, for trend charts.
    pub fn snapshots_for_sprint(&self, sprint_id: &str) -> Result<Vec<MetricsSnapshot>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, sprint_id, health_score, velocity, completion_percentage, blockers_count,
                    average_load, recorded_at
             FROM metrics_snapshots WHERE sprint_id = ?1 ORDER BY recorded_at, id",
        )?;
        let rows = stmt.query_map(params![sprint_id], snapshot_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // -----------------------------------------------------------------------
    // Recommendations
    // -----------------------------------------------------------------------

    /// Persist freshly generated recommendations for a sprint.
    ///
    /// Ids are `{sprint}-{rule}-{issue}` for issue-scoped findings and
    /// `{sprint}-{rule}-{n}` otherwise, so regenerating the same findings hits
    /// the same rows. Content is refreshed, status is never reset, and pending
    /// rows that no longer fire are dropped.
    pub fn save_recommendations(
        &self,
        sprint_id: &str,
        recs: &[Recommendation],
        now: DateTime<Utc>,
    ) -> Result<Vec<StoredRecommendation>> {
        let mut ids = Vec::with_capacity(recs.len());
        {
            let mut conn = self.lock();
            let tx = conn.transaction()?;
            let mut per_rule: std::collections::HashMap<&str, u32> = Default::default();
            for rec in recs {
                let id = match &rec.issue_id {
                    Some(issue_id) => format!("{sprint_id}-{}-{issue_id}", rec.rule),
                    None => {
                        let n = per_rule.entry(rec.rule.as_str()).or_insert(0);
                        *n += 1;
                        format!("{sprint_id}-{}-{n}", rec.rule)
                    }
                };
                let affected: Vec<&str> = rec.affected_tasks.iter().map(|t| t.id.as_str()).collect();
                tx.execute(
                    "INSERT INTO recommendations (id, sprint_id, rule, title, problem, solution, priority,
                                                  success_probability, affected_issue_ids, status, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending', ?10)
                     ON CONFLICT(id) DO UPDATE SET
                        title = excluded.title,
                        problem = excluded.problem,
                        solution = excluded.solution,
                        priority = excluded.priority,
                        success_probability = excluded.success_probability,
                        affected_issue_ids = excluded.affected_issue_ids",
                    params![
                        id,
                        sprint_id,
                        rec.rule,
                        rec.title,
                        rec.problem,
                        rec.solution,
                        rec.priority.as_str(),
                        rec.success_probability,
                        serde_json::to_string(&affected)?,
                        to_millis(now),
                    ],
                )?;
                ids.push(id);
            }

            let stale: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM recommendations WHERE sprint_id = ?1 AND status = 'pending'",
                )?;
                let rows = stmt.query_map(params![sprint_id], |row| row.get::<_, String>(0))?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
                    .into_iter()
                    .filter(|id| !ids.contains(id))
                    .collect()
            };
            for id in &stale {
                tx.execute("DELETE FROM recommendations WHERE id = ?1", params![id])?;
            }
            tx.commit()?;
        }

        ids.iter().map(|id| self.get_recommendation(id)).collect()
    }

    pub fn get_recommendation(&self, id: &str) -> Result<StoredRecommendation> {
        self.lock()
            .query_row(
                &format!("SELECT {RECOMMENDATION_COLUMNS} FROM recommendations WHERE id = ?1"),
                params![id],
                recommendation_from_row,
            )
            .optional()?
            .ok_or_else(|| PitstopError::RecommendationNotFound(id.to_string()))
    }

    pub fn recommendations_for_sprint(&self, sprint_id: &str) -> Result<Vec<StoredRecommendation>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECOMMENDATION_COLUMNS} FROM recommendations WHERE sprint_id = ?1
             ORDER BY created_at, rowid"
        ))?;
        let rows = stmt.query_map(params![sprint_id], recommendation_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The only mutation a recommendation ever receives.
    pub fn set_recommendation_status(
        &self,
        id: &str,
        status: RecommendationStatus,
        now: DateTime<Utc>,
    ) -> Result<StoredRecommendation> {
        let applied_at = (status == RecommendationStatus::Applied).then(|| to_millis(now));
        let changed = self.lock().execute(
            "UPDATE recommendations SET status = ?2, applied_at = COALESCE(?3, applied_at) WHERE id = ?1",
            params![id, status.as_str(), applied_at],
        )?;
        if changed == 0 {
            return Err(PitstopError::RecommendationNotFound(id.to_string()));
        }
        self.get_recommendation(id)
    }

    // -----------------------------------------------------------------------
    // Activities
    // -----------------------------------------------------------------------

    pub fn record_activity(&self, activity: &Activity) -> Result<()> {
        self.lock().execute(
            "INSERT INTO activities (id, sprint_id, kind, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                activity.id,
                activity.sprint_id,
                activity.kind,
                activity.message,
                to_millis(activity.created_at),
            ],
        )?;
        Ok(())
    }

    /// Newest first.
    pub fn recent_activities(&self, limit: usize) -> Result<Vec<Activity>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, sprint_id, kind, message, created_at FROM activities
             ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(Activity {
                id: row.get(0)?,
                sprint_id: row.get(1)?,
                kind: row.get(2)?,
                message: row.get(3)?,
                created_at: from_millis(row.get(4)?),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // -----------------------------------------------------------------------
    // Achievements
    // -----------------------------------------------------------------------

    /// Insert achievements not yet held; returns only the new ones.
    pub fn award(&self, achievements: &[Achievement]) -> Result<Vec<Achievement>> {
        let conn = self.lock();
        let mut fresh = Vec::new();
        for a in achievements {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO achievements (sprint_id, code, title, description, awarded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![a.sprint_id, a.code, a.title, a.description, to_millis(a.awarded_at)],
            )?;
            if inserted > 0 {
                fresh.push(a.clone());
            }
        }
        Ok(fresh)
    }

    pub fn achievements(&self, sprint_id: Option<&str>) -> Result<Vec<Achievement>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT sprint_id, code, title, description, awarded_at FROM achievements
             WHERE ?1 IS NULL OR sprint_id = ?1
             ORDER BY awarded_at, code",
        )?;
        let rows = stmt.query_map(params![sprint_id], |row| {
            Ok(Achievement {
                sprint_id: row.get(0)?,
                code: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
                awarded_at: from_millis(row.get(4)?),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
