//! SQLite-based storage for activities, duration plans and sessions.
//!
//! [`Database`] is also the production [`SessionStore`] behind the timer
//! orchestrator.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::data_dir;
use super::migrations;
use super::models::{Activity, ActivityStats, Session, SessionSegment, Stats};
use crate::collaborators::{NewSession, SessionStore, StoreResult};
use crate::error::DatabaseError;
use crate::timer::{DurationPlan, PlanSegment, SegmentType};

pub type DbResult<T> = Result<T, DatabaseError>;

/// Midnight UTC of the current day.
pub fn start_of_today() -> Option<DateTime<Utc>> {
    Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
}

/// SQLite database for focusflow data.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data_dir>/focusflow.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the
    /// database cannot be opened or migrated.
    pub fn open() -> crate::error::Result<Self> {
        let path = data_dir()?.join("focusflow.db");
        Ok(Self::open_at(&path)?)
    }

    pub fn open_at(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::init(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    // ── Activities ───────────────────────────────────────────────────

    pub fn add_activity(&self, name: &str) -> DbResult<Activity> {
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO activities (name, created_at) VALUES (?1, ?2)",
            params![name, fmt_ts(now)],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_activity(id)?.ok_or(DatabaseError::NotFound {
            kind: "activity",
            id: id.to_string(),
        })
    }

    pub fn get_activity(&self, id: i64) -> DbResult<Option<Activity>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, session_count, total_secs, created_at
                 FROM activities WHERE id = ?1",
                params![id],
                activity_from_row,
            )
            .optional()?)
    }

    pub fn list_activities(&self) -> DbResult<Vec<Activity>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, session_count, total_secs, created_at
             FROM activities ORDER BY name COLLATE NOCASE",
        )?;
        let rows = stmt.query_map([], activity_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn rename_activity(&self, id: i64, name: &str) -> DbResult<()> {
        let changed = self
            .conn
            .execute("UPDATE activities SET name = ?1 WHERE id = ?2", params![name, id])?;
        expect_row(changed, "activity", id)
    }

    /// Remove an activity. Its sessions stay, so history and stats survive.
    pub fn remove_activity(&self, id: i64) -> DbResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM activities WHERE id = ?1", params![id])?;
        expect_row(changed, "activity", id)
    }

    // ── Duration plans ───────────────────────────────────────────────

    /// Store a plan and return it with its new id.
    pub fn add_duration(&self, plan: &DurationPlan) -> DbResult<DurationPlan> {
        plan.validate()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let segments = serde_json::to_string(&plan.segments)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO durations (name, segments, created_at) VALUES (?1, ?2, ?3)",
            params![plan.name, segments, fmt_ts(Utc::now())],
        )?;
        Ok(DurationPlan {
            id: Some(self.conn.last_insert_rowid()),
            ..plan.clone()
        })
    }

    pub fn get_duration(&self, id: i64) -> DbResult<Option<DurationPlan>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, segments FROM durations WHERE id = ?1",
                params![id],
                duration_from_row,
            )
            .optional()?)
    }

    pub fn list_durations(&self) -> DbResult<Vec<DurationPlan>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, segments FROM durations ORDER BY id")?;
        let rows = stmt.query_map([], duration_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn remove_duration(&self, id: i64) -> DbResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM durations WHERE id = ?1", params![id])?;
        expect_row(changed, "duration", id)
    }

    // ── Sessions ─────────────────────────────────────────────────────

    pub fn get_session(&self, id: &str) -> DbResult<Option<Session>> {
        let session = self
            .conn
            .query_row(
                "SELECT id, activity_id, duration_id, started_at, ended_at, is_ongoing
                 FROM sessions WHERE id = ?1",
                params![id],
                session_from_row,
            )
            .optional()?;
        match session {
            Some(mut session) => {
                session.segments = self.session_segments(&session.id)?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Sessions newest first.
    pub fn list_sessions(&self, limit: Option<usize>) -> DbResult<Vec<Session>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(
            "SELECT id, activity_id, duration_id, started_at, ended_at, is_ongoing
             FROM sessions ORDER BY started_at DESC LIMIT ?1",
        )?;
        let mut sessions = stmt
            .query_map(params![limit], session_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        for session in &mut sessions {
            session.segments = self.session_segments(&session.id)?;
        }
        Ok(sessions)
    }

    fn session_segments(&self, session_id: &str) -> DbResult<Vec<SessionSegment>> {
        let mut stmt = self.conn.prepare(
            "SELECT segment_type, duration_secs FROM session_segments
             WHERE session_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok(SessionSegment {
                segment_type: segment_type_from_sql(row.get::<_, String>(0)?)?,
                duration_secs: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub(crate) fn insert_session(&self, session: &Session) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO sessions (id, activity_id, duration_id, started_at, ended_at, is_ongoing)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.id,
                session.activity_id,
                session.duration_id,
                fmt_ts(session.started_at),
                session.ended_at.map(fmt_ts),
                session.is_ongoing,
            ],
        )?;
        for (position, segment) in session.segments.iter().enumerate() {
            self.conn.execute(
                "INSERT INTO session_segments (session_id, position, segment_type, duration_secs)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    session.id,
                    position as i64,
                    segment.segment_type.as_str(),
                    segment.duration_secs
                ],
            )?;
        }
        Ok(())
    }

    // ── Statistics ───────────────────────────────────────────────────

    /// Totals over every session.
    pub fn stats_all(&self) -> DbResult<Stats> {
        self.stats_since(None)
    }

    /// Totals over sessions started at or after `since`.
    pub fn stats_since(&self, since: Option<DateTime<Utc>>) -> DbResult<Stats> {
        let since = since.map(fmt_ts).unwrap_or_default();
        let mut stats = Stats::default();

        let (sessions, completed) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN is_ongoing = 0 THEN 1 ELSE 0 END), 0)
             FROM sessions WHERE started_at >= ?1",
            params![since],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        stats.sessions = sessions;
        stats.completed_sessions = completed;

        let mut stmt = self.conn.prepare(
            "SELECT seg.segment_type, COALESCE(SUM(seg.duration_secs), 0)
             FROM session_segments seg
             JOIN sessions s ON s.id = seg.session_id
             WHERE s.started_at >= ?1
             GROUP BY seg.segment_type",
        )?;
        let rows = stmt.query_map(params![since], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;
        for row in rows {
            let (segment_type, secs) = row?;
            if let Some(segment_type) = SegmentType::parse(&segment_type) {
                stats.add(segment_type, secs);
            }
        }
        Ok(stats)
    }

    /// Today's totals (UTC day).
    pub fn stats_today(&self) -> DbResult<Stats> {
        self.stats_since(start_of_today())
    }

    /// Per-activity session counts and focus time, busiest first.
    pub fn activity_breakdown(&self, since: Option<DateTime<Utc>>) -> DbResult<Vec<ActivityStats>> {
        let since = since.map(fmt_ts).unwrap_or_default();
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.name,
                    (SELECT COUNT(*) FROM sessions s
                     WHERE s.activity_id = a.id AND s.started_at >= ?1),
                    (SELECT COALESCE(SUM(seg.duration_secs), 0)
                     FROM session_segments seg JOIN sessions s ON s.id = seg.session_id
                     WHERE s.activity_id = a.id AND s.started_at >= ?1
                       AND seg.segment_type = 'focus')
             FROM activities a",
        )?;
        let rows = stmt.query_map(params![since], |row| {
            Ok(ActivityStats {
                activity_id: row.get(0)?,
                name: row.get(1)?,
                sessions: row.get(2)?,
                focus_secs: row.get(3)?,
            })
        })?;
        let mut breakdown = rows.collect::<Result<Vec<_>, _>>()?;
        breakdown.sort_by(|a, b| b.focus_secs.cmp(&a.focus_secs).then(a.name.cmp(&b.name)));
        Ok(breakdown)
    }

    pub(crate) fn insert_activity(&self, activity: &Activity) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO activities (id, name, session_count, total_secs, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                activity.id,
                activity.name,
                activity.session_count,
                activity.total_secs,
                fmt_ts(activity.created_at)
            ],
        )?;
        Ok(())
    }

    pub(crate) fn insert_duration(&self, plan: &DurationPlan) -> DbResult<()> {
        let segments = serde_json::to_string(&plan.segments)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO durations (id, name, segments, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![plan.id, plan.name, segments, fmt_ts(Utc::now())],
        )?;
        Ok(())
    }

    pub(crate) fn clear_all(&self) -> DbResult<()> {
        self.conn.execute_batch(
            "DELETE FROM session_segments;
             DELETE FROM sessions;
             DELETE FROM durations;
             DELETE FROM activities;",
        )?;
        Ok(())
    }
}

impl SessionStore for Database {
    fn create_session(&mut self, session: &NewSession) -> StoreResult<String> {
        let mut id = session.id.clone();
        let mut suffix = 1;
        while self.session_exists(&id)? {
            id = format!("{}-{suffix}", session.id);
            suffix += 1;
        }
        self.insert_session(&Session::from_new(session, id.clone()))?;
        Ok(id)
    }

    fn end_session(&mut self, id: &str, ended_at: DateTime<Utc>) -> StoreResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE sessions SET ended_at = ?1, is_ongoing = 0 WHERE id = ?2",
                params![fmt_ts(ended_at), id],
            )
            .map_err(DatabaseError::from)?;
        Ok(expect_row(changed, "session", id)?)
    }

    fn session_exists(&self, id: &str) -> StoreResult<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM sessions WHERE id = ?1", params![id], |_| Ok(()))
            .optional()
            .map_err(DatabaseError::from)?;
        Ok(found.is_some())
    }

    fn increment_session_segment(
        &mut self,
        id: &str,
        segment_type: SegmentType,
        increment_secs: u64,
    ) -> StoreResult<()> {
        if !self.session_exists(id)? {
            return Err(DatabaseError::NotFound {
                kind: "session",
                id: id.to_string(),
            }
            .into());
        }
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(DatabaseError::from)?;
        let last = tx
            .query_row(
                "SELECT position, segment_type FROM session_segments
                 WHERE session_id = ?1 ORDER BY position DESC LIMIT 1",
                params![id],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .map_err(DatabaseError::from)?;

        match last {
            Some((position, last_type)) if last_type == segment_type.as_str() => {
                tx.execute(
                    "UPDATE session_segments SET duration_secs = duration_secs + ?1
                     WHERE session_id = ?2 AND position = ?3",
                    params![increment_secs, id, position],
                )
                .map_err(DatabaseError::from)?;
            }
            last => {
                let position = last.map(|(p, _)| p + 1).unwrap_or(0);
                tx.execute(
                    "INSERT INTO session_segments (session_id, position, segment_type, duration_secs)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![id, position, segment_type.as_str(), increment_secs],
                )
                .map_err(DatabaseError::from)?;
            }
        }
        tx.commit().map_err(DatabaseError::from)?;
        Ok(())
    }

    fn activity_exists(&self, activity_id: i64) -> StoreResult<bool> {
        Ok(self.get_activity(activity_id)?.is_some())
    }

    fn increment_activity_session_count(&mut self, activity_id: i64) -> StoreResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE activities SET session_count = session_count + 1 WHERE id = ?1",
                params![activity_id],
            )
            .map_err(DatabaseError::from)?;
        Ok(expect_row(changed, "activity", activity_id)?)
    }

    fn increment_activity_time(&mut self, activity_id: i64, increment_secs: u64) -> StoreResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE activities SET total_secs = total_secs + ?1 WHERE id = ?2",
                params![increment_secs, activity_id],
            )
            .map_err(DatabaseError::from)?;
        Ok(expect_row(changed, "activity", activity_id)?)
    }
}

/// Fixed-width UTC timestamps so text comparison orders correctly.
fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn segment_type_from_sql(value: String) -> rusqlite::Result<SegmentType> {
    SegmentType::parse(&value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown segment type '{value}'").into(),
        )
    })
}

fn expect_row(changed: usize, kind: &'static str, id: impl ToString) -> DbResult<()> {
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    Ok(Activity {
        id: row.get(0)?,
        name: row.get(1)?,
        session_count: row.get(2)?,
        total_secs: row.get(3)?,
        created_at: parse_ts(4, row.get(4)?)?,
    })
}

fn duration_from_row(row: &Row<'_>) -> rusqlite::Result<DurationPlan> {
    let segments: String = row.get(2)?;
    let segments: Vec<PlanSegment> = serde_json::from_str(&segments).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(DurationPlan {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        segments,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        activity_id: row.get(1)?,
        duration_id: row.get(2)?,
        started_at: parse_ts(3, row.get(3)?)?,
        ended_at: row
            .get::<_, Option<String>>(4)?
            .map(|v| parse_ts(4, v))
            .transpose()?,
        is_ongoing: row.get(5)?,
        segments: Vec::new(),
    })
}
