//! JSON backup and restore of everything in the database.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::database::{Database, DbResult};
use super::models::{Activity, Session};
use crate::error::{DatabaseError, Result};
use crate::timer::DurationPlan;

pub const BACKUP_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub activities: Vec<Activity>,
    pub durations: Vec<DurationPlan>,
    pub sessions: Vec<Session>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSummary {
    pub activities: usize,
    pub durations: usize,
    pub sessions: usize,
}

impl Backup {
    pub fn summary(&self) -> BackupSummary {
        BackupSummary {
            activities: self.activities.len(),
            durations: self.durations.len(),
            sessions: self.sessions.len(),
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl Database {
    pub fn export_backup(&self) -> DbResult<Backup> {
        Ok(Backup {
            version: BACKUP_VERSION,
            exported_at: Utc::now(),
            activities: self.list_activities()?,
            durations: self.list_durations()?,
            sessions: self.list_sessions(None)?,
        })
    }

    /// Replace all data with the backup contents, atomically.
    pub fn import_backup(&self, backup: &Backup) -> DbResult<BackupSummary> {
        if backup.version != BACKUP_VERSION {
            return Err(DatabaseError::UnsupportedBackup(backup.version));
        }
        let tx = self.conn().unchecked_transaction()?;
        self.clear_all()?;
        for activity in &backup.activities {
            self.insert_activity(activity)?;
        }
        for plan in &backup.durations {
            self.insert_duration(plan)?;
        }
        for session in &backup.sessions {
            self.insert_session(session)?;
        }
        tx.commit()?;

        let summary = backup.summary();
        info!(?summary, "backup restored");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{NewSession, SessionStore};
    use crate::timer::SegmentType;

    fn seeded() -> Database {
        let mut db = Database::open_memory().unwrap();
        let activity = db.add_activity("Reading").unwrap();
        db.add_duration(&DurationPlan::from_minutes("classic", &[25, 5, 25]).unwrap())
            .unwrap();
        let id = db
            .create_session(&NewSession::new(activity.id, None, Utc::now()))
            .unwrap();
        db.increment_session_segment(&id, SegmentType::Focus, 120)
            .unwrap();
        db.end_session(&id, Utc::now()).unwrap();
        db
    }

    #[test]
    fn export_then_import_into_fresh_database() {
        let source = seeded();
        let backup = source.export_backup().unwrap();

        let target = Database::open_memory().unwrap();
        target.add_activity("Stale").unwrap();
        let summary = target.import_backup(&backup).unwrap();
        assert_eq!(
            summary,
            BackupSummary {
                activities: 1,
                durations: 1,
                sessions: 1
            }
        );

        let activities = target.list_activities().unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].name, "Reading");
        let sessions = target.list_sessions(None).unwrap();
        assert_eq!(sessions[0].segments[0].duration_secs, 120);
        assert_eq!(target.stats_all().unwrap().focus_secs, 120);
    }

    #[test]
    fn rejects_unknown_version() {
        let db = seeded();
        let mut backup = db.export_backup().unwrap();
        backup.version = 99;
        assert!(matches!(
            db.import_backup(&backup),
            Err(DatabaseError::UnsupportedBackup(99))
        ));
        assert_eq!(db.list_activities().unwrap().len(), 1);
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("backup.json");
        let backup = seeded().export_backup().unwrap();
        backup.write_to(&path).unwrap();
        assert_eq!(Backup::read_from(&path).unwrap(), backup);
    }
}
