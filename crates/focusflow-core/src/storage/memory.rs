//! In-memory [`SessionStore`], for hosts without a database and for tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::models::{Activity, Session};
use crate::collaborators::{NewSession, SessionStore, StoreResult};
use crate::error::StoreError;
use crate::timer::SegmentType;

#[derive(Debug, Default)]
pub struct MemoryStore {
    activities: BTreeMap<i64, Activity>,
    sessions: BTreeMap<String, Session>,
    next_activity_id: i64,
    increment_log: Vec<(String, SegmentType, u64)>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn add_activity(&mut self, name: &str) -> i64 {
        self.next_activity_id += 1;
        let id = self.next_activity_id;
        self.activities.insert(
            id,
            Activity {
                id,
                name: name.to_string(),
                session_count: 0,
                total_secs: 0,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub fn remove_activity(&mut self, id: i64) -> Option<Activity> {
        self.activities.remove(&id)
    }

    pub fn activity(&self, id: i64) -> Option<&Activity> {
        self.activities.get(&id)
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn remove_session(&mut self, id: &str) -> Option<Session> {
        self.sessions.remove(id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Session segment increments accepted so far, in order.
    pub fn increments(&self) -> &[(String, SegmentType, u64)] {
        &self.increment_log
    }

    /// Make every write fail with a backend error.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes {
            return Err(StoreError::Backend("store is read-only".into()));
        }
        Ok(())
    }

    fn activity_mut(&mut self, id: i64) -> StoreResult<&mut Activity> {
        self.activities.get_mut(&id).ok_or(StoreError::NotFound {
            kind: "activity",
            id: id.to_string(),
        })
    }

    fn session_mut(&mut self, id: &str) -> StoreResult<&mut Session> {
        self.sessions.get_mut(id).ok_or_else(|| StoreError::NotFound {
            kind: "session",
            id: id.to_string(),
        })
    }
}

impl SessionStore for MemoryStore {
    fn create_session(&mut self, session: &NewSession) -> StoreResult<String> {
        self.check_writable()?;
        let mut id = session.id.clone();
        let mut suffix = 1;
        while self.sessions.contains_key(&id) {
            id = format!("{}-{suffix}", session.id);
            suffix += 1;
        }
        self.sessions
            .insert(id.clone(), Session::from_new(session, id.clone()));
        Ok(id)
    }

    fn end_session(&mut self, id: &str, ended_at: DateTime<Utc>) -> StoreResult<()> {
        self.check_writable()?;
        let session = self.session_mut(id)?;
        session.ended_at = Some(ended_at);
        session.is_ongoing = false;
        Ok(())
    }

    fn session_exists(&self, id: &str) -> StoreResult<bool> {
        Ok(self.sessions.contains_key(id))
    }

    fn increment_session_segment(
        &mut self,
        id: &str,
        segment_type: SegmentType,
        increment_secs: u64,
    ) -> StoreResult<()> {
        self.check_writable()?;
        self.session_mut(id)?
            .add_increment(segment_type, increment_secs);
        self.increment_log
            .push((id.to_string(), segment_type, increment_secs));
        Ok(())
    }

    fn activity_exists(&self, activity_id: i64) -> StoreResult<bool> {
        Ok(self.activities.contains_key(&activity_id))
    }

    fn increment_activity_session_count(&mut self, activity_id: i64) -> StoreResult<()> {
        self.check_writable()?;
        self.activity_mut(activity_id)?.session_count += 1;
        Ok(())
    }

    fn increment_activity_time(&mut self, activity_id: i64, increment_secs: u64) -> StoreResult<()> {
        self.check_writable()?;
        let activity = self.activity_mut(activity_id)?;
        activity.total_secs = activity.total_secs.saturating_add(increment_secs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colliding_session_ids_get_suffixes() {
        let mut store = MemoryStore::default();
        let new = NewSession::new(1, None, Utc::now());
        let a = store.create_session(&new).unwrap();
        let b = store.create_session(&new).unwrap();
        assert_eq!(a, new.id);
        assert_eq!(b, format!("{}-1", new.id));
    }

    #[test]
    fn missing_references_are_not_found() {
        let mut store = MemoryStore::default();
        let err = store.increment_activity_time(4, 60).unwrap_err();
        assert!(err.is_not_found());
        let err = store.end_session("nope", Utc::now()).unwrap_err();
        assert!(err.is_not_found());
    }
}
