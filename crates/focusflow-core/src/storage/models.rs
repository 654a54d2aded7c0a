use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collaborators::NewSession;
use crate::timer::SegmentType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub name: String,
    pub session_count: u64,
    /// Focus seconds credited to this activity.
    pub total_secs: u64,
    pub created_at: DateTime<Utc>,
}

/// A realized span of a session: what kind of time, and how much.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSegment {
    pub segment_type: SegmentType,
    pub duration_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub activity_id: i64,
    #[serde(default)]
    pub duration_id: Option<i64>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub is_ongoing: bool,
    #[serde(default)]
    pub segments: Vec<SessionSegment>,
}

impl Session {
    pub fn from_new(new: &NewSession, id: String) -> Self {
        Self {
            id,
            activity_id: new.activity_id,
            duration_id: new.duration_id,
            started_at: new.started_at,
            ended_at: None,
            is_ongoing: true,
            segments: Vec::new(),
        }
    }

    /// Extend the trailing segment when it has the same type, else open a new one.
    pub fn add_increment(&mut self, segment_type: SegmentType, secs: u64) {
        match self.segments.last_mut() {
            Some(last) if last.segment_type == segment_type => {
                last.duration_secs = last.duration_secs.saturating_add(secs);
            }
            _ => self.segments.push(SessionSegment {
                segment_type,
                duration_secs: secs,
            }),
        }
    }

    pub fn total_secs(&self, segment_type: SegmentType) -> u64 {
        self.segments
            .iter()
            .filter(|s| s.segment_type == segment_type)
            .map(|s| s.duration_secs)
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub sessions: u64,
    pub completed_sessions: u64,
    pub focus_secs: u64,
    pub break_secs: u64,
    pub pause_secs: u64,
}

impl Stats {
    pub(crate) fn add(&mut self, segment_type: SegmentType, secs: u64) {
        match segment_type {
            SegmentType::Focus => self.focus_secs += secs,
            SegmentType::Break => self.break_secs += secs,
            SegmentType::Pause => self.pause_secs += secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub activity_id: i64,
    pub name: String,
    pub sessions: u64,
    pub focus_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_merge_with_same_trailing_type() {
        let new = NewSession::new(1, None, Utc::now());
        let mut session = Session::from_new(&new, new.id.clone());
        session.add_increment(SegmentType::Focus, 60);
        session.add_increment(SegmentType::Focus, 60);
        session.add_increment(SegmentType::Pause, 60);
        session.add_increment(SegmentType::Focus, 120);

        assert_eq!(session.segments.len(), 3);
        assert_eq!(session.segments[0].duration_secs, 120);
        assert_eq!(session.total_secs(SegmentType::Focus), 240);
        assert_eq!(session.total_secs(SegmentType::Pause), 60);
    }
}
