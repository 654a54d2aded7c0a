//! Interfaces the timer orchestrator talks to.
//!
//! Persistence, notifications, prompts and sound are platform concerns.
//! The orchestrator only sees these traits, so its logic runs the same in a
//! terminal, a GUI shell or a test.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NotifyError, StoreError};
use crate::timer::SegmentType;

pub type StoreResult<T> = Result<T, StoreError>;

/// A session as handed to the store when the timer starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    /// Derived from `started_at`.
    pub id: String,
    pub activity_id: i64,
    pub duration_id: Option<i64>,
    pub started_at: DateTime<Utc>,
}

impl NewSession {
    pub fn new(activity_id: i64, duration_id: Option<i64>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: started_at.timestamp_millis().to_string(),
            activity_id,
            duration_id,
            started_at,
        }
    }
}

/// Persistence collaborator.
///
/// Missing references come back as [`StoreError::NotFound`], never as panics.
pub trait SessionStore {
    /// Create an ongoing session with no segments. Returns the stored id,
    /// which may differ from `session.id` if that id was taken.
    fn create_session(&mut self, session: &NewSession) -> StoreResult<String>;

    fn end_session(&mut self, id: &str, ended_at: DateTime<Utc>) -> StoreResult<()>;

    fn session_exists(&self, id: &str) -> StoreResult<bool>;

    fn increment_session_segment(
        &mut self,
        id: &str,
        segment_type: SegmentType,
        increment_secs: u64,
    ) -> StoreResult<()>;

    fn activity_exists(&self, activity_id: i64) -> StoreResult<bool>;

    fn increment_activity_session_count(&mut self, activity_id: i64) -> StoreResult<()>;

    fn increment_activity_time(&mut self, activity_id: i64, increment_secs: u64) -> StoreResult<()>;
}

pub type NotificationId = String;

/// Deferred local notifications.
pub trait Notifier {
    fn schedule_notification(
        &mut self,
        title: &str,
        body: &str,
        fire_at: DateTime<Utc>,
    ) -> Result<NotificationId, NotifyError>;

    fn cancel_notification(&mut self, id: &NotificationId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    StopConfirmation,
    SegmentComplete,
    SessionComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptChoice {
    /// "Stop" on the stop prompt, "Proceed" on completion prompts.
    Confirm,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOption {
    pub label: String,
    pub choice: PromptChoice,
}

/// A confirmation waiting for the user. Answered through
/// [`crate::timer::TimerOrchestrator::respond`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub kind: PromptKind,
    pub title: String,
    pub description: String,
    pub options: Vec<PromptOption>,
}

impl Prompt {
    pub fn allows(&self, choice: PromptChoice) -> bool {
        self.options.iter().any(|o| o.choice == choice)
    }
}

pub trait Presenter {
    fn present(&mut self, prompt: &Prompt);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundClip {
    SegmentComplete,
    SessionComplete,
}

/// Fire-and-forget audio.
pub trait SoundPlayer {
    fn play(&mut self, clip: SoundClip);
}

/// Everything the host platform provides besides storage.
pub trait Platform: Notifier + Presenter + SoundPlayer {}

impl<T: Notifier + Presenter + SoundPlayer> Platform for T {}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<C: Clock + ?Sized> Clock for std::rc::Rc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
